use axum::{extract::{Path, State}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::{
    idempotency_key::OptionalIdempotencyKey,
    order_token::OrderEditToken,
    organizer::OrganizerToken,
    payment_callback::PaymentCallback,
    tenant::CurrentTenant,
};
use crate::api::dtos::{
    requests::{AmendOrderRequest, RecordPaymentRequest, SubmitOrderRequest},
    responses::{ParticipantOrderView, SubmitOrderResponse},
};
use crate::domain::services::order_collector::{AmendCredentials, SubmitOrderInput};
use crate::error::AppError;
use std::sync::Arc;

pub async fn submit_order(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, code)): Path<(String, String)>,
    idempotency_key: OptionalIdempotencyKey,
    Json(payload): Json<SubmitOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session_service.find(&tenant.id, &code).await?;

    let outcome = state.order_collector.submit(&session, SubmitOrderInput {
        idempotency_key: idempotency_key.or_body(payload.idempotency_key),
        participant_name: payload.participant_name,
        contact_email: payload.contact_email,
        contact_id: payload.contact_id,
        items: payload.items,
        scheduled_pickup_time: payload.scheduled_pickup_time,
    }).await?;

    let status = if outcome.duplicate { StatusCode::OK } else { StatusCode::CREATED };

    Ok((status, Json(SubmitOrderResponse {
        participant_order_id: outcome.order.id,
        payment_status: outcome.order.payment_status,
        subtotal_cents: outcome.order.subtotal_cents,
        duplicate: outcome.duplicate,
        edit_token: outcome.edit_token,
    })))
}

/// Allowed for the participant holding the order's edit token, or the organizer.
pub async fn amend_order(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, code, order_id)): Path<(String, String, String)>,
    edit_token: OrderEditToken,
    organizer: OrganizerToken,
    Json(payload): Json<AmendOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session_service.find(&tenant.id, &code).await?;

    let credentials = AmendCredentials {
        edit_token: edit_token.as_deref(),
        organizer_token: organizer.as_deref(),
    };
    let order = state.order_collector.amend(&session, &order_id, payload.items, credentials).await?;

    Ok(Json(ParticipantOrderView::from(order)))
}

/// Payment gateway callback for a pay-individually order.
pub async fn record_payment(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, code, order_id)): Path<(String, String, String)>,
    _gateway: PaymentCallback,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session_service.find(&tenant.id, &code).await?;

    let order = state.order_collector.record_payment(&session, &order_id, payload.reference.trim()).await?;

    Ok(Json(ParticipantOrderView::from(order)))
}
