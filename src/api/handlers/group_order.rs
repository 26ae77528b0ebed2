use axum::{extract::{Path, Query, State}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::{organizer::OrganizerToken, tenant::CurrentTenant};
use crate::api::dtos::{
    requests::{CreateSessionRequest, ExtendSessionRequest, ListSessionsQuery},
    responses::{CloseSessionResponse, RosterResponse, SessionCreatedResponse, SessionStatusResponse, SessionView},
};
use crate::domain::services::invitation_service::InviteContact;
use crate::domain::services::session_service::CreateSessionInput;
use crate::error::AppError;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let invitees: Vec<InviteContact> = payload.invitees
        .into_iter()
        .map(|i| InviteContact { contact_id: i.contact_id, name: i.name, email: i.email })
        .collect();

    let (session, organizer_token) = state.session_service.create(&tenant, CreateSessionInput {
        name: payload.name,
        organizer_name: payload.organizer_name,
        organizer_email: payload.organizer_email,
        organizer_phone: payload.organizer_phone,
        company_name: payload.company_name,
        fulfillment_method: payload.fulfillment_method,
        delivery_address: payload.delivery_address,
        scheduled_pickup_time: payload.scheduled_pickup_time,
        expires_in_hours: payload.expires_in_hours,
        is_sponsored_order: payload.is_sponsored_order,
        sponsor_name: payload.sponsor_name,
    }).await?;

    let invitations_created = if invitees.is_empty() {
        0
    } else {
        match state.invitation_tracker.invite(&session, invitees).await {
            Ok(invitations) => invitations.len(),
            Err(e) => {
                warn!("Session {} created but initial invitations failed: {}", session.session_code, e);
                0
            }
        }
    };

    let shareable_link = tenant.shareable_link(&state.config.share_base_domain, &session.session_code);

    Ok((StatusCode::CREATED, Json(SessionCreatedResponse {
        session_code: session.session_code.clone(),
        shareable_link,
        expires_at: session.expires_at,
        organizer_token,
        invitations_created,
        session: SessionView::new(session, &tenant, &state.config.share_base_domain),
    })))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Query(query): Query<ListSessionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = state.session_service.list(&tenant.id, query.status).await?;

    let views: Vec<SessionView> = sessions
        .into_iter()
        .map(|s| SessionView::new(s, &tenant, &state.config.share_base_domain))
        .collect();

    Ok(Json(views))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, code)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let roster = state.session_service.roster(&tenant.id, &code).await?;

    Ok(Json(RosterResponse::new(roster, &tenant, &state.config.share_base_domain)))
}

pub async fn close_session(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, code)): Path<(String, String)>,
    organizer: OrganizerToken,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session_service.find(&tenant.id, &code).await?;
    state.session_service.authorize(&session, organizer.as_deref())?;

    info!("Organizer closing session {}", code);
    let outcome = state.session_service.close(&session).await?;

    Ok(Json(CloseSessionResponse {
        session_code: outcome.session.session_code,
        status: outcome.session.status,
        report: outcome.report,
    }))
}

pub async fn cancel_session(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, code)): Path<(String, String)>,
    organizer: OrganizerToken,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session_service.find(&tenant.id, &code).await?;
    state.session_service.authorize(&session, organizer.as_deref())?;

    let cancelled = state.session_service.cancel(&session).await?;

    Ok(Json(SessionStatusResponse {
        session_code: cancelled.session_code,
        status: cancelled.status,
        expires_at: cancelled.expires_at,
    }))
}

pub async fn extend_session(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, code)): Path<(String, String)>,
    organizer: OrganizerToken,
    Json(payload): Json<ExtendSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session_service.find(&tenant.id, &code).await?;
    state.session_service.authorize(&session, organizer.as_deref())?;

    let extended = state.session_service.extend(&session, payload.extend_hours).await?;

    Ok(Json(SessionView::new(extended.observed_at(Utc::now()), &tenant, &state.config.share_base_domain)))
}
