use axum::{
    body::Body,
    extract::Request,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use crate::state::AppState;
use crate::api::handlers::{health, tenant, group_order, invitation, participant_order};
use tower_http::{
    trace::TraceLayer,
    classify::ServerErrorsFailureClass,
};
use tracing::{info_span, Span, error, info};
use uuid::Uuid;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))

        // Tenants
        .route("/api/v1/tenants", post(tenant::create_tenant))
        .route("/api/v1/tenants/by-slug/{slug}", get(tenant::get_tenant_by_slug))

        // Sessions
        .route("/api/v1/{tenant_id}/group-orders", post(group_order::create_session).get(group_order::list_sessions))
        .route("/api/v1/{tenant_id}/group-orders/{code}", get(group_order::get_session))
        .route("/api/v1/{tenant_id}/group-orders/{code}/close", post(group_order::close_session))
        .route("/api/v1/{tenant_id}/group-orders/{code}/cancel", post(group_order::cancel_session))
        .route("/api/v1/{tenant_id}/group-orders/{code}/extend", post(group_order::extend_session))

        // Invitations
        .route("/api/v1/{tenant_id}/group-orders/{code}/invitations", post(invitation::invite_contacts))
        .route("/api/v1/{tenant_id}/group-orders/{code}/invitations/{invitation_id}/status", post(invitation::mark_invitation_status))

        // Participant orders
        .route("/api/v1/{tenant_id}/group-orders/{code}/orders", post(participant_order::submit_order))
        .route("/api/v1/{tenant_id}/group-orders/{code}/orders/{order_id}", put(participant_order::amend_order))
        .route("/api/v1/{tenant_id}/group-orders/{code}/orders/{order_id}/payment", post(participant_order::record_payment))

        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = Uuid::new_v4().to_string();
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                        tenant_id = tracing::field::Empty,
                    )
                })
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("started processing request: {} {}", request.method(), request.uri().path());
                })
                .on_response(|response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "finished processing request"
                    );
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    error!("request failed: {:?}", error);
                })
        )
        .with_state(state)
}
