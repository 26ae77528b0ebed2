use axum::{extract::{Path, State}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::{organizer::OrganizerToken, tenant::CurrentTenant};
use crate::api::dtos::{
    requests::{InviteRequest, MarkInvitationRequest},
    responses::{InvitationView, InvitationsCreatedResponse},
};
use crate::domain::services::invitation_service::InviteContact;
use crate::error::AppError;
use std::sync::Arc;

pub async fn invite_contacts(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, code)): Path<(String, String)>,
    organizer: OrganizerToken,
    Json(payload): Json<InviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session_service.find(&tenant.id, &code).await?;
    state.session_service.authorize(&session, organizer.as_deref())?;

    let contacts = payload.contacts
        .into_iter()
        .map(|c| InviteContact { contact_id: c.contact_id, name: c.name, email: c.email })
        .collect();

    let invitations = state.invitation_tracker.invite(&session, contacts).await?;

    Ok((StatusCode::CREATED, Json(InvitationsCreatedResponse {
        invitations_created: invitations.len(),
        invitations: invitations.into_iter().map(InvitationView::from).collect(),
    })))
}

/// Webhook-style status update from the notification service.
pub async fn mark_invitation_status(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, code, invitation_id)): Path<(String, String, String)>,
    Json(payload): Json<MarkInvitationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session_service.find(&tenant.id, &code).await?;

    let invitation = state.invitation_tracker.mark(&session.id, &invitation_id, payload.status).await?;

    Ok(Json(InvitationView::from(invitation)))
}
