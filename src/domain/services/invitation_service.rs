use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::models::{
    group_session::GroupOrderSession,
    invitation::{Invitation, InvitationStatus},
};
use crate::domain::ports::InvitationRepository;
use crate::error::AppError;

pub struct InviteContact {
    pub contact_id: Option<String>,
    pub name: String,
    pub email: String,
}

/// Advisory bookkeeping of who was asked to join a session. Nothing here gates submission.
pub struct InvitationTracker {
    repo: Arc<dyn InvitationRepository>,
}

impl InvitationTracker {
    pub fn new(repo: Arc<dyn InvitationRepository>) -> Self {
        Self { repo }
    }

    pub async fn invite(&self, session: &GroupOrderSession, contacts: Vec<InviteContact>) -> Result<Vec<Invitation>, AppError> {
        if !session.is_open_at(Utc::now()) {
            return Err(AppError::WindowClosed);
        }

        for contact in &contacts {
            if contact.name.trim().is_empty() {
                return Err(AppError::Validation("Invitee name is required".into()));
            }
            if !contact.email.contains('@') {
                return Err(AppError::Validation(format!("Invalid invitee email: {}", contact.email)));
            }
        }

        let mut invitations = Vec::with_capacity(contacts.len());
        for contact in contacts {
            let invitation = Invitation::new(
                session.id.clone(),
                contact.contact_id,
                contact.name.trim().to_string(),
                contact.email.trim().to_string(),
            );
            invitations.push(self.repo.upsert(&invitation).await?);
        }

        info!(session_code = %session.session_code, count = invitations.len(), "Invitations recorded");
        Ok(invitations)
    }

    /// Forward-only status update. A backward or repeated move leaves the row untouched
    /// and still returns it.
    pub async fn mark(&self, session_id: &str, invitation_id: &str, status: InvitationStatus) -> Result<Invitation, AppError> {
        let existing = self.repo.find_by_id(session_id, invitation_id).await?
            .ok_or(AppError::NotFound("Invitation not found".into()))?;

        if status <= existing.status {
            debug!(invitation_id, current = existing.status.as_str(), requested = status.as_str(), "Ignoring non-forward invitation update");
            return Ok(existing);
        }

        self.repo.advance_status(invitation_id, status, Utc::now()).await?;

        self.repo.find_by_id(session_id, invitation_id).await?
            .ok_or(AppError::NotFound("Invitation not found".into()))
    }

    /// Marks every invitation matching the participant as ORDERED. Contact id wins over email.
    pub async fn mark_ordered_for(&self, session_id: &str, contact_id: Option<&str>, email: Option<&str>) -> Result<u64, AppError> {
        let now = Utc::now();
        if let Some(contact_id) = contact_id.filter(|c| !c.trim().is_empty()) {
            let updated = self.repo.mark_ordered_by_contact(session_id, contact_id, now).await?;
            if updated > 0 {
                return Ok(updated);
            }
        }
        match email.filter(|e| !e.trim().is_empty()) {
            Some(email) => self.repo.mark_ordered_by_email(session_id, email, now).await,
            None => Ok(0),
        }
    }

    pub async fn list(&self, session_id: &str) -> Result<Vec<Invitation>, AppError> {
        self.repo.list_by_session(session_id).await
    }
}
