use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::domain::models::{
    closeout::CloseTrigger,
    group_session::{generate_access_token, generate_session_code, hash_token, FulfillmentMethod, GroupOrderSession, NewSessionParams, SessionStatus, SettlementStatus},
    invitation::{Invitation, InvitationStats},
    participant_order::ParticipantOrder,
    tenant::Tenant,
};
use crate::domain::ports::{GroupSessionRepository, ParticipantOrderRepository};
use crate::domain::services::closeout::{CloseOutcome, CloseoutAggregator};
use crate::domain::services::invitation_service::InvitationTracker;
use crate::error::AppError;

pub struct CreateSessionInput {
    pub name: Option<String>,
    pub organizer_name: String,
    pub organizer_email: Option<String>,
    pub organizer_phone: String,
    pub company_name: Option<String>,
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    pub expires_in_hours: i64,
    pub is_sponsored_order: bool,
    pub sponsor_name: Option<String>,
}

/// Everything the organizer's "incoming orders" view polls for.
pub struct SessionRoster {
    pub session: GroupOrderSession,
    pub orders: Vec<ParticipantOrder>,
    pub invitations: Vec<Invitation>,
    pub invitation_stats: InvitationStats,
    pub total_cents: i64,
    pub time_remaining_minutes: i64,
}

impl SessionRoster {
    pub fn awaiting_sponsor_payment(&self) -> bool {
        self.session.is_sponsored_order
            && self.session.status.is_terminal()
            && matches!(self.session.settlement_status, SettlementStatus::Pending | SettlementStatus::Failed)
            && !self.orders.is_empty()
    }
}

pub struct WindowBounds {
    pub min_hours: i64,
    pub max_hours: i64,
}

impl WindowBounds {
    pub fn check(&self, hours: i64) -> Result<(), AppError> {
        if hours < self.min_hours || hours > self.max_hours {
            return Err(AppError::InvalidWindow { min: self.min_hours, max: self.max_hours, requested: hours });
        }
        Ok(())
    }
}

pub struct GroupSessionService {
    sessions: Arc<dyn GroupSessionRepository>,
    orders: Arc<dyn ParticipantOrderRepository>,
    invitations: Arc<InvitationTracker>,
    closeout: Arc<CloseoutAggregator>,
    window: WindowBounds,
    code_attempts: u32,
    code_source: fn(&str) -> String,
}

impl GroupSessionService {
    pub fn new(
        sessions: Arc<dyn GroupSessionRepository>,
        orders: Arc<dyn ParticipantOrderRepository>,
        invitations: Arc<InvitationTracker>,
        closeout: Arc<CloseoutAggregator>,
        window: WindowBounds,
        code_attempts: u32,
    ) -> Self {
        Self {
            sessions,
            orders,
            invitations,
            closeout,
            window,
            code_attempts,
            code_source: generate_session_code,
        }
    }

    /// Swaps the session code generator. Tests use it to force collisions.
    pub fn with_code_source(mut self, code_source: fn(&str) -> String) -> Self {
        self.code_source = code_source;
        self
    }

    /// Returns the stored session and the organizer token. The token is only ever shown here.
    pub async fn create(&self, tenant: &Tenant, input: CreateSessionInput) -> Result<(GroupOrderSession, String), AppError> {
        self.window.check(input.expires_in_hours)?;

        if input.organizer_name.trim().is_empty() {
            return Err(AppError::Validation("Organizer name is required".into()));
        }
        if input.organizer_phone.trim().is_empty() {
            return Err(AppError::Validation("Organizer phone is required".into()));
        }
        let delivery_address = input.delivery_address.filter(|a| !a.trim().is_empty());
        if input.fulfillment_method == FulfillmentMethod::Delivery && delivery_address.is_none() {
            return Err(AppError::Validation("Delivery address is required for delivery orders".into()));
        }

        let organizer_token = generate_access_token();
        let token_hash = hash_token(&organizer_token);

        for attempt in 1..=self.code_attempts {
            let code = (self.code_source)(&tenant.slug);
            if self.sessions.code_exists(&code).await? {
                warn!(attempt, code = %code, "Session code collision, retrying");
                continue;
            }

            let session = GroupOrderSession::new(NewSessionParams {
                tenant_id: tenant.id.clone(),
                session_code: code,
                name: input.name.clone(),
                organizer_name: input.organizer_name.trim().to_string(),
                organizer_email: input.organizer_email.clone(),
                organizer_phone: input.organizer_phone.trim().to_string(),
                company_name: input.company_name.clone(),
                organizer_token_hash: token_hash.clone(),
                fulfillment_method: input.fulfillment_method,
                delivery_address: delivery_address.clone(),
                scheduled_pickup_time: input.scheduled_pickup_time,
                is_sponsored_order: input.is_sponsored_order,
                sponsor_name: input.sponsor_name.clone(),
                expires_in_hours: input.expires_in_hours,
            });

            match self.sessions.create(&session).await {
                Ok(created) => {
                    info!(
                        session_code = %created.session_code,
                        tenant_id = %created.tenant_id,
                        expires_at = %created.expires_at,
                        sponsored = created.is_sponsored_order,
                        "Group order session created"
                    );
                    return Ok((created, organizer_token));
                }
                Err(e) if e.is_unique_violation() => {
                    warn!(attempt, "Session code taken between check and insert, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::CodeGenerationExhausted(self.code_attempts))
    }

    /// Persisted row, without lazy expiry applied.
    pub async fn find(&self, tenant_id: &str, session_code: &str) -> Result<GroupOrderSession, AppError> {
        self.sessions.find_by_code(tenant_id, session_code).await?
            .ok_or(AppError::NotFound("Group order not found".into()))
    }

    pub async fn get(&self, tenant_id: &str, session_code: &str) -> Result<GroupOrderSession, AppError> {
        Ok(self.find(tenant_id, session_code).await?.observed_at(Utc::now()))
    }

    pub fn authorize(&self, session: &GroupOrderSession, token: Option<&str>) -> Result<(), AppError> {
        match token {
            Some(token) if session.organizer_token_matches(token) => Ok(()),
            _ => Err(AppError::Unauthorized),
        }
    }

    pub async fn list(&self, tenant_id: &str, status: Option<SessionStatus>) -> Result<Vec<GroupOrderSession>, AppError> {
        let now = Utc::now();
        let sessions = self.sessions.list_by_tenant(tenant_id, status).await?;
        Ok(sessions.into_iter().map(|s| s.observed_at(now)).collect())
    }

    pub async fn roster(&self, tenant_id: &str, session_code: &str) -> Result<SessionRoster, AppError> {
        let now = Utc::now();
        let session = self.find(tenant_id, session_code).await?.observed_at(now);
        let orders = self.orders.list_by_session(&session.id).await?;
        let invitations = self.invitations.list(&session.id).await?;

        Ok(SessionRoster {
            total_cents: orders.iter().map(|o| o.subtotal_cents).sum(),
            invitation_stats: InvitationStats::from_invitations(&invitations),
            time_remaining_minutes: session.time_remaining_minutes(now),
            session,
            orders,
            invitations,
        })
    }

    pub async fn close(&self, session: &GroupOrderSession) -> Result<CloseOutcome, AppError> {
        self.closeout.close(session, CloseTrigger::Organizer).await
    }

    pub async fn cancel(&self, session: &GroupOrderSession) -> Result<GroupOrderSession, AppError> {
        let now = Utc::now();
        match session.effective_status(now) {
            SessionStatus::Cancelled => return Ok(session.clone()),
            SessionStatus::Open => {}
            terminal => return Err(AppError::AlreadyTerminal(terminal)),
        }

        if let Some(cancelled) = self.sessions.cancel_if_empty(&session.id, now).await? {
            info!(session_code = %cancelled.session_code, "Group order session cancelled");
            return Ok(cancelled);
        }

        let current = self.sessions.find_by_id(&session.id).await?
            .ok_or(AppError::NotFound("Group order not found".into()))?
            .observed_at(Utc::now());
        match current.status {
            SessionStatus::Cancelled => Ok(current),
            SessionStatus::Open => Err(AppError::Conflict("Cannot cancel a group order that already has orders".into())),
            terminal => Err(AppError::AlreadyTerminal(terminal)),
        }
    }

    pub async fn extend(&self, session: &GroupOrderSession, extend_hours: i64) -> Result<GroupOrderSession, AppError> {
        self.window.check(extend_hours)?;

        let now = Utc::now();
        let status = session.effective_status(now);
        if status != SessionStatus::Open {
            return Err(AppError::AlreadyTerminal(status));
        }

        let new_expiry = session.expires_at + Duration::hours(extend_hours);
        match self.sessions.extend_if_open(&session.id, session.expires_at, new_expiry, now).await? {
            Some(extended) => {
                info!(session_code = %extended.session_code, expires_at = %extended.expires_at, "Ordering window extended");
                Ok(extended)
            }
            None => {
                let current = self.sessions.find_by_id(&session.id).await?
                    .ok_or(AppError::NotFound("Group order not found".into()))?
                    .observed_at(Utc::now());
                match current.status {
                    SessionStatus::Open => Err(AppError::Conflict("Session was modified concurrently, retry".into())),
                    terminal => Err(AppError::AlreadyTerminal(terminal)),
                }
            }
        }
    }
}
