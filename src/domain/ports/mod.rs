use crate::domain::models::{
    closeout::{AggregateChargeRequest, ChargeReceipt, FulfillmentTicket, IndividualChargeRequest, TicketReceipt},
    group_session::{GroupOrderSession, SessionStatus, SettlementStatus},
    invitation::{Invitation, InvitationStatus},
    participant_order::{OrderItem, ParticipantOrder},
    tenant::Tenant,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Tenant>, AppError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError>;
}

/// Persisted session rows. Every status change is a single conditional update,
/// returning `None` when the row was not in the state the caller required.
#[async_trait]
pub trait GroupSessionRepository: Send + Sync {
    async fn create(&self, session: &GroupOrderSession) -> Result<GroupOrderSession, AppError>;
    async fn code_exists(&self, session_code: &str) -> Result<bool, AppError>;
    async fn find_by_code(&self, tenant_id: &str, session_code: &str) -> Result<Option<GroupOrderSession>, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<GroupOrderSession>, AppError>;
    async fn list_by_tenant(&self, tenant_id: &str, status: Option<SessionStatus>) -> Result<Vec<GroupOrderSession>, AppError>;

    /// `OPEN -> CLOSED`, or `OPEN -> EXPIRED` when the window has already elapsed at `now`.
    async fn close_if_open(&self, id: &str, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError>;
    /// `OPEN -> EXPIRED`, only once `expires_at <= now`.
    async fn expire_if_due(&self, id: &str, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError>;
    /// `OPEN -> CANCELLED`, only while the window is live and no participant order exists.
    async fn cancel_if_empty(&self, id: &str, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError>;
    /// Moves `expires_at` from `current` to `new`, only while the window is live.
    async fn extend_if_open(&self, id: &str, current: DateTime<Utc>, new: DateTime<Utc>, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError>;

    async fn find_due_for_expiry(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<GroupOrderSession>, AppError>;
    async fn record_settlement(
        &self,
        id: &str,
        status: SettlementStatus,
        reference: Option<String>,
        error: Option<String>,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;
    async fn mark_closeout_completed(&self, id: &str, at: DateTime<Utc>) -> Result<(), AppError>;
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    /// Inserts, or refreshes name/email of the row sharing `(session_id, dedupe_key)`.
    async fn upsert(&self, invitation: &Invitation) -> Result<Invitation, AppError>;
    async fn find_by_id(&self, session_id: &str, id: &str) -> Result<Option<Invitation>, AppError>;
    async fn list_by_session(&self, session_id: &str) -> Result<Vec<Invitation>, AppError>;
    /// Applies `status` only if it ranks above the stored one. Returns whether a row changed.
    async fn advance_status(&self, id: &str, status: InvitationStatus, now: DateTime<Utc>) -> Result<bool, AppError>;
    async fn mark_ordered_by_contact(&self, session_id: &str, contact_id: &str, now: DateTime<Utc>) -> Result<u64, AppError>;
    async fn mark_ordered_by_email(&self, session_id: &str, email: &str, now: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait]
pub trait ParticipantOrderRepository: Send + Sync {
    /// Inserts the order only if its session is `OPEN` with `expires_at > now` at the
    /// moment of the write and no row shares its idempotency key. `None` otherwise.
    async fn insert_if_open(&self, order: &ParticipantOrder, now: DateTime<Utc>) -> Result<Option<ParticipantOrder>, AppError>;
    async fn find_by_idempotency_key(&self, session_id: &str, key: &str) -> Result<Option<ParticipantOrder>, AppError>;
    async fn find_by_id(&self, session_id: &str, id: &str) -> Result<Option<ParticipantOrder>, AppError>;
    async fn list_by_session(&self, session_id: &str) -> Result<Vec<ParticipantOrder>, AppError>;
    async fn count_by_session(&self, session_id: &str) -> Result<i64, AppError>;
    /// Replaces items while the order is still mutable and its session is still open.
    async fn amend_items_if_mutable(&self, id: &str, items: &[OrderItem], subtotal_cents: i64, now: DateTime<Utc>) -> Result<Option<ParticipantOrder>, AppError>;
    /// `UNPAID -> PAID`.
    async fn mark_paid(&self, id: &str, reference: &str, now: DateTime<Utc>) -> Result<Option<ParticipantOrder>, AppError>;
    /// `SPONSORED_PENDING -> SPONSORED_SETTLED` for the given ids.
    async fn mark_sponsored_settled(&self, session_id: &str, ids: &[String], reference: &str, now: DateTime<Utc>) -> Result<u64, AppError>;
    async fn record_ticket(&self, id: &str, ticket_reference: &str, now: DateTime<Utc>) -> Result<(), AppError>;
}

/// External payment gateway. Fire-and-observe: implementations must not retry.
#[async_trait]
pub trait PaymentCoordinator: Send + Sync {
    async fn charge_individual(&self, request: &IndividualChargeRequest) -> Result<ChargeReceipt, AppError>;
    async fn charge_aggregate(&self, request: &AggregateChargeRequest) -> Result<ChargeReceipt, AppError>;
}

#[async_trait]
pub trait FulfillmentService: Send + Sync {
    async fn submit_ticket(&self, ticket: &FulfillmentTicket) -> Result<TicketReceipt, AppError>;
}
