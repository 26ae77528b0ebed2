use crate::domain::models::{
    closeout::CloseoutReport,
    group_session::{FulfillmentMethod, GroupOrderSession, SessionStatus, SettlementStatus},
    invitation::{Invitation, InvitationStats, InvitationStatus},
    participant_order::{OrderItem, ParticipantOrder, PaymentStatus},
    tenant::Tenant,
};
use crate::domain::services::session_service::SessionRoster;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub custom_domain: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Tenant> for TenantResponse {
    fn from(t: Tenant) -> Self {
        Self {
            id: t.id,
            name: t.name,
            slug: t.slug,
            custom_domain: t.custom_domain,
            created_at: t.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub session_code: String,
    pub shareable_link: String,
    pub name: String,
    pub organizer_name: String,
    pub organizer_email: Option<String>,
    pub organizer_phone: String,
    pub company_name: Option<String>,
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    pub is_sponsored_order: bool,
    pub sponsor_name: Option<String>,
    pub status: SessionStatus,
    pub expires_at: DateTime<Utc>,
    pub time_remaining_minutes: i64,
    pub settlement_status: SettlementStatus,
    pub settlement_error: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl SessionView {
    /// `session` is expected to have lazy expiry applied already.
    pub fn new(session: GroupOrderSession, tenant: &Tenant, base_domain: &str) -> Self {
        let now = Utc::now();
        Self {
            shareable_link: tenant.shareable_link(base_domain, &session.session_code),
            time_remaining_minutes: session.time_remaining_minutes(now),
            id: session.id,
            session_code: session.session_code,
            name: session.name,
            organizer_name: session.organizer_name,
            organizer_email: session.organizer_email,
            organizer_phone: session.organizer_phone,
            company_name: session.company_name,
            fulfillment_method: session.fulfillment_method,
            delivery_address: session.delivery_address,
            scheduled_pickup_time: session.scheduled_pickup_time,
            is_sponsored_order: session.is_sponsored_order,
            sponsor_name: session.sponsor_name,
            status: session.status,
            expires_at: session.expires_at,
            settlement_status: session.settlement_status,
            settlement_error: session.settlement_error,
            payment_reference: session.payment_reference,
            created_at: session.created_at,
            closed_at: session.closed_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreatedResponse {
    pub session_code: String,
    pub shareable_link: String,
    pub expires_at: DateTime<Utc>,
    /// Shown once. Required as `X-Organizer-Token` for organizer actions.
    pub organizer_token: String,
    pub invitations_created: usize,
    pub session: SessionView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantOrderView {
    pub participant_order_id: String,
    pub participant_name: String,
    pub contact_email: Option<String>,
    pub items: Vec<OrderItem>,
    pub item_count: i64,
    pub subtotal_cents: i64,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
    pub ticket_reference: Option<String>,
}

impl From<ParticipantOrder> for ParticipantOrderView {
    fn from(o: ParticipantOrder) -> Self {
        Self {
            item_count: o.item_count(),
            participant_order_id: o.id,
            participant_name: o.participant_name,
            contact_email: o.contact_email,
            items: o.items.0,
            subtotal_cents: o.subtotal_cents,
            payment_status: o.payment_status,
            payment_reference: o.payment_reference,
            scheduled_pickup_time: o.scheduled_pickup_time,
            submitted_at: o.submitted_at,
            ticket_reference: o.ticket_reference,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderResponse {
    pub participant_order_id: String,
    pub payment_status: PaymentStatus,
    pub subtotal_cents: i64,
    pub duplicate: bool,
    /// Present only on the response that created the order. Send as `X-Order-Token` to amend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationView {
    pub id: String,
    pub contact_id: Option<String>,
    pub name: String,
    pub email: String,
    pub status: InvitationStatus,
    pub invited_at: DateTime<Utc>,
    pub ordered_at: Option<DateTime<Utc>>,
}

impl From<Invitation> for InvitationView {
    fn from(i: Invitation) -> Self {
        Self {
            id: i.id,
            contact_id: i.contact_id,
            name: i.name,
            email: i.email,
            status: i.status,
            invited_at: i.invited_at,
            ordered_at: i.ordered_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationsCreatedResponse {
    pub invitations_created: usize,
    pub invitations: Vec<InvitationView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterResponse {
    pub session: SessionView,
    pub participant_orders: Vec<ParticipantOrderView>,
    pub invitations: Vec<InvitationView>,
    pub invitation_stats: InvitationStats,
    pub order_count: usize,
    pub total_cents: i64,
    pub awaiting_sponsor_payment: bool,
}

impl RosterResponse {
    pub fn new(roster: SessionRoster, tenant: &Tenant, base_domain: &str) -> Self {
        let awaiting_sponsor_payment = roster.awaiting_sponsor_payment();
        Self {
            order_count: roster.orders.len(),
            total_cents: roster.total_cents,
            invitation_stats: roster.invitation_stats,
            awaiting_sponsor_payment,
            session: SessionView::new(roster.session, tenant, base_domain),
            participant_orders: roster.orders.into_iter().map(ParticipantOrderView::from).collect(),
            invitations: roster.invitations.into_iter().map(InvitationView::from).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionResponse {
    pub session_code: String,
    pub status: SessionStatus,
    /// Present only for the call that performed the transition.
    pub report: Option<CloseoutReport>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub session_code: String,
    pub status: SessionStatus,
    pub expires_at: DateTime<Utc>,
}
