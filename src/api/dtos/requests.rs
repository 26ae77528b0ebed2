use crate::domain::models::{
    group_session::{FulfillmentMethod, SessionStatus},
    invitation::InvitationStatus,
    participant_order::OrderItem,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    pub name: String,
    pub slug: String,
    pub custom_domain: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteeRequest {
    pub contact_id: Option<String>,
    pub name: String,
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub name: Option<String>,
    pub organizer_name: String,
    pub organizer_email: Option<String>,
    pub organizer_phone: String,
    pub company_name: Option<String>,
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    pub expires_in_hours: i64,
    #[serde(default)]
    pub is_sponsored_order: bool,
    pub sponsor_name: Option<String>,
    #[serde(default)]
    pub invitees: Vec<InviteeRequest>,
}

#[derive(Deserialize)]
pub struct ListSessionsQuery {
    pub status: Option<SessionStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendSessionRequest {
    pub extend_hours: i64,
}

#[derive(Deserialize)]
pub struct InviteRequest {
    pub contacts: Vec<InviteeRequest>,
}

#[derive(Deserialize)]
pub struct MarkInvitationRequest {
    pub status: InvitationStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    pub idempotency_key: Option<String>,
    pub participant_name: String,
    pub contact_email: Option<String>,
    pub contact_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct AmendOrderRequest {
    pub items: Vec<OrderItem>,
}

#[derive(Deserialize)]
pub struct RecordPaymentRequest {
    pub reference: String,
}
