use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::group_session::{hash_token, UnknownVariant};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    SponsoredPending,
    SponsoredSettled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::SponsoredPending => "SPONSORED_PENDING",
            PaymentStatus::SponsoredSettled => "SPONSORED_SETTLED",
        }
    }

    /// Orders stay editable only until money has moved.
    pub fn is_mutable(&self) -> bool {
        matches!(self, PaymentStatus::Unpaid | PaymentStatus::SponsoredPending)
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "UNPAID" => Ok(PaymentStatus::Unpaid),
            "PAID" => Ok(PaymentStatus::Paid),
            "SPONSORED_PENDING" => Ok(PaymentStatus::SponsoredPending),
            "SPONSORED_SETTLED" => Ok(PaymentStatus::SponsoredSettled),
            _ => Err(UnknownVariant { kind: "payment status", value }),
        }
    }
}

/// A line item with its price frozen at submission.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub menu_item_id: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Ceiling for a single participant's subtotal ($10M). Keeps any session total far from `i64` overflow.
pub const MAX_ORDER_SUBTOTAL_CENTS: i64 = 1_000_000_000;

impl OrderItem {
    /// `None` on overflow.
    pub fn line_total_cents(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.unit_price_cents)
    }
}

pub fn subtotal_cents(items: &[OrderItem]) -> Result<i64, AppError> {
    items.iter().try_fold(0i64, |total, item| {
        item.line_total_cents()
            .and_then(|line| total.checked_add(line))
            .filter(|total| *total <= MAX_ORDER_SUBTOTAL_CENTS)
            .ok_or_else(|| AppError::Validation(format!(
                "Order total exceeds the limit of {} cents", MAX_ORDER_SUBTOTAL_CENTS
            )))
    })
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct ParticipantOrder {
    pub id: String,
    pub session_id: String,
    pub tenant_id: String,
    pub idempotency_key: String,
    #[serde(skip_serializing)]
    pub edit_token_hash: String,
    pub participant_name: String,
    pub contact_email: Option<String>,
    pub contact_id: Option<String>,
    pub items: Json<Vec<OrderItem>>,
    pub subtotal_cents: i64,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    #[sqlx(try_from = "String")]
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub ticket_reference: Option<String>,
    pub ticket_emitted_at: Option<DateTime<Utc>>,
}

pub struct NewParticipantOrder {
    pub session_id: String,
    pub tenant_id: String,
    pub idempotency_key: String,
    pub edit_token_hash: String,
    pub participant_name: String,
    pub contact_email: Option<String>,
    pub contact_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    pub payment_status: PaymentStatus,
}

impl ParticipantOrder {
    pub fn new(params: NewParticipantOrder) -> Result<Self, AppError> {
        let now = Utc::now();
        let subtotal = subtotal_cents(&params.items)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            session_id: params.session_id,
            tenant_id: params.tenant_id,
            idempotency_key: params.idempotency_key,
            edit_token_hash: params.edit_token_hash,
            participant_name: params.participant_name,
            contact_email: params.contact_email,
            contact_id: params.contact_id,
            items: Json(params.items),
            subtotal_cents: subtotal,
            scheduled_pickup_time: params.scheduled_pickup_time,
            payment_status: params.payment_status,
            payment_reference: None,
            submitted_at: now,
            updated_at: now,
            settled_at: None,
            ticket_reference: None,
            ticket_emitted_at: None,
        })
    }

    pub fn edit_token_matches(&self, token: &str) -> bool {
        hash_token(token) == self.edit_token_hash
    }

    pub fn item_count(&self) -> i64 {
        self.items.0.iter().map(|i| i64::from(i.quantity)).sum()
    }
}

/// Key used when the client sends none: the same person submitting twice into
/// the same session collapses onto one order.
pub fn derive_idempotency_key(session_id: &str, participant_name: &str, contact_email: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(b"|");
    hasher.update(participant_name.trim().to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(contact_email.unwrap_or_default().trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}
