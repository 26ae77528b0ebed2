use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::group_session::{FulfillmentMethod, SessionStatus};
use super::participant_order::OrderItem;

/// Who ended the ordering window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseTrigger {
    Organizer,
    ExpirySweep,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SponsorCharge {
    pub sponsor_name: String,
    pub total_cents: i64,
    pub order_ids: Vec<String>,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseoutFailure {
    #[serde(rename_all = "camelCase")]
    PaymentAggregationFailed { total_cents: i64, reason: String },
    /// The sponsor was charged under `reference` but persisting that fact failed.
    #[serde(rename_all = "camelCase")]
    SettlementRecordFailed { reference: String, reason: String },
    #[serde(rename_all = "camelCase")]
    FulfillmentEmissionFailed { participant_order_id: String, participant_name: String, reason: String },
}

/// Outcome of one closeout. Failures are collected per order rather than aborting the run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseoutReport {
    pub session_code: String,
    pub status: SessionStatus,
    pub trigger: CloseTrigger,
    pub order_count: usize,
    pub sponsor_charge: Option<SponsorCharge>,
    pub tickets_emitted: usize,
    pub failures: Vec<CloseoutFailure>,
}

impl CloseoutReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn payment_failed(&self) -> bool {
        self.failures.iter().any(|f| matches!(f, CloseoutFailure::PaymentAggregationFailed { .. }))
    }
}

/// Single charge raised against the sponsor at closeout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateChargeRequest {
    pub tenant_id: String,
    pub session_code: String,
    pub sponsor_name: String,
    pub total_cents: i64,
    pub reference_order_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualChargeRequest {
    pub tenant_id: String,
    pub session_code: String,
    pub participant_order_id: String,
    pub participant_name: String,
    pub contact_email: Option<String>,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeReceipt {
    pub reference: String,
}

/// Per-person kitchen manifest handed to the fulfillment system.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentTicket {
    pub tenant_id: String,
    pub session_code: String,
    pub participant_order_id: String,
    pub participant_name: String,
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
    pub subtotal_cents: i64,
    pub prepaid: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketReceipt {
    pub ticket_id: String,
}
