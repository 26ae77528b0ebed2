use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_RANDOM_LEN: usize = 6;

#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Open,
    Closed,
    Expired,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "OPEN",
            SessionStatus::Closed => "CLOSED",
            SessionStatus::Expired => "EXPIRED",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Open)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SessionStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "OPEN" => Ok(SessionStatus::Open),
            "CLOSED" => Ok(SessionStatus::Closed),
            "EXPIRED" => Ok(SessionStatus::Expired),
            "CANCELLED" => Ok(SessionStatus::Cancelled),
            _ => Err(UnknownVariant { kind: "session status", value }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentMethod {
    Pickup,
    Delivery,
}

impl FulfillmentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentMethod::Pickup => "pickup",
            FulfillmentMethod::Delivery => "delivery",
        }
    }
}

impl TryFrom<String> for FulfillmentMethod {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pickup" => Ok(FulfillmentMethod::Pickup),
            "delivery" => Ok(FulfillmentMethod::Delivery),
            _ => Err(UnknownVariant { kind: "fulfillment method", value }),
        }
    }
}

/// Progress of the sponsor's aggregate charge. Only sponsored sessions ever leave `NotRequired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    NotRequired,
    Pending,
    Settled,
    Failed,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::NotRequired => "NOT_REQUIRED",
            SettlementStatus::Pending => "PENDING",
            SettlementStatus::Settled => "SETTLED",
            SettlementStatus::Failed => "FAILED",
        }
    }
}

impl TryFrom<String> for SettlementStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "NOT_REQUIRED" => Ok(SettlementStatus::NotRequired),
            "PENDING" => Ok(SettlementStatus::Pending),
            "SETTLED" => Ok(SettlementStatus::Settled),
            "FAILED" => Ok(SettlementStatus::Failed),
            _ => Err(UnknownVariant { kind: "settlement status", value }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct GroupOrderSession {
    pub id: String,
    pub tenant_id: String,
    pub session_code: String,
    pub name: String,
    pub organizer_name: String,
    pub organizer_email: Option<String>,
    pub organizer_phone: String,
    pub company_name: Option<String>,
    #[serde(skip_serializing)]
    pub organizer_token_hash: String,
    #[sqlx(try_from = "String")]
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    pub is_sponsored_order: bool,
    pub sponsor_name: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: SessionStatus,
    #[sqlx(try_from = "String")]
    pub settlement_status: SettlementStatus,
    pub settlement_error: Option<String>,
    pub sponsor_paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closeout_completed_at: Option<DateTime<Utc>>,
}

pub struct NewSessionParams {
    pub tenant_id: String,
    pub session_code: String,
    pub name: Option<String>,
    pub organizer_name: String,
    pub organizer_email: Option<String>,
    pub organizer_phone: String,
    pub company_name: Option<String>,
    pub organizer_token_hash: String,
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    pub is_sponsored_order: bool,
    pub sponsor_name: Option<String>,
    pub expires_in_hours: i64,
}

impl GroupOrderSession {
    pub fn new(params: NewSessionParams) -> Self {
        let now = Utc::now();
        let sponsor_name = if params.is_sponsored_order {
            Some(params.sponsor_name
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| params.organizer_name.clone()))
        } else {
            None
        };
        let settlement_status = if params.is_sponsored_order {
            SettlementStatus::Pending
        } else {
            SettlementStatus::NotRequired
        };

        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: params.tenant_id,
            session_code: params.session_code,
            name: params.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| "Group Order".to_string()),
            organizer_name: params.organizer_name,
            organizer_email: params.organizer_email,
            organizer_phone: params.organizer_phone,
            company_name: params.company_name,
            organizer_token_hash: params.organizer_token_hash,
            fulfillment_method: params.fulfillment_method,
            delivery_address: params.delivery_address,
            scheduled_pickup_time: params.scheduled_pickup_time,
            is_sponsored_order: params.is_sponsored_order,
            sponsor_name,
            expires_at: now + Duration::hours(params.expires_in_hours),
            status: SessionStatus::Open,
            settlement_status,
            settlement_error: None,
            sponsor_paid_at: None,
            payment_reference: None,
            created_at: now,
            closed_at: None,
            closeout_completed_at: None,
        }
    }

    /// Status as observed at `now`. A persisted `OPEN` row whose window has elapsed
    /// reads as `EXPIRED` whether or not the sweep has flipped it yet.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SessionStatus {
        if self.status == SessionStatus::Open && now >= self.expires_at {
            SessionStatus::Expired
        } else {
            self.status
        }
    }

    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == SessionStatus::Open
    }

    pub fn time_remaining_minutes(&self, now: DateTime<Utc>) -> i64 {
        if !self.is_open_at(now) {
            return 0;
        }
        (self.expires_at - now).num_minutes().max(0)
    }

    /// Applies lazy expiry to the in-memory copy so everything handed to callers is consistent.
    pub fn observed_at(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        self
    }

    pub fn organizer_token_matches(&self, token: &str) -> bool {
        hash_token(token) == self.organizer_token_hash
    }
}

/// `TA-7K2Q9X`: two characters of the tenant slug, then six random characters.
pub fn generate_session_code(tenant_slug: &str) -> String {
    let mut prefix: String = tenant_slug
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(2)
        .collect::<String>()
        .to_ascii_uppercase();
    while prefix.len() < 2 {
        prefix.push('X');
    }

    let mut rng = rand::thread_rng();
    let random_part: String = (0..CODE_RANDOM_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();

    format!("{}-{}", prefix, random_part)
}

/// Random bearer secret. Only its `hash_token` digest is stored.
pub fn generate_access_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
