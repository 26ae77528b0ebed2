use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::group_session::UnknownVariant;

/// Invitation progress. Ordering follows the lifecycle, so a transition is
/// only applied when it moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Sent,
    Viewed,
    Ordered,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Sent => "SENT",
            InvitationStatus::Viewed => "VIEWED",
            InvitationStatus::Ordered => "ORDERED",
        }
    }

    pub fn rank(&self) -> i32 {
        match self {
            InvitationStatus::Pending => 0,
            InvitationStatus::Sent => 1,
            InvitationStatus::Viewed => 2,
            InvitationStatus::Ordered => 3,
        }
    }
}

impl TryFrom<String> for InvitationStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "PENDING" => Ok(InvitationStatus::Pending),
            "SENT" => Ok(InvitationStatus::Sent),
            "VIEWED" => Ok(InvitationStatus::Viewed),
            "ORDERED" => Ok(InvitationStatus::Ordered),
            _ => Err(UnknownVariant { kind: "invitation status", value }),
        }
    }
}

/// SQL expression ranking the `status` column the same way as [`InvitationStatus::rank`].
pub const STATUS_RANK_SQL: &str =
    "CASE status WHEN 'PENDING' THEN 0 WHEN 'SENT' THEN 1 WHEN 'VIEWED' THEN 2 ELSE 3 END";

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Invitation {
    pub id: String,
    pub session_id: String,
    pub contact_id: Option<String>,
    #[serde(skip_serializing)]
    pub dedupe_key: String,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub status: InvitationStatus,
    pub invited_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ordered_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn new(session_id: String, contact_id: Option<String>, name: String, email: String) -> Self {
        let now = Utc::now();
        let contact_id = contact_id.filter(|c| !c.trim().is_empty());
        let dedupe_key = dedupe_key(contact_id.as_deref(), &email);

        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            contact_id,
            dedupe_key,
            name,
            email,
            status: InvitationStatus::Pending,
            invited_at: now,
            updated_at: now,
            ordered_at: None,
        }
    }
}

pub fn dedupe_key(contact_id: Option<&str>, email: &str) -> String {
    match contact_id {
        Some(id) => format!("contact:{}", id),
        None => format!("email:{}", email.trim().to_lowercase()),
    }
}

#[derive(Debug, Default, Serialize, Clone, PartialEq, Eq)]
pub struct InvitationStats {
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub viewed: usize,
    pub ordered: usize,
}

impl InvitationStats {
    pub fn from_invitations(invitations: &[Invitation]) -> Self {
        let mut stats = InvitationStats { total: invitations.len(), ..Default::default() };
        for inv in invitations {
            match inv.status {
                InvitationStatus::Pending => stats.pending += 1,
                InvitationStatus::Sent => stats.sent += 1,
                InvitationStatus::Viewed => stats.viewed += 1,
                InvitationStatus::Ordered => stats.ordered += 1,
            }
        }
        stats
    }
}
