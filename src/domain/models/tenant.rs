use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub custom_domain: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: String, slug: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            slug,
            custom_domain: None,
            created_at: Utc::now(),
        }
    }

    /// Public link participants open to join a session.
    pub fn shareable_link(&self, base_domain: &str, session_code: &str) -> String {
        let domain = self.custom_domain
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("{}.{}", self.slug, base_domain));
        format!("https://{}/group/{}", domain, session_code)
    }
}
