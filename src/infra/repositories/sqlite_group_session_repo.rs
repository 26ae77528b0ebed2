use crate::domain::{
    models::group_session::{GroupOrderSession, SessionStatus, SettlementStatus},
    ports::GroupSessionRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct SqliteGroupSessionRepo {
    pool: SqlitePool,
}

impl SqliteGroupSessionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupSessionRepository for SqliteGroupSessionRepo {
    async fn create(&self, session: &GroupOrderSession) -> Result<GroupOrderSession, AppError> {
        sqlx::query_as::<_, GroupOrderSession>(
            r#"INSERT INTO group_sessions (
                   id, tenant_id, session_code, name, organizer_name, organizer_email, organizer_phone,
                   company_name, organizer_token_hash, fulfillment_method, delivery_address, scheduled_pickup_time,
                   is_sponsored_order, sponsor_name, expires_at, status, settlement_status, created_at
               )
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING *"#
        )
            .bind(&session.id)
            .bind(&session.tenant_id)
            .bind(&session.session_code)
            .bind(&session.name)
            .bind(&session.organizer_name)
            .bind(&session.organizer_email)
            .bind(&session.organizer_phone)
            .bind(&session.company_name)
            .bind(&session.organizer_token_hash)
            .bind(session.fulfillment_method.as_str())
            .bind(&session.delivery_address)
            .bind(session.scheduled_pickup_time)
            .bind(session.is_sponsored_order)
            .bind(&session.sponsor_name)
            .bind(session.expires_at)
            .bind(session.status.as_str())
            .bind(session.settlement_status.as_str())
            .bind(session.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn code_exists(&self, session_code: &str) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM group_sessions WHERE session_code = ?")
            .bind(session_code)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(count > 0)
    }

    async fn find_by_code(&self, tenant_id: &str, session_code: &str) -> Result<Option<GroupOrderSession>, AppError> {
        sqlx::query_as::<_, GroupOrderSession>(
            "SELECT * FROM group_sessions WHERE tenant_id = ? AND session_code = ?"
        )
            .bind(tenant_id)
            .bind(session_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<GroupOrderSession>, AppError> {
        sqlx::query_as::<_, GroupOrderSession>("SELECT * FROM group_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_tenant(&self, tenant_id: &str, status: Option<SessionStatus>) -> Result<Vec<GroupOrderSession>, AppError> {
        match status {
            Some(status) => sqlx::query_as::<_, GroupOrderSession>(
                "SELECT * FROM group_sessions WHERE tenant_id = ? AND status = ? ORDER BY created_at DESC LIMIT 100"
            )
                .bind(tenant_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(AppError::Database),
            None => sqlx::query_as::<_, GroupOrderSession>(
                "SELECT * FROM group_sessions WHERE tenant_id = ? ORDER BY created_at DESC LIMIT 100"
            )
                .bind(tenant_id)
                .fetch_all(&self.pool)
                .await
                .map_err(AppError::Database),
        }
    }

    async fn close_if_open(&self, id: &str, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError> {
        sqlx::query_as::<_, GroupOrderSession>(
            r#"UPDATE group_sessions
               SET status = CASE WHEN expires_at <= ? THEN 'EXPIRED' ELSE 'CLOSED' END,
                   closed_at = ?
               WHERE id = ? AND status = 'OPEN'
               RETURNING *"#
        )
            .bind(now)
            .bind(now)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn expire_if_due(&self, id: &str, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError> {
        sqlx::query_as::<_, GroupOrderSession>(
            "UPDATE group_sessions SET status = 'EXPIRED', closed_at = ? WHERE id = ? AND status = 'OPEN' AND expires_at <= ? RETURNING *"
        )
            .bind(now)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn cancel_if_empty(&self, id: &str, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError> {
        sqlx::query_as::<_, GroupOrderSession>(
            r#"UPDATE group_sessions
               SET status = 'CANCELLED', closed_at = ?, settlement_status = 'NOT_REQUIRED'
               WHERE id = ? AND status = 'OPEN' AND expires_at > ?
                 AND NOT EXISTS (SELECT 1 FROM participant_orders WHERE session_id = group_sessions.id)
               RETURNING *"#
        )
            .bind(now)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn extend_if_open(&self, id: &str, current: DateTime<Utc>, new: DateTime<Utc>, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError> {
        sqlx::query_as::<_, GroupOrderSession>(
            "UPDATE group_sessions SET expires_at = ? WHERE id = ? AND status = 'OPEN' AND expires_at = ? AND expires_at > ? RETURNING *"
        )
            .bind(new)
            .bind(id)
            .bind(current)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_due_for_expiry(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<GroupOrderSession>, AppError> {
        sqlx::query_as::<_, GroupOrderSession>(
            "SELECT * FROM group_sessions WHERE status = 'OPEN' AND expires_at <= ? ORDER BY expires_at ASC LIMIT ?"
        )
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn record_settlement(
        &self,
        id: &str,
        status: SettlementStatus,
        reference: Option<String>,
        error: Option<String>,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE group_sessions SET settlement_status = ?, payment_reference = ?, settlement_error = ?, sponsor_paid_at = ? WHERE id = ?"
        )
            .bind(status.as_str())
            .bind(reference)
            .bind(error)
            .bind(paid_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn mark_closeout_completed(&self, id: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE group_sessions SET closeout_completed_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }
}
