use crate::domain::{
    models::group_session::{GroupOrderSession, SessionStatus, SettlementStatus},
    ports::GroupSessionRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub struct PostgresGroupSessionRepo {
    pool: PgPool,
}

impl PostgresGroupSessionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupSessionRepository for PostgresGroupSessionRepo {
    async fn create(&self, session: &GroupOrderSession) -> Result<GroupOrderSession, AppError> {
        sqlx::query_as::<_, GroupOrderSession>(
            r#"INSERT INTO group_sessions (
                   id, tenant_id, session_code, name, organizer_name, organizer_email, organizer_phone,
                   company_name, organizer_token_hash, fulfillment_method, delivery_address, scheduled_pickup_time,
                   is_sponsored_order, sponsor_name, expires_at, status, settlement_status, created_at
               )
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
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
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM group_sessions WHERE session_code = $1)")
            .bind(session_code)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_code(&self, tenant_id: &str, session_code: &str) -> Result<Option<GroupOrderSession>, AppError> {
        sqlx::query_as::<_, GroupOrderSession>(
            "SELECT * FROM group_sessions WHERE tenant_id = $1 AND session_code = $2"
        )
            .bind(tenant_id)
            .bind(session_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<GroupOrderSession>, AppError> {
        sqlx::query_as::<_, GroupOrderSession>("SELECT * FROM group_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_tenant(&self, tenant_id: &str, status: Option<SessionStatus>) -> Result<Vec<GroupOrderSession>, AppError> {
        match status {
            Some(status) => sqlx::query_as::<_, GroupOrderSession>(
                "SELECT * FROM group_sessions WHERE tenant_id = $1 AND status = $2 ORDER BY created_at DESC LIMIT 100"
            )
                .bind(tenant_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(AppError::Database),
            None => sqlx::query_as::<_, GroupOrderSession>(
                "SELECT * FROM group_sessions WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT 100"
            )
                .bind(tenant_id)
                .fetch_all(&self.pool)
                .await
                .map_err(AppError::Database),
        }
    }

    async fn close_if_open(&self, id: &str, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError> {
        // Blocks behind any submission holding FOR SHARE on this row, so those commit first.
        sqlx::query_as::<_, GroupOrderSession>(
            r#"UPDATE group_sessions
               SET status = CASE WHEN expires_at <= $1 THEN 'EXPIRED' ELSE 'CLOSED' END,
                   closed_at = $1
               WHERE id = $2 AND status = 'OPEN'
               RETURNING *"#
        )
            .bind(now)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn expire_if_due(&self, id: &str, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError> {
        sqlx::query_as::<_, GroupOrderSession>(
            "UPDATE group_sessions SET status = 'EXPIRED', closed_at = $1 WHERE id = $2 AND status = 'OPEN' AND expires_at <= $1 RETURNING *"
        )
            .bind(now)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn cancel_if_empty(&self, id: &str, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let locked: Option<String> = sqlx::query_scalar(
            "SELECT id FROM group_sessions WHERE id = $1 AND status = 'OPEN' AND expires_at > $2 FOR UPDATE"
        )
            .bind(id)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        if locked.is_none() {
            return Ok(None);
        }

        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participant_orders WHERE session_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        if orders > 0 {
            return Ok(None);
        }

        let cancelled = sqlx::query_as::<_, GroupOrderSession>(
            "UPDATE group_sessions SET status = 'CANCELLED', closed_at = $1, settlement_status = 'NOT_REQUIRED' WHERE id = $2 RETURNING *"
        )
            .bind(now)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(Some(cancelled))
    }

    async fn extend_if_open(&self, id: &str, current: DateTime<Utc>, new: DateTime<Utc>, now: DateTime<Utc>) -> Result<Option<GroupOrderSession>, AppError> {
        sqlx::query_as::<_, GroupOrderSession>(
            "UPDATE group_sessions SET expires_at = $1 WHERE id = $2 AND status = 'OPEN' AND expires_at = $3 AND expires_at > $4 RETURNING *"
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
            "SELECT * FROM group_sessions WHERE status = 'OPEN' AND expires_at <= $1 ORDER BY expires_at ASC LIMIT $2"
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
            "UPDATE group_sessions SET settlement_status = $1, payment_reference = $2, settlement_error = $3, sponsor_paid_at = $4 WHERE id = $5"
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
        sqlx::query("UPDATE group_sessions SET closeout_completed_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }
}
