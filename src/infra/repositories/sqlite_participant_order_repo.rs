use crate::domain::{
    models::participant_order::{OrderItem, ParticipantOrder},
    ports::ParticipantOrderRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;

pub struct SqliteParticipantOrderRepo {
    pool: SqlitePool,
}

impl SqliteParticipantOrderRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantOrderRepository for SqliteParticipantOrderRepo {
    async fn insert_if_open(&self, order: &ParticipantOrder, now: DateTime<Utc>) -> Result<Option<ParticipantOrder>, AppError> {
        // SQLite serializes writers, so the window check and the insert cannot interleave with a close.
        sqlx::query_as::<_, ParticipantOrder>(
            r#"INSERT INTO participant_orders (
                   id, session_id, tenant_id, idempotency_key, edit_token_hash, participant_name, contact_email,
                   contact_id, items, subtotal_cents, scheduled_pickup_time, payment_status, submitted_at, updated_at
               )
               SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
               WHERE EXISTS (
                   SELECT 1 FROM group_sessions WHERE id = ? AND status = 'OPEN' AND expires_at > ?
               )
               ON CONFLICT (session_id, idempotency_key) DO NOTHING
               RETURNING *"#
        )
            .bind(&order.id)
            .bind(&order.session_id)
            .bind(&order.tenant_id)
            .bind(&order.idempotency_key)
            .bind(&order.edit_token_hash)
            .bind(&order.participant_name)
            .bind(&order.contact_email)
            .bind(&order.contact_id)
            .bind(&order.items)
            .bind(order.subtotal_cents)
            .bind(order.scheduled_pickup_time)
            .bind(order.payment_status.as_str())
            .bind(order.submitted_at)
            .bind(order.updated_at)
            .bind(&order.session_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_idempotency_key(&self, session_id: &str, key: &str) -> Result<Option<ParticipantOrder>, AppError> {
        sqlx::query_as::<_, ParticipantOrder>(
            "SELECT * FROM participant_orders WHERE session_id = ? AND idempotency_key = ?"
        )
            .bind(session_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, session_id: &str, id: &str) -> Result<Option<ParticipantOrder>, AppError> {
        sqlx::query_as::<_, ParticipantOrder>("SELECT * FROM participant_orders WHERE session_id = ? AND id = ?")
            .bind(session_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<ParticipantOrder>, AppError> {
        sqlx::query_as::<_, ParticipantOrder>(
            "SELECT * FROM participant_orders WHERE session_id = ? ORDER BY submitted_at ASC"
        )
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn count_by_session(&self, session_id: &str) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM participant_orders WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn amend_items_if_mutable(&self, id: &str, items: &[OrderItem], subtotal_cents: i64, now: DateTime<Utc>) -> Result<Option<ParticipantOrder>, AppError> {
        sqlx::query_as::<_, ParticipantOrder>(
            r#"UPDATE participant_orders
               SET items = ?, subtotal_cents = ?, updated_at = ?
               WHERE id = ?
                 AND payment_status IN ('UNPAID', 'SPONSORED_PENDING')
                 AND EXISTS (
                     SELECT 1 FROM group_sessions
                     WHERE group_sessions.id = participant_orders.session_id
                       AND status = 'OPEN' AND expires_at > ?
                 )
               RETURNING *"#
        )
            .bind(Json(items))
            .bind(subtotal_cents)
            .bind(now)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn mark_paid(&self, id: &str, reference: &str, now: DateTime<Utc>) -> Result<Option<ParticipantOrder>, AppError> {
        sqlx::query_as::<_, ParticipantOrder>(
            "UPDATE participant_orders SET payment_status = 'PAID', payment_reference = ?, settled_at = ?, updated_at = ? WHERE id = ? AND payment_status = 'UNPAID' RETURNING *"
        )
            .bind(reference)
            .bind(now)
            .bind(now)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn mark_sponsored_settled(&self, session_id: &str, ids: &[String], reference: &str, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let mut settled = 0;
        for id in ids {
            let result = sqlx::query(
                "UPDATE participant_orders SET payment_status = 'SPONSORED_SETTLED', payment_reference = ?, settled_at = ?, updated_at = ? WHERE session_id = ? AND id = ? AND payment_status = 'SPONSORED_PENDING'"
            )
                .bind(reference)
                .bind(now)
                .bind(now)
                .bind(session_id)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
            settled += result.rows_affected();
        }
        tx.commit().await.map_err(AppError::Database)?;
        Ok(settled)
    }

    async fn record_ticket(&self, id: &str, ticket_reference: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE participant_orders SET ticket_reference = ?, ticket_emitted_at = ? WHERE id = ?")
            .bind(ticket_reference)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }
}
