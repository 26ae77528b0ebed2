use crate::domain::{
    models::participant_order::{OrderItem, ParticipantOrder},
    ports::ParticipantOrderRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

pub struct PostgresParticipantOrderRepo {
    pool: PgPool,
}

impl PostgresParticipantOrderRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantOrderRepository for PostgresParticipantOrderRepo {
    async fn insert_if_open(&self, order: &ParticipantOrder, now: DateTime<Utc>) -> Result<Option<ParticipantOrder>, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        // FOR SHARE makes a concurrent close wait until this insert has committed.
        let open: Option<String> = sqlx::query_scalar(
            "SELECT id FROM group_sessions WHERE id = $1 AND status = 'OPEN' AND expires_at > $2 FOR SHARE"
        )
            .bind(&order.session_id)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        if open.is_none() {
            return Ok(None);
        }

        let inserted = sqlx::query_as::<_, ParticipantOrder>(
            r#"INSERT INTO participant_orders (
                   id, session_id, tenant_id, idempotency_key, edit_token_hash, participant_name, contact_email,
                   contact_id, items, subtotal_cents, scheduled_pickup_time, payment_status, submitted_at, updated_at
               )
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
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
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(inserted)
    }

    async fn find_by_idempotency_key(&self, session_id: &str, key: &str) -> Result<Option<ParticipantOrder>, AppError> {
        sqlx::query_as::<_, ParticipantOrder>(
            "SELECT * FROM participant_orders WHERE session_id = $1 AND idempotency_key = $2"
        )
            .bind(session_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, session_id: &str, id: &str) -> Result<Option<ParticipantOrder>, AppError> {
        sqlx::query_as::<_, ParticipantOrder>("SELECT * FROM participant_orders WHERE session_id = $1 AND id = $2")
            .bind(session_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<ParticipantOrder>, AppError> {
        sqlx::query_as::<_, ParticipantOrder>(
            "SELECT * FROM participant_orders WHERE session_id = $1 ORDER BY submitted_at ASC"
        )
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn count_by_session(&self, session_id: &str) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM participant_orders WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn amend_items_if_mutable(&self, id: &str, items: &[OrderItem], subtotal_cents: i64, now: DateTime<Utc>) -> Result<Option<ParticipantOrder>, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let open: Option<String> = sqlx::query_scalar(
            r#"SELECT s.id FROM group_sessions s
               JOIN participant_orders o ON o.session_id = s.id
               WHERE o.id = $1 AND s.status = 'OPEN' AND s.expires_at > $2
               FOR SHARE OF s"#
        )
            .bind(id)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        if open.is_none() {
            return Ok(None);
        }

        let amended = sqlx::query_as::<_, ParticipantOrder>(
            r#"UPDATE participant_orders
               SET items = $1, subtotal_cents = $2, updated_at = $3
               WHERE id = $4 AND payment_status IN ('UNPAID', 'SPONSORED_PENDING')
               RETURNING *"#
        )
            .bind(Json(items))
            .bind(subtotal_cents)
            .bind(now)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(amended)
    }

    async fn mark_paid(&self, id: &str, reference: &str, now: DateTime<Utc>) -> Result<Option<ParticipantOrder>, AppError> {
        sqlx::query_as::<_, ParticipantOrder>(
            "UPDATE participant_orders SET payment_status = 'PAID', payment_reference = $1, settled_at = $2, updated_at = $2 WHERE id = $3 AND payment_status = 'UNPAID' RETURNING *"
        )
            .bind(reference)
            .bind(now)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn mark_sponsored_settled(&self, session_id: &str, ids: &[String], reference: &str, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE participant_orders SET payment_status = 'SPONSORED_SETTLED', payment_reference = $1, settled_at = $2, updated_at = $2 WHERE session_id = $3 AND id = ANY($4) AND payment_status = 'SPONSORED_PENDING'"
        )
            .bind(reference)
            .bind(now)
            .bind(session_id)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    async fn record_ticket(&self, id: &str, ticket_reference: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE participant_orders SET ticket_reference = $1, ticket_emitted_at = $2 WHERE id = $3")
            .bind(ticket_reference)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }
}
