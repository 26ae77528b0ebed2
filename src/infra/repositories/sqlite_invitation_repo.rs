use crate::domain::{
    models::invitation::{Invitation, InvitationStatus, STATUS_RANK_SQL},
    ports::InvitationRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct SqliteInvitationRepo {
    pool: SqlitePool,
}

impl SqliteInvitationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvitationRepository for SqliteInvitationRepo {
    async fn upsert(&self, invitation: &Invitation) -> Result<Invitation, AppError> {
        sqlx::query_as::<_, Invitation>(
            r#"INSERT INTO group_invitations (id, session_id, contact_id, dedupe_key, name, email, status, invited_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (session_id, dedupe_key) DO UPDATE SET
                   name = excluded.name,
                   email = excluded.email,
                   updated_at = excluded.updated_at
               RETURNING *"#
        )
            .bind(&invitation.id)
            .bind(&invitation.session_id)
            .bind(&invitation.contact_id)
            .bind(&invitation.dedupe_key)
            .bind(&invitation.name)
            .bind(&invitation.email)
            .bind(invitation.status.as_str())
            .bind(invitation.invited_at)
            .bind(invitation.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, session_id: &str, id: &str) -> Result<Option<Invitation>, AppError> {
        sqlx::query_as::<_, Invitation>("SELECT * FROM group_invitations WHERE session_id = ? AND id = ?")
            .bind(session_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<Invitation>, AppError> {
        sqlx::query_as::<_, Invitation>(
            "SELECT * FROM group_invitations WHERE session_id = ? ORDER BY invited_at ASC"
        )
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn advance_status(&self, id: &str, status: InvitationStatus, now: DateTime<Utc>) -> Result<bool, AppError> {
        let ordered_at = (status == InvitationStatus::Ordered).then_some(now);
        let query = format!(
            "UPDATE group_invitations SET status = ?, updated_at = ?, ordered_at = COALESCE(ordered_at, ?) WHERE id = ? AND ({}) < ?",
            STATUS_RANK_SQL
        );
        let result = sqlx::query(&query)
            .bind(status.as_str())
            .bind(now)
            .bind(ordered_at)
            .bind(id)
            .bind(status.rank())
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_ordered_by_contact(&self, session_id: &str, contact_id: &str, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE group_invitations SET status = 'ORDERED', updated_at = ?, ordered_at = ? WHERE session_id = ? AND contact_id = ? AND status <> 'ORDERED'"
        )
            .bind(now)
            .bind(now)
            .bind(session_id)
            .bind(contact_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    async fn mark_ordered_by_email(&self, session_id: &str, email: &str, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE group_invitations SET status = 'ORDERED', updated_at = ?, ordered_at = ? WHERE session_id = ? AND lower(email) = lower(?) AND status <> 'ORDERED'"
        )
            .bind(now)
            .bind(now)
            .bind(session_id)
            .bind(email.trim())
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }
}
