use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::error::AppError;
use crate::state::AppState;
use crate::infra::fulfillment::http_fulfillment_service::HttpFulfillmentService;
use crate::infra::payment::http_payment_coordinator::HttpPaymentCoordinator;
use crate::infra::repositories::{
    postgres_group_session_repo::PostgresGroupSessionRepo, postgres_invitation_repo::PostgresInvitationRepo,
    postgres_participant_order_repo::PostgresParticipantOrderRepo, postgres_tenant_repo::PostgresTenantRepo,
    sqlite_group_session_repo::SqliteGroupSessionRepo, sqlite_invitation_repo::SqliteInvitationRepo,
    sqlite_participant_order_repo::SqliteParticipantOrderRepo, sqlite_tenant_repo::SqliteTenantRepo,
};

pub async fn bootstrap_state(config: &Config) -> Result<AppState, AppError> {
    let database_url = &config.database_url;
    let payment_coordinator = Arc::new(HttpPaymentCoordinator::new(
        config.payment_service_url.clone(),
        config.payment_service_token.clone(),
    ));
    let fulfillment_service = Arc::new(HttpFulfillmentService::new(
        config.fulfillment_service_url.clone(),
        config.fulfillment_service_token.clone(),
    ));

    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        info!("Initializing PostgreSQL connection...");

        let pool = connect_postgres(database_url).await?;
        run_postgres_migrations(&pool).await?;

        Ok(AppState::new(
            config.clone(),
            Arc::new(PostgresTenantRepo::new(pool.clone())),
            Arc::new(PostgresGroupSessionRepo::new(pool.clone())),
            Arc::new(PostgresInvitationRepo::new(pool.clone())),
            Arc::new(PostgresParticipantOrderRepo::new(pool)),
            payment_coordinator,
            fulfillment_service,
        ))
    } else {
        info!("Initializing SQLite connection with WAL Mode...");

        let pool = connect_sqlite(database_url).await?;
        run_sqlite_migrations(&pool).await?;

        Ok(AppState::new(
            config.clone(),
            Arc::new(SqliteTenantRepo::new(pool.clone())),
            Arc::new(SqliteGroupSessionRepo::new(pool.clone())),
            Arc::new(SqliteInvitationRepo::new(pool.clone())),
            Arc::new(SqliteParticipantOrderRepo::new(pool)),
            payment_coordinator,
            fulfillment_service,
        ))
    }
}

async fn connect_postgres(database_url: &str) -> Result<PgPool, AppError> {
    let opts = PgConnectOptions::from_str(database_url)?
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

    Ok(PgPoolOptions::new()
        .max_connections(10)
        .connect_with(opts)
        .await?)
}

pub async fn connect_sqlite(database_url: &str) -> Result<SqlitePool, AppError> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

    Ok(SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?)
}

async fn run_postgres_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("Postgres migrations failed: {}", e)))
}

pub async fn run_sqlite_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("SQLite migrations failed: {}", e)))
}
