#![allow(dead_code)]

use group_order_backend::{
    api::router::create_router,
    state::AppState,
    config::Config,
    infra::factory::{connect_sqlite, run_sqlite_migrations},
    infra::repositories::{
        sqlite_group_session_repo::SqliteGroupSessionRepo,
        sqlite_invitation_repo::SqliteInvitationRepo,
        sqlite_participant_order_repo::SqliteParticipantOrderRepo,
        sqlite_tenant_repo::SqliteTenantRepo,
    },
    domain::models::closeout::{
        AggregateChargeRequest, ChargeReceipt, FulfillmentTicket, IndividualChargeRequest, TicketReceipt,
    },
    domain::ports::{FulfillmentService, PaymentCoordinator},
    domain::services::session_service::{GroupSessionService, WindowBounds},
    error::AppError,
};
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tower::ServiceExt;
use serde_json::{json, Value};

#[derive(Default)]
pub struct MockPaymentCoordinator {
    pub individual_calls: Mutex<Vec<IndividualChargeRequest>>,
    pub aggregate_calls: Mutex<Vec<AggregateChargeRequest>>,
    pub fail_individual: AtomicBool,
    pub fail_aggregate: AtomicBool,
}

impl MockPaymentCoordinator {
    pub fn aggregate_calls(&self) -> Vec<AggregateChargeRequest> {
        self.aggregate_calls.lock().unwrap().clone()
    }

    pub fn individual_calls(&self) -> Vec<IndividualChargeRequest> {
        self.individual_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentCoordinator for MockPaymentCoordinator {
    async fn charge_individual(&self, request: &IndividualChargeRequest) -> Result<ChargeReceipt, AppError> {
        self.individual_calls.lock().unwrap().push(request.clone());
        if self.fail_individual.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("card declined".into()));
        }
        Ok(ChargeReceipt { reference: format!("ch_{}", Uuid::new_v4().simple()) })
    }

    async fn charge_aggregate(&self, request: &AggregateChargeRequest) -> Result<ChargeReceipt, AppError> {
        self.aggregate_calls.lock().unwrap().push(request.clone());
        if self.fail_aggregate.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("sponsor card declined".into()));
        }
        Ok(ChargeReceipt { reference: format!("agg_{}", Uuid::new_v4().simple()) })
    }
}

#[derive(Default)]
pub struct MockFulfillmentService {
    pub tickets: Mutex<Vec<FulfillmentTicket>>,
    /// Participant names whose ticket submission fails.
    pub fail_for: Mutex<HashSet<String>>,
}

impl MockFulfillmentService {
    pub fn tickets(&self) -> Vec<FulfillmentTicket> {
        self.tickets.lock().unwrap().clone()
    }

    pub fn fail_for(&self, participant_name: &str) {
        self.fail_for.lock().unwrap().insert(participant_name.to_string());
    }
}

#[async_trait]
impl FulfillmentService for MockFulfillmentService {
    async fn submit_ticket(&self, ticket: &FulfillmentTicket) -> Result<TicketReceipt, AppError> {
        if self.fail_for.lock().unwrap().contains(&ticket.participant_name) {
            return Err(AppError::Upstream("kitchen printer offline".into()));
        }
        self.tickets.lock().unwrap().push(ticket.clone());
        Ok(TicketReceipt { ticket_id: format!("tkt_{}", Uuid::new_v4().simple()) })
    }
}

/// Callback secret configured by `Config::for_database`.
pub const PAYMENT_CALLBACK_TOKEN: &str = "callback-secret";

pub struct CreatedSession {
    pub code: String,
    pub token: String,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub payments: Arc<MockPaymentCoordinator>,
    pub fulfillment: Arc<MockFulfillmentService>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// App whose session codes come from `code_source` instead of the random generator.
    pub async fn with_code_source(code_source: fn(&str) -> String) -> Self {
        Self::build(Some(code_source)).await
    }

    async fn build(code_source: Option<fn(&str) -> String>) -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}", db_filename);

        let pool = connect_sqlite(&db_url).await.expect("Failed to connect to test db");
        run_sqlite_migrations(&pool).await.expect("Failed to migrate test db");

        let payments = Arc::new(MockPaymentCoordinator::default());
        let fulfillment = Arc::new(MockFulfillmentService::default());

        let config = Config::for_database(db_url);

        let mut state = AppState::new(
            config.clone(),
            Arc::new(SqliteTenantRepo::new(pool.clone())),
            Arc::new(SqliteGroupSessionRepo::new(pool.clone())),
            Arc::new(SqliteInvitationRepo::new(pool.clone())),
            Arc::new(SqliteParticipantOrderRepo::new(pool.clone())),
            payments.clone(),
            fulfillment.clone(),
        );

        if let Some(code_source) = code_source {
            let service = GroupSessionService::new(
                state.session_repo.clone(),
                state.order_repo.clone(),
                state.invitation_tracker.clone(),
                state.closeout.clone(),
                WindowBounds { min_hours: config.min_window_hours, max_hours: config.max_window_hours },
                config.session_code_attempts,
            ).with_code_source(code_source);
            state = state.with_session_service(service);
        }

        let state = Arc::new(state);
        let router = create_router(state.clone());

        Self {
            router,
            pool,
            db_filename,
            state,
            payments,
            fulfillment,
        }
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn create_tenant(&self, slug: &str) -> String {
        let (status, body) = self.request(
            "POST",
            "/api/v1/tenants",
            Some(json!({ "name": format!("Tenant {}", slug), "slug": slug })),
            &[],
        ).await;
        assert_eq!(status, StatusCode::CREATED, "tenant creation failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Creates a pickup session; `overrides` is merged over the default payload.
    pub async fn create_session(&self, tenant_id: &str, overrides: Value) -> CreatedSession {
        let (status, body) = self.try_create_session(tenant_id, overrides).await;
        assert_eq!(status, StatusCode::CREATED, "session creation failed: {}", body);
        CreatedSession {
            code: body["sessionCode"].as_str().unwrap().to_string(),
            token: body["organizerToken"].as_str().unwrap().to_string(),
            body,
        }
    }

    pub async fn try_create_session(&self, tenant_id: &str, overrides: Value) -> (StatusCode, Value) {
        let mut payload = json!({
            "organizerName": "Robin Organizer",
            "organizerPhone": "555-0100",
            "organizerEmail": "robin@example.com",
            "fulfillmentMethod": "pickup",
            "expiresInHours": 2,
            "isSponsoredOrder": false
        });
        if let (Some(base), Some(extra)) = (payload.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        self.request("POST", &format!("/api/v1/{}/group-orders", tenant_id), Some(payload), &[]).await
    }

    pub async fn submit_order(&self, tenant_id: &str, code: &str, name: &str, unit_price_cents: i64, key: Option<&str>) -> (StatusCode, Value) {
        let mut payload = json!({
            "participantName": name,
            "contactEmail": format!("{}@example.com", name.to_lowercase()),
            "items": [
                { "menuItemId": "burrito", "name": "Burrito", "quantity": 1, "unitPriceCents": unit_price_cents }
            ]
        });
        if let Some(key) = key {
            payload["idempotencyKey"] = json!(key);
        }
        self.request("POST", &format!("/api/v1/{}/group-orders/{}/orders", tenant_id, code), Some(payload), &[]).await
    }

    pub async fn close(&self, tenant_id: &str, session: &CreatedSession) -> (StatusCode, Value) {
        self.request(
            "POST",
            &format!("/api/v1/{}/group-orders/{}/close", tenant_id, session.code),
            None,
            &[("X-Organizer-Token", session.token.as_str())],
        ).await
    }

    pub async fn roster(&self, tenant_id: &str, code: &str) -> Value {
        let (status, body) = self.request("GET", &format!("/api/v1/{}/group-orders/{}", tenant_id, code), None, &[]).await;
        assert_eq!(status, StatusCode::OK, "roster failed: {}", body);
        body
    }

    /// Moves the window into the past without touching the persisted status.
    pub async fn force_expiry(&self, code: &str) {
        sqlx::query("UPDATE group_sessions SET expires_at = ? WHERE session_code = ?")
            .bind(Utc::now() - Duration::minutes(1))
            .bind(code)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn persisted_status(&self, code: &str) -> String {
        sqlx::query_scalar("SELECT status FROM group_sessions WHERE session_code = ?")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn order_count(&self, code: &str) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM participant_orders o JOIN group_sessions s ON s.id = o.session_id WHERE s.session_code = ?"
        )
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_filename));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_filename));
    }
}
