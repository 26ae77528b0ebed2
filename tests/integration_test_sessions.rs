mod common;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::TestApp;
use group_order_backend::background::sweep_expired_sessions;
use serde_json::json;

fn fixed_code(_slug: &str) -> String {
    "TA-AAAAAA".to_string()
}

#[tokio::test]
async fn test_create_session_returns_code_link_and_token() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;

    let session = app.create_session(&tid, json!({ "name": "Friday lunch" })).await;

    assert!(session.code.starts_with("TA-"));
    assert_eq!(session.code.len(), 9);
    assert_eq!(
        session.body["shareableLink"],
        format!("https://taqueria.order.local/group/{}", session.code)
    );
    assert!(!session.token.is_empty());
    assert_eq!(session.body["session"]["status"], "OPEN");
    assert_eq!(session.body["session"]["name"], "Friday lunch");
    assert_eq!(session.body["session"]["settlementStatus"], "NOT_REQUIRED");
    assert!(session.body["session"]["timeRemainingMinutes"].as_i64().unwrap() >= 119);
    assert!(session.body["session"].get("organizerTokenHash").is_none());

    let expires_at: DateTime<Utc> = session.body["expiresAt"].as_str().unwrap().parse().unwrap();
    let minutes = (expires_at - Utc::now()).num_minutes();
    assert!((118..=120).contains(&minutes));
}

#[tokio::test]
async fn test_custom_domain_used_for_shareable_link() {
    let app = TestApp::new().await;
    let (status, body) = app.request(
        "POST",
        "/api/v1/tenants",
        Some(json!({ "name": "Sol", "slug": "sol", "customDomain": "order.sol.example" })),
        &[],
    ).await;
    assert_eq!(status, StatusCode::CREATED);
    let tid = body["id"].as_str().unwrap().to_string();

    let session = app.create_session(&tid, json!({})).await;
    assert_eq!(
        session.body["shareableLink"],
        format!("https://order.sol.example/group/{}", session.code)
    );
}

#[tokio::test]
async fn test_invalid_window_rejected() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;

    for hours in [0, 5, -1] {
        let (status, body) = app.try_create_session(&tid, json!({ "expiresInHours": hours })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_WINDOW");
    }

    for hours in [1, 4] {
        let (status, _) = app.try_create_session(&tid, json!({ "expiresInHours": hours })).await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn test_delivery_requires_address() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;

    let (status, body) = app.try_create_session(&tid, json!({ "fulfillmentMethod": "delivery" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION");

    let session = app.create_session(&tid, json!({
        "fulfillmentMethod": "delivery",
        "deliveryAddress": "12 Market St, Floor 3"
    })).await;
    assert_eq!(session.body["session"]["fulfillmentMethod"], "delivery");
}

#[tokio::test]
async fn test_sponsor_defaults_to_organizer() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;

    let sponsored = app.create_session(&tid, json!({ "isSponsoredOrder": true })).await;
    assert_eq!(sponsored.body["session"]["sponsorName"], "Robin Organizer");
    assert_eq!(sponsored.body["session"]["settlementStatus"], "PENDING");

    let unsponsored = app.create_session(&tid, json!({ "sponsorName": "Alex" })).await;
    assert!(unsponsored.body["session"]["sponsorName"].is_null());
}

#[tokio::test]
async fn test_unknown_tenant_and_session() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;

    let (status, _) = app.request("GET", "/api/v1/no-such-tenant/group-orders/TA-000000", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.request("GET", &format!("/api/v1/{}/group-orders/TA-000000", tid), None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_session_codes_are_tenant_scoped() {
    let app = TestApp::new().await;
    let t1 = app.create_tenant("taqueria").await;
    let t2 = app.create_tenant("other").await;

    let session = app.create_session(&t1, json!({})).await;

    let (status, _) = app.request("GET", &format!("/api/v1/{}/group-orders/{}", t2, session.code), None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lazy_expiry_reported_before_sweep() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({})).await;

    app.force_expiry(&session.code).await;

    let roster = app.roster(&tid, &session.code).await;
    assert_eq!(roster["session"]["status"], "EXPIRED");
    assert_eq!(roster["session"]["timeRemainingMinutes"], 0);
    assert_eq!(app.persisted_status(&session.code).await, "OPEN");

    assert_eq!(sweep_expired_sessions(&app.state).await, 1);
    assert_eq!(app.persisted_status(&session.code).await, "EXPIRED");

    assert_eq!(sweep_expired_sessions(&app.state).await, 0);
}

#[tokio::test]
async fn test_sweep_ignores_live_sessions() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({})).await;

    assert_eq!(sweep_expired_sessions(&app.state).await, 0);
    assert_eq!(app.persisted_status(&session.code).await, "OPEN");
}

#[tokio::test]
async fn test_close_requires_organizer_token() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({})).await;
    let uri = format!("/api/v1/{}/group-orders/{}/close", tid, session.code);

    let (status, _) = app.request("POST", &uri, None, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.request("POST", &uri, None, &[("X-Organizer-Token", "guess")]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.persisted_status(&session.code).await, "OPEN");
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({})).await;

    let (status, first) = app.close(&tid, &session).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "CLOSED");
    assert_eq!(first["report"]["trigger"], "ORGANIZER");

    let (status, second) = app.close(&tid, &session).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "CLOSED");
    assert!(second["report"].is_null());
}

#[tokio::test]
async fn test_close_after_unswept_expiry_finalizes_as_expired() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({})).await;

    app.force_expiry(&session.code).await;

    let (status, body) = app.close(&tid, &session).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "EXPIRED");
    assert!(body["report"].is_object());
    assert_eq!(app.persisted_status(&session.code).await, "EXPIRED");

    let (status, body) = app.close(&tid, &session).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "EXPIRED");
    assert!(body["report"].is_null());
}

#[tokio::test]
async fn test_cancel_rules() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;

    let empty = app.create_session(&tid, json!({})).await;
    let cancel_uri = format!("/api/v1/{}/group-orders/{}/cancel", tid, empty.code);
    let headers = [("X-Organizer-Token", empty.token.as_str())];

    let (status, body) = app.request("POST", &cancel_uri, None, &headers).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, body) = app.request("POST", &cancel_uri, None, &headers).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, body) = app.close(&tid, &empty).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_TERMINAL");

    let with_order = app.create_session(&tid, json!({})).await;
    let (status, _) = app.submit_order(&tid, &with_order.code, "Jamie", 1000, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.request(
        "POST",
        &format!("/api/v1/{}/group-orders/{}/cancel", tid, with_order.code),
        None,
        &[("X-Organizer-Token", with_order.token.as_str())],
    ).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(app.persisted_status(&with_order.code).await, "OPEN");

    let closed = app.create_session(&tid, json!({})).await;
    app.close(&tid, &closed).await;
    let (status, body) = app.request(
        "POST",
        &format!("/api/v1/{}/group-orders/{}/cancel", tid, closed.code),
        None,
        &[("X-Organizer-Token", closed.token.as_str())],
    ).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_TERMINAL");
}

#[tokio::test]
async fn test_extend_window() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({ "expiresInHours": 1 })).await;
    let uri = format!("/api/v1/{}/group-orders/{}/extend", tid, session.code);
    let headers = [("X-Organizer-Token", session.token.as_str())];

    let before: DateTime<Utc> = session.body["expiresAt"].as_str().unwrap().parse().unwrap();

    let (status, body) = app.request("POST", &uri, Some(json!({ "extendHours": 2 })), &headers).await;
    assert_eq!(status, StatusCode::OK);
    let after: DateTime<Utc> = body["expiresAt"].as_str().unwrap().parse().unwrap();
    assert_eq!((after - before).num_hours(), 2);

    let (status, body) = app.request("POST", &uri, Some(json!({ "extendHours": 9 })), &headers).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_WINDOW");

    app.close(&tid, &session).await;
    let (status, body) = app.request("POST", &uri, Some(json!({ "extendHours": 1 })), &headers).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_TERMINAL");
}

#[tokio::test]
async fn test_extend_cannot_revive_expired_window() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({})).await;
    app.force_expiry(&session.code).await;

    let (status, body) = app.request(
        "POST",
        &format!("/api/v1/{}/group-orders/{}/extend", tid, session.code),
        Some(json!({ "extendHours": 2 })),
        &[("X-Organizer-Token", session.token.as_str())],
    ).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_TERMINAL");
}

#[tokio::test]
async fn test_list_sessions_by_status() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let open = app.create_session(&tid, json!({})).await;
    let closed = app.create_session(&tid, json!({})).await;
    app.close(&tid, &closed).await;

    let (status, all) = app.request("GET", &format!("/api/v1/{}/group-orders", tid), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, open_only) = app.request("GET", &format!("/api/v1/{}/group-orders?status=OPEN", tid), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    let open_only = open_only.as_array().unwrap();
    assert_eq!(open_only.len(), 1);
    assert_eq!(open_only[0]["sessionCode"], open.code);
}

#[tokio::test]
async fn test_code_generation_exhausted() {
    let app = TestApp::with_code_source(fixed_code).await;
    let tid = app.create_tenant("taqueria").await;

    let first = app.create_session(&tid, json!({})).await;
    assert_eq!(first.code, "TA-AAAAAA");

    let (status, body) = app.try_create_session(&tid, json!({})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "CODE_GENERATION_EXHAUSTED");
}

#[tokio::test]
async fn test_tenant_by_slug_and_duplicate_slug() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;

    let (status, body) = app.request("GET", "/api/v1/tenants/by-slug/taqueria", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], tid);

    let (status, _) = app.request(
        "POST",
        "/api/v1/tenants",
        Some(json!({ "name": "Copy", "slug": "taqueria" })),
        &[],
    ).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
