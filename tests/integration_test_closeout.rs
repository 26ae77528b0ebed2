mod common;

use std::sync::atomic::Ordering;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::TestApp;
use group_order_backend::background::sweep_expired_sessions;
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

#[tokio::test]
async fn test_sponsor_pays_single_aggregate_charge() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({
        "expiresInHours": 1,
        "isSponsoredOrder": true,
        "sponsorName": "Alex"
    })).await;

    let (_, jamie) = app.submit_order(&tid, &session.code, "Jamie", 1000, None).await;
    let (_, sam) = app.submit_order(&tid, &session.code, "Sam", 1500, None).await;
    assert_eq!(jamie["paymentStatus"], "SPONSORED_PENDING");
    assert_eq!(sam["paymentStatus"], "SPONSORED_PENDING");

    let (status, body) = app.close(&tid, &session).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CLOSED");

    let report = &body["report"];
    assert_eq!(report["orderCount"], 2);
    assert_eq!(report["ticketsEmitted"], 2);
    assert_eq!(report["failures"].as_array().unwrap().len(), 0);
    assert_eq!(report["sponsorCharge"]["sponsorName"], "Alex");
    assert_eq!(report["sponsorCharge"]["totalCents"], 2500);
    assert_eq!(report["sponsorCharge"]["orderIds"].as_array().unwrap().len(), 2);

    let charges = app.payments.aggregate_calls();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].sponsor_name, "Alex");
    assert_eq!(charges[0].total_cents, 2500);
    assert!(app.payments.individual_calls().is_empty());

    let roster = app.roster(&tid, &session.code).await;
    for order in roster["participantOrders"].as_array().unwrap() {
        assert_eq!(order["paymentStatus"], "SPONSORED_SETTLED");
        assert!(order["ticketReference"].as_str().unwrap().starts_with("tkt_"));
    }
    assert_eq!(roster["session"]["settlementStatus"], "SETTLED");
    assert_eq!(roster["awaitingSponsorPayment"], false);

    let tickets = app.fulfillment.tickets();
    assert_eq!(tickets.len(), 2);
    let mut names: Vec<_> = tickets.iter().map(|t| t.participant_name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["Jamie", "Sam"]);
    assert!(tickets.iter().all(|t| t.prepaid));
    let jamie_ticket = tickets.iter().find(|t| t.participant_name == "Jamie").unwrap();
    assert_eq!(jamie_ticket.subtotal_cents, 1000);
    assert_eq!(jamie_ticket.items.len(), 1);
}

#[tokio::test]
async fn test_sponsor_charge_failure_still_feeds_everyone() {
    let app = TestApp::new().await;
    app.payments.fail_aggregate.store(true, Ordering::SeqCst);
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({ "isSponsoredOrder": true, "sponsorName": "Alex" })).await;

    app.submit_order(&tid, &session.code, "Jamie", 1000, None).await;
    app.submit_order(&tid, &session.code, "Sam", 1500, None).await;

    let (status, body) = app.close(&tid, &session).await;
    assert_eq!(status, StatusCode::OK);
    let report = &body["report"];
    assert!(report["sponsorCharge"].is_null());
    assert_eq!(report["ticketsEmitted"], 2);
    let failures = report["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["kind"], "PAYMENT_AGGREGATION_FAILED");
    assert_eq!(failures[0]["totalCents"], 2500);

    let roster = app.roster(&tid, &session.code).await;
    assert_eq!(roster["session"]["status"], "CLOSED");
    assert_eq!(roster["session"]["settlementStatus"], "FAILED");
    assert!(roster["session"]["settlementError"].is_string());
    assert_eq!(roster["awaitingSponsorPayment"], true);
    for order in roster["participantOrders"].as_array().unwrap() {
        assert_eq!(order["paymentStatus"], "SPONSORED_PENDING");
    }

    assert!(app.fulfillment.tickets().iter().all(|t| !t.prepaid));
}

#[tokio::test]
async fn test_settlement_write_failure_still_emits_tickets() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({ "isSponsoredOrder": true, "sponsorName": "Alex" })).await;
    app.submit_order(&tid, &session.code, "Jamie", 1000, None).await;
    app.submit_order(&tid, &session.code, "Sam", 1500, None).await;

    sqlx::query(
        r#"CREATE TRIGGER reject_sponsored_settled
           BEFORE UPDATE OF payment_status ON participant_orders
           WHEN NEW.payment_status = 'SPONSORED_SETTLED'
           BEGIN SELECT RAISE(ABORT, 'settlement write rejected'); END"#
    )
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, body) = app.close(&tid, &session).await;
    assert_eq!(status, StatusCode::OK, "close failed: {}", body);

    let report = &body["report"];
    assert_eq!(report["orderCount"], 2);
    assert_eq!(report["ticketsEmitted"], 2);
    let reference = report["sponsorCharge"]["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("agg_"));
    let failures = report["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["kind"], "SETTLEMENT_RECORD_FAILED");
    assert_eq!(failures[0]["reference"], reference.as_str());

    assert_eq!(app.payments.aggregate_calls().len(), 1);
    let tickets = app.fulfillment.tickets();
    assert_eq!(tickets.len(), 2);
    assert!(tickets.iter().all(|t| t.prepaid));

    let roster = app.roster(&tid, &session.code).await;
    assert_eq!(roster["session"]["settlementStatus"], "SETTLED");
    assert_eq!(roster["session"]["paymentReference"], reference.as_str());
    for order in roster["participantOrders"].as_array().unwrap() {
        assert_eq!(order["paymentStatus"], "SPONSORED_PENDING");
        assert!(order["ticketReference"].is_string());
    }
}

#[tokio::test]
async fn test_fulfillment_failure_isolated_per_order() {
    let app = TestApp::new().await;
    app.payments.fail_individual.store(true, Ordering::SeqCst);
    app.fulfillment.fail_for("Sam");
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({})).await;

    for (name, price) in [("Jamie", 1000), ("Sam", 1500), ("Kai", 900)] {
        let (status, _) = app.submit_order(&tid, &session.code, name, price, None).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app.close(&tid, &session).await;
    assert_eq!(status, StatusCode::OK);
    let report = &body["report"];
    assert_eq!(report["orderCount"], 3);
    assert_eq!(report["ticketsEmitted"], 2);
    assert!(report["sponsorCharge"].is_null());
    let failures = report["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["kind"], "FULFILLMENT_EMISSION_FAILED");
    assert_eq!(failures[0]["participantName"], "Sam");

    let tickets = app.fulfillment.tickets();
    assert_eq!(tickets.len(), 2);
    assert!(tickets.iter().all(|t| t.participant_name != "Sam"));
    assert!(app.payments.aggregate_calls().is_empty());
}

#[tokio::test]
async fn test_sponsored_session_without_orders_needs_no_charge() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({ "isSponsoredOrder": true })).await;

    let (status, body) = app.close(&tid, &session).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["orderCount"], 0);
    assert!(body["report"]["sponsorCharge"].is_null());
    assert!(app.payments.aggregate_calls().is_empty());

    let roster = app.roster(&tid, &session.code).await;
    assert_eq!(roster["session"]["settlementStatus"], "NOT_REQUIRED");
    assert_eq!(roster["awaitingSponsorPayment"], false);
}

#[tokio::test]
async fn test_sweep_runs_closeout_once() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({ "isSponsoredOrder": true, "sponsorName": "Alex" })).await;
    app.submit_order(&tid, &session.code, "Jamie", 1000, None).await;

    app.force_expiry(&session.code).await;
    assert_eq!(sweep_expired_sessions(&app.state).await, 1);
    assert_eq!(app.persisted_status(&session.code).await, "EXPIRED");
    assert_eq!(app.payments.aggregate_calls().len(), 1);
    assert_eq!(app.fulfillment.tickets().len(), 1);

    let (status, body) = app.close(&tid, &session).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "EXPIRED");
    assert!(body["report"].is_null());

    assert_eq!(app.payments.aggregate_calls().len(), 1);
    assert_eq!(app.fulfillment.tickets().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_closes_have_single_winner() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({ "isSponsoredOrder": true, "sponsorName": "Alex" })).await;
    app.submit_order(&tid, &session.code, "Jamie", 1000, None).await;
    app.submit_order(&tid, &session.code, "Sam", 1500, None).await;

    let uri = format!("/api/v1/{}/group-orders/{}/close", tid, session.code);
    let mut set = JoinSet::new();
    for _ in 0..5 {
        let router = app.router.clone();
        let uri = uri.clone();
        let token = session.token.clone();
        set.spawn(async move {
            let response = router.oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("X-Organizer-Token", token)
                    .body(Body::empty())
                    .unwrap()
            ).await.unwrap();
            let status = response.status();
            (status, body_json(response).await)
        });
    }

    let mut winners = 0;
    while let Some(result) = set.join_next().await {
        let (status, body) = result.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "CLOSED");
        if body["report"].is_object() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(app.payments.aggregate_calls().len(), 1);
    assert_eq!(app.fulfillment.tickets().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sweep_and_organizer_close_race() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({ "isSponsoredOrder": true })).await;
    app.submit_order(&tid, &session.code, "Jamie", 1000, None).await;
    app.force_expiry(&session.code).await;

    let state = app.state.clone();
    let sweep = tokio::spawn(async move { sweep_expired_sessions(&state).await });

    let (status, body) = app.close(&tid, &session).await;
    let swept = sweep.await.unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "EXPIRED");
    let organizer_won = body["report"].is_object();
    assert_eq!(swept + usize::from(organizer_won), 1);

    assert_eq!(app.persisted_status(&session.code).await, "EXPIRED");
    assert_eq!(app.payments.aggregate_calls().len(), 1);
    assert_eq!(app.fulfillment.tickets().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submission_racing_close_is_either_in_closeout_or_rejected() {
    for round in 0..5 {
        let app = TestApp::new().await;
        let tid = app.create_tenant("taqueria").await;
        let session = app.create_session(&tid, json!({ "isSponsoredOrder": true })).await;

        let submit_router = app.router.clone();
        let submit_uri = format!("/api/v1/{}/group-orders/{}/orders", tid, session.code);
        let submit = tokio::spawn(async move {
            let payload = json!({
                "participantName": format!("Racer {}", round),
                "items": [{ "menuItemId": "taco", "name": "Taco", "quantity": 1, "unitPriceCents": 500 }]
            });
            let response = submit_router.oneshot(
                Request::builder()
                    .method("POST")
                    .uri(submit_uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap()
            ).await.unwrap();
            let status = response.status();
            (status, body_json(response).await)
        });

        let (close_status, close_body) = app.close(&tid, &session).await;
        let (submit_status, submit_body) = submit.await.unwrap();

        assert_eq!(close_status, StatusCode::OK);
        assert_eq!(app.persisted_status(&session.code).await, "CLOSED");

        let report = &close_body["report"];
        match submit_status {
            StatusCode::CREATED => {
                assert_eq!(app.order_count(&session.code).await, 1);
                assert_eq!(report["orderCount"], 1);
                assert_eq!(report["sponsorCharge"]["totalCents"], 500);
                assert_eq!(app.fulfillment.tickets().len(), 1);
            }
            StatusCode::CONFLICT => {
                assert_eq!(submit_body["code"], "WINDOW_CLOSED");
                assert_eq!(app.order_count(&session.code).await, 0);
                assert_eq!(report["orderCount"], 0);
                assert!(app.fulfillment.tickets().is_empty());
            }
            other => panic!("unexpected submission status {}", other),
        }
    }
}

#[tokio::test]
async fn test_pay_individually_tickets_reflect_payment() {
    let app = TestApp::new().await;
    let tid = app.create_tenant("taqueria").await;
    let session = app.create_session(&tid, json!({
        "fulfillmentMethod": "delivery",
        "deliveryAddress": "12 Market St"
    })).await;

    let (_, body) = app.submit_order(&tid, &session.code, "Jamie", 1000, None).await;
    let order_id = body["participantOrderId"].as_str().unwrap().to_string();

    for _ in 0..100 {
        let roster = app.roster(&tid, &session.code).await;
        if roster["participantOrders"][0]["paymentStatus"] == "PAID" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let (status, _) = app.close(&tid, &session).await;
    assert_eq!(status, StatusCode::OK);

    let tickets = app.fulfillment.tickets();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].participant_order_id, order_id);
    assert!(tickets[0].prepaid);
    assert_eq!(tickets[0].delivery_address.as_deref(), Some("12 Market St"));
}
