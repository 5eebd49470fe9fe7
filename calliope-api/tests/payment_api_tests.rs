//! Integration tests for the payment lifecycle

mod helpers;

use axum::http::StatusCode;
use helpers::{dune, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_payment_lifecycle() {
    let app = TestApp::new().await;
    let admin = app.register("root").await;
    let buyer = app.register("buyer").await;
    let other = app.register("other").await;

    let (_, book) = app.send("POST", "/api/books", Some(&admin), Some(dune())).await;
    let book_id = book["data"]["id"].as_str().unwrap();

    let (status, body) = app
        .send(
            "POST",
            "/api/payments",
            Some(&buyer),
            Some(json!({"bookId": book_id, "amountCents": 1299, "currency": "eur"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["currency"], "EUR");
    assert!(body["data"]["reference"].as_str().unwrap().starts_with("PAY-"));
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send("GET", &format!("/api/payments/{}", id), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send("POST", &format!("/api/payments/{}/confirm", id), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("POST", &format!("/api/payments/{}/confirm", id), Some(&buyer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "succeeded");

    let (status, _) = app
        .send("POST", &format!("/api/payments/{}/cancel", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, mine) = app.send("GET", "/api/payments", Some(&other), None).await;
    assert!(mine["data"].as_array().unwrap().is_empty());
    let (_, all) = app.send("GET", "/api/payments", Some(&admin), None).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_payment_validation() {
    let app = TestApp::new().await;
    let token = app.register("buyer").await;

    let (status, _) = app
        .send(
            "POST",
            "/api/payments",
            Some(&token),
            Some(json!({"amountCents": 0, "currency": "EUR"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/api/payments",
            Some(&token),
            Some(json!({"amountCents": 500, "currency": "EURO"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/api/payments",
            Some(&token),
            Some(json!({
                "bookId": "6f9d1c52-6f0e-4d2e-9a43-9d3c8d7b1a00",
                "amountCents": 500,
                "currency": "EUR"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.count("payments").await, 0);
}
