//! Integration tests for the ranking service endpoints

use airoco_fx::services::RankingStore;
use airoco_fx::types::*;
use airoco_fx::{api, AppState};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let store = RankingStore::new_in_memory().unwrap();
    api::app(AppState::new(Arc::new(store)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(app: &Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

fn snapshot(user: &str, money: i64) -> Value {
    json!({
        "user_name": user,
        "money": money,
        "stocks": {
            "co2": {"stock": 1, "special_stocks": 0},
            "temp": {"stock": 0, "special_stocks": 20},
            "humid": {"stock": 10, "special_stocks": 0}
        }
    })
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_register_twice() {
    let app = app();
    let (status, body) = get(&app, "/?user_name=alice&register=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, body) = get(&app, "/?user_name=alice&register=true").await;
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_unknown_user_defaults() {
    let app = app();
    let (status, body) = get(&app, "/?user_name=ghost&get_money=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"money": 10000}));

    let (_, body) = get(&app, "/?user_name=ghost&get_stocks=1").await;
    let stocks: StocksBackup = serde_json::from_value(body).unwrap();
    assert_eq!(stocks, StocksBackup::default());

    let (status, body) = get(&app, "/?user_name=ghost").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_post_then_read_back() {
    let app = app();
    let (status, _) = post(&app, snapshot("alice", 12_345)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app, "/?user_name=alice&get_money=1").await;
    assert_eq!(body["money"], 12_345);

    let (_, body) = get(&app, "/?user_name=alice&get_stocks=1").await;
    assert_eq!(body["temp"]["special_stocks"], 20);
    assert_eq!(body["humid"]["stock"], 10);

    // last write wins, even when lower
    post(&app, snapshot("alice", 5)).await;
    let (_, body) = get(&app, "/?user_name=alice&get_money=1").await;
    assert_eq!(body["money"], 5);
}

#[tokio::test]
async fn test_ranking_ties_share_rank() {
    let app = app();
    post(&app, snapshot("carol", 8_000)).await;
    post(&app, snapshot("alice", 15_000)).await;
    post(&app, snapshot("bob", 15_000)).await;

    let (status, body) = get(&app, "/?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let table: RankingTable = serde_json::from_value(body).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table[&1].rank, 1);
    assert_eq!(table[&2].rank, 1);

    let (_, body) = get(&app, "/?user_name=carol").await;
    assert_eq!(body["3"]["user_name"], "carol");
    assert_eq!(body["3"]["money"], 8_000);
}

#[tokio::test]
async fn test_bad_requests() {
    let app = app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, _) = post(&app, json!({"money": 1})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/?limit=many").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cors_headers() {
    let app = app();
    let request = Request::get("/?limit=5")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
