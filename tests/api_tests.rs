mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use wallet_settlement::api::responses::{ApiResponse, ErrorResponse, NotifyResponse};
use wallet_settlement::api::{create_router, AppState};
use wallet_settlement::models::Order;
use wallet_settlement::repositories::Store;

fn router(h: &common::TestHarness) -> Router {
    create_router(AppState::new(h.ledger.clone(), h.settlement.clone()))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[test]
fn test_api_response_error_serialization() {
    let error = ErrorResponse::new("TEST_ERROR", "Test error message");
    let response: ApiResponse<()> = ApiResponse::<()>::error(error);
    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"success\":false"));
    assert!(json.contains("\"code\":\"TEST_ERROR\""));
}

#[tokio::test]
async fn test_liveness_and_health() {
    let h = common::harness();

    let (status, _) = send(router(&h), get("/live")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(router(&h), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");

    let (status, _) = send(router(&h), get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let h = common::harness();
    let response = router(&h).oneshot(get("/live")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_unknown_wallet_reads_as_zero() {
    let h = common::harness();
    let (status, body) = send(router(&h), get("/wallets/7")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balance"], 0);
    assert!(h.store.find_wallet(7).await.unwrap().is_none());
}

#[tokio::test]
async fn test_recharge_and_deduct_flow() {
    let h = common::harness();

    let (status, body) = send(
        router(&h),
        post_json("/wallets/7/recharge", serde_json::json!({"amount": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["wallet"]["balance"], 500);
    assert_eq!(body["data"]["entry"]["kind"], "CREDIT");

    let (status, body) = send(
        router(&h),
        post_json(
            "/wallets/7/deduct",
            serde_json::json!({"amount": 300, "reason": "chapter unlock"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["entry"]["delta"], -300);
    assert_eq!(body["data"]["entry"]["amount"], 300);
    assert_eq!(body["data"]["entry"]["reason"], "chapter unlock");

    let (status, body) = send(
        router(&h),
        post_json("/wallets/7/deduct", serde_json::json!({"amount": 300})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_FUNDS");

    let (_, body) = send(router(&h), get("/wallets/7/ledger?limit=1")).await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["items"][0]["resulting_balance"], 200);

    let (_, body) = send(router(&h), get("/wallets/7/reconcile")).await;
    assert_eq!(body["data"]["consistent"], true);
}

#[tokio::test]
async fn test_validation_errors() {
    let h = common::harness();

    let (status, body) = send(
        router(&h),
        post_json("/wallets/7/recharge", serde_json::json!({"amount": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"][0]["field"], "amount");

    let (status, body) = send(
        router(&h),
        post_json("/wallets/7/recharge", serde_json::json!({"amount": 100_001})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_AMOUNT");
}

#[tokio::test]
async fn test_deduct_without_wallet_is_not_found() {
    let h = common::harness();
    let (status, body) = send(
        router(&h),
        post_json("/wallets/9/deduct", serde_json::json!({"amount": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "WALLET_NOT_FOUND");
}

#[tokio::test]
async fn test_purchase_endpoint() {
    let h = common::harness();
    h.ledger.recharge(7, 500, None).await.unwrap();

    let (status, body) = send(
        router(&h),
        post_json("/wallets/7/purchases", serde_json::json!({"item_id": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["wallet"]["balance"], 200);
    assert_eq!(body["data"]["title"], "Night Train");

    let (status, body) = send(
        router(&h),
        post_json("/wallets/7/purchases", serde_json::json!({"item_id": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "NOT_PAYABLE");

    let (_, body) = send(router(&h), get("/wallets/7/items")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_frozen_wallet_conflicts_until_unfrozen() {
    let h = common::harness();
    h.ledger.recharge(7, 500, None).await.unwrap();
    h.store.force_balance(7, 800).await;

    let (status, body) = send(
        router(&h),
        post_json("/wallets/7/recharge", serde_json::json!({"amount": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INTEGRITY_ERROR");

    let (status, body) = send(
        router(&h),
        post_json("/wallets/7/deduct", serde_json::json!({"amount": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "WALLET_FROZEN");

    let (status, _) = send(router(&h), post_json("/wallets/7/unfreeze", Value::Null)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    h.store.force_balance(7, 500).await;
    let (status, body) = send(router(&h), post_json("/wallets/7/unfreeze", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["frozen"], false);
}

#[tokio::test]
async fn test_payment_notify_acknowledges_success() {
    let h = common::harness();
    h.store
        .insert_order(&Order::pending("O-1", 7, 1999))
        .await
        .unwrap();
    let body = common::notification_body(&h.adapter, &common::transaction_json("O-1", "SUCCESS", 1999));

    let request = Request::builder()
        .method("POST")
        .uri("/payments/notify")
        .header("content-type", "application/json")
        .header("Wechatpay-Signature", "c2lnbmF0dXJl")
        .header("Wechatpay-Timestamp", "1700000000")
        .header("Wechatpay-Nonce", "n-0001")
        .header("Wechatpay-Serial", "5157F09EFDC096DE15EBE81A47057A72")
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    let ack: NotifyResponse = serde_json::from_value(body).unwrap();
    assert_eq!(ack, NotifyResponse::success());
    assert_eq!(h.ledger.get_balance(7).await.unwrap(), 1999);
}

#[tokio::test]
async fn test_payment_notify_failure_is_generic() {
    let h = common::harness();
    let body = common::notification_body(&h.adapter, &common::transaction_json("O-404", "SUCCESS", 1999));

    // No signature headers at all.
    let (status, body) = send(
        router(&h),
        Request::builder()
            .method("POST")
            .uri("/payments/notify")
            .body(Body::from(body))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "FAIL");
    assert_eq!(body["message"], "notification not processed");
}

#[tokio::test]
async fn test_metrics_unavailable_without_recorder() {
    let h = common::harness();
    let (status, _) = send(router(&h), get("/metrics")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
