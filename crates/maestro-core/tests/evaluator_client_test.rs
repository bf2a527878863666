// Wire-contract tests for the evaluator client

use std::time::Duration;

use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use maestro_contracts::EvaluateRequest;
use maestro_core::evaluator::EvaluatorClient;

async fn serve(router: Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn request(kind: &str) -> EvaluateRequest {
    EvaluateRequest {
        kind: kind.to_string(),
        config: json!({"queryRef": {"name": "q1", "namespace": "default"}}),
        parameters: Default::default(),
    }
}

#[tokio::test]
async fn evaluate_parses_the_verdict_envelope() {
    let addr = serve(Router::new().route(
        "/evaluate",
        post(|Json(body): Json<serde_json::Value>| async move {
            assert_eq!(body["type"], "query");
            Json(json!({
                "score": "0.75",
                "passed": true,
                "metadata": {"criteria": "accuracy"},
                "tokenUsage": {"prompt": 11, "completion": 4, "total": 15}
            }))
        }),
    ))
    .await;

    let client = EvaluatorClient::new(Duration::from_secs(2));
    let verdict = client
        .evaluate(&format!("http://{}", addr), &request("query"))
        .await
        .unwrap();
    assert_eq!(verdict.score, "0.75");
    assert!(verdict.passed);
    assert_eq!(verdict.token_usage.unwrap().total, 15);
}

#[tokio::test]
async fn evaluate_metrics_uses_the_same_envelope() {
    let addr = serve(Router::new().route(
        "/evaluate-metrics",
        post(|Json(body): Json<serde_json::Value>| async move {
            assert_eq!(body["type"], "direct");
            Json(json!({"score": "1.0", "passed": true, "metadata": {}}))
        }),
    ))
    .await;

    let client = EvaluatorClient::new(Duration::from_secs(2));
    let verdict = client
        .evaluate_metrics(&format!("http://{}", addr), &request("direct"))
        .await
        .unwrap();
    assert!(verdict.passed);
    assert!(verdict.token_usage.is_none());
}

#[tokio::test]
async fn unreachable_evaluator_is_classified() {
    let client = EvaluatorClient::new(Duration::from_millis(200));
    let err = client
        .evaluate("http://127.0.0.1:9", &request("query"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "EvaluatorUnavailable");
}
