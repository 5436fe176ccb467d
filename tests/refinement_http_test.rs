use geoharness::engine::harness::HarnessRunner;
use geoharness::engine::refinement::Termination;
use geoharness::{Coordinate, GeminiClient, RefinementLoop, RefinementRequest, RefinementStatus};
use httpmock::prelude::*;
use std::time::Duration;

const GENERATE_PATH: &str = "/models/gemini-2.0-flash:generateContent";

fn gemini_reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
    })
}

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        server.base_url(),
        "gemini-2.0-flash",
        "integration-key",
        Duration::from_secs(5),
    )
    .unwrap()
}

fn start() -> Coordinate {
    Coordinate::new(37.5000, 127.0000).unwrap()
}

/// 緯度差 0.0001° ≈ 11.1m
fn truth() -> Coordinate {
    Coordinate::new(37.5001, 127.0000).unwrap()
}

#[tokio::test]
async fn test_refinement_converges_through_http_service() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path(GENERATE_PATH)
            .header("x-goog-api-key", "integration-key")
            .body_contains("Current error (RMSE)");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(gemini_reply(
                r#"{"lat_offset": 0.0001, "lng_offset": 0.0, "confidence": 0.9, "reasoning": "shift north"}"#,
            ));
    });

    let refinement = RefinementLoop::new(client(&server));
    let outcome = refinement
        .run(&RefinementRequest::new("Seoul test point", start(), truth()))
        .await;

    // 第一次修正後誤差 < 1m，第二輪開始前提前停止
    api_mock.assert_hits(1);
    assert_eq!(outcome.status, RefinementStatus::Success);
    assert_eq!(outcome.termination, Termination::EarlyStop);
    assert!(outcome.converged);
    assert_eq!(outcome.iterations.len(), 1);
    assert_eq!(outcome.reasoning.as_deref(), Some("shift north"));
    assert_eq!(outcome.harness_score, 100);
}

#[tokio::test]
async fn test_non_json_reply_is_a_parse_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(GENERATE_PATH);
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(gemini_reply("I think you should move north a little."));
    });

    let outcome = RefinementLoop::new(client(&server))
        .run(&RefinementRequest::new("Seoul test point", start(), truth()))
        .await;

    assert_eq!(outcome.status, RefinementStatus::JsonParseError);
    assert!(outcome.iterations.is_empty());
    assert_eq!(outcome.final_position, start());
}

#[tokio::test]
async fn test_http_failure_is_timeout_or_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(GENERATE_PATH);
        then.status(503).body("overloaded");
    });

    let outcome = RefinementLoop::new(client(&server))
        .run(&RefinementRequest::new("Seoul test point", start(), truth()))
        .await;

    assert_eq!(outcome.status, RefinementStatus::TimeoutOrError);
    assert_eq!(outcome.termination, Termination::ServiceError);
    assert!(outcome.iterations.is_empty());
}

#[tokio::test]
async fn test_slow_service_hits_loop_timeout() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(GENERATE_PATH);
        then.status(200)
            .delay(Duration::from_millis(500))
            .json_body(gemini_reply(r#"{"lat_offset": 0.0001}"#));
    });

    let outcome = RefinementLoop::new(client(&server))
        .with_timeout(Duration::from_millis(50))
        .run(&RefinementRequest::new("Seoul test point", start(), truth()))
        .await;

    assert_eq!(outcome.status, RefinementStatus::TimeoutOrError);
    assert!(outcome.iterations.is_empty());
}

#[tokio::test]
async fn test_harness_runner_reports_before_and_after() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST).path(GENERATE_PATH);
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(gemini_reply(
                r#"{"lat_offset": 0.00005, "lng_offset": 0.0, "confidence": 0.7, "reasoning": "halfway"}"#,
            ));
    });

    let runner = HarnessRunner::new(Some(RefinementLoop::new(client(&server))), 2);
    let report = runner.run("API Request Point", start(), truth()).await;

    // 基準量測不呼叫服務；兩次各移動一半 → 收斂
    api_mock.assert_hits(2);
    assert!((report.rmse_before_m - 11.1195).abs() < 1e-3);
    assert!(report.rmse_after_m < 1.0);
    assert_eq!(report.iterations, 2);
    assert_eq!(report.corrections.len(), 2);
    assert_eq!(report.status, RefinementStatus::Success);
}
