//! HTTP oracle tests against a wiremock chat-completions server.

mod support;

use std::sync::Arc;
use std::time::Duration;

use digest_core::analysis::OracleRequest;
use digest_core::{
    AnalysisEngine, AnalysisOracle, AnalysisStatus, CanonicalRecord, ChatCompletionsOracle,
    OracleError, RetryPolicy, Source,
};
use serde_json::json;
use support::oracle_reply;
use support::socket_guard::start_mock_server_or_skip;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn chat_body(content: &str) -> serde_json::Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}

fn record() -> CanonicalRecord {
    let mut record = CanonicalRecord::new(
        Source::Paper,
        "program repair with llms",
        "Program Repair with LLMs",
        "https://arxiv.org/abs/2402.1",
    );
    record.description = "We repair bugs with a language model.".to_string();
    record
}

fn oracle(base_url: &str) -> ChatCompletionsOracle {
    ChatCompletionsOracle::new(
        base_url,
        "test-model",
        Some("sk-test".to_string()),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_fenced_json_reply_is_parsed() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let content = format!("```json\n{}\n```", oracle_reply("code_repair", 8));
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "test-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&content)))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = oracle(&format!("{}/v1", server.uri()));
    let reply = oracle
        .analyze(&OracleRequest::from_record(&record()), &[])
        .await
        .unwrap();

    assert_eq!(reply["category_tags"][0], "code_repair");
    assert_eq!(reply["scoring_dimensions"]["readability"], 8);
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .mount(&server)
        .await;

    let err = oracle(&server.uri())
        .analyze(&OracleRequest::from_record(&record()), &[])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OracleError::HttpStatus { status: 429, retry_after: Some(ref value) } if value == "2"
    ));
}

#[tokio::test]
async fn test_reply_without_json_is_malformed() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_body("I cannot help with that.")),
        )
        .mount(&server)
        .await;

    let err = oracle(&server.uri())
        .analyze(&OracleRequest::from_record(&record()), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, OracleError::MalformedReply { .. }));
}

#[tokio::test]
async fn test_engine_retries_server_error_then_succeeds() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_body(&oracle_reply("code_repair", 7).to_string())),
        )
        .with_priority(2)
        .mount(&server)
        .await;

    let policy = RetryPolicy::new(
        3,
        Duration::from_millis(10),
        Duration::from_millis(50),
        2.0,
    )
    .with_max_jitter(Duration::ZERO);
    let engine = AnalysisEngine::new(
        Arc::new(oracle(&server.uri())),
        2,
        policy,
        Duration::from_secs(5),
    )
    .unwrap();

    let (records, stats) = engine.analyze_all(vec![record()], None).await;

    assert_eq!(stats.complete, 1);
    assert_eq!(stats.retried, 1);
    let analysis = records[0].analysis.as_ref().unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Complete);
    assert_eq!(records[0].category_tags, vec!["code_repair"]);
}

#[tokio::test]
async fn test_engine_does_not_retry_unauthorized() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let engine = AnalysisEngine::new(
        Arc::new(oracle(&server.uri())),
        1,
        RetryPolicy::default(),
        Duration::from_secs(5),
    )
    .unwrap();

    let (records, stats) = engine.analyze_all(vec![record()], None).await;

    assert_eq!(stats.unavailable, 1);
    assert_eq!(stats.retried, 0);
    assert!(records[0].is_degraded());
    assert!(!records[0].category_tags.is_empty());
}
