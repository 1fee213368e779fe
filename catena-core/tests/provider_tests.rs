//! Provider transport behavior against a mock HTTP server

use std::sync::Arc;
use std::time::Duration;

use catena_core::model::predict;
use catena_core::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(text: &str) -> serde_json::Value {
    json!({
        "choices": [{"message": {"role": "assistant", "content": text}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
    })
}

fn openai_config(server: &MockServer) -> ModelConfig {
    ModelConfig {
        provider: ProviderKind::OpenAI,
        kind: ModelKind::Chat,
        model: "gpt-4o-mini".into(),
        api_key: Some("test-key".into()),
        base_url: Some(server.uri()),
        ..Default::default()
    }
}

fn fast_retries(max_attempts: usize) -> HttpConfig {
    HttpConfig {
        timeout: Duration::from_secs(5),
        retry: RetryConfig::default()
            .with_max_attempts(max_attempts)
            .with_initial_delay(Duration::from_millis(5))
            .with_max_delay(Duration::from_millis(20))
            .with_jitter(false),
    }
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Paris")))
        .expect(1)
        .mount(&server)
        .await;

    let model =
        ModelFactory::create_with_http(&openai_config(&server), &fast_retries(3), false).unwrap();
    let text = predict(model.as_ref(), "Capital of France?", &RunContext::new())
        .await
        .unwrap();

    assert_eq!(text, "Paris");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let model =
        ModelFactory::create_with_http(&openai_config(&server), &fast_retries(3), false).unwrap();
    let err = predict(model.as_ref(), "x", &RunContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CatenaError::ProviderStatus { status: 400, .. }));
}

#[tokio::test]
async fn test_agent_over_http_sends_stop_sequence() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stop": ["\nObservation:"]})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("I know this.\nFinal Answer: Paris")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let model = ModelFactory::create_with_http(
        &openai_config(&server),
        &HttpConfig {
            retry: RetryConfig::no_retry(),
            ..Default::default()
        },
        false,
    )
    .unwrap();
    let tools = ToolRegistry::new();
    let agent = ZeroShotReactAgent::new(model, &tools).unwrap();
    let executor = AgentExecutor::new(Arc::new(agent), tools);

    let answer = chain::run(&executor, "Capital of France?", &RunContext::new())
        .await
        .unwrap();

    assert_eq!(answer, "Paris");
}

#[tokio::test]
async fn test_cancellation_aborts_slow_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let model =
        ModelFactory::create_with_http(&openai_config(&server), &fast_retries(1), false).unwrap();
    let ctx = RunContext::new();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = predict(model.as_ref(), "x", &ctx).await.unwrap_err();
    assert!(err.is_cancelled());
}
