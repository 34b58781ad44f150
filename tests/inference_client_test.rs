//! HTTP-level tests of the OpenAI-compatible client against a mock server.

use mockito::Matcher;
use serde_json::json;

use proofloop::adapters::inference::OpenAiCompatClient;
use proofloop::domain::errors::DomainError;
use proofloop::domain::models::{
    Conversation, EffortLevel, FinishReason, InferenceConfig, StreamGuardConfig,
};
use proofloop::domain::ports::InferenceClient;

const PATH: &str = "/v1/chat/completions";

fn client(server: &mockito::ServerGuard, stream: bool, api_key: Option<&str>) -> OpenAiCompatClient {
    let config = InferenceConfig {
        api_url: format!("{}{PATH}", server.url()),
        api_key: api_key.map(ToString::to_string),
        stream,
        request_timeout_secs: 10,
        ..Default::default()
    };
    OpenAiCompatClient::new(config, StreamGuardConfig::default()).unwrap()
}

fn conversation() -> Conversation {
    Conversation::opening("You are a mathematician.", "Prove 1 + 1 = 2.", &[])
}

#[tokio::test]
async fn test_complete_response_is_normalized() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({
        "choices": [{
            "message": {
                "content": "<|channel|>analysis<|message|>think<|end|><|start|>assistant<|channel|>final<|message|>### Summary ###\nDone.<|return|>",
            },
            "finish_reason": "stop"
        }]
    });
    let mock = server
        .mock("POST", PATH)
        .match_body(Matcher::PartialJson(json!({
            "reasoning": {"effort": "high"},
            "stream": false,
            "messages": [
                {"role": "system", "content": "You are a mathematician."},
                {"role": "user", "content": "Prove 1 + 1 = 2."}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let response = client(&server, false, None)
        .send(&conversation(), EffortLevel::High)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.content, "### Summary ###\nDone.");
    assert_eq!(response.trace.as_deref(), Some("think"));
    assert_eq!(response.finish, FinishReason::Stop);
}

#[tokio::test]
async fn test_streamed_response_is_assembled() {
    let mut server = mockito::Server::new_async().await;
    let events = [
        json!({"choices": [{"delta": {"content": "### Sum"}, "finish_reason": null}]}),
        json!({"choices": [{"delta": {"content": "mary ###\nok"}, "finish_reason": null}]}),
        json!({"choices": [{"delta": {}, "finish_reason": "stop"}]}),
    ];
    let mut body: String = events.iter().map(|e| format!("data: {e}\n\n")).collect();
    body.push_str("data: [DONE]\n\n");

    let mock = server
        .mock("POST", PATH)
        .match_body(Matcher::PartialJson(json!({"stream": true})))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let response = client(&server, true, None)
        .send(&conversation(), EffortLevel::Low)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.content, "### Summary ###\nok");
    assert_eq!(response.finish, FinishReason::Stop);
}

#[tokio::test]
async fn test_http_error_is_transport() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(500)
        .with_body("upstream overloaded")
        .create_async()
        .await;

    let err = client(&server, false, None)
        .send(&conversation(), EffortLevel::High)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Transport(ref msg) if msg.contains("500")));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unparsable_body_is_protocol() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let err = client(&server, false, None)
        .send(&conversation(), EffortLevel::High)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Protocol(_)));
}

#[tokio::test]
async fn test_empty_choices_is_protocol() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let err = client(&server, false, None)
        .send(&conversation(), EffortLevel::High)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Protocol(_)));
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({"choices": [{"message": {"content": "yes"}, "finish_reason": "stop"}]});
    let mock = server
        .mock("POST", PATH)
        .match_header("authorization", "Bearer sk-local")
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let response = client(&server, false, Some("sk-local"))
        .send(&conversation(), EffortLevel::Low)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.content, "yes");
}
