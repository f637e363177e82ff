//! Pact contract tests for the OpenAI chat completions API
//!
//! These tests define the contract between the LLM Operator and the OpenAI API.
//! The operator's own client talks to a Pact mock server, so the recorded
//! requests are exactly what the operator sends.

#[cfg(test)]
mod common;

use common::init_rustls;
use llm_operator::llms::openai::{ModelParams, OpenAi};
use llm_operator::llms::{CallOption, Llm, LlmError};
use pact_consumer::prelude::*;
use serde_json::json;
use std::sync::Once;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls before tests
fn init() {
    RUSTLS_INIT.call_once(|| {
        init_rustls();
    });
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": content
            },
            "finish_reason": "stop"
        }]
    })
}

/// Mock server URL without its trailing slash
fn base_url(url: impl ToString) -> String {
    let mut base_url = url.to_string();
    if base_url.ends_with('/') {
        base_url.pop();
    }
    base_url
}

#[tokio::test]
async fn test_openai_validate_model_contract() {
    init();
    let mut pact_builder = PactBuilder::new("LLM-Operator", "OpenAI");

    pact_builder.interaction("validate a model with a short chat completion", "", |mut i| {
        i.given("the API key is valid and gpt-4 is available");
        i.request
            .method("POST")
            .path("/chat/completions")
            .header("authorization", "Bearer sk-test")
            .header("content-type", "application/json")
            .json_body(json!({
                "model": "gpt-4",
                "messages": [{"role": "user", "content": "Hello"}]
            }));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(completion("Hello! How can I help you today?"));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = OpenAi::new("sk-test", &base_url(mock_server.url()))
        .expect("Failed to build client");

    let response = client
        .validate(&[CallOption::model("gpt-4")])
        .await
        .expect("Validation request failed");
    assert!(response
        .to_string()
        .contains("Hello! How can I help you today?"));
}

#[tokio::test]
async fn test_openai_prompt_call_contract() {
    init();
    let mut pact_builder = PactBuilder::new("LLM-Operator", "OpenAI");

    pact_builder.interaction("send prompt parameters as a chat completion", "", |mut i| {
        i.given("the API key is valid");
        i.request
            .method("POST")
            .path("/chat/completions")
            .header("authorization", "Bearer sk-test")
            .header("content-type", "application/json")
            .json_body(json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "Write a haiku about operators"}],
                "temperature": 0.8,
                "top_p": 0.7
            }));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(completion("Reconcile, requeue"));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = OpenAi::new("sk-test", &base_url(mock_server.url()))
        .expect("Failed to build client");

    let payload = ModelParams::user("Write a haiku about operators")
        .marshal()
        .expect("Failed to marshal params");
    let response = client.call(&payload).await.expect("Prompt call failed");

    let envelope: serde_json::Value =
        serde_json::from_slice(&response.to_bytes()).expect("Response is not JSON");
    assert_eq!(envelope["code"], 200);
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["data"], "Reconcile, requeue");
}

#[tokio::test]
async fn test_openai_rejected_api_key_contract() {
    init();
    let mut pact_builder = PactBuilder::new("LLM-Operator", "OpenAI");

    pact_builder.interaction("validate with a revoked API key", "", |mut i| {
        i.given("the API key has been revoked");
        i.request
            .method("POST")
            .path("/chat/completions")
            .header("authorization", "Bearer sk-revoked")
            .header("content-type", "application/json")
            .json_body(json!({
                "model": "gpt-4",
                "messages": [{"role": "user", "content": "Hello"}]
            }));
        i.response
            .status(401)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "message": "Incorrect API key provided",
                    "type": "invalid_request_error",
                    "code": "invalid_api_key"
                }
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = OpenAi::new("sk-revoked", &base_url(mock_server.url()))
        .expect("Failed to build client");

    let err = client
        .validate(&[CallOption::model("gpt-4")])
        .await
        .expect_err("Revoked key must be rejected");
    match err {
        LlmError::Api { status, body, .. } => {
            assert_eq!(status, 401);
            assert!(body.contains("invalid_api_key"));
        }
        other => panic!("Unexpected error: {other}"),
    }
}
