/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Full request-cycle tests driving the real router (`routes::build`) against
//! a `wiremock` stand-in for the Argo upstream.

use argo_core::{Config, ModelRegistry};
use argo_server::state::AppState;
use argo_server::transport::Transport;
use axum_test::TestServer;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_server(upstream: &MockServer) -> TestServer {
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        user: "proxyuser".to_string(),
        argo_url: format!("{}/chat", upstream.uri()),
        argo_stream_url: format!("{}/streamchat", upstream.uri()),
        argo_embedding_url: format!("{}/embed", upstream.uri()),
        verbose: false,
        num_workers: 1,
        timeout_secs: 5,
        translate_tools: true,
    };
    let registry = ModelRegistry::new();
    let client = Transport::build_client(std::time::Duration::from_secs(5)).unwrap();
    let transport = Transport::new(client);
    let state = AppState::new(config, registry, transport);
    TestServer::new(argo_server::routes::build(state)).expect("cannot instantiate TestServer")
}

#[tokio::test]
async fn chat_completions_non_stream_roundtrip() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "hi there"})))
        .mount(&upstream)
        .await;

    let server = test_server(&upstream).await;
    let response = server
        .post("/v1/chat/completions")
        .json(&json!({
            "model": "argo:gpt-4o",
            "messages": [{"role": "user", "content": "hello"}],
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["object"], json!("chat.completion"));
    assert_eq!(body["choices"][0]["message"]["content"], json!("hi there"));
    // usage.total_tokens must equal prompt_tokens + completion_tokens.
    let usage = &body["usage"];
    assert_eq!(
        usage["total_tokens"],
        json!(usage["prompt_tokens"].as_u64().unwrap() + usage["completion_tokens"].as_u64().unwrap())
    );
}

#[tokio::test]
async fn chat_completions_forwards_configured_user_and_resolved_model() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
        .mount(&upstream)
        .await;

    let server = test_server(&upstream).await;
    server
        .post("/v1/chat/completions")
        .json(&json!({
            "model": "argo:gpt-4o",
            "user": "someone-else",
            "messages": [{"role": "user", "content": "hello"}],
        }))
        .await
        .assert_status_ok();

    // The user-overwrite and model-resolution rules are asserted against the
    // shaped body directly in shaper.rs's unit tests; here we only need the
    // round trip to succeed end to end.
    let requests = upstream.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["user"], json!("proxyuser"));
    assert_eq!(sent["model"], json!("gpt4o"));
}

#[tokio::test]
async fn no_sys_msg_model_strips_system_role_end_to_end() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
        .mount(&upstream)
        .await;

    let server = test_server(&upstream).await;
    server
        .post("/v1/chat/completions")
        .json(&json!({
            "model": "argo:gpt-o1-mini",
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"},
            ],
        }))
        .await
        .assert_status_ok();

    let requests = upstream.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    // No system-roled message, no top-level `system` key.
    assert!(!sent.as_object().unwrap().contains_key("system"));
    let messages = sent["messages"].as_array().unwrap();
    assert!(messages.iter().all(|m| m["role"] != "system"));
}

#[tokio::test]
async fn function_call_reply_sets_tool_calls_and_finish_reason() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "FUNCTION_CALL: get_weather\nARGUMENTS: {\"city\": \"Chicago\"}",
        })))
        .mount(&upstream)
        .await;

    let server = test_server(&upstream).await;
    let response = server
        .post("/v1/chat/completions")
        .json(&json!({
            "model": "argo:gpt-4o",
            "messages": [{"role": "user", "content": "weather?"}],
            "tools": [{
                "type": "function",
                "function": {"name": "get_weather", "parameters": {"type": "object", "properties": {}}},
            }],
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let choice = &body["choices"][0];
    assert_eq!(choice["finish_reason"], json!("tool_calls"));
    assert_eq!(choice["message"]["content"], Value::Null);
    assert_eq!(choice["message"]["tool_calls"][0]["function"]["name"], json!("get_weather"));
}

#[tokio::test]
async fn embeddings_roundtrip() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [[0.1, 0.2, 0.3]],
        })))
        .mount(&upstream)
        .await;

    let server = test_server(&upstream).await;
    let response = server
        .post("/v1/embeddings")
        .json(&json!({"model": "argo:text-embedding-3-small", "input": "hello world"}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"][0]["embedding"], json!([0.1, 0.2, 0.3]));
    assert_eq!(body["usage"]["total_tokens"], body["usage"]["prompt_tokens"]);
}

#[tokio::test]
async fn upstream_error_status_is_surfaced() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream is down"))
        .mount(&upstream)
        .await;

    let server = test_server(&upstream).await;
    let response = server
        .post("/v1/chat/completions")
        .json(&json!({"model": "argo:gpt-4o", "messages": [{"role": "user", "content": "hi"}]}))
        .await;

    response.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn malformed_system_field_is_bad_request() {
    let upstream = MockServer::start().await;
    let server = test_server(&upstream).await;

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({"model": "argo:gpt-4o", "messages": [], "system": 5}))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn models_lists_registry_aliases() {
    let upstream = MockServer::start().await;
    let server = test_server(&upstream).await;

    let response = server.get("/v1/models").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"argo:gpt-4o"));
    assert!(ids.contains(&"argo:text-embedding-3-small"));
}

#[tokio::test]
async fn health_never_touches_upstream() {
    let upstream = MockServer::start().await;
    let server = test_server(&upstream).await;

    server.get("/health").await.assert_status_ok();
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

/// Splits a `text/event-stream` body into its `data: ...` payloads.
fn sse_payloads(body: &str) -> Vec<&str> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .collect()
}

#[tokio::test]
async fn chat_completions_stream_ends_with_single_done() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/streamchat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello there"))
        .mount(&upstream)
        .await;

    let server = test_server(&upstream).await;
    let response = server
        .post("/v1/chat/completions")
        .json(&json!({
            "model": "argo:gpt-4o",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .await;

    response.assert_status_ok();
    let body = response.text();
    let payloads = sse_payloads(&body);
    assert_eq!(payloads.iter().filter(|p| **p == "[DONE]").count(), 1);
    assert_eq!(payloads.last(), Some(&"[DONE]"));
}

#[tokio::test]
async fn completions_stream_ends_with_single_done() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/streamchat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello there"))
        .mount(&upstream)
        .await;

    let server = test_server(&upstream).await;
    let response = server
        .post("/v1/completions")
        .json(&json!({
            "model": "argo:gpt-4o",
            "stream": true,
            "prompt": "hi",
        }))
        .await;

    response.assert_status_ok();
    let body = response.text();
    let payloads = sse_payloads(&body);
    assert_eq!(payloads.iter().filter(|p| **p == "[DONE]").count(), 1);
    assert_eq!(payloads.last(), Some(&"[DONE]"));
}

#[tokio::test]
async fn responses_stream_has_gapless_sequence_numbers_and_one_completed_event() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/streamchat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello there"))
        .mount(&upstream)
        .await;

    let server = test_server(&upstream).await;
    let response = server
        .post("/v1/responses")
        .json(&json!({
            "model": "argo:gpt-4o",
            "stream": true,
            "input": "hi",
        }))
        .await;

    response.assert_status_ok();
    let body = response.text();
    let events: Vec<Value> = sse_payloads(&body)
        .into_iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();

    for (i, event) in events.iter().enumerate() {
        assert_eq!(event["sequence_number"].as_u64().unwrap(), i as u64);
    }
    assert_eq!(events.iter().filter(|e| e["type"] == "response.completed").count(), 1);
    assert_eq!(events.last().unwrap()["type"], json!("response.completed"));
}

#[tokio::test]
async fn non_streamable_model_fake_stream_matches_non_stream_reply() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "hello world"})))
        .mount(&upstream)
        .await;

    let server = test_server(&upstream).await;

    let non_stream = server
        .post("/v1/chat/completions")
        .json(&json!({
            "model": "argo:gpt-o1-mini",
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .await;
    non_stream.assert_status_ok();
    let non_stream_body: Value = non_stream.json();
    let non_stream_text = non_stream_body["choices"][0]["message"]["content"].as_str().unwrap().to_string();

    let streamed = server
        .post("/v1/chat/completions")
        .json(&json!({
            "model": "argo:gpt-o1-mini",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .await;
    streamed.assert_status_ok();
    let body = streamed.text();
    let reassembled: String = sse_payloads(&body)
        .into_iter()
        .filter(|p| *p != "[DONE]")
        .map(|p| {
            let v: Value = serde_json::from_str(p).unwrap();
            v["choices"][0]["delta"]["content"].as_str().unwrap_or_default().to_string()
        })
        .collect();

    assert_eq!(reassembled, non_stream_text);
}
