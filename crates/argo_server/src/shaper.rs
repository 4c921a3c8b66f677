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

//! The Request Shaper: rewrites an incoming OpenAI-shaped JSON body into the
//! shape the upstream expects, per the ten ordered rules below.
//!
//! One function is shared across all four endpoint kinds, operating on a
//! plain `serde_json::Map` rather than per-endpoint typed structs, since most
//! of the rules are conditional rewrites keyed on which fields happen to be
//! present rather than on the endpoint itself.

use std::collections::HashSet;

use serde_json::{Map, Value};

use argo_core::{Config, ModelKind, ModelRegistry, ProxyError};

use crate::functions::build_function_calling_preamble;

/// Which route invoked the shaper; determines which of the ten rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Chat,
    Completions,
    Embeddings,
    Responses,
}

impl EndpointKind {
    fn model_kind(self) -> ModelKind {
        match self {
            EndpointKind::Embeddings => ModelKind::Embedding,
            _ => ModelKind::Chat,
        }
    }
}

const RESPONSES_STRIP_FIELDS: &[&str] = &[
    "include",
    "metadata",
    "parallel_tool_calls",
    "previous_response_id",
    "reasoning",
    "service_tier",
    "store",
    "text",
    "tool_choice",
    "tools",
    "truncation",
];

/// Shapes `body` for `kind`, returning a new upstream-bound payload. Never
/// mutates `body`.
pub fn shape(
    body: &Map<String, Value>,
    kind: EndpointKind,
    config: &Config,
    registry: &ModelRegistry,
) -> Result<Map<String, Value>, ProxyError> {
    let mut out = body.clone();

    // 1. user is always overwritten with the configured upstream identity.
    out.insert("user".to_string(), Value::String(config.user.clone()));

    // 2. model resolution, with the kind-specific default on a missing key.
    let requested_model = out
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let upstream_model = registry.resolve(&requested_model, kind.model_kind());
    out.insert("model".to_string(), Value::String(upstream_model.clone()));

    // 3. normalize any already-present `prompt` to a sequence of strings.
    if let Some(value) = out.remove("prompt") {
        out.insert("prompt".to_string(), Value::Array(normalize_to_strings(value)?));
    }

    // 4. embeddings: input -> prompt.
    if kind == EndpointKind::Embeddings {
        if let Some(input) = out.remove("input") {
            out.insert("prompt".to_string(), Value::Array(normalize_to_strings(input)?));
        }
    }

    // 5. responses: input -> messages, instructions prepended, field renames
    // and stripping.
    if kind == EndpointKind::Responses {
        let mut messages = match out.remove("input") {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        };

        if let Some(Value::String(instructions)) = out.remove("instructions") {
            let mut synthetic = Map::new();
            synthetic.insert("role".to_string(), Value::String("system".to_string()));
            synthetic.insert("content".to_string(), Value::String(instructions));
            messages.insert(0, Value::Object(synthetic));
        }

        if let Some(max_output) = out.remove("max_output_tokens") {
            out.insert("max_tokens".to_string(), max_output);
        }

        for field in RESPONSES_STRIP_FIELDS {
            out.remove(*field);
        }

        out.insert("messages".to_string(), Value::Array(messages));
    }

    // 6. function-calling preamble injection, chat only.
    if config.translate_tools && kind == EndpointKind::Chat {
        if let Some(Value::Array(tools)) = out.get("tools").cloned() {
            if !tools.is_empty() {
                let preamble = build_function_calling_preamble(&tools);
                prepend_to_first_system_message(&mut out, &preamble)?;
                out.insert("tools".to_string(), Value::Null);
            }
        }
    }

    // 7. collapse a multi-entry prompt list to a single joined entry, chat
    // endpoints only. Embeddings/Responses skip straight to rule 10, where
    // the dedup-join does the same job but drops duplicates first — this is
    // what the embeddings dedup test below depends on.
    if matches!(kind, EndpointKind::Chat | EndpointKind::Completions) {
        if let Some(Value::Array(items)) = out.get("prompt").cloned() {
            if items.len() > 1 {
                let joined = join_strings(&items)?;
                out.insert(
                    "prompt".to_string(),
                    Value::Array(vec![Value::String(joined)]),
                );
            }
        }
    }

    // 8. no-sys-msg demotion.
    if registry.no_sys_msg(&upstream_model) {
        demote_system_messages(&mut out);

        if let Some(system) = out.remove("system") {
            let system_strings = normalize_to_strings(system)?;
            let mut prompt = match out.remove("prompt") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            let mut merged = system_strings;
            merged.extend(prompt.drain(..));
            out.insert("prompt".to_string(), Value::Array(merged));
        }
    }

    // 9. non-streamable models are forced to a non-streaming upstream call.
    if !registry.streamable(&upstream_model) {
        out.insert("stream".to_string(), Value::Bool(false));
    }

    // 10. dedup-and-concatenate system/prompt sequences into single strings.
    if let Some(value) = out.remove("system") {
        let strings = normalize_to_strings(value)?;
        out.insert("system".to_string(), Value::String(dedup_join(&strings)));
    }
    if let Some(Value::Array(items)) = out.remove("prompt") {
        let strings = items
            .into_iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(|| invalid_prompt()))
            .collect::<Result<Vec<_>, _>>()?;
        out.insert("prompt".to_string(), Value::String(dedup_join(&strings)));
    }

    Ok(out)
}

fn invalid_prompt() -> ProxyError {
    ProxyError::BadRequest("prompt/system must be a string or an array of strings".to_string())
}

/// Accepts a scalar string or an array of strings; anything else is a bad
/// request.
fn normalize_to_strings(value: Value) -> Result<Vec<Value>, ProxyError> {
    match value {
        Value::String(s) => Ok(vec![Value::String(s)]),
        Value::Array(items) => {
            for item in &items {
                if !item.is_string() {
                    return Err(invalid_prompt());
                }
            }
            Ok(items)
        }
        _ => Err(invalid_prompt()),
    }
}

fn join_strings(items: &[Value]) -> Result<String, ProxyError> {
    let strings = items
        .iter()
        .map(|v| v.as_str().ok_or_else(invalid_prompt))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(strings.join("\n\n"))
}

/// Joins `items` with `"\n\n"`, preserving first-seen order and dropping
/// duplicates.
fn dedup_join(items: &[String]) -> String {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            ordered.push(item.clone());
        }
    }
    ordered.join("\n\n")
}

fn demote_system_messages(out: &mut Map<String, Value>) {
    if let Some(Value::Array(messages)) = out.get_mut("messages") {
        for message in messages.iter_mut() {
            if let Value::Object(map) = message {
                if map.get("role").and_then(Value::as_str) == Some("system") {
                    map.insert("role".to_string(), Value::String("user".to_string()));
                }
            }
        }
    }
}

fn prepend_to_first_system_message(
    out: &mut Map<String, Value>,
    preamble: &str,
) -> Result<(), ProxyError> {
    if let Some(Value::Array(messages)) = out.get_mut("messages") {
        for message in messages.iter_mut() {
            if let Value::Object(map) = message {
                if map.get("role").and_then(Value::as_str) == Some("system") {
                    let existing = map.get("content").and_then(Value::as_str).unwrap_or("");
                    let merged = format!("{preamble}\n\n{existing}");
                    map.insert("content".to_string(), Value::String(merged));
                    return Ok(());
                }
            }
        }
        // No system message yet: insert one at the front.
        let mut synthetic = Map::new();
        synthetic.insert("role".to_string(), Value::String("system".to_string()));
        synthetic.insert("content".to_string(), Value::String(preamble.to_string()));
        messages.insert(0, Value::Object(synthetic));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 44497,
            user: "proxyuser".to_string(),
            argo_url: "http://up/chat".to_string(),
            argo_stream_url: "http://up/stream".to_string(),
            argo_embedding_url: "http://up/embed".to_string(),
            verbose: false,
            num_workers: 4,
            timeout_secs: 600,
            translate_tools: false,
        }
    }

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn overwrites_user_and_resolves_model() {
        let body = obj(json!({"model": "argo:gpt-4o", "messages": [], "user": "someone-else"}));
        let shaped = shape(&body, EndpointKind::Chat, &config(), &ModelRegistry::new()).unwrap();
        assert_eq!(shaped["user"], json!("proxyuser"));
        assert_eq!(shaped["model"], json!("gpt4o"));
    }

    #[test]
    fn missing_model_falls_back_to_default() {
        let body = obj(json!({"messages": []}));
        let shaped = shape(&body, EndpointKind::Chat, &config(), &ModelRegistry::new()).unwrap();
        assert_eq!(shaped["model"], json!("gpt4o"));
    }

    #[test]
    fn embeddings_renames_input_to_prompt() {
        let body = obj(json!({"model": "argo:text-embedding-3-small", "input": "hello"}));
        let shaped =
            shape(&body, EndpointKind::Embeddings, &config(), &ModelRegistry::new()).unwrap();
        assert_eq!(shaped["prompt"], json!("hello"));
        assert!(!shaped.contains_key("input"));
    }

    #[test]
    fn embeddings_array_input_dedups_and_joins() {
        let body = obj(json!({
            "model": "argo:text-embedding-3-small",
            "input": ["a", "b", "a"],
        }));
        let shaped =
            shape(&body, EndpointKind::Embeddings, &config(), &ModelRegistry::new()).unwrap();
        assert_eq!(shaped["prompt"], json!("a\n\nb"));
    }

    #[test]
    fn responses_builds_messages_from_input_and_instructions() {
        let body = obj(json!({
            "model": "argo:gpt-4o",
            "input": [{"role": "user", "content": "hi"}],
            "instructions": "be nice",
            "max_output_tokens": 100,
            "store": true,
        }));
        let shaped =
            shape(&body, EndpointKind::Responses, &config(), &ModelRegistry::new()).unwrap();
        let messages = shaped["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], json!("system"));
        assert_eq!(messages[0]["content"], json!("be nice"));
        assert_eq!(shaped["max_tokens"], json!(100));
        assert!(!shaped.contains_key("max_output_tokens"));
        assert!(!shaped.contains_key("store"));
        assert!(!shaped.contains_key("input"));
    }

    #[test]
    fn no_sys_msg_model_demotes_system_role_and_merges_into_prompt() {
        let body = obj(json!({
            "model": "argo:gpt-o1-mini",
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"},
            ],
            "system": "be terse too",
        }));
        let shaped = shape(&body, EndpointKind::Chat, &config(), &ModelRegistry::new()).unwrap();
        let messages = shaped["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], json!("user"));
        assert!(!shaped.contains_key("system"));
        assert_eq!(shaped["prompt"], json!("be terse too"));
    }

    #[test]
    fn non_streamable_model_forces_stream_false() {
        let body = obj(json!({"model": "argo:gpt-o1-mini", "messages": [], "stream": true}));
        let shaped = shape(&body, EndpointKind::Chat, &config(), &ModelRegistry::new()).unwrap();
        assert_eq!(shaped["stream"], json!(false));
    }

    #[test]
    fn invalid_system_type_is_bad_request() {
        let body = obj(json!({"model": "argo:gpt-4o", "system": 5}));
        let err = shape(&body, EndpointKind::Chat, &config(), &ModelRegistry::new()).unwrap_err();
        assert!(matches!(err, ProxyError::BadRequest(_)));
    }

    #[test]
    fn system_sequence_is_dedup_joined() {
        let body = obj(json!({
            "model": "argo:gpt-4o",
            "system": ["a", "b", "a"],
        }));
        let shaped = shape(&body, EndpointKind::Chat, &config(), &ModelRegistry::new()).unwrap();
        assert_eq!(shaped["system"], json!("a\n\nb"));
    }

    #[test]
    fn translate_tools_injects_preamble_and_nulls_tools() {
        let mut cfg = config();
        cfg.translate_tools = true;
        let body = obj(json!({
            "model": "argo:gpt-4o",
            "messages": [{"role": "system", "content": "base"}],
            "tools": [{
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "parameters": {"type": "object", "properties": {}},
                },
            }],
        }));
        let shaped = shape(&body, EndpointKind::Chat, &cfg, &ModelRegistry::new()).unwrap();
        let messages = shaped["messages"].as_array().unwrap();
        let content = messages[0]["content"].as_str().unwrap();
        assert!(content.contains("get_weather"));
        assert!(content.ends_with("base"));
        assert_eq!(shaped["tools"], Value::Null);
    }
}
