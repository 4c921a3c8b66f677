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

//! The Response Translator: turns an upstream reply (or stream of raw text
//! chunks) into the OpenAI-shaped envelopes and SSE event sequences clients
//! expect.
//!
//! Every SSE frame is a plain `data: <json>\n\n` frame — no named `event:`
//! field. Clients already get the event's kind from the `type` field inside
//! the JSON payload (`response.created`, `response.output_text.delta`, ...),
//! so a second, redundant signal at the SSE framing layer would just be
//! another thing for a client to get out of sync with the body it parses.
//! Streaming functions are split into a private `*_data` generator that
//! yields the raw JSON strings (independently testable) and a thin public
//! wrapper that maps each string into an `Event` and wraps the whole thing in
//! `Sse`.

use std::convert::Infallible;
use std::time::{SystemTime, UNIX_EPOCH};

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde_json::Value;
use uuid::Uuid;

use argo_core::{tokens::count_tokens, ProxyError};

use crate::functions::{parse_function_call_response, to_tool_calls};
use crate::openai_types::{
    ChatCompletion, ChatCompletionChunk, Completion, CompletionChoice, EmbeddingList,
    EmbeddingObject, EmbeddingUsage, ResponseEnvelope, ResponseOutputMessage, ResponseOutputText,
    ResponseUsage, Usage,
};

/// One item of a decoded upstream stream, as handed to the streaming
/// translator functions. `Failed` marks that the transport hit a mid-flight
/// error and no further chunks will arrive; streaming functions treat it as
/// an instruction to stop emitting immediately, with no closing chunk and no
/// `[DONE]`/`response.completed` frame, since by that point response headers
/// are already committed and a status code can no longer change.
pub enum StreamChunk {
    Text(String),
    Failed,
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn new_id(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4().simple())
}

fn upstream_text(body: &Value) -> Result<&str, ProxyError> {
    body.get("response")
        .and_then(Value::as_str)
        .ok_or_else(|| ProxyError::Unexpected("upstream reply missing `response` field".to_string()))
}

/// Non-streaming chat/completion translation, with function-call detection
/// applied when `translate_tools` is enabled.
pub fn chat_non_stream(
    upstream_body: &Value,
    model: &str,
    prompt_tokens: u32,
    translate_tools: bool,
) -> Result<ChatCompletion, ProxyError> {
    let text = upstream_text(upstream_body)?;
    let completion_tokens = count_tokens(text, model);
    let usage = Usage::new(prompt_tokens, completion_tokens);
    let id = new_id("chatcmpl-");
    let mut completion = ChatCompletion::new(id, now_unix(), model.to_string(), text.to_string(), usage);

    if translate_tools {
        if let Some(parsed) = parse_function_call_response(text) {
            let choice = &mut completion.choices[0];
            choice.message.content = None;
            choice.message.tool_calls = Some(to_tool_calls(&parsed));
            choice.finish_reason = Some("tool_calls".to_string());
        }
    }

    Ok(completion)
}

/// Legacy `/v1/completions` non-streaming translation: `text`/`text_completion`
/// shape, usage always present (unlike the streaming variant, where the
/// upstream never reports usage mid-flight).
pub fn completion_non_stream(
    upstream_body: &Value,
    model: &str,
    prompt_tokens: u32,
) -> Result<Completion, ProxyError> {
    let text = upstream_text(upstream_body)?;
    let completion_tokens = count_tokens(text, model);
    Ok(Completion {
        id: new_id("cmpl-"),
        object: "text_completion".to_string(),
        created: now_unix(),
        model: model.to_string(),
        choices: vec![CompletionChoice {
            text: text.to_string(),
            index: 0,
            finish_reason: Some("stop".to_string()),
        }],
        usage: Some(Usage::new(prompt_tokens, completion_tokens)),
    })
}

/// Embeddings translation: one `EmbeddingObject` per upstream vector, in
/// order. `total_tokens == prompt_tokens` since there is no completion side.
pub fn embeddings(
    upstream_body: &Value,
    model: &str,
    prompt_tokens: u32,
) -> Result<EmbeddingList, ProxyError> {
    let vectors = upstream_body
        .get("embedding")
        .and_then(Value::as_array)
        .ok_or_else(|| ProxyError::Unexpected("upstream reply missing `embedding` field".to_string()))?;

    let data = vectors
        .iter()
        .enumerate()
        .map(|(index, vector)| {
            let embedding = vector
                .as_array()
                .map(|items| items.iter().filter_map(Value::as_f64).collect())
                .unwrap_or_default();
            EmbeddingObject {
                object: "embedding".to_string(),
                index,
                embedding,
            }
        })
        .collect();

    Ok(EmbeddingList {
        object: "list".to_string(),
        data,
        model: model.to_string(),
        usage: EmbeddingUsage {
            prompt_tokens,
            total_tokens: prompt_tokens,
        },
    })
}

/// Non-streaming `/v1/responses` translation: one output message, one
/// output-text content part.
pub fn response_non_stream(
    upstream_body: &Value,
    model: &str,
    prompt_tokens: u32,
) -> Result<ResponseEnvelope, ProxyError> {
    let text = upstream_text(upstream_body)?;
    let completion_tokens = count_tokens(text, model);
    Ok(ResponseEnvelope {
        id: new_id("resp_"),
        object: "response".to_string(),
        created_at: now_unix(),
        model: model.to_string(),
        status: "completed".to_string(),
        output: vec![ResponseOutputMessage {
            id: new_id("msg_"),
            kind: "message".to_string(),
            status: "completed".to_string(),
            content: vec![ResponseOutputText::new(text.to_string())],
        }],
        usage: Some(ResponseUsage {
            input_tokens: prompt_tokens,
            output_tokens: completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }),
    })
}

/// Streams a chat/completion SSE sequence from a stream of decoded upstream
/// chunks, applying function-call detection to the accumulated reply once
/// the source stream ends cleanly (the bridge only ever sees the full text,
/// never a partial match). Terminated by a single `data: [DONE]\n\n`, unless
/// the source stream reports [`StreamChunk::Failed`], in which case emission
/// stops immediately with no closing chunk and no `[DONE]`.
fn chat_stream_data<S>(chunks: S, id: String, created: i64, model: String, translate_tools: bool) -> impl Stream<Item = String>
where
    S: Stream<Item = StreamChunk> + Send + 'static,
{
    stream! {
        tokio::pin!(chunks);
        let mut accumulated = String::new();

        while let Some(item) = chunks.next().await {
            let chunk = match item {
                StreamChunk::Text(s) => s,
                StreamChunk::Failed => return,
            };
            accumulated.push_str(&chunk);
            let event = ChatCompletionChunk::delta(&id, created, &model, chunk, None);
            yield serde_json::to_string(&event).unwrap_or_default();
        }

        let mut final_event = ChatCompletionChunk::delta(&id, created, &model, String::new(), Some("stop"));
        if translate_tools {
            if let Some(parsed) = parse_function_call_response(&accumulated) {
                final_event.choices[0].delta.content = None;
                final_event.choices[0].delta.tool_calls = Some(to_tool_calls(&parsed));
                final_event.choices[0].finish_reason = Some("tool_calls".to_string());
            }
        }
        yield serde_json::to_string(&final_event).unwrap_or_default();
        yield "[DONE]".to_string();
    }
}

pub fn chat_stream<S>(
    chunks: S,
    model: String,
    translate_tools: bool,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = StreamChunk> + Send + 'static,
{
    let id = new_id("chatcmpl-");
    let created = now_unix();
    let data = chat_stream_data(chunks, id, created, model, translate_tools);
    Sse::new(data.map(|payload| Ok(Event::default().data(payload)))).keep_alive(KeepAlive::default())
}

/// Legacy completions SSE variant: `text` instead of `delta.content`, no
/// function-call bridge (the legacy endpoint has no `tools` field). Like
/// [`chat_stream_data`], a [`StreamChunk::Failed`] stops emission immediately
/// with no closing chunk and no `[DONE]`.
fn completion_stream_data<S>(chunks: S, id: String, created: i64, model: String) -> impl Stream<Item = String>
where
    S: Stream<Item = StreamChunk> + Send + 'static,
{
    stream! {
        tokio::pin!(chunks);
        while let Some(item) = chunks.next().await {
            let chunk = match item {
                StreamChunk::Text(s) => s,
                StreamChunk::Failed => return,
            };
            let event = Completion {
                id: id.clone(),
                object: "text_completion".to_string(),
                created,
                model: model.clone(),
                choices: vec![CompletionChoice {
                    text: chunk,
                    index: 0,
                    finish_reason: None,
                }],
                usage: None,
            };
            yield serde_json::to_string(&event).unwrap_or_default();
        }
        let done = Completion {
            id: id.clone(),
            object: "text_completion".to_string(),
            created,
            model: model.clone(),
            choices: vec![CompletionChoice {
                text: String::new(),
                index: 0,
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        };
        yield serde_json::to_string(&done).unwrap_or_default();
        yield "[DONE]".to_string();
    }
}

pub fn completion_stream<S>(chunks: S, model: String) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = StreamChunk> + Send + 'static,
{
    let id = new_id("cmpl-");
    let created = now_unix();
    let data = completion_stream_data(chunks, id, created, model);
    Sse::new(data.map(|payload| Ok(Event::default().data(payload)))).keep_alive(KeepAlive::default())
}

/// Drives the nine-event `/v1/responses` streaming state machine from a
/// stream of decoded upstream chunks. `prompt_tokens` is already known from
/// the Token Accountant; `output_tokens` is computed once, at the terminal
/// event. Every frame carries its event name in the `type` field of the JSON
/// payload rather than the SSE framing itself, so a transport failure mid
/// delta-loop (signalled by [`StreamChunk::Failed`]) can stop emission
/// outright with no `response.completed` frame, exactly like the chat and
/// completion streams.
fn response_stream_data<S>(chunks: S, response_id: String, message_id: String, model: String, prompt_tokens: u32) -> impl Stream<Item = String>
where
    S: Stream<Item = StreamChunk> + Send + 'static,
{
    const OUTPUT_INDEX: u32 = 0;
    const CONTENT_INDEX: u32 = 0;

    stream! {
        tokio::pin!(chunks);
        let mut seq: u64 = 0;
        let mut next_seq = |s: &mut u64| { let v = *s; *s += 1; v };

        let mut onset_response = serde_json::json!({
            "id": response_id,
            "object": "response",
            "created_at": now_unix(),
            "model": model,
            "status": "in_progress",
            "output": [],
        });

        yield serde_json::to_string(&serde_json::json!({
            "type": "response.created",
            "sequence_number": next_seq(&mut seq),
            "response": onset_response,
        })).unwrap_or_default();

        onset_response["status"] = serde_json::json!("in_progress");
        yield serde_json::to_string(&serde_json::json!({
            "type": "response.in_progress",
            "sequence_number": next_seq(&mut seq),
            "response": onset_response,
        })).unwrap_or_default();

        let mut output_msg = serde_json::json!({
            "id": message_id,
            "type": "message",
            "status": "in_progress",
            "content": [],
        });

        yield serde_json::to_string(&serde_json::json!({
            "type": "response.output_item.added",
            "sequence_number": next_seq(&mut seq),
            "output_index": OUTPUT_INDEX,
            "item": output_msg,
        })).unwrap_or_default();

        yield serde_json::to_string(&serde_json::json!({
            "type": "response.content_part.added",
            "sequence_number": next_seq(&mut seq),
            "output_index": OUTPUT_INDEX,
            "content_index": CONTENT_INDEX,
            "part": {"type": "output_text", "text": ""},
        })).unwrap_or_default();

        let mut cumulated = String::new();
        while let Some(item) = chunks.next().await {
            let chunk = match item {
                StreamChunk::Text(s) => s,
                StreamChunk::Failed => return,
            };
            cumulated.push_str(&chunk);
            yield serde_json::to_string(&serde_json::json!({
                "type": "response.output_text.delta",
                "sequence_number": next_seq(&mut seq),
                "output_index": OUTPUT_INDEX,
                "content_index": CONTENT_INDEX,
                "delta": chunk,
            })).unwrap_or_default();
        }

        yield serde_json::to_string(&serde_json::json!({
            "type": "response.output_text.done",
            "sequence_number": next_seq(&mut seq),
            "output_index": OUTPUT_INDEX,
            "content_index": CONTENT_INDEX,
            "text": cumulated,
        })).unwrap_or_default();

        let output_text = serde_json::json!({"type": "output_text", "text": cumulated});
        yield serde_json::to_string(&serde_json::json!({
            "type": "response.content_part.done",
            "sequence_number": next_seq(&mut seq),
            "output_index": OUTPUT_INDEX,
            "content_index": CONTENT_INDEX,
            "part": output_text,
        })).unwrap_or_default();

        output_msg["status"] = serde_json::json!("completed");
        output_msg["content"] = serde_json::json!([output_text]);
        yield serde_json::to_string(&serde_json::json!({
            "type": "response.output_item.done",
            "sequence_number": next_seq(&mut seq),
            "output_index": OUTPUT_INDEX,
            "item": output_msg,
        })).unwrap_or_default();

        let output_tokens = count_tokens(&cumulated, &model);
        onset_response["status"] = serde_json::json!("completed");
        onset_response["output"] = serde_json::json!([output_msg]);
        onset_response["usage"] = serde_json::json!({
            "input_tokens": prompt_tokens,
            "output_tokens": output_tokens,
            "total_tokens": prompt_tokens + output_tokens,
        });
        yield serde_json::to_string(&serde_json::json!({
            "type": "response.completed",
            "sequence_number": next_seq(&mut seq),
            "response": onset_response,
        })).unwrap_or_default();
    }
}

pub fn response_stream<S>(
    chunks: S,
    model: String,
    prompt_tokens: u32,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = StreamChunk> + Send + 'static,
{
    let response_id = new_id("resp_");
    let message_id = new_id("msg_");
    let data = response_stream_data(chunks, response_id, message_id, model, prompt_tokens);
    Sse::new(data.map(|payload| Ok(Event::default().data(payload)))).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_non_stream_computes_usage() {
        let body = json!({"response": "hello there"});
        let completion = chat_non_stream(&body, "gpt4o", 3, false).unwrap();
        assert_eq!(completion.usage.prompt_tokens, 3);
        assert_eq!(completion.usage.completion_tokens, 2);
        assert_eq!(completion.usage.total_tokens, 5);
        assert_eq!(completion.model, "gpt4o");
    }

    #[test]
    fn chat_non_stream_detects_function_call() {
        let body = json!({"response": "FUNCTION_CALL: get_weather\nARGUMENTS: {\"city\": \"Chicago\"}"});
        let completion = chat_non_stream(&body, "gpt4o", 1, true).unwrap();
        let choice = &completion.choices[0];
        assert!(choice.message.content.is_none());
        assert_eq!(choice.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(choice.message.tool_calls.as_ref().unwrap()[0].function.name, "get_weather");
    }

    #[test]
    fn embeddings_preserve_index_order() {
        let body = json!({"embedding": [[0.1, 0.2], [0.3, 0.4]]});
        let list = embeddings(&body, "ada002", 2).unwrap();
        assert_eq!(list.data[0].index, 0);
        assert_eq!(list.data[1].index, 1);
        assert_eq!(list.usage.total_tokens, list.usage.prompt_tokens);
    }

    #[test]
    fn response_non_stream_wraps_single_message() {
        let body = json!({"response": "hi"});
        let resp = response_non_stream(&body, "gpt4o", 4).unwrap();
        assert_eq!(resp.output.len(), 1);
        assert_eq!(resp.output[0].content[0].text, "hi");
        assert_eq!(resp.status, "completed");
    }

    fn text_chunks(words: &[&str]) -> impl Stream<Item = StreamChunk> {
        futures::stream::iter(words.iter().map(|w| StreamChunk::Text(w.to_string())).collect::<Vec<_>>())
    }

    async fn collect(stream: impl Stream<Item = String>) -> Vec<String> {
        tokio::pin!(stream);
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn chat_stream_data_ends_with_single_done() {
        let payloads = collect(chat_stream_data(text_chunks(&["hel", "lo"]), "chatcmpl-1".to_string(), 0, "gpt4o".to_string(), false)).await;
        assert_eq!(payloads.last().unwrap(), "[DONE]");
        assert_eq!(payloads.iter().filter(|p| p.as_str() == "[DONE]").count(), 1);

        let reassembled: String = payloads[..payloads.len() - 2]
            .iter()
            .map(|p| {
                let v: Value = serde_json::from_str(p).unwrap();
                v["choices"][0]["delta"]["content"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(reassembled, "hello");
    }

    #[tokio::test]
    async fn chat_stream_data_stops_on_failure_with_no_trailing_frame() {
        let chunks = futures::stream::iter(vec![StreamChunk::Text("hel".to_string()), StreamChunk::Failed]);
        let payloads = collect(chat_stream_data(chunks, "chatcmpl-1".to_string(), 0, "gpt4o".to_string(), false)).await;
        assert_eq!(payloads.len(), 1);
        assert!(!payloads.iter().any(|p| p == "[DONE]"));
    }

    #[tokio::test]
    async fn completion_stream_data_ends_with_single_done() {
        let payloads = collect(completion_stream_data(text_chunks(&["a", "b"]), "cmpl-1".to_string(), 0, "gpt4o".to_string())).await;
        assert_eq!(payloads.last().unwrap(), "[DONE]");
        assert_eq!(payloads.iter().filter(|p| p.as_str() == "[DONE]").count(), 1);
    }

    #[tokio::test]
    async fn completion_stream_data_stops_on_failure() {
        let chunks = futures::stream::iter(vec![StreamChunk::Failed]);
        let payloads = collect(completion_stream_data(chunks, "cmpl-1".to_string(), 0, "gpt4o".to_string())).await;
        assert!(payloads.is_empty());
    }

    #[tokio::test]
    async fn response_stream_data_sequence_numbers_are_gapless() {
        let payloads = collect(response_stream_data(
            text_chunks(&["hi"]),
            "resp_1".to_string(),
            "msg_1".to_string(),
            "gpt4o".to_string(),
            3,
        ))
        .await;

        let events: Vec<Value> = payloads.iter().map(|p| serde_json::from_str(p).unwrap()).collect();
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event["sequence_number"].as_u64().unwrap(), i as u64);
        }
        assert_eq!(events.iter().filter(|e| e["type"] == "response.completed").count(), 1);
        assert_eq!(events.last().unwrap()["type"], "response.completed");
    }

    #[tokio::test]
    async fn response_stream_data_stops_on_failure_before_completed() {
        let chunks = futures::stream::iter(vec![StreamChunk::Text("hi".to_string()), StreamChunk::Failed]);
        let payloads = collect(response_stream_data(
            chunks,
            "resp_1".to_string(),
            "msg_1".to_string(),
            "gpt4o".to_string(),
            3,
        ))
        .await;
        let events: Vec<Value> = payloads.iter().map(|p| serde_json::from_str(p).unwrap()).collect();
        assert!(!events.iter().any(|e| e["type"] == "response.completed"));
    }
}
