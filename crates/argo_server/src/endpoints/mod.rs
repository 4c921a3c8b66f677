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

//! Endpoint Orchestrators: one module per route, each composing
//! Shaper → Transport → Translator.

pub mod chat;
pub mod chat_completions;
pub mod completions;
pub mod docs;
pub mod embeddings;
pub mod health;
pub mod models;
pub mod responses;
pub mod status;

use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::{Map, Value};

use argo_core::ProxyError;

use crate::transport::ForwardedHeaders;
use crate::translator::StreamChunk;

/// Parses a request body into a JSON object. An empty or non-object body is
/// a bad request.
pub fn require_object(body: Value) -> Result<Map<String, Value>, ProxyError> {
    match body {
        Value::Object(map) if !map.is_empty() => Ok(map),
        Value::Object(_) => Err(ProxyError::BadRequest("request body must not be empty".to_string())),
        _ => Err(ProxyError::BadRequest("request body must be a JSON object".to_string())),
    }
}

/// Whether the client asked for `stream: true`, defaulting to non-streaming.
pub fn wants_stream(body: &Map<String, Value>) -> bool {
    body.get("stream").and_then(Value::as_bool).unwrap_or(false)
}

/// Converts a raw upstream byte stream into a stream of lossily-decoded UTF-8
/// chunks. A transport error mid-stream yields exactly one
/// [`StreamChunk::Failed`] and then ends the stream — by that point response
/// headers are already committed, so the translator's only remaining option
/// is to stop emitting cleanly rather than surface the error as a status
/// code.
pub fn decode_text_stream(
    bytes: Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send + Unpin>,
) -> impl Stream<Item = StreamChunk> {
    bytes.scan(false, |failed, chunk| {
        if *failed {
            return futures::future::ready(None);
        }
        match chunk {
            Ok(b) => futures::future::ready(Some(StreamChunk::Text(String::from_utf8_lossy(&b).into_owned()))),
            Err(_) => {
                *failed = true;
                futures::future::ready(Some(StreamChunk::Failed))
            }
        }
    })
}

/// Copies the upstream's forwarded response headers onto the outbound axum
/// response. Pairs that don't round-trip through `http`'s header types are
/// skipped rather than failing the whole response.
pub fn apply_headers(response: &mut Response, headers: &ForwardedHeaders) {
    for (name, value) in headers {
        let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) else {
            continue;
        };
        response.headers_mut().insert(name, value);
    }
}
