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

//! POST `/v1/responses` — the OpenAI responses API, stream or non-stream.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde_json::Value;

use crate::accounting::prompt_tokens;
use crate::endpoints::{apply_headers, decode_text_stream, require_object, wants_stream};
use crate::error::HttpError;
use crate::fake_stream;
use crate::shaper::{shape, EndpointKind};
use crate::state::SharedState;
use crate::translator;
use crate::translator::StreamChunk;

#[utoipa::path(
    post,
    path = "/v1/responses",
    request_body = crate::openai_types::ResponsesRequest,
    responses(
        (status = 200, description = "OK", body = crate::openai_types::ResponseEnvelope),
        (status = 400, description = "malformed request", body = crate::openai_types::ErrorBody),
        (status = 502, description = "upstream error", body = crate::openai_types::ErrorBody),
    ),
)]
pub async fn responses(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> Result<Response, HttpError> {
    let body = require_object(body)?;
    let client_wants_stream = wants_stream(&body);

    let shaped = shape(&body, EndpointKind::Responses, &state.config, &state.registry)?;
    let model = shaped["model"].as_str().unwrap_or_default().to_string();
    let prompt_tok = prompt_tokens(&shaped, &model);
    let forwarded_stream = wants_stream(&shaped);
    let shaped_value = Value::Object(shaped);

    if forwarded_stream {
        let reply = state
            .transport
            .post_stream(&state.config.argo_stream_url, &shaped_value)
            .await?;
        let headers = reply.headers;
        let chunks = decode_text_stream(reply.bytes);
        let mut response = translator::response_stream(chunks, model, prompt_tok).into_response();
        apply_headers(&mut response, &headers);
        return Ok(response);
    }

    let reply = state
        .transport
        .post_json(&state.config.argo_url, &shaped_value)
        .await?;

    if client_wants_stream {
        let text = reply
            .body
            .get("response")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let chunks = fake_stream::windows(text).map(StreamChunk::Text);
        let mut response = translator::response_stream(chunks, model, prompt_tok).into_response();
        apply_headers(&mut response, &reply.headers);
        return Ok(response);
    }

    let envelope = translator::response_non_stream(&reply.body, &model, prompt_tok)?;
    let mut response = Json(envelope).into_response();
    apply_headers(&mut response, &reply.headers);
    Ok(response)
}
