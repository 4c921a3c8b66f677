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

//! POST `/v1/embeddings` — always non-streaming, always the embedding
//! upstream URL.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::accounting::prompt_tokens;
use crate::endpoints::{apply_headers, require_object};
use crate::error::HttpError;
use crate::shaper::{shape, EndpointKind};
use crate::state::SharedState;
use crate::translator;

#[utoipa::path(
    post,
    path = "/v1/embeddings",
    request_body = crate::openai_types::EmbeddingsRequest,
    responses(
        (status = 200, description = "OK", body = crate::openai_types::EmbeddingList),
        (status = 400, description = "malformed request", body = crate::openai_types::ErrorBody),
        (status = 502, description = "upstream error", body = crate::openai_types::ErrorBody),
    ),
)]
pub async fn embeddings(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> Result<Response, HttpError> {
    let body = require_object(body)?;
    let shaped = shape(&body, EndpointKind::Embeddings, &state.config, &state.registry)?;
    let model = shaped["model"].as_str().unwrap_or_default().to_string();
    let prompt_tok = prompt_tokens(&shaped, &model);
    let shaped_value = Value::Object(shaped);

    let reply = state
        .transport
        .post_json(&state.config.argo_embedding_url, &shaped_value)
        .await?;

    let list = translator::embeddings(&reply.body, &model, prompt_tok)?;
    let mut response = Json(list).into_response();
    apply_headers(&mut response, &reply.headers);
    Ok(response)
}
