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

//! POST `/v1/chat` — pass-through chat: the body is forwarded to the
//! upstream mostly as received, with no Shaper or Translator involved, and
//! the upstream's raw JSON reply handed straight back to the client. The
//! user identity and model resolution still apply here, though — those
//! rewrites aren't an OpenAI-compatibility concern, they're how every
//! request (translated or not) gets attributed to this proxy's upstream
//! account and routed to a model the upstream actually serves.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use argo_core::ModelKind;

use crate::endpoints::{apply_headers, require_object};
use crate::error::HttpError;
use crate::state::SharedState;

pub async fn chat(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> Result<Response, HttpError> {
    let mut body = require_object(body)?;

    body.insert("user".to_string(), Value::String(state.config.user.clone()));

    let requested_model = body.get("model").and_then(Value::as_str).unwrap_or("").to_string();
    let upstream_model = state.registry.resolve(&requested_model, ModelKind::Chat);
    body.insert("model".to_string(), Value::String(upstream_model));

    let reply = state
        .transport
        .post_json(&state.config.argo_url, &Value::Object(body))
        .await?;
    let mut response = Json(reply.body).into_response();
    apply_headers(&mut response, &reply.headers);
    Ok(response)
}
