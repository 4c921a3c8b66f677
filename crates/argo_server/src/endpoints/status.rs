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

//! GET `/v1/status` — a live probe against the upstream chat endpoint, so an
//! operator can tell "the proxy is up" apart from "the proxy is up but
//! upstream isn't answering". The probe goes through the same Shaper and
//! Translator as a real `/v1/chat/completions` call and hands back the
//! translated reply, so a working status check is also evidence that the
//! whole pipeline, not just connectivity, is intact.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::accounting::prompt_tokens;
use crate::endpoints::{apply_headers, require_object};
use crate::error::HttpError;
use crate::shaper::{shape, EndpointKind};
use crate::state::SharedState;
use crate::translator;

pub async fn status(State(state): State<SharedState>) -> Result<Response, HttpError> {
    let probe = require_object(json!({
        "model": "argo:gpt-4o",
        "messages": [{"role": "user", "content": "Say hello"}],
    }))?;

    let shaped = shape(&probe, EndpointKind::Chat, &state.config, &state.registry)?;
    let model = shaped["model"].as_str().unwrap_or_default().to_string();
    let prompt_tok = prompt_tokens(&shaped, &model);
    let shaped_value = Value::Object(shaped);

    let reply = state.transport.post_json(&state.config.argo_url, &shaped_value).await?;

    let completion = translator::chat_non_stream(&reply.body, &model, prompt_tok, state.config.translate_tools)?;
    let mut response = Json(completion).into_response();
    apply_headers(&mut response, &reply.headers);
    Ok(response)
}
