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

//! GET `/v1/models` — the static model catalogue, built from the registry's
//! stable `list_chat`/`list_embed` sequences.

use axum::extract::State;
use axum::Json;

use crate::openai_types::{ModelList, ModelObject};
use crate::state::SharedState;
use crate::translator::now_unix;

#[utoipa::path(
    get,
    path = "/v1/models",
    responses((status = 200, description = "OK", body = ModelList)),
)]
pub async fn models(State(state): State<SharedState>) -> Json<ModelList> {
    let created = now_unix();
    let data = state
        .registry
        .list_chat()
        .iter()
        .chain(state.registry.list_embed().iter())
        .map(|(alias, _upstream)| ModelObject {
            id: alias.clone(),
            object: "model".to_string(),
            created,
            owned_by: "argoproxy".to_string(),
        })
        .collect();

    Json(ModelList {
        object: "list".to_string(),
        data,
    })
}
