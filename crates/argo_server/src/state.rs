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

//! Shared, request-scoped application state.
//!
//! A plain `Arc<AppState>` threaded through axum's `State` extractor. The
//! registry and config are frozen after startup, so there's no live-reload
//! case here that would justify a global lock.

use std::sync::Arc;

use argo_core::{Config, ModelRegistry};

use crate::transport::Transport;

/// Everything an endpoint handler needs, built once in [`crate::start`].
pub struct AppState {
    pub config: Config,
    pub registry: ModelRegistry,
    pub transport: Transport,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: Config, registry: ModelRegistry, transport: Transport) -> SharedState {
        Arc::new(AppState {
            config,
            registry,
            transport,
        })
    }
}
