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

//! Domain primitives for the Argo translation proxy: configuration, the
//! model registry, the token accountant, and the shared error taxonomy.
//! Kept free of `axum`/HTTP-framework concerns so it can be exercised and
//! tested in isolation from the server crate.

pub mod config;
pub mod error;
pub mod registry;
pub mod tokens;

pub use config::{Config, ConfigError};
pub use error::ProxyError;
pub use registry::{ModelKind, ModelRegistry};
