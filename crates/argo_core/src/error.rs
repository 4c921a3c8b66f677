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

//! Error taxonomy shared by the translation engine and the HTTP layer.

use thiserror::Error;

/// The four error kinds the translation engine can produce, each with a fixed
/// HTTP mapping applied by the server crate (never here — this crate does not
/// depend on `axum`).
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing/invalid JSON body, a malformed `system` field, or any other
    /// client-caused contract violation.
    #[error("{0}")]
    BadRequest(String),

    /// The upstream could not be reached at all: connect failure, DNS
    /// failure, reset, or timeout.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream replied with a non-2xx status. `status` is preserved so
    /// the orchestrator can pass it straight through to the client.
    #[error("Upstream API error: {status} {body}")]
    UpstreamError { status: u16, body: String },

    /// Anything else.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ProxyError {
    /// Wraps a [`reqwest::Error`], classifying connect/timeout/request
    /// failures as unavailable and everything else as unexpected.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            ProxyError::UpstreamUnavailable(err.to_string())
        } else {
            ProxyError::Unexpected(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::BadRequest(err.to_string())
    }
}
