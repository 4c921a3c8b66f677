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

//! Upstream Transport: a pooled `reqwest::Client` shared across requests,
//! issuing non-streaming and streaming POSTs against the Argo upstream.
//!
//! The client is built once at startup and cloned cheaply into every
//! handler, so connections to the upstream get reused instead of
//! renegotiated per request. Forwarded headers are computed here and handed
//! back on every reply; callers are expected to copy them onto the outbound
//! response themselves.

use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::{Client, Response};
use serde_json::Value;

use argo_core::ProxyError;

/// Response headers, hop-by-hop ones excluded, ready to copy onto the
/// outbound client response.
pub type ForwardedHeaders = Vec<(String, String)>;

/// Headers that must never be forwarded verbatim: the proxy either sets its
/// own version of these, or the value would be wrong once re-framed (SSE vs.
/// the upstream's raw body, a different encoding, a different length).
const HOP_BY_HOP: &[&str] = &[
    "content-type",
    "content-encoding",
    "transfer-encoding",
    "content-length",
];

fn forwarded_headers(response: &Response) -> ForwardedHeaders {
    response
        .headers()
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(&name.as_str().to_ascii_lowercase().as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// A successful non-streaming upstream call.
pub struct JsonReply {
    pub status: u16,
    pub headers: ForwardedHeaders,
    pub body: Value,
}

/// A successful streaming upstream call: status/headers are known up front,
/// the body arrives as a byte stream.
pub struct StreamReply {
    pub status: u16,
    pub headers: ForwardedHeaders,
    pub bytes: Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send + Unpin>,
}

/// Thin wrapper around a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
}

impl Transport {
    pub fn new(client: Client) -> Self {
        Transport { client }
    }

    pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
        Client::builder().timeout(timeout).build()
    }

    /// Issues a non-streaming POST, returning the parsed JSON body on 2xx.
    ///
    /// Connect/read failures become `UpstreamUnavailable`; a non-2xx status
    /// becomes `UpstreamError` carrying the status and raw body text.
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<JsonReply, ProxyError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(ProxyError::from_transport)?;

        let status = response.status();
        let headers = forwarded_headers(&response);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProxyError::UpstreamError {
                status: status.as_u16(),
                body: text,
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(ProxyError::from_transport)?;

        Ok(JsonReply {
            status: status.as_u16(),
            headers,
            body,
        })
    }

    /// Issues a streaming POST. On non-2xx, the full error body is read
    /// eagerly and returned as `Err` so the orchestrator can surface it
    /// without ever starting an SSE frame.
    pub async fn post_stream(&self, url: &str, body: &Value) -> Result<StreamReply, ProxyError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(ProxyError::from_transport)?;

        let status = response.status();
        let headers = forwarded_headers(&response);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProxyError::UpstreamError {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(StreamReply {
            status: status.as_u16(),
            headers,
            bytes: Box::new(response.bytes_stream()),
        })
    }
}
