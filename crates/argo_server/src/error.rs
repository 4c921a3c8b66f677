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

//! HTTP-layer error mapping: turns a [`ProxyError`] into a status code and a
//! uniform `{"error": "..."}` body. Kept in `argo_server` rather than
//! `argo_core` since it is the only piece of the error taxonomy that knows
//! about `axum`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use argo_core::ProxyError;

use crate::openai_types::ErrorBody;

pub struct HttpError(pub ProxyError);

impl From<ProxyError> for HttpError {
    fn from(err: ProxyError) -> Self {
        HttpError(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ProxyError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ProxyError::UpstreamUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            ProxyError::UpstreamError { status, body } => {
                let code = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
                (code, format!("Upstream API error: {status} {body}"))
            }
            ProxyError::Unexpected(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        (status, Json(ErrorBody::new(message))).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let resp = HttpError(ProxyError::BadRequest("oops".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_unavailable_maps_to_503() {
        let resp = HttpError(ProxyError::UpstreamUnavailable("down".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn upstream_error_passes_through_status() {
        let resp = HttpError(ProxyError::UpstreamError {
            status: 429,
            body: "slow down".to_string(),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn unexpected_maps_to_500() {
        let resp = HttpError(ProxyError::Unexpected("boom".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
