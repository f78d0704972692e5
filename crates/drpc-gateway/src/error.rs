// Copyright 2026 The dRPC Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! Maps a pre-stream `DrpcError` to an HTTP status and a Connect-shaped JSON
//! body. Only used before the response body starts streaming — once bytes
//! are flowing back to the caller, a mid-stream failure can only truncate
//! the body, since the 200 status line has already gone out.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drpc_core::DrpcError;
use serde::Serialize;

#[derive(Serialize)]
struct ConnectErrorBody {
    code: &'static str,
    message: String,
}

fn status_for(err: &DrpcError) -> StatusCode {
    match err {
        DrpcError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        DrpcError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DrpcError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(err: DrpcError) -> Response {
    let status = status_for(&err);
    let body = ConnectErrorBody {
        code: err.connect_code().as_wire_name(),
        message: err.to_string(),
    };
    (status, Json(body)).into_response()
}
