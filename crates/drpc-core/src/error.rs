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

//! Error kinds shared across the workspace (spec §7).
//!
//! Every public operation in every crate returns `drpc_core::Result<T>`, so
//! call sites never need to reach for `anyhow`/`Box<dyn Error>` conversions
//! at crate boundaries. The taxonomy below matches the Connect/gRPC status
//! space exactly, because dRPC must preserve a server's Connect error code
//! verbatim when one comes back on the wire.

use std::fmt;

pub type Result<T> = std::result::Result<T, DrpcError>;

/// The Connect/gRPC status code space, used both for dRPC's own internal
/// error kinds (first seven variants, §7) and for round-tripping a
/// server-supplied `code` field from a Connect error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectCode {
    Canceled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl ConnectCode {
    /// Parse the lower-case wire name used in a Connect error JSON body's
    /// `code` field (e.g. `"deadline_exceeded"`). Unknown names map to
    /// `Unknown` rather than failing the decode.
    pub fn from_wire_name(name: &str) -> Self {
        match name {
            "canceled" => Self::Canceled,
            "invalid_argument" => Self::InvalidArgument,
            "deadline_exceeded" => Self::DeadlineExceeded,
            "not_found" => Self::NotFound,
            "already_exists" => Self::AlreadyExists,
            "permission_denied" => Self::PermissionDenied,
            "resource_exhausted" => Self::ResourceExhausted,
            "failed_precondition" => Self::FailedPrecondition,
            "aborted" => Self::Aborted,
            "out_of_range" => Self::OutOfRange,
            "unimplemented" => Self::Unimplemented,
            "internal" => Self::Internal,
            "unavailable" => Self::Unavailable,
            "data_loss" => Self::DataLoss,
            "unauthenticated" => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    pub fn as_wire_name(&self) -> &'static str {
        match self {
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid_argument",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::ResourceExhausted => "resource_exhausted",
            Self::FailedPrecondition => "failed_precondition",
            Self::Aborted => "aborted",
            Self::OutOfRange => "out_of_range",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::DataLoss => "data_loss",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for ConnectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DrpcError {
    /// The caller's cancellation signal fired before or during the
    /// operation.
    #[error("cancelled")]
    Cancelled,

    /// A per-attempt or overall deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Unparseable peer input, malformed multi-address, bad content-type, or
    /// any other caller-supplied value that cannot be a valid request.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Dial failure, peer unreachable, or no dial candidates.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Envelope parse error or payload decode failure.
    #[error("data loss: {0}")]
    DataLoss(String),

    /// Bridge panic, broken in-memory pipe, or pool invariant violation.
    #[error("internal error: {0}")]
    Internal(String),

    /// A structured error returned by the remote handler, preserving its
    /// Connect status code.
    #[error("{code}: {message}")]
    Status { code: ConnectCode, message: String },
}

impl DrpcError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn data_loss(message: impl Into<String>) -> Self {
        Self::DataLoss(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(code: ConnectCode, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// The Connect code this error would present to a client, for logging
    /// and for building error response bodies.
    pub fn connect_code(&self) -> ConnectCode {
        match self {
            Self::Cancelled => ConnectCode::Canceled,
            Self::DeadlineExceeded => ConnectCode::DeadlineExceeded,
            Self::InvalidArgument(_) => ConnectCode::InvalidArgument,
            Self::Unavailable(_) => ConnectCode::Unavailable,
            Self::DataLoss(_) => ConnectCode::DataLoss,
            Self::Internal(_) => ConnectCode::Internal,
            Self::Status { code, .. } => *code,
        }
    }
}

impl From<std::io::Error> for DrpcError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            TimedOut => Self::DeadlineExceeded,
            ConnectionRefused | ConnectionReset | ConnectionAborted | NotConnected | BrokenPipe => {
                Self::Unavailable(err.to_string())
            }
            _ => Self::Internal(err.to_string()),
        }
    }
}
