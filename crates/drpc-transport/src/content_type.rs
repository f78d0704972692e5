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

//! Content-type dispatch (spec §6, §9 "Dynamic content-type dispatch"):
//! a tagged `MessageFormat` derived once per call from the content-type
//! string, rather than runtime type introspection.

/// The finite content-type set a unary call may use (spec §6).
pub const UNARY_CONTENT_TYPES: &[&str] = &[
    "application/proto",
    "application/json",
    "application/grpc-web+proto",
    "application/grpc+proto",
];

/// The finite content-type set a streaming call may use (spec §6).
pub const STREAMING_CONTENT_TYPES: &[&str] = &[
    "application/connect+json",
    "application/grpc-web+proto",
    "application/grpc-web+json",
    "application/grpc+proto",
    "application/grpc+json",
];

/// Message serialization, derived once per call from the content-type string
/// and cached per `(method, format)` by callers that compile method
/// descriptors (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Proto,
    Json,
}

impl MessageFormat {
    /// `*+proto` / `*/proto` / exactly `application/proto` is binary; `*+json`
    /// / `application/json` is JSON. Any other content-type is rejected.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.ends_with("+proto") || content_type == "application/proto" {
            Some(Self::Proto)
        } else if content_type.ends_with("+json") || content_type == "application/json" {
            Some(Self::Json)
        } else {
            None
        }
    }
}

pub fn is_valid_unary_content_type(content_type: &str) -> bool {
    UNARY_CONTENT_TYPES.contains(&content_type)
}

pub fn is_valid_streaming_content_type(content_type: &str) -> bool {
    STREAMING_CONTENT_TYPES.contains(&content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proto_suffix_and_exact_match_detected() {
        assert_eq!(MessageFormat::from_content_type("application/proto"), Some(MessageFormat::Proto));
        assert_eq!(MessageFormat::from_content_type("application/grpc+proto"), Some(MessageFormat::Proto));
    }

    #[test]
    fn json_suffix_and_exact_match_detected() {
        assert_eq!(MessageFormat::from_content_type("application/json"), Some(MessageFormat::Json));
        assert_eq!(MessageFormat::from_content_type("application/connect+json"), Some(MessageFormat::Json));
    }

    #[test]
    fn unrecognized_content_type_has_no_format() {
        assert_eq!(MessageFormat::from_content_type("text/plain"), None);
    }

    #[test]
    fn finite_sets_match_spec() {
        assert!(is_valid_unary_content_type("application/proto"));
        assert!(!is_valid_unary_content_type("application/connect+json"));
        assert!(is_valid_streaming_content_type("application/connect+json"));
        assert!(!is_valid_streaming_content_type("application/proto"));
    }
}
