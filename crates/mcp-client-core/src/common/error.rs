//! Error types for the chat relay.
//!
//! This module defines the central `Error` enum, which captures every
//! per-request failure the relay can report. It implements `From<Error>` for
//! `tonic::Status` so handlers can propagate errors with `?` and clients
//! receive a stable status code.
//!
//! ## Error Cases
//! - `InvalidRequest`: The request failed schema validation.
//! - `RequestCancelled`: The call context was cancelled (client gone or the
//!   service is shutting down).
//! - `NotConfigured`: The model session is missing or could not be built.
//! - `EmptyResult`: The model returned no candidates or no content parts.
//! - `Backend`: The model call itself failed.
//! - `ChannelError`: A response fragment could not be delivered to the client.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the chat relay.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The client request violated its schema constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The call was cancelled before or while the model was invoked.
    #[error("Request cancelled")]
    RequestCancelled,

    /// The server is missing a usable model session.
    #[error("Server configuration error: {reason}")]
    NotConfigured { reason: String },

    /// The model answered but produced nothing to relay.
    #[error("Empty model result: {reason}")]
    EmptyResult { reason: String },

    /// The model call failed (transport, HTTP status or decoding).
    #[error("Model backend error: {reason}")]
    Backend { reason: String },

    /// Sending a fragment to the client failed.
    #[error("Channel error: {context}")]
    ChannelError { context: String },
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::NotConfigured { reason } => {
                Status::internal(format!("server configuration error: {reason}"))
            }
            Error::EmptyResult { reason } => Status::unknown(reason),
            Error::Backend { reason } => Status::unknown(format!("model backend error: {reason}")),
            Error::ChannelError { context } => Status::unknown(format!("Channel error: {context}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn maps_each_variant_to_its_status_code() {
        let cases = [
            (
                Error::InvalidRequest {
                    reason: "content must not be empty".to_string(),
                },
                Code::InvalidArgument,
            ),
            (Error::RequestCancelled, Code::Cancelled),
            (
                Error::NotConfigured {
                    reason: "chat session not initialized".to_string(),
                },
                Code::Internal,
            ),
            (
                Error::EmptyResult {
                    reason: "no candidates".to_string(),
                },
                Code::Unknown,
            ),
            (
                Error::Backend {
                    reason: "HTTP 503".to_string(),
                },
                Code::Unknown,
            ),
            (
                Error::ChannelError {
                    context: "receiver dropped".to_string(),
                },
                Code::Unknown,
            ),
        ];

        for (err, code) in cases {
            assert_eq!(Status::from(err).code(), code);
        }
    }

    #[test]
    fn invalid_request_keeps_reason_as_message() {
        let status = Status::from(Error::InvalidRequest {
            reason: "content must not be empty".to_string(),
        });
        assert_eq!(status.message(), "content must not be empty");
    }
}
