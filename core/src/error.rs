//! Error types for the sm.ms client.
//!
//! # Design
//! Four failure kinds reach the caller. `Transport` covers everything below
//! HTTP semantics (connect, TLS, timeouts, body reads, reading the caller's
//! upload source). `MalformedResponse` means the body was not a JSON envelope
//! at all, while `SchemaMismatch` means the envelope parsed but its `data`
//! did not fit the shape the operation expects. `Remote` is the service
//! saying no, either through the status code or `success: false`; it keeps
//! the decoded envelope so callers can still look at it.

use std::error::Error as StdError;

use crate::envelope::Envelope;
use crate::http::HttpMethod;

/// A failure below the HTTP layer, with a short note on what was being done.
#[derive(Debug, thiserror::Error)]
#[error("{context}: {source}")]
pub struct TransportError {
    context: String,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl TransportError {
    pub fn new(
        context: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

/// The service rejected the call.
#[derive(Debug, thiserror::Error)]
#[error(
    "remote error: status {status} method {method} url {url} request id {request_id:?} code {code:?}: {message}"
)]
pub struct RemoteError {
    pub status: u16,
    pub method: HttpMethod,
    pub url: String,
    pub request_id: String,
    pub code: String,
    pub message: String,
    /// The envelope as decoded, including whatever `data` came with it.
    pub envelope: Envelope,
}

/// Errors returned by every `SmmsClient` operation.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network or I/O failure. Never retried.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response body is not a JSON envelope.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String, body: String },

    /// The envelope parsed, but `field` did not have the expected shape.
    #[error("unexpected shape for `{field}`: {reason} (payload: {payload})")]
    SchemaMismatch {
        field: String,
        reason: String,
        payload: String,
    },

    /// HTTP status above 399 or `success: false`.
    #[error(transparent)]
    Remote(Box<RemoteError>),
}

impl ApiError {
    /// The decoded envelope, when the failure happened after decoding one.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            ApiError::Remote(remote) => Some(&remote.envelope),
            _ => None,
        }
    }

    /// The service error code, when the service reported one.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            ApiError::Remote(remote) => Some(remote.code.as_str()),
            _ => None,
        }
    }
}

impl From<RemoteError> for ApiError {
    fn from(err: RemoteError) -> Self {
        ApiError::Remote(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_keeps_context_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = TransportError::new("POST https://sm.ms/api/v2/token", io);
        assert_eq!(err.context(), "POST https://sm.ms/api/v2/token");
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "POST https://sm.ms/api/v2/token: refused");
    }

    #[test]
    fn remote_error_display_names_every_diagnostic() {
        let err = ApiError::from(RemoteError {
            status: 401,
            method: HttpMethod::Get,
            url: "https://sm.ms/api/v2/clear".to_string(),
            request_id: "REQ1".to_string(),
            code: "unauthorized".to_string(),
            message: "Authorization failed.".to_string(),
            envelope: Envelope::default(),
        });
        let text = err.to_string();
        assert!(text.contains("401"));
        assert!(text.contains("GET"));
        assert!(text.contains("https://sm.ms/api/v2/clear"));
        assert!(text.contains("REQ1"));
        assert!(text.contains("unauthorized"));
        assert!(text.contains("Authorization failed."));
        assert_eq!(err.remote_code(), Some("unauthorized"));
        assert!(err.envelope().is_some());
    }

    #[test]
    fn non_remote_errors_carry_no_envelope() {
        let err = ApiError::MalformedResponse {
            reason: "expected value".to_string(),
            body: "<html>".to_string(),
        };
        assert!(err.envelope().is_none());
        assert!(err.remote_code().is_none());
    }
}
