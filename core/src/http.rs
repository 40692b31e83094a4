//! HTTP request/response data and the transport seam.
//!
//! # Design
//! Requests and responses are plain data, as before, but the round-trip now
//! happens inside the library through a `Transport`. The client never owns a
//! global HTTP agent: a transport is constructed explicitly and handed to the
//! client, so callers can swap in their own timeouts, proxies or test doubles.
//!
//! A request body is either owned bytes or a borrowed reader. Upload bodies
//! are staged in a pooled buffer and streamed from a reader view over it, so
//! `HttpRequest` carries a lifetime instead of owning everything.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use ureq::SendBody;

use crate::error::TransportError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body attached to an outgoing request.
pub enum RequestBody<'a> {
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + 'a>),
}

impl RequestBody<'_> {
    /// Drain the body into memory. Used by transports that need the whole
    /// payload up front, and by test doubles.
    pub fn into_bytes(self) -> std::io::Result<Vec<u8>> {
        match self {
            RequestBody::Bytes(bytes) => Ok(bytes),
            RequestBody::Reader(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }
}

impl fmt::Debug for RequestBody<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            RequestBody::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// An HTTP request described as plain data.
///
/// `headers` is the complete header set for the call; transports add only
/// what the protocol itself requires (Host, framing).
pub struct HttpRequest<'a> {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody<'a>>,
}

impl HttpRequest<'_> {
    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Token values must not end up in logs.
impl fmt::Debug for HttpRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                if k.eq_ignore_ascii_case("authorization") {
                    (k.as_str(), "<redacted>")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &self.body)
            .finish()
    }
}

/// An HTTP response with its body fully read into memory.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Executes one HTTP round-trip.
///
/// Implementations must return 4xx/5xx responses as data rather than errors;
/// only failures to complete the exchange are `TransportError`s. A transport
/// is shared by every clone of a client, possibly across threads.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Agent with ureq's default timeouts.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Agent whose whole call (connect, send, receive) is bounded by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    /// Wrap an agent configured by the caller. The agent must not treat
    /// HTTP status codes as errors, or remote failures lose their envelope.
    pub fn from_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    fn build(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let result = match method {
            HttpMethod::Get => {
                if body.is_some() {
                    return Err(TransportError::new(
                        format!("{method} {url}"),
                        "GET requests cannot carry a body",
                    ));
                }
                let mut builder = self.agent.get(&url);
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(&url);
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match body {
                    None => builder.send_empty(),
                    Some(RequestBody::Bytes(bytes)) => builder.send(&bytes[..]),
                    Some(RequestBody::Reader(mut reader)) => {
                        builder.send(SendBody::from_reader(&mut reader))
                    }
                }
            }
        };
        let mut response = result.map_err(|e| TransportError::new(format!("{method} {url}"), e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_vec().map_err(|e| {
            TransportError::new(format!("reading response body of {method} {url}"), e)
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_authorization() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "https://sm.ms/api/v2/history".to_string(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), "secret-token".to_string()),
            ],
            body: None,
        };
        let text = format!("{req:?}");
        assert!(!text.contains("secret-token"));
        assert!(text.contains("<redacted>"));
        assert!(text.contains("application/json"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Post,
            url: "https://sm.ms/api/v2/profile".to_string(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: None,
        };
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.header("accept"), None);
    }

    #[test]
    fn reader_body_drains_into_bytes() {
        let data = b"form=data".to_vec();
        let body = RequestBody::Reader(Box::new(&data[..]));
        assert_eq!(body.into_bytes().unwrap(), b"form=data");
    }

    #[test]
    fn method_display_matches_wire_form() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Post.to_string(), "POST");
    }
}
