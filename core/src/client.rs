//! Blocking client for the sm.ms v2 API.
//!
//! # Design
//! `SmmsClient` holds the auth token, a shared `Transport`, the pool used to
//! stage upload bodies, and the base URL. It is immutable after construction
//! apart from `set_transport`, so one client can be cloned or shared across
//! threads freely. Every operation builds one `HttpRequest`, runs it through
//! `execute`, and decodes the envelope's `data` into that operation's type.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::error::{ApiError, RemoteError, TransportError};
use crate::http::{HttpMethod, HttpRequest, RequestBody, Transport, UreqTransport};
use crate::multipart::MultipartWriter;
use crate::pool::BufferPool;
use crate::types::{ImageRecord, Profile, TokenData};

const DEFAULT_BASE_URL: &str = "https://sm.ms";
const API_PREFIX: &str = "/api/v2";

/// Form field the upload endpoint reads the file from.
const UPLOAD_FIELD: &str = "smfile";

/// RFC 3986 unreserved characters pass through; everything else is encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Where the API lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Authenticated handle on the API.
#[derive(Clone)]
pub struct SmmsClient {
    token: String,
    transport: Arc<dyn Transport>,
    pool: Arc<BufferPool>,
    config: ClientConfig,
}

impl fmt::Debug for SmmsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmmsClient")
            .field("token", &"<redacted>")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SmmsClient {
    /// Exchange credentials for a token against the public service.
    pub fn login(username: &str, password: &str) -> Result<Self, ApiError> {
        Self::login_with(
            ClientConfig::default(),
            Arc::new(UreqTransport::new()),
            username,
            password,
        )
    }

    pub fn login_with(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        username: &str,
        password: &str,
    ) -> Result<Self, ApiError> {
        let token = Self::acquire_token(transport.as_ref(), &config, username, password)?;
        Ok(Self::with_transport(config, transport, token))
    }

    /// Client for a token obtained earlier. Makes no network call.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::with_transport(
            ClientConfig::default(),
            Arc::new(UreqTransport::new()),
            token,
        )
    }

    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            transport,
            pool: Arc::new(BufferPool::new()),
            config,
        }
    }

    /// Route subsequent calls through `transport`.
    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = transport;
    }

    /// The token this client authenticates with, for the caller to persist.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Pool that stages upload bodies, shared by clones of this client.
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    /// POST `/token` with a form-encoded username and password.
    pub fn acquire_token(
        transport: &dyn Transport,
        config: &ClientConfig,
        username: &str,
        password: &str,
    ) -> Result<String, ApiError> {
        let form = encode_form(&[("password", password), ("username", username)]);
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: config.endpoint("/token"),
            headers: vec![
                (
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body: Some(RequestBody::Bytes(form.into_bytes())),
        };
        let envelope = execute(transport, request)?;
        let data: TokenData = envelope.decode_data("data")?;
        if data.token.is_empty() {
            return Err(ApiError::SchemaMismatch {
                field: "data.token".to_string(),
                reason: "token is empty".to_string(),
                payload: envelope.data.to_string(),
            });
        }
        Ok(data.token)
    }

    /// Upload one image read to the end from `image`.
    pub fn upload(&self, filename: &str, mut image: impl Read) -> Result<ImageRecord, ApiError> {
        // Dropping the guard returns the buffer on every path out of here.
        let mut buf = self.pool.acquire();

        let mut form = MultipartWriter::new(&mut *buf);
        let content_type = form.content_type();
        let part = form
            .create_form_file(UPLOAD_FIELD, filename)
            .map_err(|e| TransportError::new("creating multipart form file", e))?;
        let written = io::copy(&mut image, part).map_err(|e| {
            TransportError::new(format!("copying {filename} into the upload body"), e)
        })?;
        form.finish()
            .map_err(|e| TransportError::new("closing multipart body", e))?;
        debug!(filename, written, body_len = buf.len(), "staged upload body");

        let mut headers = vec![("Content-Type".to_string(), content_type)];
        headers.extend(self.auth_headers());
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: self.config.endpoint("/upload"),
            headers,
            body: Some(RequestBody::Reader(Box::new(buf.reader()))),
        };
        let envelope = execute(self.transport.as_ref(), request)?;
        envelope.decode_data("data")
    }

    /// Images uploaded from this client's IP.
    pub fn history(&self) -> Result<Vec<ImageRecord>, ApiError> {
        let envelope = self.call(HttpMethod::Get, "/history")?;
        envelope.decode_list("data")
    }

    /// Images uploaded by this account.
    pub fn upload_history(&self) -> Result<Vec<ImageRecord>, ApiError> {
        let envelope = self.call(HttpMethod::Get, "/upload_history")?;
        envelope.decode_list("data")
    }

    pub fn profile(&self) -> Result<Profile, ApiError> {
        let envelope = self.call(HttpMethod::Post, "/profile")?;
        envelope.decode_data("data")
    }

    /// Delete the image with this hash.
    pub fn delete(&self, hash: &str) -> Result<(), ApiError> {
        let path = format!("/delete/{}", utf8_percent_encode(hash, UNRESERVED));
        let envelope = self.call(HttpMethod::Get, &path)?;
        debug!(hash, request_id = %envelope.request_id, message = %envelope.message, "image deleted");
        Ok(())
    }

    /// Empty the upload history.
    pub fn clear(&self) -> Result<(), ApiError> {
        let envelope = self.call(HttpMethod::Get, "/clear")?;
        debug!(request_id = %envelope.request_id, message = %envelope.message, "history cleared");
        Ok(())
    }

    /// Authenticated request without a body.
    fn call(&self, method: HttpMethod, path: &str) -> Result<Envelope, ApiError> {
        let request = HttpRequest {
            method,
            url: self.config.endpoint(path),
            headers: self.auth_headers(),
            body: None,
        };
        execute(self.transport.as_ref(), request)
    }

    fn auth_headers(&self) -> Vec<(String, String)> {
        vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("Authorization".to_string(), self.token.clone()),
        ]
    }
}

/// Send `request`, read the envelope, and turn service-side failures into
/// `ApiError::Remote`.
pub fn execute(transport: &dyn Transport, request: HttpRequest<'_>) -> Result<Envelope, ApiError> {
    let method = request.method;
    let url = request.url.clone();
    debug!(%method, %url, "sending request");

    let response = transport.send(request)?;
    let envelope = Envelope::from_slice(&response.body)?;

    if !envelope.success || response.status > 399 {
        warn!(
            %method,
            %url,
            status = response.status,
            request_id = %envelope.request_id,
            code = %envelope.code,
            message = %envelope.message,
            "remote call failed"
        );
        return Err(RemoteError {
            status: response.status,
            method,
            url,
            request_id: envelope.request_id.clone(),
            code: envelope.code.clone(),
            message: envelope.message.clone(),
            envelope,
        }
        .into());
    }

    debug!(%method, %url, status = response.status, request_id = %envelope.request_id, "request succeeded");
    Ok(envelope)
}

/// `application/x-www-form-urlencoded`, in the order given.
fn encode_form(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, UNRESERVED),
                utf8_percent_encode(v, UNRESERVED)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
