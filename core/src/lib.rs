//! Blocking client for the sm.ms image-hosting API (v2).
//!
//! # Overview
//! Authenticates with a username/password or an existing token, uploads
//! images, lists upload history, reads the account profile, and deletes or
//! clears stored images. Every call is one synchronous HTTP exchange.
//!
//! # Design
//! - `SmmsClient` holds an immutable token plus an injected `Transport`;
//!   `UreqTransport` is the default and callers may supply their own.
//! - Responses are decoded in two steps: the generic `Envelope` first, then
//!   its `data` into the operation's type (`ImageRecord`, `Profile`, ...).
//! - Upload bodies are staged in a `BufferPool` and streamed from a reader
//!   view over the pooled buffer; the buffer goes back on every exit path.
//! - No retries, no caching. Errors surface as `ApiError` on the failing call.

pub mod client;
pub mod envelope;
pub mod error;
pub mod http;
pub mod multipart;
pub mod pool;
pub mod types;

pub use client::{execute, ClientConfig, SmmsClient};
pub use envelope::Envelope;
pub use error::{ApiError, RemoteError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBody, Transport, UreqTransport};
pub use pool::{Buffer, BufferPool, BufferReader, PooledBuffer};
pub use types::{ImageRecord, Profile, TokenData};
