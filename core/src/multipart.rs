//! Minimal `multipart/form-data` writer.
//!
//! Writes parts straight into any `io::Write` (the upload path uses a pooled
//! buffer), so the body is never assembled twice. Only file parts are
//! supported since the upload endpoint takes a single file field.

use std::io::{self, Write};

use uuid::Uuid;

/// Streams a multipart body into `W`.
#[derive(Debug)]
pub struct MultipartWriter<W> {
    inner: W,
    boundary: String,
    parts: usize,
}

impl<W: Write> MultipartWriter<W> {
    /// Writer with a random boundary.
    pub fn new(inner: W) -> Self {
        Self::with_boundary(inner, Uuid::new_v4().simple().to_string())
    }

    pub fn with_boundary(inner: W, boundary: impl Into<String>) -> Self {
        Self {
            inner,
            boundary: boundary.into(),
            parts: 0,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Start a file part and return the sink for its content. The content
    /// ends where the next part (or `finish`) begins.
    pub fn create_form_file(&mut self, field: &str, filename: &str) -> io::Result<&mut W> {
        if self.parts > 0 {
            self.inner.write_all(b"\r\n")?;
        }
        write!(
            self.inner,
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            self.boundary,
            escape_quoted(field),
            escape_quoted(filename),
        )?;
        self.parts += 1;
        Ok(&mut self.inner)
    }

    /// Write the closing delimiter and hand back the sink.
    pub fn finish(mut self) -> io::Result<W> {
        if self.parts > 0 {
            self.inner.write_all(b"\r\n")?;
        }
        write!(self.inner, "--{}--\r\n", self.boundary)?;
        Ok(self.inner)
    }
}

/// Escape a value for a quoted header parameter. Line breaks are
/// percent-encoded so a filename cannot start a new header.
fn escape_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            c => out.push(c),
        }
    }
    out
}
