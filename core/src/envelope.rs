//! The JSON envelope wrapped around every sm.ms response.
//!
//! Decoding happens in two steps. The envelope is parsed first with `data`
//! kept as an untyped `serde_json::Value`; each operation then decodes `data`
//! into its own type. A body that is not JSON is a `MalformedResponse`; a
//! `data` of the wrong shape is a `SchemaMismatch`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;

/// Longest body excerpt kept in a `MalformedResponse`.
const BODY_EXCERPT_LIMIT: usize = 512;

/// `{success, code, message, data, RequestId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "string_or_number")]
    pub code: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, rename = "RequestId", deserialize_with = "string_or_number")]
    pub request_id: String,
}

impl Envelope {
    pub fn from_slice(body: &[u8]) -> Result<Self, ApiError> {
        serde_json::from_slice(body).map_err(|e| ApiError::MalformedResponse {
            reason: e.to_string(),
            body: excerpt(body),
        })
    }

    /// Decode `data` into `T`. `field` is the root of the path reported in
    /// the resulting error, e.g. `data[0].width`.
    pub fn decode_data<T: DeserializeOwned>(&self, field: &str) -> Result<T, ApiError> {
        serde_path_to_error::deserialize(&self.data).map_err(|e| ApiError::SchemaMismatch {
            field: field_path(field, e.path()),
            reason: e.inner().to_string(),
            payload: self.data.to_string(),
        })
    }

    /// Like `decode_data`, but an absent or `null` `data` is an empty list.
    pub fn decode_list<T: DeserializeOwned>(&self, field: &str) -> Result<Vec<T>, ApiError> {
        if self.data.is_null() {
            return Ok(Vec::new());
        }
        self.decode_data(field)
    }
}

fn field_path(root: &str, path: &serde_path_to_error::Path) -> String {
    let path = path.to_string();
    match path.as_str() {
        "." => root.to_string(),
        p if p.starts_with('[') => format!("{root}{p}"),
        p => format!("{root}.{p}"),
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= BODY_EXCERPT_LIMIT {
        return text.into_owned();
    }
    let mut end = BODY_EXCERPT_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// The service is loose about scalar types in the diagnostic fields.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}
