//! Payload types decoded from the envelope's `data` field.
//!
//! # Design
//! Every field defaults when missing and unknown fields are ignored, because
//! the service adds and drops keys between deployments. Serialized names are
//! the wire names, so a record written back out matches what the service sent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// `data` of a successful token exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    #[serde(default)]
    pub token: String,
}

/// One stored image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(default)]
    pub file_id: u64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub filename: String,
    #[serde(default, rename = "storename")]
    pub store_name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub url: String,
    /// Link that deletes the image without a token.
    #[serde(default, rename = "delete")]
    pub delete_url: String,
    #[serde(default, rename = "page")]
    pub page_url: String,
}

/// Account snapshot returned by the profile endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: String,
    /// End of the current membership group; `None` when the account has none.
    #[serde(default, with = "group_expire")]
    pub group_expire: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disk_usage: String,
    #[serde(default)]
    pub disk_limit: String,
}

/// Parse a `group_expire` value as the service renders it.
///
/// `"0000-00-00"` (optionally followed by a zero time) means no expiry.
pub fn parse_group_expire(raw: &str) -> Result<Option<DateTime<Utc>>, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("0000-00-00") {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(Some(ndt.and_utc()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Some(ndt.and_utc()));
        }
    }
    Err(format!("unrecognized group_expire timestamp `{raw}`"))
}

mod group_expire {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(raw) => super::parse_group_expire(&raw).map_err(de::Error::custom),
        }
    }
}
