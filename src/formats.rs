use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::{ExportError, Result};

/// CSV header, in the column order new files are written with.
pub const COLUMNS: [&str; 6] = [
    "journal_id",
    "entry_id",
    "content",
    "title",
    "created_at",
    "fetched_at",
];

/// An entry discovered on a listing page, not fetched yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReference {
    source_url: String,
    collection_id: String,
    entry_id: String,
    listed_created_at: String,
}

impl EntryReference {
    pub fn new(source_url: &str, listed_created_at: impl Into<String>) -> Result<Self> {
        let (collection_id, entry_id) = parse_entry_url(source_url)?;
        Ok(Self {
            source_url: source_url.to_owned(),
            collection_id,
            entry_id,
            listed_created_at: listed_created_at.into(),
        })
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn listed_created_at(&self) -> &str {
        &self.listed_created_at
    }
}

/// One exported entry, as persisted in the resume store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    #[serde(rename = "journal_id")]
    pub collection_id: String,
    pub entry_id: String,
    pub content: String,
    pub title: String,
    #[serde(rename = "created_at")]
    pub listed_created_at: String,
    #[serde(deserialize_with = "deserialize_fetched_at")]
    pub fetched_at: DateTime<Utc>,
}

impl EntryRecord {
    pub fn from_reference(
        reference: &EntryReference,
        title: String,
        content: String,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            collection_id: reference.collection_id.clone(),
            entry_id: reference.entry_id.clone(),
            content,
            title,
            listed_created_at: reference.listed_created_at.clone(),
            fetched_at,
        }
    }
}

/// Extracts `(journal_id, entry_id)` from `https://<host>/journals/<journal_id>/<entry_id>`.
///
/// Trailing path segments, a query or a fragment after the two ids are tolerated.
pub fn parse_entry_url(raw: &str) -> Result<(String, String)> {
    let malformed = || ExportError::MalformedReference {
        url: raw.to_owned(),
    };

    let url = Url::parse(raw).map_err(|_| malformed())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(malformed());
    }

    let mut segments = url.path_segments().ok_or_else(malformed)?;
    if segments.next() != Some("journals") {
        return Err(malformed());
    }
    let journal_id = segments.next().filter(|s| is_digits(s)).ok_or_else(malformed)?;
    let entry_id = segments.next().filter(|s| is_digits(s)).ok_or_else(malformed)?;

    Ok((journal_id.to_owned(), entry_id.to_owned()))
}

fn is_digits(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

// Older exports stored `fetched_at` as float Unix seconds.
fn deserialize_fetched_at<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let secs: f64 = raw
        .parse()
        .map_err(|_| serde::de::Error::custom(format!("invalid fetched_at: {raw:?}")))?;
    if !secs.is_finite() {
        return Err(serde::de::Error::custom(format!("invalid fetched_at: {raw:?}")));
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
        .ok_or_else(|| serde::de::Error::custom(format!("fetched_at out of range: {raw:?}")))
}
