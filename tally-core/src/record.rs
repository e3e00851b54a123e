//! Canonical expense record shared by every pipeline stage.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum title length, in characters.
pub const TITLE_MAX_CHARS: usize = 75;
/// Maximum description length, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 150;
/// Receipt-derived descriptions keep this much until they are stored.
pub const RECEIPT_DESCRIPTION_MAX_CHARS: usize = 200;
/// Largest amount a single record may carry (one billion).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    Relational,
    External,
}

/// Record identifier, tagged with its origin once at ingestion.
///
/// The tag decides which deletion/update path a record uses, so it is never
/// re-derived from the shape of the string afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "origin", content = "id", rename_all = "lowercase")]
pub enum RecordId {
    Relational(Uuid),
    External(String),
}

impl RecordId {
    pub fn origin(&self) -> SourceOrigin {
        match self {
            RecordId::Relational(_) => SourceOrigin::Relational,
            RecordId::External(_) => SourceOrigin::External,
        }
    }

    /// String form used for exact-id comparison across both origins.
    pub fn key(&self) -> String {
        match self {
            RecordId::Relational(id) => id.hyphenated().to_string(),
            RecordId::External(id) => id.clone(),
        }
    }

    /// Tag an identifier that arrived as bare text (e.g. typed by a user).
    ///
    /// Only for boundaries where the source is unknown; ingestion tags by
    /// source instead.
    pub fn from_untagged(raw: &str) -> Self {
        let raw = raw.trim();
        match Uuid::parse_str(raw) {
            Ok(id) if raw.len() == 36 => RecordId::Relational(id),
            _ => RecordId::External(raw.to_string()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Relational(id) => write!(f, "{}", id.hyphenated()),
            RecordId::External(id) => f.write_str(id),
        }
    }
}

/// A unified expense, independent of which source produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: RecordId,
    /// Non-negative, currency-agnostic
    pub amount: Decimal,
    pub title: String,
    pub description: String,
    /// Canonical category after normalization
    pub category: String,
    /// Category as it arrived, when it differs from `category`
    pub original_category: Option<String>,
    /// Explicit calendar date from the source, if any
    pub date: Option<NaiveDate>,
    /// Creation instant from the source, if any
    pub created_at: Option<DateTime<Utc>>,
    /// Instant used for duplicate detection and intra-day ordering:
    /// `created_at` if present, else local midnight of `date`
    pub timestamp: DateTime<Utc>,
    /// Calendar day used for filtering and grouping
    pub effective_date: NaiveDate,
}

impl ExpenseRecord {
    pub fn origin(&self) -> SourceOrigin {
        self.id.origin()
    }

    pub fn is_external(&self) -> bool {
        self.origin() == SourceOrigin::External
    }

    /// Title for display; falls back to the description.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.description
        } else {
            &self.title
        }
    }
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_origin() {
        let rel = RecordId::Relational(Uuid::nil());
        let ext = RecordId::External("rcpt_42".to_string());
        assert_eq!(rel.origin(), SourceOrigin::Relational);
        assert_eq!(ext.origin(), SourceOrigin::External);
        assert_eq!(rel.key(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_from_untagged() {
        let rel = RecordId::from_untagged("67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(rel.origin(), SourceOrigin::Relational);

        // simple (unhyphenated) uuids are not the store's shape
        let ext = RecordId::from_untagged("67e5504410b1426f9247bb680e5fe0c8");
        assert_eq!(ext.origin(), SourceOrigin::External);

        let ext = RecordId::from_untagged("1712345678901");
        assert_eq!(ext, RecordId::External("1712345678901".to_string()));
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("café au lait", 4), "café");
        assert_eq!(truncate_chars("short", 75), "short");
        let long = "x".repeat(200);
        assert_eq!(truncate_chars(&long, DESCRIPTION_MAX_CHARS).chars().count(), 150);
    }

    #[test]
    fn test_record_id_serde_shape() {
        let id = RecordId::External("abc".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"origin":"external","id":"abc"}"#);
    }
}
