//! Wire shapes of the two expense sources and the upload endpoint.
//!
//! Every field is optional and loosely typed: upstream payloads mix numbers
//! and numeric strings, and a bad field must cost one record, not the batch.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

/// A record as returned by `GET /get-my-expenses/{userId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalExpense {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "loose_decimal")]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "loose_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
}

/// A row of the relational expense table.
///
/// `description` packs `title|description` (or legacy `title - description`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationalRow {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "loose_decimal")]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub expense_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub created_at: Option<String>,
}

/// Insert payload for the relational table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationalInsert {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub description: String,
    pub category: String,
    pub expense_date: NaiveDate,
}

/// Body of a `POST /upload` response (one element of it, when it is an array).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default, deserialize_with = "loose_decimal")]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "loose_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "loose_f64")]
    pub confidence: Option<f64>,
}

/// Accept strings and numbers; anything else reads as absent.
fn loose_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn loose_decimal<'de, D>(d: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(Value::String(s)) => parse_decimal(&s),
        _ => None,
    })
}

fn loose_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(value.filter(|f| f.is_finite()))
}

/// Decode a JSON array one row at a time. Rows that are not objects, or
/// that still fail to decode, are logged and skipped.
pub fn decode_rows<T: DeserializeOwned>(body: &str, source: &str) -> serde_json::Result<Vec<T>> {
    let rows: Vec<Value> = serde_json::from_str(body)?;
    Ok(rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value(row) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(source, index, error = %e, "undecodable row; skipping");
                None
            }
        })
        .collect())
}

/// Parse "12.50", "$1,299.00" or "1.5e2" into a decimal.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}
