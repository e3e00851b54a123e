//! Receipt upload responses: validate the classification and turn it into
//! an extraction, or reject it with a message the user can act on.

use rust_decimal::Decimal;
use serde::Deserialize;
use tally_core::{MAX_AMOUNT, RECEIPT_DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS, truncate_chars};
use thiserror::Error;
use tracing::warn;

use crate::types::UploadResponse;

/// A field the upload service must supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadField {
    Amount,
    Category,
}

impl UploadField {
    fn label(&self) -> &'static str {
        match self {
            UploadField::Amount => "amount",
            UploadField::Category => "category",
        }
    }
}

/// Recoverable rejection of an upload response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadRejection {
    #[error(
        "The receipt was read but its {} could not be found. Try a clearer photo or add the expense manually.",
        field_list(.0)
    )]
    MissingFields(Vec<UploadField>),
    #[error("The receipt service returned no result. Try again or add the expense manually.")]
    Empty,
    #[error("The receipt service sent a response we could not read. Try again or add the expense manually.")]
    Malformed,
}

fn field_list(fields: &[UploadField]) -> String {
    fields
        .iter()
        .map(UploadField::label)
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Validated receipt classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptExtraction {
    pub amount: Decimal,
    /// Raw category label; normalized when the expense is recorded
    pub category: String,
    pub title: String,
    /// Up to the receipt cap; storage truncates further
    pub description: String,
    pub confidence: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UploadPayload {
    // tried first: derived structs also accept sequences
    Many(Vec<UploadResponse>),
    One(UploadResponse),
}

/// Parse a raw `POST /upload` body (object or single-element array).
pub fn parse_upload_body(body: &str) -> Result<ReceiptExtraction, UploadRejection> {
    let payload: UploadPayload = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, "unreadable upload response");
        UploadRejection::Malformed
    })?;
    let response = match payload {
        UploadPayload::Many(rs) => rs.into_iter().next().ok_or(UploadRejection::Empty)?,
        UploadPayload::One(r) => r,
    };
    validate_upload(response)
}

pub fn validate_upload(response: UploadResponse) -> Result<ReceiptExtraction, UploadRejection> {
    let amount = response
        .amount
        .filter(|a| *a > Decimal::ZERO && *a <= MAX_AMOUNT);
    let category = response
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let (amount, category) = match (amount, category) {
        (Some(a), Some(c)) => (a, c),
        (amount, category) => {
            let mut missing = Vec::new();
            if amount.is_none() {
                missing.push(UploadField::Amount);
            }
            if category.is_none() {
                missing.push(UploadField::Category);
            }
            return Err(UploadRejection::MissingFields(missing));
        }
    };

    let mut title = response.title.unwrap_or_default().trim().to_string();
    let mut description = response.description.unwrap_or_default().trim().to_string();
    if title.is_empty() && !description.is_empty() {
        std::mem::swap(&mut title, &mut description);
    }
    if title.is_empty() {
        title = format!("{category} receipt");
    }

    Ok(ReceiptExtraction {
        amount,
        category,
        title: truncate_chars(&title, TITLE_MAX_CHARS),
        description: truncate_chars(&description, RECEIPT_DESCRIPTION_MAX_CHARS),
        confidence: response.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_response() {
        let body = r#"{"amount": "23.10", "category": "Food & Dining", "title": "Taqueria",
                       "description": "Lunch", "confidence": 0.92}"#;
        let x = parse_upload_body(body).unwrap();
        assert_eq!(x.amount, Decimal::new(2310, 2));
        assert_eq!(x.category, "Food & Dining");
        assert_eq!(x.title, "Taqueria");
        assert_eq!(x.confidence, Some(0.92));
    }

    #[test]
    fn test_single_element_array() {
        let body = r#"[{"amount": 8, "category": "supplies"}]"#;
        let x = parse_upload_body(body).unwrap();
        assert_eq!(x.amount, Decimal::from(8));
        assert_eq!(x.title, "supplies receipt");
    }

    #[test]
    fn test_missing_fields_named() {
        let err = parse_upload_body(r#"{"title": "???"}"#).unwrap_err();
        assert_eq!(
            err,
            UploadRejection::MissingFields(vec![UploadField::Amount, UploadField::Category])
        );
        let msg = err.to_string();
        assert!(msg.contains("amount and category"), "{msg}");
        assert!(msg.contains("manually"));

        let err = parse_upload_body(r#"{"amount": 4.5, "category": "  "}"#).unwrap_err();
        assert_eq!(err, UploadRejection::MissingFields(vec![UploadField::Category]));
    }

    #[test]
    fn test_zero_amount_is_missing() {
        let err = parse_upload_body(r#"{"amount": 0, "category": "Meals"}"#).unwrap_err();
        assert_eq!(err, UploadRejection::MissingFields(vec![UploadField::Amount]));
    }

    #[test]
    fn test_string_confidence_is_not_malformed() {
        let x = parse_upload_body(r#"{"amount": 12.5, "category": "Meals", "confidence": "0.9"}"#)
            .unwrap();
        assert_eq!(x.amount, Decimal::new(125, 1));
        assert_eq!(x.confidence, Some(0.9));

        let x = parse_upload_body(r#"{"amount": 3, "category": "Meals", "confidence": "n/a"}"#).unwrap();
        assert_eq!(x.confidence, None);
    }

    #[test]
    fn test_oversized_amount_is_missing() {
        let err = parse_upload_body(r#"{"amount": "50000000000000000000000000000", "category": "Meals"}"#)
            .unwrap_err();
        assert_eq!(err, UploadRejection::MissingFields(vec![UploadField::Amount]));
    }

    #[test]
    fn test_empty_and_malformed() {
        assert_eq!(parse_upload_body("[]").unwrap_err(), UploadRejection::Empty);
        assert_eq!(parse_upload_body("<html>502</html>").unwrap_err(), UploadRejection::Malformed);
    }

    #[test]
    fn test_receipt_description_keeps_200() {
        let body = format!(
            r#"{{"amount": 1, "category": "Meals", "title": "x", "description": "{}"}}"#,
            "d".repeat(260)
        );
        let x = parse_upload_body(&body).unwrap();
        assert_eq!(x.description.chars().count(), RECEIPT_DESCRIPTION_MAX_CHARS);
    }
}
