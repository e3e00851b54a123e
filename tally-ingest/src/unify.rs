//! Record shape unifier: both source shapes -> [`ExpenseRecord`].
//!
//! Origin tags are assigned here, by source, and never re-derived.

use rust_decimal::Decimal;
use tally_core::{
    DESCRIPTION_MAX_CHARS, ExpenseRecord, FALLBACK_CATEGORY, MAX_AMOUNT, RecordId, TITLE_MAX_CHARS,
    ViewClock, truncate_chars,
};
use tracing::warn;
use uuid::Uuid;

use crate::dates;
use crate::types::{ExternalExpense, RelationalRow};

/// Title used when a record carries no text at all.
pub const UNTITLED: &str = "Untitled expense";

/// Split a packed relational description into (title, description).
///
/// `title|description` is the current format. The legacy format splits on
/// the first `" - "` only; later separators stay in the description.
pub fn split_packed_description(packed: &str) -> (String, String) {
    let packed = packed.trim();
    if let Some((title, rest)) = packed.split_once('|') {
        return (title.trim().to_string(), rest.trim().to_string());
    }
    if let Some((title, rest)) = packed.split_once(" - ") {
        return (title.trim().to_string(), rest.trim().to_string());
    }
    (packed.to_string(), String::new())
}

/// Pack a title and description for the relational `description` column.
pub fn pack_description(title: &str, description: &str) -> String {
    if description.is_empty() {
        title.to_string()
    } else {
        format!("{title}|{description}")
    }
}

pub fn unify_external(rows: Vec<ExternalExpense>, clock: &ViewClock) -> Vec<ExpenseRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let Some(id) = row.id else {
                warn!(title = ?row.title, "external record without id; skipping");
                return None;
            };
            let amount = usable_amount(row.amount, &id)?;
            let dates = dates::resolve(row.date.as_deref(), row.created_at.as_deref(), clock, &id);

            let mut title = row.title.unwrap_or_default().trim().to_string();
            let mut description = row.description.unwrap_or_default().trim().to_string();
            // upstream sometimes fills only the description
            if title.is_empty() && !description.is_empty() {
                std::mem::swap(&mut title, &mut description);
            }

            Some(finish(
                RecordId::External(id),
                amount,
                title,
                description,
                row.category,
                dates,
            ))
        })
        .collect()
}

pub fn unify_relational(rows: Vec<RelationalRow>, clock: &ViewClock) -> Vec<ExpenseRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let raw_id = row.id.unwrap_or_default();
            let id = match Uuid::parse_str(&raw_id) {
                Ok(id) => id,
                Err(e) => {
                    warn!(id = %raw_id, error = %e, "relational row with invalid id; skipping");
                    return None;
                }
            };
            let amount = usable_amount(row.amount, &raw_id)?;
            let dates = dates::resolve(
                row.expense_date.as_deref(),
                row.created_at.as_deref(),
                clock,
                &raw_id,
            );
            let (mut title, mut description) =
                split_packed_description(row.description.as_deref().unwrap_or_default());
            if title.is_empty() && !description.is_empty() {
                std::mem::swap(&mut title, &mut description);
            }

            Some(finish(
                RecordId::Relational(id),
                amount,
                title,
                description,
                row.category,
                dates,
            ))
        })
        .collect()
}

fn usable_amount(amount: Option<Decimal>, id: &str) -> Option<Decimal> {
    let amount = match amount {
        Some(a) if a.is_sign_negative() => {
            warn!(record = id, amount = %a, "negative amount; using absolute value");
            a.abs()
        }
        Some(a) => a,
        None => {
            warn!(record = id, "record without a usable amount; skipping");
            return None;
        }
    };
    if amount > MAX_AMOUNT {
        warn!(record = id, amount = %amount, "implausibly large amount; skipping");
        return None;
    }
    Some(amount)
}

fn finish(
    id: RecordId,
    amount: Decimal,
    title: String,
    description: String,
    category: Option<String>,
    dates: dates::ResolvedDates,
) -> ExpenseRecord {
    let category = category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());
    let title = if title.is_empty() && description.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    };

    ExpenseRecord {
        id,
        amount,
        title: truncate_chars(&title, TITLE_MAX_CHARS),
        description: truncate_chars(&description, DESCRIPTION_MAX_CHARS),
        category,
        original_category: None,
        date: dates.date,
        created_at: dates.created_at,
        timestamp: dates.timestamp,
        effective_date: dates.effective_date,
    }
}
