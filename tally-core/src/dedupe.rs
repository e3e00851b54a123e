//! Deduplication engine.
//!
//! Phase 1 keeps the first occurrence of every id. Phase 2 looks for
//! functional duplicates (same amount within a cent, timestamps within five
//! minutes) and only drops a record stamped at the upstream artifact hour
//! when a twin at a different hour exists. Every other near-duplicate is
//! kept and reported so the caller can warn the user.

use chrono::TimeDelta;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::debug;

use crate::record::{ExpenseRecord, RecordId};
use crate::time::ViewClock;

/// Amounts closer than this are considered equal (0.01).
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
/// Timestamps closer than this are considered the same event.
pub const DUPLICATE_WINDOW_SECS: i64 = 5 * 60;
/// Local hour produced by a known upstream timestamp bug.
pub const ARTIFACT_HOUR: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupeReport {
    pub records: Vec<ExpenseRecord>,
    pub exact_removed: usize,
    pub artifacts_removed: usize,
    /// Near-duplicate pairs that were both kept
    pub ambiguous: Vec<(RecordId, RecordId)>,
}

/// Deduplicate, preserving the order of the records that remain.
pub fn dedupe(records: Vec<ExpenseRecord>, clock: &ViewClock) -> Vec<ExpenseRecord> {
    dedupe_with_report(records, clock).records
}

pub fn dedupe_with_report(records: Vec<ExpenseRecord>, clock: &ViewClock) -> DedupeReport {
    let before = records.len();
    let unique = drop_repeated_ids(records);
    let exact_removed = before - unique.len();

    let window = TimeDelta::seconds(DUPLICATE_WINDOW_SECS);
    let twins: Vec<Vec<usize>> = (0..unique.len())
        .map(|i| {
            (0..unique.len())
                .filter(|&j| j != i && is_functional_duplicate(&unique[i], &unique[j], window))
                .collect()
        })
        .collect();

    let mut drop = vec![false; unique.len()];
    for (i, others) in twins.iter().enumerate() {
        if others.is_empty() || clock.local_hour(unique[i].timestamp) != ARTIFACT_HOUR {
            continue;
        }
        if others
            .iter()
            .any(|&j| clock.local_hour(unique[j].timestamp) != ARTIFACT_HOUR)
        {
            drop[i] = true;
        }
    }

    let mut ambiguous = Vec::new();
    for (i, others) in twins.iter().enumerate() {
        for &j in others.iter().filter(|&&j| j > i) {
            if !drop[i] && !drop[j] {
                ambiguous.push((unique[i].id.clone(), unique[j].id.clone()));
            }
        }
    }

    let artifacts_removed = drop.iter().filter(|d| **d).count();
    let records: Vec<ExpenseRecord> = unique
        .into_iter()
        .zip(drop)
        .filter_map(|(r, d)| (!d).then_some(r))
        .collect();

    debug!(
        exact_removed,
        artifacts_removed,
        ambiguous = ambiguous.len(),
        kept = records.len(),
        "dedupe pass"
    );

    DedupeReport {
        records,
        exact_removed,
        artifacts_removed,
        ambiguous,
    }
}

fn drop_repeated_ids(records: Vec<ExpenseRecord>) -> Vec<ExpenseRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.id.key()))
        .collect()
}

fn is_functional_duplicate(a: &ExpenseRecord, b: &ExpenseRecord, window: TimeDelta) -> bool {
    (a.amount - b.amount).abs() < AMOUNT_TOLERANCE
        && (a.timestamp - b.timestamp).abs() < window
}
