//! The reconciliation pass over already-unified records:
//! temporal correction -> dedupe -> category normalization -> filter -> group.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::category::CategoryContext;
use crate::correction::CorrectionPolicy;
use crate::dedupe::dedupe_with_report;
use crate::grouping::{GroupedView, ViewMode, filter, group};
use crate::record::{ExpenseRecord, RecordId};
use crate::time::ViewClock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    #[serde(default)]
    pub correction: CorrectionPolicy,
    #[serde(default)]
    pub view_mode: ViewMode,
}

/// Counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    pub input: usize,
    pub date_corrected: usize,
    pub exact_removed: usize,
    pub artifacts_removed: usize,
    pub categories_minted: usize,
    pub shown: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub view: GroupedView,
    /// Near-duplicates that were kept; the caller should warn about these
    pub ambiguous: Vec<(RecordId, RecordId)>,
    pub stats: PassStats,
}

/// Reconcile both sources into one grouped view.
///
/// External records go first so that, on an exact-id collision, the
/// external copy is the one kept.
pub fn reconcile(
    external: Vec<ExpenseRecord>,
    relational: Vec<ExpenseRecord>,
    categories: &mut CategoryContext<'_>,
    clock: &ViewClock,
    options: &ReconcileOptions,
) -> Reconciliation {
    let mut records = external;
    records.extend(relational);

    let mut stats = PassStats {
        input: records.len(),
        ..PassStats::default()
    };

    stats.date_corrected = options.correction.apply(&mut records, clock);

    let report = dedupe_with_report(records, clock);
    stats.exact_removed = report.exact_removed;
    stats.artifacts_removed = report.artifacts_removed;

    let before = categories.set.len();
    let mut records = report.records;
    for record in &mut records {
        normalize_record(record, categories);
    }
    stats.categories_minted = categories.set.len() - before;

    let records = filter(records, options.view_mode, clock);
    stats.shown = records.len();
    let view = group(records, clock);

    info!(
        input = stats.input,
        shown = stats.shown,
        exact_removed = stats.exact_removed,
        artifacts_removed = stats.artifacts_removed,
        date_corrected = stats.date_corrected,
        "reconciled expenses"
    );

    Reconciliation {
        view,
        ambiguous: report.ambiguous,
        stats,
    }
}

/// Replace the record's category with its normalized display name, keeping
/// the raw label in `original_category` when they differ.
pub fn normalize_record(record: &mut ExpenseRecord, categories: &mut CategoryContext<'_>) {
    let raw = record
        .original_category
        .take()
        .unwrap_or_else(|| record.category.clone());
    let normalized = categories.normalize(&raw);
    if normalized.display != raw {
        record.original_category = Some(raw);
    }
    record.category = normalized.display;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{CategorySet, Unpersisted};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_normalize_record_keeps_original() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 12, 0, 0).unwrap();
        let mut record = ExpenseRecord {
            id: RecordId::Relational(Uuid::nil()),
            amount: Decimal::ONE,
            title: "Pizza".to_string(),
            description: String::new(),
            category: "restaurant".to_string(),
            original_category: None,
            date: Some(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()),
            created_at: None,
            timestamp: ts,
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
        };
        let mut set = CategorySet::default();
        let mut ctx = CategoryContext::new(&mut set, &Unpersisted);

        normalize_record(&mut record, &mut ctx);
        assert_eq!(record.category, "Meals");
        assert_eq!(record.original_category.as_deref(), Some("restaurant"));

        // running again is a no-op
        normalize_record(&mut record, &mut ctx);
        assert_eq!(record.category, "Meals");
        assert_eq!(record.original_category.as_deref(), Some("restaurant"));
    }
}
