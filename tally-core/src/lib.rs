//! tally-core: expense records and the reconciliation pipeline
//! (temporal correction, deduplication, category normalization, grouping).

pub mod category;
pub mod correction;
pub mod dedupe;
pub mod grouping;
pub mod pipeline;
pub mod record;
pub mod time;

pub use category::{
    CategoryContext, CategorySet, CategorySink, DEFAULT_CATEGORIES, FALLBACK_CATEGORY, MatchRule,
    Normalized, Unpersisted,
};
pub use correction::CorrectionPolicy;
pub use dedupe::{DedupeReport, dedupe, dedupe_with_report};
pub use grouping::{DayGroup, GroupedView, ViewMode, filter, group, sum_amounts};
pub use pipeline::{PassStats, ReconcileOptions, Reconciliation, normalize_record, reconcile};
pub use record::{
    DESCRIPTION_MAX_CHARS, ExpenseRecord, MAX_AMOUNT, RECEIPT_DESCRIPTION_MAX_CHARS, RecordId,
    SourceOrigin,
    TITLE_MAX_CHARS, truncate_chars,
};
pub use time::ViewClock;
