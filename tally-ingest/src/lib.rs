//! tally-ingest: source record shapes, the record shape unifier, receipt
//! upload validation and new-entry construction.

pub mod dates;
pub mod entry;
pub mod types;
pub mod unify;
pub mod upload;

pub use entry::{EntrySource, NewExpense};
pub use types::{ExternalExpense, RelationalInsert, RelationalRow, UploadResponse, decode_rows};
pub use unify::{pack_description, split_packed_description, unify_external, unify_relational};
pub use upload::{ReceiptExtraction, UploadField, UploadRejection, parse_upload_body, validate_upload};

use tally_core::{CategoryContext, ReconcileOptions, Reconciliation, ViewClock};

/// Unify both raw sources and run the reconciliation pass.
pub fn reconcile_raw(
    external: Vec<ExternalExpense>,
    relational: Vec<RelationalRow>,
    categories: &mut CategoryContext<'_>,
    clock: &ViewClock,
    options: &ReconcileOptions,
) -> Reconciliation {
    let external = unify_external(external, clock);
    let relational = unify_relational(relational, clock);
    tally_core::reconcile(external, relational, categories, clock, options)
}
