//! Plain-text rendering of a reconciled view.

use std::fmt::Write;

use tally_core::{ExpenseRecord, GroupedView, Reconciliation, RecordId};
use tally_sync::SourceError;

pub fn render_reconciliation(rec: &Reconciliation, failures: &[SourceError]) -> String {
    let mut out = String::new();

    for failure in failures {
        let _ = writeln!(out, "! {failure}");
    }
    if !failures.is_empty() {
        out.push('\n');
    }

    out.push_str(&render_view(&rec.view));

    if !rec.ambiguous.is_empty() {
        let _ = writeln!(out, "\nPossible duplicates (kept, please review):");
        for (a, b) in &rec.ambiguous {
            let _ = writeln!(out, "  {} ~ {}", short_id(a), short_id(b));
        }
    }
    out
}

pub fn render_view(view: &GroupedView) -> String {
    let mut out = String::new();
    if view.is_empty() {
        out.push_str("No expenses to show.\n");
        return out;
    }

    for group in &view.groups {
        let marker = if group.expanded { "v" } else { ">" };
        let _ = writeln!(
            out,
            "{marker} {}  ({} item{}, ${})",
            group.key,
            group.records.len(),
            if group.records.len() == 1 { "" } else { "s" },
            group.total
        );
        if group.expanded {
            for r in &group.records {
                let _ = writeln!(out, "    {}", render_record(r));
            }
        }
    }

    let _ = writeln!(out, "\nTotal: ${} across {} expenses", view.total(), view.record_count());
    for (category, total) in view.category_totals() {
        let _ = writeln!(out, "  {category}: ${total}");
    }
    out
}

pub fn render_record(r: &ExpenseRecord) -> String {
    let mut line = format!("${:>9}  {:<20} {}", r.amount, r.category, r.display_title());
    if let Some(original) = &r.original_category {
        let _ = write!(line, "  (was \"{original}\")");
    }
    let _ = write!(line, "  [{}]", short_id(&r.id));
    line
}

fn short_id(id: &RecordId) -> String {
    let key = id.key();
    let prefix = match id {
        RecordId::Relational(_) => "db",
        RecordId::External(_) => "ml",
    };
    format!("{prefix}:{}", key.chars().take(8).collect::<String>())
}
