//! Fetch both expense sources and run reconciliation passes one at a time.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tally_core::{
    CategoryContext, CategorySet, ExpenseRecord, ReconcileOptions, Reconciliation, RecordId,
    SourceOrigin, ViewClock,
};
use tally_ingest::{NewExpense, ReceiptExtraction, reconcile_raw, unify_relational};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config_store::ConfigStore;
use crate::service::ExternalSource;
use crate::store::RelationalSource;

/// Why a source contributed nothing to a pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("external service unavailable: {0}")]
    External(String),
    #[error("relational store unavailable: {0}")]
    Relational(String),
    #[error("Neither expense source could be reached. Check your connection and try again.")]
    Unreachable,
}

impl SourceError {
    fn unavailable(origin: SourceOrigin, detail: String) -> Self {
        match origin {
            SourceOrigin::External => Self::External(detail),
            SourceOrigin::Relational => Self::Relational(detail),
        }
    }

    pub fn origin(&self) -> Option<SourceOrigin> {
        match self {
            Self::External(_) => Some(SourceOrigin::External),
            Self::Relational(_) => Some(SourceOrigin::Relational),
            Self::Unreachable => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub reconciliation: Reconciliation,
    pub failures: Vec<SourceError>,
}

impl SyncOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct Reconciler<E, R> {
    external: E,
    relational: R,
    config: ConfigStore,
    /// Held for the whole of a pass; waiting passes queue in FIFO order.
    categories: Mutex<CategorySet>,
    tz: Tz,
    options: ReconcileOptions,
}

impl<E, R> Reconciler<E, R>
where
    E: ExternalSource + Sync,
    R: RelationalSource + Sync,
{
    pub fn new(
        external: E,
        relational: R,
        config: ConfigStore,
        tz: Tz,
        options: ReconcileOptions,
    ) -> Result<Self> {
        let categories = config.load_categories().context("load categories")?;
        Ok(Self {
            external,
            relational,
            config,
            categories: Mutex::new(categories),
            tz,
            options,
        })
    }

    pub fn clock(&self) -> ViewClock {
        ViewClock::system(self.tz)
    }

    /// Snapshot of the session's category set.
    pub async fn categories(&self) -> CategorySet {
        self.categories.lock().await.clone()
    }

    /// Run a pass against the current time.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        let mut categories = self.categories.lock().await;
        let clock = self.clock();
        self.pass(&mut categories, &clock).await
    }

    /// Run a pass against a fixed clock.
    pub async fn sync_at(&self, clock: ViewClock) -> Result<SyncOutcome> {
        let mut categories = self.categories.lock().await;
        self.pass(&mut categories, &clock).await
    }

    async fn pass(&self, categories: &mut CategorySet, clock: &ViewClock) -> Result<SyncOutcome> {
        let (external, relational) = tokio::join!(
            self.external.fetch_expenses(),
            self.relational.select_expenses()
        );

        let mut failures = Vec::new();
        let external = keep_or_log(external, SourceOrigin::External, &mut failures);
        let relational = keep_or_log(relational, SourceOrigin::Relational, &mut failures);
        if failures.len() == 2 {
            return Err(SourceError::Unreachable.into());
        }

        let (clock, options) = (*clock, self.options);
        let reconciliation = self
            .with_categories(categories, move |ctx| {
                reconcile_raw(external, relational, ctx, &clock, &options)
            })
            .await?;
        Ok(SyncOutcome {
            reconciliation,
            failures,
        })
    }

    /// Run `f` on the blocking pool against a copy of `categories`, then
    /// store the copy back. Minting waits on the configuration store's
    /// queue, which must not happen on a runtime worker.
    async fn with_categories<T, F>(&self, categories: &mut CategorySet, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut CategoryContext<'_>) -> T + Send + 'static,
    {
        let mut set = categories.clone();
        let sink = self.config.clone();
        let (set, out) = tokio::task::spawn_blocking(move || {
            let out = f(&mut CategoryContext::new(&mut set, &sink));
            (set, out)
        })
        .await
        .context("category normalization did not finish")?;
        *categories = set;
        Ok(out)
    }

    /// Canonical category for `raw`, minting it if new.
    pub async fn normalize_category(&self, raw: &str) -> Result<String> {
        let raw = raw.to_string();
        let mut categories = self.categories.lock().await;
        self.with_categories(&mut categories, move |ctx| ctx.normalize_category(&raw))
            .await
    }

    /// Record a typed-in expense in the relational store.
    pub async fn add_manual(
        &self,
        amount: Decimal,
        title: &str,
        description: &str,
        category: &str,
        date: NaiveDate,
    ) -> Result<ExpenseRecord> {
        let (title, description, category) =
            (title.to_string(), description.to_string(), category.to_string());
        let expense = {
            let mut categories = self.categories.lock().await;
            self.with_categories(&mut categories, move |ctx| {
                NewExpense::manual(amount, &title, &description, &category, date, ctx)
            })
            .await??
        };
        self.insert(expense).await
    }

    /// Record a receipt extraction in the relational store.
    pub async fn add_receipt(&self, receipt: ReceiptExtraction, date: NaiveDate) -> Result<ExpenseRecord> {
        let expense = {
            let mut categories = self.categories.lock().await;
            self.with_categories(&mut categories, move |ctx| {
                NewExpense::from_receipt(receipt, date, ctx)
            })
            .await?
        };
        self.insert(expense).await
    }

    async fn insert(&self, expense: NewExpense) -> Result<ExpenseRecord> {
        let row = self
            .relational
            .insert_expense(&expense.to_insert())
            .await
            .context("save expense")?;
        let id = row.id.clone().unwrap_or_default();
        let record = unify_relational(vec![row], &self.clock())
            .into_iter()
            .next()
            .with_context(|| format!("stored row {id} could not be read back"))?;
        info!(id = %record.id, amount = %record.amount, category = %record.category, "expense recorded");
        Ok(record)
    }

    /// Delete by origin: relational deletes must succeed, external deletes
    /// are best-effort.
    pub async fn delete(&self, id: &RecordId) -> Result<()> {
        match id {
            RecordId::Relational(uuid) => self
                .relational
                .delete_expense(*uuid)
                .await
                .with_context(|| format!("delete expense {id}")),
            RecordId::External(ext) => {
                if let Err(e) = self.external.delete_expense(ext).await {
                    warn!(id = %ext, error = %e, "external delete failed; ignoring");
                }
                Ok(())
            }
        }
    }
}

fn keep_or_log<T>(
    fetched: Result<Vec<T>>,
    source: SourceOrigin,
    failures: &mut Vec<SourceError>,
) -> Vec<T> {
    match fetched {
        Ok(rows) => rows,
        Err(e) => {
            let detail = format!("{e:#}");
            warn!(?source, error = %detail, "source fetch failed; continuing without it");
            failures.push(SourceError::unavailable(source, detail));
            Vec::new()
        }
    }
}
