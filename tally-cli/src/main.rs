use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use tally_core::{CategoryContext, ReconcileOptions, RecordId, ViewClock, ViewMode};
use tally_ingest::{ExternalExpense, RelationalRow, UploadRejection, decode_rows, reconcile_raw};
use tally_sync::{ConfigStore, FileKvStore, Reconciler, RestStore, ServiceClient};
use tracing::debug;

mod config;
mod logging;
mod render;
mod state;

use config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TALLY_BUILD_SHA"), ")"),
    about = "Reconcile expenses from the receipt service and the expense store"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage ~/.tally/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Fetch both sources, reconcile, and print the grouped view
    Sync {
        /// today, week, month or all
        #[arg(long, default_value = "all")]
        view: ViewMode,

        /// Print the grouped view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile exported JSON files without touching the network
    Reconcile {
        /// JSON array of external-service expenses
        #[arg(long)]
        external: Option<PathBuf>,

        /// JSON array of relational-store rows
        #[arg(long)]
        relational: Option<PathBuf>,

        #[arg(long, default_value = "all")]
        view: ViewMode,

        /// Pin "now" (RFC 3339) instead of using the system clock
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        #[arg(long)]
        json: bool,
    },

    /// Print the canonical category for a raw label
    Normalize { label: String },

    /// List the current category set
    Categories,

    /// Record an expense by hand
    Add {
        #[arg(long)]
        amount: Decimal,

        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long)]
        category: String,

        /// YYYY-MM-DD (default: today in the configured timezone)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Upload a receipt image for classification
    Upload {
        image: PathBuf,

        /// Record the extraction in the expense store
        #[arg(long)]
        save: bool,

        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Delete an expense by id
    Delete { id: String },

    /// Business context used by the receipt service
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,
}

#[derive(Subcommand, Debug)]
enum ContextCommand {
    Show,
    Set { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
        },

        Command::Sync { view, json } => {
            let cfg = config::load_config()?;
            let reconciler = build_reconciler(&cfg, view)?;
            let outcome = reconciler.sync().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.reconciliation.view)?);
            } else {
                print!(
                    "{}",
                    render::render_reconciliation(&outcome.reconciliation, &outcome.failures)
                );
            }
        }

        Command::Reconcile {
            external,
            relational,
            view,
            now,
            json,
        } => {
            if external.is_none() && relational.is_none() {
                bail!("Pass --external <file>, --relational <file>, or both.");
            }
            let cfg = config::load_config()?;
            let tz = cfg.timezone()?;
            let clock = match now {
                Some(now) => ViewClock::new(now, tz),
                None => ViewClock::system(tz),
            };
            let external: Vec<ExternalExpense> = read_rows_or_empty(external.as_deref(), "external")?;
            let relational: Vec<RelationalRow> =
                read_rows_or_empty(relational.as_deref(), "relational")?;

            let store = open_config_store()?;
            let mut categories = store.load_categories()?;
            let mut ctx = CategoryContext::new(&mut categories, &store);
            let options = ReconcileOptions {
                correction: cfg.correction,
                view_mode: view,
            };
            let rec = reconcile_raw(external, relational, &mut ctx, &clock, &options);
            debug!(stats = ?rec.stats, "offline reconciliation");

            if json {
                println!("{}", serde_json::to_string_pretty(&rec.view)?);
            } else {
                print!("{}", render::render_reconciliation(&rec, &[]));
            }
        }

        Command::Normalize { label } => {
            let store = open_config_store()?;
            let mut categories = store.load_categories()?;
            let mut ctx = CategoryContext::new(&mut categories, &store);
            let n = ctx.normalize(&label);
            if n.display != n.canonical {
                println!("{} (shown as \"{}\")", n.canonical, n.display);
            } else {
                println!("{}", n.canonical);
            }
        }

        Command::Categories => {
            let store = open_config_store()?;
            for name in store.load_categories()?.names() {
                println!("{name}");
            }
        }

        Command::Add {
            amount,
            title,
            description,
            category,
            date,
        } => {
            let cfg = config::load_config()?;
            let reconciler = build_reconciler(&cfg, ViewMode::All)?;
            let date = date.unwrap_or_else(|| reconciler.clock().today());
            let record = reconciler
                .add_manual(amount, &title, &description, &category, date)
                .await?;
            println!("Saved: {}", render::render_record(&record));
        }

        Command::Upload { image, save, date } => {
            let cfg = config::load_config()?;
            cfg.require_remote()?;
            let client = service_client(&cfg)?;

            let extraction = match client.upload_receipt(&image).await {
                Ok(x) => x,
                Err(e) => match e.downcast_ref::<UploadRejection>() {
                    Some(rejection) => {
                        println!("{rejection}");
                        return Ok(());
                    }
                    None => return Err(e),
                },
            };

            println!("Amount:      ${}", extraction.amount);
            println!("Category:    {}", extraction.category);
            println!("Title:       {}", extraction.title);
            if !extraction.description.is_empty() {
                println!("Description: {}", extraction.description);
            }
            if let Some(confidence) = extraction.confidence {
                println!("Confidence:  {:.0}%", confidence * 100.0);
            }

            if save {
                let reconciler = build_reconciler(&cfg, ViewMode::All)?;
                let date = date.unwrap_or_else(|| reconciler.clock().today());
                let record = reconciler.add_receipt(extraction, date).await?;
                println!("\nSaved: {}", render::render_record(&record));
            } else {
                println!("\nRe-run with --save to record it.");
            }
        }

        Command::Delete { id } => {
            let cfg = config::load_config()?;
            let reconciler = build_reconciler(&cfg, ViewMode::All)?;
            // the only place an id string is tagged by its shape
            let id = RecordId::from_untagged(id.trim());
            reconciler.delete(&id).await?;
            println!("Deleted {id}");
        }

        Command::Context { command } => {
            let store = open_config_store()?;
            match command {
                ContextCommand::Show => match store.business_context()? {
                    Some(text) if !text.is_empty() => println!("{text}"),
                    _ => println!("No business context set. Run: tally context set \"<text>\""),
                },
                ContextCommand::Set { text } => {
                    store.set_business_context(&text)?;
                    println!("Business context saved.");
                }
            }
        }
    }

    Ok(())
}

fn open_config_store() -> Result<ConfigStore> {
    let path = state::kv_path()?;
    let backend = FileKvStore::open(&path).with_context(|| format!("open {}", path.display()))?;
    Ok(ConfigStore::spawn(backend)?)
}

fn service_client(cfg: &Config) -> Result<ServiceClient> {
    ServiceClient::new(
        &cfg.service.base_url,
        &cfg.service.user_id,
        cfg.service.timeout(),
    )
}

fn build_reconciler(cfg: &Config, view_mode: ViewMode) -> Result<Reconciler<ServiceClient, RestStore>> {
    cfg.require_remote()?;
    let store = RestStore::new(
        &cfg.store.base_url,
        &cfg.store.api_key,
        &cfg.store.table,
        &cfg.service.user_id,
        cfg.store.timeout(),
    )?;
    let options = ReconcileOptions {
        correction: cfg.correction,
        view_mode,
    };
    Reconciler::new(
        service_client(cfg)?,
        store,
        open_config_store()?,
        cfg.timezone()?,
        options,
    )
}

fn read_rows_or_empty<T: serde::de::DeserializeOwned>(path: Option<&Path>, source: &str) -> Result<Vec<T>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    decode_rows(&s, source).with_context(|| format!("parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_carries_build_stamp() {
        let cmd = Cli::command();
        let version = cmd.get_version().unwrap();
        assert!(version.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(version.ends_with(&format!("({})", env!("TALLY_BUILD_SHA"))));
    }

    #[test]
    fn test_typed_arguments_parse() {
        let cli = Cli::try_parse_from([
            "tally", "add", "--amount", "12.50", "--title", "Lunch", "--category", "food",
            "--date", "2026-02-20",
        ])
        .unwrap();
        match cli.command {
            Command::Add { amount, date, .. } => {
                assert_eq!(amount, Decimal::new(1250, 2));
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 2, 20));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["tally", "sync", "--view", "fortnight"]).is_err());
    }

    #[test]
    fn test_offline_rows_skip_bad_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("external.json");
        fs::write(&path, r#"[{"id": "ml-1", "amount": 4, "title": 9}, 17]"#).unwrap();
        let rows: Vec<ExternalExpense> = read_rows_or_empty(Some(&path), "external").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title.as_deref(), Some("9"));
        assert!(read_rows_or_empty::<ExternalExpense>(None, "external").unwrap().is_empty());
    }
}
