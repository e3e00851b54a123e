use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tally_core::CorrectionPolicy;

use crate::state::{ensure_tally_home, tally_home};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub view: ViewSection,
    #[serde(default)]
    pub correction: CorrectionPolicy,
}

/// External receipt/classification service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub base_url: String,
    /// Also scopes rows in the relational store.
    pub user_id: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub base_url: String,
    pub api_key: String,
    pub table: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSection {
    pub timezone: String,
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user_id: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            table: "expenses".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for ViewSection {
    fn default() -> Self {
        Self {
            timezone: "America/Chicago".to_string(),
        }
    }
}

impl ServiceSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StoreSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        tally_core::time::parse_timezone(&self.view.timezone)
            .with_context(|| format!("Fix [view] timezone in {}", display_config_path()))
    }

    /// Fail with the next step to take when a remote section is unset.
    pub fn require_remote(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.service.base_url.trim().is_empty() {
            missing.push("[service] base_url");
        }
        if self.service.user_id.trim().is_empty() {
            missing.push("[service] user_id");
        }
        if self.store.base_url.trim().is_empty() {
            missing.push("[store] base_url");
        }
        if self.store.api_key.trim().is_empty() {
            missing.push("[store] api_key");
        }
        if !missing.is_empty() {
            bail!(
                "Set {} in {} (run `tally config init` to create it).",
                missing.join(", "),
                display_config_path()
            );
        }
        Ok(())
    }
}

fn display_config_path() -> String {
    tally_home()
        .map(|home| home.join("config.toml").display().to_string())
        .unwrap_or_else(|_| "~/.tally/config.toml".to_string())
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config_to(p: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&p, &Config::default())?;
    println!("Wrote {}", p.display());
    println!("Fill in [service] and [store] before running `tally sync`.");
    Ok(())
}
