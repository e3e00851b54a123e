//! Serialized access to the key-value configuration store.
//!
//! A single worker thread owns the backend and runs jobs strictly in the
//! order they were submitted, so read-modify-write operations never
//! interleave. Callers block until their job has run.

use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use tally_core::{CategorySet, CategorySink};
use tracing::{debug, error};

use crate::kv::{KeyValueStore, StoreError, StoreResult};

pub const CATEGORIES_KEY: &str = "categories";
pub const BUSINESS_CONTEXT_KEY: &str = "business_context";

type Job = Box<dyn FnOnce(&mut dyn KeyValueStore) + Send>;

/// Handle to the configuration store's write queue. Cheap to clone.
///
/// Every call blocks the calling thread until its job has run; async code
/// calls it from the blocking pool.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    jobs: mpsc::Sender<Job>,
}

impl ConfigStore {
    /// Move `backend` onto a dedicated worker thread.
    pub fn spawn<S>(backend: S) -> StoreResult<Self>
    where
        S: KeyValueStore + Send + 'static,
    {
        let (jobs, rx) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name("tally-config-store".to_string())
            .spawn(move || {
                let mut backend = backend;
                for job in rx {
                    job(&mut backend);
                }
                debug!("config store worker stopped");
            })?;
        Ok(Self { jobs })
    }

    fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn KeyValueStore) -> StoreResult<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();
        let job: Job = Box::new(move |store| {
            let _ = reply_tx.send(f(store));
        });
        self.jobs.send(job).map_err(|_| StoreError::Closed)?;
        reply_rx.recv().map_err(|_| StoreError::Closed)?
    }

    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_string();
        self.run(move |store| store.get(&key))
    }

    pub fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.run(move |store| store.set(&key, &value))
    }

    /// Read-modify-write `key` as one queued job.
    pub fn update<F>(&self, key: &str, f: F) -> StoreResult<String>
    where
        F: FnOnce(Option<String>) -> StoreResult<String> + Send + 'static,
    {
        let key = key.to_string();
        self.run(move |store| {
            let next = f(store.get(&key)?)?;
            store.set(&key, &next)?;
            Ok(next)
        })
    }

    /// Stored category set, or the defaults when nothing is stored yet.
    pub fn load_categories(&self) -> StoreResult<CategorySet> {
        match self.get(CATEGORIES_KEY)? {
            Some(raw) => {
                let names: Vec<String> = serde_json::from_str(&raw)?;
                Ok(CategorySet::from_names(names))
            }
            None => Ok(CategorySet::default()),
        }
    }

    /// Merge `names` into the stored list. Entries written by another
    /// session since our last read are kept.
    pub fn save_categories(&self, names: &[String]) -> StoreResult<CategorySet> {
        let names = names.to_vec();
        let merged = self.update(CATEGORIES_KEY, move |current| {
            let stored: Vec<String> = match current {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Vec::new(),
            };
            let set = CategorySet::from_names(names.iter().chain(stored.iter()));
            Ok(serde_json::to_string(set.names())?)
        })?;
        let names: Vec<String> = serde_json::from_str(&merged)?;
        Ok(CategorySet::from_names(names))
    }

    pub fn business_context(&self) -> StoreResult<Option<String>> {
        self.get(BUSINESS_CONTEXT_KEY)
    }

    pub fn set_business_context(&self, text: &str) -> StoreResult<()> {
        self.set(BUSINESS_CONTEXT_KEY, text.trim())
    }
}

impl CategorySink for ConfigStore {
    fn persist(&self, names: &[String]) -> Result<()> {
        self.save_categories(names).map_err(|e| {
            error!(error = %e, "failed to persist category list");
            anyhow::Error::new(e).context("persist categories")
        })?;
        Ok(())
    }
}
