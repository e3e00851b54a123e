//! tally-sync: the two remote expense sources, the serialized
//! configuration store, and the reconciler that ties them together.

pub mod config_store;
pub mod kv;
pub mod reconciler;
pub mod service;
pub mod store;

pub use config_store::{BUSINESS_CONTEXT_KEY, CATEGORIES_KEY, ConfigStore};
pub use kv::{FileKvStore, KeyValueStore, MemoryKvStore, StoreError, StoreResult};
pub use reconciler::{Reconciler, SourceError, SyncOutcome};
pub use service::{ExternalSource, ServiceClient};
pub use store::{RelationalSource, RestStore};
