//! Process-level wiring for ystore.
//!
//! # Modules
//!
//! - `selector` - Picks, connects and provisions the storage backend
//! - `delivery` - Sends merged state to the update callback
//! - `worker` - Task loop tying storage, delivery and compaction together
//! - `error` - Startup errors

pub mod delivery;
pub mod error;
pub mod selector;
pub mod worker;

pub use delivery::{DeliveryError, DeliveryOutcome, UpdateCallback};
pub use error::StartupError;
pub use selector::{BackendChoice, Storage, open_storage};
pub use worker::{Worker, WorkerTask, compaction_policy, task_queue};
