//! Versioned storage of survey waves.
//!
//! Each survey identity owns one schema and a gap-free sequence of waves
//! numbered by `load_counter` from 0. The [`LoadCoordinator`] decides
//! whether a run starts a history, appends to it, or aborts on schema
//! drift, and commits through a [`SurveyStore`] in one precondition-checked
//! write.

mod coordinator;
mod error;
mod file;
mod store;
mod types;

// === Errors ===
pub use error::{LoadError, StoreError};

// === Stores ===
pub use file::{FileStore, LOCK_FILE, MANIFEST_FILE, WAVES_DIR};
pub use store::{MemoryStore, SurveyStore};
pub use types::{Precondition, SurveyId, WaveRecord, WriteRequest};

// === Coordination ===
pub use coordinator::{
    DEFAULT_COMMIT_ATTEMPTS, LoadCoordinator, LoadOutcome, LoadPlan, LoadState,
};
