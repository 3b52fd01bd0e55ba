//! Local durable store of assessment runs.
//!
//! Records are merged by logical identity (display name, falling back to the
//! job id) rather than by connection, kept newest-first and capped at
//! [`MAX_RUNS`]. Storage problems never surface to callers: unreadable data
//! reads as an empty store and failed writes are logged.

mod error;
mod file;
mod memory;
pub mod merge;

use assess_proto::RunRecord;

pub use error::StoreError;
pub use file::FileRunStore;
pub use memory::MemoryRunStore;

/// Well-known key the serialized run list lives under.
pub const STORAGE_KEY: &str = "assess_runs";

/// Maximum number of runs retained after every write.
pub const MAX_RUNS: usize = 100;

pub trait RunStore: Send + Sync {
    /// All stored runs, newest first.
    fn list(&self) -> Vec<RunRecord>;

    /// First run per identity key in current order. Does not touch storage.
    fn list_dedup(&self) -> Vec<RunRecord> {
        merge::dedup_by_identity(self.list())
    }

    fn upsert(&self, record: RunRecord);

    fn clear(&self);
}
