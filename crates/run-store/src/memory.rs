use std::sync::Arc;

use assess_proto::RunRecord;
use parking_lot::Mutex;

use crate::{merge, RunStore, MAX_RUNS};

/// In-memory backend for tests and ephemeral sessions.
pub struct MemoryRunStore {
    runs: Mutex<Vec<RunRecord>>,
    cap: usize,
}

impl MemoryRunStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_capacity(MAX_RUNS))
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            runs: Mutex::new(Vec::new()),
            cap,
        }
    }
}

impl Default for MemoryRunStore {
    fn default() -> Self {
        Self::with_capacity(MAX_RUNS)
    }
}

impl RunStore for MemoryRunStore {
    fn list(&self) -> Vec<RunRecord> {
        self.runs.lock().clone()
    }

    fn upsert(&self, record: RunRecord) {
        let mut guard = self.runs.lock();
        merge::upsert_into(&mut guard, record, self.cap);
    }

    fn clear(&self) {
        self.runs.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(job: &str, name: Option<&str>) -> RunRecord {
        RunRecord {
            job_id: job.into(),
            created_at: 0,
            student_name: name.map(str::to_owned),
            progress: Vec::new(),
            summary: None,
        }
    }

    #[test]
    fn upserts_and_lists() {
        let store = MemoryRunStore::new();
        store.upsert(run("1", Some("A")));
        store.upsert(run("2", Some("A")));
        store.upsert(run("3", Some("B")));
        let jobs: Vec<String> = store.list().into_iter().map(|r| r.job_id).collect();
        assert_eq!(jobs, vec!["3", "2"]);
        store.clear();
        assert!(store.list().is_empty());
        assert!(store.list_dedup().is_empty());
    }
}
