use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assess_proto::RunRecord;
use directories::ProjectDirs;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::{merge, RunStore, MAX_RUNS, STORAGE_KEY};

/// Run store persisted as one JSON array in a single file.
///
/// Every operation re-reads the file, so several handles on the same path
/// observe each other's writes. The mutex makes read-merge-write one step for
/// all callers sharing this handle.
pub struct FileRunStore {
    path: PathBuf,
    cap: usize,
    lock: Mutex<()>,
}

impl FileRunStore {
    pub fn open(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            cap: MAX_RUNS,
            lock: Mutex::new(()),
        })
    }

    /// `<data dir>/assess/assess_runs.json` for the current user.
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let dirs = ProjectDirs::from("", "", "assess").ok_or(StoreError::NoDataDir)?;
        Ok(dirs.data_dir().join(format!("{STORAGE_KEY}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Vec<RunRecord> {
        match self.try_read() {
            Ok(runs) => runs,
            Err(err) => {
                warn!(
                    target: "assess::store",
                    path = %self.path.display(),
                    error = %err,
                    "run store unreadable; treating as empty"
                );
                Vec::new()
            }
        }
    }

    fn try_read(&self) -> Result<Vec<RunRecord>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write(&self, runs: &[RunRecord]) {
        if let Err(err) = self.try_write(runs) {
            warn!(
                target: "assess::store",
                path = %self.path.display(),
                error = %err,
                "failed to persist runs"
            );
        }
    }

    fn try_write(&self, runs: &[RunRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }
        let serialized = serde_json::to_vec(runs)?;

        let tmp = self.path.with_extension("json.tmp");
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp).map_err(|err| StoreError::io(&tmp, err))?;
        file.write_all(&serialized)
            .and_then(|_| file.sync_all())
            .map_err(|err| StoreError::io(&tmp, err))?;
        fs::rename(&tmp, &self.path).map_err(|err| StoreError::io(&self.path, err))?;
        debug!(target: "assess::store", runs = runs.len(), "persisted runs");
        Ok(())
    }
}

impl RunStore for FileRunStore {
    fn list(&self) -> Vec<RunRecord> {
        let _guard = self.lock.lock();
        self.read()
    }

    fn upsert(&self, record: RunRecord) {
        let _guard = self.lock.lock();
        let mut runs = self.read();
        merge::upsert_into(&mut runs, record, self.cap);
        self.write(&runs);
    }

    fn clear(&self) {
        let _guard = self.lock.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                target: "assess::store",
                path = %self.path.display(),
                error = %err,
                "failed to clear run store"
            ),
        }
    }
}
