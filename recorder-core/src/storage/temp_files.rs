use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::models::error::RecorderError;

const FILE_PREFIX: &str = "recording_";
const FILE_EXTENSION: &str = "rec";

/// Allocates and removes per-recording files in the cache directory.
///
/// Deletions that fail are remembered and retried by `sweep_leaked`.
pub struct TempFileStore {
    dir: PathBuf,
    leaked: Mutex<Vec<PathBuf>>,
}

impl TempFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            leaked: Mutex::new(Vec::new()),
        }
    }

    /// Create a new, empty, uniquely named file, creating the directory if needed.
    pub fn allocate(&self) -> Result<PathBuf, RecorderError> {
        fs::create_dir_all(&self.dir).map_err(|e| RecorderError::storage_io("failed to create cache directory", e))?;

        let path = self
            .dir
            .join(format!("{}{}.{}", FILE_PREFIX, uuid::Uuid::new_v4().simple(), FILE_EXTENSION));
        File::options()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| RecorderError::storage_io("failed to create temp file", e))?;
        Ok(path)
    }

    /// Delete `path` if present. A failure is logged and recorded, never returned.
    pub fn discard(&self, path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                log::warn!(
                    "{}",
                    RecorderError::ResourceReleaseFailure(format!("could not delete {}: {}", path.display(), e))
                );
                self.leaked.lock().push(path.to_path_buf());
                false
            }
        }
    }

    /// Retry deletion of previously leaked files. Returns how many remain.
    pub fn sweep_leaked(&self) -> usize {
        let pending = std::mem::take(&mut *self.leaked.lock());
        if pending.is_empty() {
            return 0;
        }
        let mut remaining = Vec::new();
        for path in pending {
            match fs::remove_file(&path) {
                Ok(()) => log::debug!("Removed leaked recording {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(_) => remaining.push(path),
            }
        }
        let count = remaining.len();
        self.leaked.lock().extend(remaining);
        count
    }

    pub fn leaked(&self) -> Vec<PathBuf> {
        self.leaked.lock().clone()
    }
}
