use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

/// Guard held for the duration of one batch on one file
///
/// Dropping the last guard for a filename removes its entry from the table.
pub struct FileGuard<'a> {
    locks: &'a FileLocks,
    filename: String,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl FileGuard<'_> {
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl Drop for FileGuard<'_> {
    fn drop(&mut self) {
        // Release the file first so its Arc no longer counts as a holder
        drop(self.guard.take());
        self.locks.prune(&self.filename);
    }
}

impl std::fmt::Debug for FileGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileGuard")
            .field("filename", &self.filename)
            .finish()
    }
}

/// Table of per-filename locks
///
/// A batch assumes exclusive access to a file from read to write. Batches for
/// different files never wait on each other.
#[derive(Debug, Default)]
pub struct FileLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other batch holds `filename`, then claim it
    pub fn lock(&self, filename: &str) -> FileGuard<'_> {
        let entry = self.entry(filename);
        FileGuard {
            locks: self,
            filename: filename.to_string(),
            guard: Some(entry.lock_arc()),
        }
    }

    /// Claim `filename` only if no other batch holds it
    pub fn try_lock(&self, filename: &str) -> Option<FileGuard<'_>> {
        let entry = self.entry(filename);
        entry.try_lock_arc().map(|guard| FileGuard {
            locks: self,
            filename: filename.to_string(),
            guard: Some(guard),
        })
    }

    /// Number of filenames with a live entry
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }

    fn entry(&self, filename: &str) -> Arc<Mutex<()>> {
        // The table lock is released before waiting on the file lock
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(filename.to_string()).or_default())
    }

    /// Drop the entry for `filename` once only the table refers to it
    ///
    /// Entries are cloned under the table lock, so a count of one here means
    /// no guard holds or is waiting on the file.
    fn prune(&self, filename: &str) {
        let mut locks = self.locks.lock();
        if locks
            .get(filename)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(filename);
        }
    }
}
