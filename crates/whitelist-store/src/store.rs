use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::record::WhitelistRecord;

/// File-backed whitelist of client identifiers.
///
/// Construct via [`WhitelistStore::open`], which creates or repairs the
/// record on disk. Every public operation takes the store lock for its full
/// read-modify-write, so a single instance can be shared (behind an `Arc`)
/// between any number of flows and admin commands.
pub struct WhitelistStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl std::fmt::Debug for WhitelistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhitelistStore")
            .field("path", &self.path)
            .finish()
    }
}

impl WhitelistStore {
    /// Open the whitelist record at `path`.
    ///
    /// * A missing record (and any missing parent directory) is created empty.
    /// * A record whose structure is invalid is reset to an empty whitelist
    ///   instead of failing startup.
    /// * Untrimmed or duplicate entries are normalised and written back.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        };

        if let Some(parent) = store.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
            }
        }

        if !store.path.exists() {
            info!(path = %store.path.display(), "whitelist record not found; creating empty");
            store.write_record(&WhitelistRecord::default())?;
            return Ok(store);
        }

        match store.read_record() {
            Ok(mut record) => {
                if record.normalize() {
                    warn!(
                        path = %store.path.display(),
                        "whitelist record contained duplicate or untrimmed entries; rewriting"
                    );
                    store.write_record(&record)?;
                }
                info!(
                    path = %store.path.display(),
                    entries = record.whitelist_uid.len(),
                    "whitelist record loaded"
                );
            }
            Err(err) if err.is_corrupt() => {
                warn!(
                    path = %store.path.display(),
                    %err,
                    "whitelist record is corrupt; resetting to an empty whitelist"
                );
                store.write_record(&WhitelistRecord::default())?;
            }
            Err(err) => return Err(err),
        }

        Ok(store)
    }

    /// Location of the persisted record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an entry equal to `uid` after trimming is present.
    pub fn exists(&self, uid: &str) -> Result<bool, StoreError> {
        let _guard = self.guard()?;
        let record = self.read_record()?;
        Ok(record.contains(uid))
    }

    /// Insert `uid` if absent. Returns `true` if it was inserted and `false`
    /// if it was already present.
    pub fn add(&self, uid: &str) -> Result<bool, StoreError> {
        let uid = uid.trim();
        if uid.is_empty() {
            return Err(StoreError::EmptyIdentifier);
        }

        let _guard = self.guard()?;
        let mut record = self.read_record()?;

        if record.contains(uid) {
            debug!(uid, "uid already whitelisted");
            return Ok(false);
        }

        record.whitelist_uid.push(uid.to_string());
        self.write_record(&record)?;

        info!(uid, entries = record.whitelist_uid.len(), "uid added to whitelist");
        Ok(true)
    }

    /// Delete `uid` if present. Returns `true` if it was removed and `false`
    /// if it was absent.
    pub fn remove(&self, uid: &str) -> Result<bool, StoreError> {
        let uid = uid.trim();

        let _guard = self.guard()?;
        let mut record = self.read_record()?;

        let before = record.whitelist_uid.len();
        record.whitelist_uid.retain(|u| u.trim() != uid);

        if record.whitelist_uid.len() == before {
            debug!(uid, "uid not in whitelist; nothing to remove");
            return Ok(false);
        }

        self.write_record(&record)?;

        info!(uid, entries = record.whitelist_uid.len(), "uid removed from whitelist");
        Ok(true)
    }

    /// Snapshot of the whitelist in file order.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.guard()?;
        Ok(self.read_record()?.whitelist_uid)
    }

    // -- Internals ------------------------------------------------------------

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.lock.lock().map_err(|_| StoreError::Poisoned)
    }

    fn read_record(&self) -> Result<WhitelistRecord, StoreError> {
        let contents = fs::read_to_string(&self.path).map_err(StoreError::Read)?;
        WhitelistRecord::parse(&contents).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Write the full record to a sibling temp file, then rename it over the
    /// record so readers never observe a partial write.
    fn write_record(&self, record: &WhitelistRecord) -> Result<(), StoreError> {
        let bytes = record.to_pretty_json()?;

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        let mut file = fs::File::create(&tmp_path).map_err(StoreError::Write)?;
        file.write_all(&bytes).map_err(StoreError::Write)?;
        file.sync_all().map_err(StoreError::Write)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(StoreError::Write)
    }
}
