//! File-backed user table.
//!
//! The whole table lives in one pretty-printed JSON array and is rewritten
//! wholesale on every mutation. Two rules keep that survivable:
//!
//! - every read-modify-write sequence runs under a single async mutex, so
//!   concurrent registrations cannot both pass a uniqueness check and then
//!   clobber each other's rows (the lost-update race);
//! - writes land in a temp file first and are moved into place with a rename,
//!   so a crash mid-write never truncates the table.
//!
//! A missing file means an empty table. A file that exists but does not parse
//! is treated as empty too (with a warning) so a hand-edited table does not
//! take the whole service down; genuine I/O failures are surfaced as
//! [`StoreError`] instead of being masked.

use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

mod models;

pub use models::{Provider, UserRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read user table: {0}")]
    Read(#[source] io::Error),
    #[error("failed to write user table: {0}")]
    Write(#[source] io::Error),
    #[error("failed to encode user table: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Single-writer store over the JSON user table.
pub struct UserStore {
    path: PathBuf,
    // Serializes read-modify-write sequences; plain reads go around it.
    write_lock: Mutex<()>,
}

impl UserStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record. Missing file and corrupt JSON both yield an empty
    /// table; only real I/O failures are errors.
    pub async fn read_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::Read(err)),
        };

        match serde_json::from_slice::<Vec<UserRecord>>(&raw) {
            Ok(records) => Ok(records),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    "user table is not valid JSON, treating as empty: {err}"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Replace the entire table.
    pub async fn write_all(&self, records: &[UserRecord]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_locked(records).await
    }

    /// Run a read-modify-write sequence atomically with respect to other
    /// mutations. The closure gets the current table and may change it freely;
    /// the result is written back before the lock is released.
    pub async fn mutate<F, T>(&self, apply: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<UserRecord>) -> T,
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        let outcome = apply(&mut records);
        self.write_locked(&records).await?;
        Ok(outcome)
    }

    /// Stamp the record's last login. Missing ids are ignored.
    pub async fn touch_last_login(&self, id: Uuid) -> Result<(), StoreError> {
        self.mutate(|records| {
            if let Some(record) = records.iter_mut().find(|record| record.id == id) {
                record.last_login = Some(Utc::now());
            }
        })
        .await
    }

    async fn write_locked(&self, records: &[UserRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(StoreError::Write)?;
            }
        }

        let json = serde_json::to_vec_pretty(records)?;

        // Write-then-rename so a crash never leaves a half-written table.
        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, &json).await.map_err(StoreError::Write)?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(StoreError::Write)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut file_name = self.path.file_name().map_or_else(
            || std::ffi::OsString::from("users.json"),
            std::ffi::OsStr::to_os_string,
        );
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }
}

/// Locate a record by normalized identifier (username, email, or phone).
#[must_use]
pub fn find_by_identifier<'a>(
    records: &'a [UserRecord],
    identifier: &str,
) -> Option<&'a UserRecord> {
    records
        .iter()
        .find(|record| record.matches_identifier(identifier))
}
