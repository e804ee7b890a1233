//! Flat-file persistence for the reminder store.
//!
//! The whole store is written as one JSON document after every mutation.
//! Writes go to a sibling temp file first and are renamed into place.

use chrono::Local;
use deadline_types::ReminderStore;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum DbError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Io(e) => write!(f, "I/O error: {}", e),
            DbError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for DbError {}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        DbError::Io(e)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Json(e)
    }
}

pub struct ReminderDb {
    path: PathBuf,
}

impl ReminderDb {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store. A missing file is an empty store; so is a corrupt
    /// one, after logging what went wrong and moving it aside so the next
    /// save cannot overwrite it.
    pub fn load(&self) -> ReminderStore {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No reminder file at {}, starting empty", self.path.display());
                return ReminderStore::new();
            }
            Err(e) => {
                log::error!("Failed to read reminders from {}: {}", self.path.display(), e);
                self.quarantine();
                return ReminderStore::new();
            }
        };

        match ReminderStore::from_json(&text) {
            Ok(store) => {
                log::info!(
                    "Loaded {} reminder(s) from {}",
                    store.event_count(),
                    self.path.display()
                );
                store
            }
            Err(e) => {
                log::error!(
                    "Reminder file {} is corrupt, starting empty: {}",
                    self.path.display(),
                    e
                );
                self.quarantine();
                ReminderStore::new()
            }
        }
    }

    /// Rename an unreadable store file to `<path>.corrupt-<timestamp>`
    fn quarantine(&self) {
        let mut target = self.path.clone().into_os_string();
        target.push(format!(".corrupt-{}", Local::now().format("%Y%m%d%H%M%S")));
        let target = PathBuf::from(target);

        match std::fs::rename(&self.path, &target) {
            Ok(()) => log::warn!(
                "Moved unreadable reminder file to {}",
                target.display()
            ),
            Err(e) => log::error!(
                "Failed to move unreadable reminder file {} aside: {}",
                self.path.display(),
                e
            ),
        }
    }

    /// Write a full snapshot of the store
    pub fn save(&self, store: &ReminderStore) -> Result<(), DbError> {
        let json = store.to_json()?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
