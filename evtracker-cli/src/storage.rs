use chrono::{DateTime, Utc};
use evtracker_core::storage::{selected_machine_key, session_key, totals_key};
use evtracker_core::{CumulativeTotals, SessionState, TrackerStorage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileStorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode record `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk wrapper around every stored value.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record<T> {
    saved_at: DateTime<Utc>,
    value: T,
}

/// Key/value store with one pretty-printed JSON file per key.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), FileStorageError> {
        let record = Record {
            saved_at: Utc::now(),
            value,
        };
        let payload =
            serde_json::to_vec_pretty(&record).map_err(|source| FileStorageError::Encode {
                key: key.to_string(),
                source,
            })?;
        fs::create_dir_all(&self.root).map_err(|source| FileStorageError::Io {
            path: self.root.clone(),
            source,
        })?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload)
            .and_then(|()| fs::rename(&staging, &path))
            .map_err(|source| FileStorageError::Io { path, source })
    }

    /// Missing files read as absent; so do corrupt ones, with a warning.
    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, FileStorageError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(FileStorageError::Io { path, source }),
        };
        match serde_json::from_slice::<Record<T>>(&bytes) {
            Ok(record) => {
                log::debug!("loaded `{key}` saved at {}", record.saved_at);
                Ok(Some(record.value))
            }
            Err(err) => {
                log::warn!("ignoring unreadable record {}: {err}", path.display());
                Ok(None)
            }
        }
    }

    fn remove(&self, key: &str) -> Result<(), FileStorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(FileStorageError::Io { path, source }),
        }
    }
}

impl TrackerStorage for FileStorage {
    type Error = FileStorageError;

    fn load_totals(&self, machine_id: &str) -> Result<Option<CumulativeTotals>, Self::Error> {
        self.read(&totals_key(machine_id))
    }

    fn save_totals(&self, machine_id: &str, totals: &CumulativeTotals) -> Result<(), Self::Error> {
        self.write(&totals_key(machine_id), totals)
    }

    fn load_session(&self, machine_id: &str) -> Result<Option<SessionState>, Self::Error> {
        self.read(&session_key(machine_id))
    }

    fn save_session(&self, machine_id: &str, session: &SessionState) -> Result<(), Self::Error> {
        self.write(&session_key(machine_id), session)
    }

    fn clear_session(&self, machine_id: &str) -> Result<(), Self::Error> {
        self.remove(&session_key(machine_id))
    }

    fn load_selected_machine(&self) -> Result<Option<String>, Self::Error> {
        self.read(selected_machine_key())
    }

    fn save_selected_machine(&self, machine_id: &str) -> Result<(), Self::Error> {
        self.write(selected_machine_key(), &machine_id)
    }
}
