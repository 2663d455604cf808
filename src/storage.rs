//! Snapshot persistence for the raffle aggregate
//!
//! The whole `Raffle` is written as one JSON document. Writes go to a
//! sibling temp file first and are renamed into place, so a crash mid-write
//! leaves the previous snapshot intact.

use crate::errors::{AppResult, StorageError};
use crate::raffle::{Raffle, RaffleState};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, raffle: &Raffle) -> AppResult<()> {
        let json = serde_json::to_vec_pretty(raffle)
            .map_err(|e| StorageError::WriteFailed(format!("Failed to serialize raffle: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::WriteFailed(format!("{}: {}", parent.display(), e)))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StorageError::WriteFailed(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| StorageError::WriteFailed(format!("{}: {}", self.path.display(), e)))?;

        info!(
            path = %self.path.display(),
            round = raffle.round(),
            players = raffle.participant_count(),
            "Raffle snapshot saved"
        );
        Ok(())
    }

    /// Load the stored aggregate, or `None` if nothing has been saved yet
    pub fn load(&self) -> AppResult<Option<Raffle>> {
        if !self.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path)
            .map_err(|e| StorageError::ReadFailed(format!("{}: {}", self.path.display(), e)))?;
        let raffle: Raffle = serde_json::from_slice(&bytes)?;
        raffle.config().validate()?;

        // Settling exactly when a request is outstanding
        match (raffle.state(), raffle.outstanding_request()) {
            (RaffleState::Open, None) | (RaffleState::Settling, Some(_)) => {}
            (state, pending) => {
                return Err(StorageError::CorruptedData(format!(
                    "{}: state {} with outstanding request {:?}",
                    self.path.display(),
                    state,
                    pending.map(|p| p.request_id)
                ))
                .into())
            }
        }

        info!(
            path = %self.path.display(),
            round = raffle.round(),
            state = %raffle.state(),
            "Raffle snapshot restored"
        );
        Ok(Some(raffle))
    }
}
