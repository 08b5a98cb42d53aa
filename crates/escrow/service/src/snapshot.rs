//! Versioned on-disk state.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use escrow_ledger::{JournalEntry, LedgerSnapshot};
use escrow_registry::RegistrySnapshot;
use escrow_types::Resource;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

pub const SCHEMA_VERSION: u32 = 1;

/// Everything needed to rebuild the pool, ledger, registry and journal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub schema_version: u32,
    pub authority: String,
    pub saved_at: DateTime<Utc>,
    pub resources: Vec<Resource>,
    pub ledger: LedgerSnapshot,
    pub registry: RegistrySnapshot,
    pub journal: Vec<JournalEntry>,
}

impl StateSnapshot {
    pub fn read_from(path: &Path) -> ServiceResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ServiceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let snapshot: StateSnapshot = serde_json::from_str(&raw)?;
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(ServiceError::SchemaVersion {
                found: snapshot.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// Write through a sibling temp file so a crash never leaves a truncated snapshot.
    pub fn write_to(&self, path: &Path, pretty: bool) -> ServiceResult<()> {
        let body = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };

        let io_err = |source| ServiceError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}
