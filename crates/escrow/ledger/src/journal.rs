use std::sync::Mutex;

use chrono::{DateTime, Utc};
use escrow_types::{
    ApplicationId, EscrowError, EscrowResult, GroupingKey, HolderId, LineItem, ResourceId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Committed state transition recorded in the journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalEvent {
    ResourceRegistered {
        resource: ResourceId,
        grouping_key: GroupingKey,
        capacity: u64,
    },
    Credited {
        resource: ResourceId,
        holder: HolderId,
        amount: u64,
    },
    Transferred {
        resource: ResourceId,
        from: HolderId,
        to: HolderId,
        amount: u64,
    },
    Locked {
        resource: ResourceId,
        holder: HolderId,
        amount: u64,
    },
    Unlocked {
        resource: ResourceId,
        holder: HolderId,
        amount: u64,
    },
    Burned {
        resource: ResourceId,
        holder: HolderId,
        amount: u64,
    },
    CapacityDecremented {
        resource: ResourceId,
        amount: u64,
    },
    ApplicationSubmitted {
        application: ApplicationId,
        submitter: HolderId,
        grouping_key: GroupingKey,
        line_items: Vec<LineItem>,
    },
    ApplicationApproved {
        application: ApplicationId,
    },
    ApplicationRejected {
        application: ApplicationId,
    },
}

/// Hash-chained journal entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    pub entry_id: String,
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub event: JournalEvent,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

/// Append-only journal of every committed ledger, pool and registry mutation.
///
/// No in-place mutation APIs are exposed; each entry commits to its predecessor's
/// hash so any rewrite of history is detected by [`Journal::verify_chain`].
#[derive(Debug, Default)]
pub struct Journal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a journal from persisted entries and verify hash-chain integrity.
    pub fn from_entries(entries: Vec<JournalEntry>) -> EscrowResult<Self> {
        for (expected_index, entry) in entries.iter().enumerate() {
            if entry.index != expected_index as u64 {
                return Err(EscrowError::InvalidInput(format!(
                    "journal index gap at position {} (found {})",
                    expected_index, entry.index
                )));
            }
        }

        if !chain_is_valid(&entries) {
            return Err(EscrowError::InvalidInput(
                "persisted journal hash-chain verification failed".to_string(),
            ));
        }

        Ok(Self {
            entries: Mutex::new(entries),
        })
    }

    pub fn append(&self, event: JournalEvent) -> EscrowResult<JournalEntry> {
        let mut appended = self.append_all(vec![event])?;
        appended.pop().ok_or(EscrowError::LockPoisoned)
    }

    /// Append several events under one journal lock so they stay contiguous.
    pub fn append_all(&self, events: Vec<JournalEvent>) -> EscrowResult<Vec<JournalEntry>> {
        let mut entries = self.entries.lock().map_err(|_| EscrowError::LockPoisoned)?;
        let mut appended = Vec::with_capacity(events.len());
        for event in events {
            let entry = build_entry(&entries, event);
            entries.push(entry.clone());
            appended.push(entry);
        }
        Ok(appended)
    }

    pub fn entries(&self) -> EscrowResult<Vec<JournalEntry>> {
        let entries = self.entries.lock().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(entries.clone())
    }

    pub fn len(&self) -> EscrowResult<usize> {
        let entries = self.entries.lock().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> EscrowResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn head_hash(&self) -> EscrowResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(entries.last().map(|entry| entry.entry_hash.clone()))
    }

    /// Recompute every entry hash. `Ok(false)` means the chain was tampered with.
    pub fn verify_chain(&self) -> EscrowResult<bool> {
        let entries = self.entries.lock().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(chain_is_valid(&entries))
    }
}

fn build_entry(entries: &[JournalEntry], event: JournalEvent) -> JournalEntry {
    let index = entries.len() as u64;
    let timestamp = Utc::now();
    let previous_hash = entries.last().map(|entry| entry.entry_hash.clone());
    let entry_hash = compute_entry_hash(index, timestamp, &event, previous_hash.as_deref());

    JournalEntry {
        entry_id: Uuid::new_v4().to_string(),
        index,
        timestamp,
        event,
        previous_hash,
        entry_hash,
    }
}

fn chain_is_valid(entries: &[JournalEntry]) -> bool {
    let mut previous_hash: Option<String> = None;
    for entry in entries {
        let expected_hash = compute_entry_hash(
            entry.index,
            entry.timestamp,
            &entry.event,
            previous_hash.as_deref(),
        );
        if entry.entry_hash != expected_hash || entry.previous_hash != previous_hash {
            return false;
        }
        previous_hash = Some(entry.entry_hash.clone());
    }
    true
}

fn compute_entry_hash(
    index: u64,
    timestamp: DateTime<Utc>,
    event: &JournalEvent,
    previous_hash: Option<&str>,
) -> String {
    let material = serde_json::json!({
        "index": index,
        "timestamp": timestamp,
        "event": event,
        "previous_hash": previous_hash,
    });

    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credited(amount: u64) -> JournalEvent {
        JournalEvent::Credited {
            resource: ResourceId::new(1),
            holder: HolderId::new("dev-1"),
            amount,
        }
    }

    #[test]
    fn verifies_hash_chain() {
        let journal = Journal::new();
        journal.append(credited(100)).unwrap();
        journal
            .append_all(vec![credited(5), credited(7)])
            .unwrap();

        assert_eq!(journal.len().unwrap(), 3);
        assert!(journal.verify_chain().unwrap());
        assert_eq!(journal.head_hash().unwrap(), Some(journal.entries().unwrap()[2].entry_hash.clone()));

        let entries = journal.entries().unwrap();
        assert_eq!(entries[2].previous_hash.as_deref(), Some(entries[1].entry_hash.as_str()));
    }

    #[test]
    fn detects_tampered_entries() {
        let journal = Journal::new();
        journal.append(credited(100)).unwrap();
        journal.append(credited(200)).unwrap();

        let mut entries = journal.entries().unwrap();
        entries[0].event = credited(1_000_000);

        assert!(Journal::from_entries(entries).is_err());
    }

    #[test]
    fn rejects_index_gaps() {
        let journal = Journal::new();
        journal.append(credited(1)).unwrap();
        journal.append(credited(2)).unwrap();

        let mut entries = journal.entries().unwrap();
        entries.remove(0);

        let err = Journal::from_entries(entries).unwrap_err();
        assert!(err.to_string().contains("index gap"));
    }

    #[test]
    fn restored_journal_keeps_chaining() {
        let journal = Journal::new();
        journal.append(credited(1)).unwrap();
        let restored = Journal::from_entries(journal.entries().unwrap()).unwrap();
        restored.append(credited(2)).unwrap();
        assert!(restored.verify_chain().unwrap());
        assert_eq!(restored.len().unwrap(), 2);
    }

    #[test]
    fn poisoned_lock_is_reported_by_every_accessor() {
        let journal = std::sync::Arc::new(Journal::new());
        journal.append(credited(1)).unwrap();

        let poisoner = journal.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.entries.lock().unwrap();
            panic!("poison the journal lock");
        })
        .join();

        assert!(matches!(journal.len(), Err(EscrowError::LockPoisoned)));
        assert!(matches!(journal.is_empty(), Err(EscrowError::LockPoisoned)));
        assert!(matches!(journal.head_hash(), Err(EscrowError::LockPoisoned)));
        assert!(matches!(journal.verify_chain(), Err(EscrowError::LockPoisoned)));
        assert!(matches!(journal.entries(), Err(EscrowError::LockPoisoned)));
    }
}
