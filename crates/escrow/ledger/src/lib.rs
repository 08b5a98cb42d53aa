//! Credit balance ledger.
//!
//! This crate provides:
//! - [`BalanceLedger`], the authoritative per-(resource, holder) store of total and
//!   locked balances, with lock/unlock/burn gated to one authority identity
//! - [`Journal`], an append-only blake3 hash chain of every committed mutation

#![deny(unsafe_code)]

pub mod journal;
pub mod ledger;

pub use journal::{Journal, JournalEntry, JournalEvent};
pub use ledger::{BalanceLedger, BalanceRecord, LedgerSnapshot, SupplyRecord};
