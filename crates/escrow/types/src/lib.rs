//! Domain types for the credit escrow subsystem.
//!
//! Resources are fungible credit pools tagged with a grouping key (catchment).
//! Holders own per-resource balances split into free and locked portions, and
//! applications lock credits across several resources until a planning decision
//! burns or releases them.

#![deny(unsafe_code)]

pub mod error;
pub mod ids;
pub mod records;

pub use error::{EscrowError, EscrowResult};
pub use ids::{ApplicationId, CallerId, GroupingKey, HolderId, ResourceId};
pub use records::{
    validate_line_items, Application, ApplicationStatus, Balance, BalanceView, LineItem, Resource,
    Supply,
};
