//! Escrow application registry.
//!
//! An application locks credits of several resources against one submitter in a
//! single all-or-nothing step, then resolves exactly once:
//!
//! - **approve** burns the locked credits and consumes each resource's remaining
//!   issuable capacity
//! - **reject** returns the locked credits to the submitter's free balance
//!
//! The submitter recorded at submission is the only holder ever touched while
//! resolving; approve and reject take no holder parameter.

#![deny(unsafe_code)]

pub mod registry;

pub use registry::{ApplicationFilter, ApplicationRegistry, RegistrySnapshot};
