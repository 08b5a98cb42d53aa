//! Escrow service wiring.
//!
//! Loads [`EscrowConfig`], builds the resource pool, balance ledger and
//! application registry around one shared journal, and persists the whole
//! state as a versioned JSON [`StateSnapshot`].

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod service;
pub mod snapshot;
pub mod telemetry;

pub use config::{EscrowConfig, GenesisConfig, GenesisCredit, GenesisResource, LoggingConfig, StateConfig};
pub use error::{ServiceError, ServiceResult};
pub use service::EscrowService;
pub use snapshot::{StateSnapshot, SCHEMA_VERSION};
pub use telemetry::init_tracing;
