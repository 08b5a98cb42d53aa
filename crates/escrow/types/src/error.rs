use thiserror::Error;

use crate::ids::{ApplicationId, CallerId, GroupingKey, HolderId, ResourceId};
use crate::records::ApplicationStatus;

/// Errors returned by the ledger, the resource pool and the application registry.
///
/// Every variant is a precondition failure: the call that produced it left all
/// balances, capacities and applications unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EscrowError {
    #[error("insufficient free balance of {resource} for {holder}: requested {requested}, free {available}")]
    InsufficientFreeBalance {
        resource: ResourceId,
        holder: HolderId,
        requested: u64,
        available: u64,
    },

    #[error("insufficient locked balance of {resource} for {holder}: requested {requested}, locked {available}")]
    InsufficientLockedBalance {
        resource: ResourceId,
        holder: HolderId,
        requested: u64,
        available: u64,
    },

    #[error("caller '{0}' is not the ledger authority")]
    Unauthorized(CallerId),

    #[error("{resource} belongs to grouping key '{actual}', application asserted '{expected}'")]
    GroupingKeyMismatch {
        resource: ResourceId,
        expected: GroupingKey,
        actual: GroupingKey,
    },

    #[error("application not found: {0}")]
    ApplicationNotFound(ApplicationId),

    #[error("{id} is {status:?}, not pending")]
    ApplicationNotPending {
        id: ApplicationId,
        status: ApplicationStatus,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(ResourceId),

    #[error("resource already registered: {0}")]
    DuplicateResource(ResourceId),

    #[error("insufficient remaining capacity of {resource}: requested {requested}, remaining {remaining}")]
    InsufficientCapacity {
        resource: ResourceId,
        requested: u64,
        remaining: u64,
    },

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    #[error("lock poisoned")]
    LockPoisoned,
}

pub type EscrowResult<T> = Result<T, EscrowError>;

impl EscrowError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EscrowError::InsufficientFreeBalance { .. } => "insufficient_free_balance",
            EscrowError::InsufficientLockedBalance { .. } => "insufficient_locked_balance",
            EscrowError::Unauthorized(_) => "unauthorized",
            EscrowError::GroupingKeyMismatch { .. } => "grouping_key_mismatch",
            EscrowError::ApplicationNotFound(_) => "application_not_found",
            EscrowError::ApplicationNotPending { .. } => "application_not_pending",
            EscrowError::InvalidInput(_) => "invalid_input",
            EscrowError::ResourceNotFound(_) => "resource_not_found",
            EscrowError::DuplicateResource(_) => "duplicate_resource",
            EscrowError::InsufficientCapacity { .. } => "insufficient_capacity",
            EscrowError::Overflow(_) => "overflow",
            EscrowError::LockPoisoned => "lock_poisoned",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_balance_error_display() {
        let err = EscrowError::InsufficientFreeBalance {
            resource: ResourceId::new(1),
            holder: HolderId::new("dev-1"),
            requested: 700,
            available: 600,
        };
        let s = err.to_string();
        assert!(s.contains("700"));
        assert!(s.contains("600"));
        assert!(s.contains("dev-1"));
        assert_eq!(err.kind(), "insufficient_free_balance");
    }

    #[test]
    fn mismatch_display_names_both_keys() {
        let err = EscrowError::GroupingKeyMismatch {
            resource: ResourceId::new(4),
            expected: GroupingKey::new("THAMES"),
            actual: GroupingKey::new("SOLENT"),
        };
        let s = err.to_string();
        assert!(s.contains("THAMES"));
        assert!(s.contains("SOLENT"));
    }
}
