//! Identifiers used across the escrow subsystem.

use serde::{Deserialize, Serialize};

use crate::error::{EscrowError, EscrowResult};

/// Identifier of a fungible credit pool (a "scheme").
///
/// Zero is reserved and never names a real resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl ResourceId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn validate(&self) -> EscrowResult<()> {
        if self.0 == 0 {
            return Err(EscrowError::InvalidInput(
                "resource id 0 is reserved".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "resource-{}", self.0)
    }
}

/// Account that owns balances of one or more resources.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HolderId(pub String);

impl HolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn validate(&self) -> EscrowResult<()> {
        if self.0.trim().is_empty() {
            return Err(EscrowError::InvalidInput(
                "holder id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for HolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity presented by whoever invokes a restricted ledger operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId(pub String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an escrow application. Assigned by the registry, starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub u64);

impl ApplicationId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "application-{}", self.0)
    }
}

/// Classification tag a resource is permanently assigned (a catchment name).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupingKey(pub String);

impl GroupingKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn validate(&self) -> EscrowResult<()> {
        if self.0.trim().is_empty() {
            return Err(EscrowError::InvalidInput(
                "grouping key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_resource_is_invalid() {
        assert!(ResourceId::new(0).validate().is_err());
        assert!(ResourceId::new(7).validate().is_ok());
    }

    #[test]
    fn blank_holder_is_invalid() {
        assert!(HolderId::new("   ").validate().is_err());
        assert!(HolderId::new("dev-1").validate().is_ok());
    }

    #[test]
    fn ids_serialize_transparently_enough() {
        let json = serde_json::to_string(&ResourceId::new(3)).unwrap();
        assert_eq!(json, "3");
        let key: GroupingKey = serde_json::from_str("\"SOLENT\"").unwrap();
        assert_eq!(key.as_str(), "SOLENT");
    }
}
