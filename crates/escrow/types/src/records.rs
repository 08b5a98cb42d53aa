//! Records owned by the ledger, the pool and the registry.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{EscrowError, EscrowResult};
use crate::ids::{ApplicationId, GroupingKey, HolderId, ResourceId};

/// A fungible credit pool and its issuable capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    /// Immutable after creation.
    pub grouping_key: GroupingKey,
    pub original: u64,
    /// Never exceeds `original`, never increases.
    pub remaining: u64,
}

impl Resource {
    pub fn new(id: ResourceId, grouping_key: GroupingKey, capacity: u64) -> Self {
        Self {
            id,
            grouping_key,
            original: capacity,
            remaining: capacity,
        }
    }

    /// Capacity consumed by approved applications so far.
    pub fn consumed(&self) -> u64 {
        self.original - self.remaining
    }
}

/// Total and locked quantity for one (resource, holder) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total: u64,
    pub locked: u64,
}

impl Balance {
    /// Portion of the balance that may be transferred or locked.
    pub fn free(&self) -> u64 {
        self.total - self.locked
    }

    pub fn is_zero(&self) -> bool {
        self.total == 0 && self.locked == 0
    }
}

/// Read-side projection of a balance, including the derived free amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub resource: ResourceId,
    pub holder: HolderId,
    pub total: u64,
    pub locked: u64,
    pub free: u64,
}

impl BalanceView {
    pub fn new(resource: ResourceId, holder: HolderId, balance: Balance) -> Self {
        Self {
            resource,
            holder,
            total: balance.total,
            locked: balance.locked,
            free: balance.free(),
        }
    }
}

/// Cumulative issuance accounting for one resource.
///
/// `outstanding == credited - burned` and equals the sum of every holder's total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supply {
    pub credited: u64,
    pub burned: u64,
}

impl Supply {
    pub fn outstanding(&self) -> u64 {
        self.credited - self.burned
    }
}

/// One (resource, amount) pair of an application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub resource: ResourceId,
    pub amount: u64,
}

impl LineItem {
    pub fn new(resource: ResourceId, amount: u64) -> Self {
        Self { resource, amount }
    }
}

/// Reject empty lists, zero amounts, reserved ids and repeated resources.
pub fn validate_line_items(items: &[LineItem]) -> EscrowResult<()> {
    if items.is_empty() {
        return Err(EscrowError::InvalidInput(
            "an application needs at least one line item".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        item.resource.validate()?;
        if item.amount == 0 {
            return Err(EscrowError::InvalidInput(format!(
                "line item for {} has a zero amount",
                item.resource
            )));
        }
        if !seen.insert(item.resource) {
            return Err(EscrowError::InvalidInput(format!(
                "{} appears more than once",
                item.resource
            )));
        }
    }
    Ok(())
}

/// Lifecycle of an application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(EscrowError::InvalidInput(format!(
                "unknown application status '{}'",
                other
            ))),
        }
    }
}

/// An escrow request: line items locked against one submitter until resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub submitter: HolderId,
    pub grouping_key: GroupingKey,
    pub line_items: Vec<LineItem>,
    pub status: ApplicationStatus,
}

impl Application {
    pub fn is_pending(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }

    pub fn total_amount(&self) -> u64 {
        self.line_items.iter().map(|item| item.amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_is_total_minus_locked() {
        let balance = Balance {
            total: 1000,
            locked: 400,
        };
        assert_eq!(balance.free(), 600);
        assert!(!balance.is_zero());
    }

    #[test]
    fn empty_line_items_rejected() {
        let err = validate_line_items(&[]).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn zero_amount_rejected() {
        let items = vec![LineItem::new(ResourceId::new(1), 0)];
        assert!(matches!(
            validate_line_items(&items),
            Err(EscrowError::InvalidInput(_))
        ));
    }

    #[test]
    fn duplicate_resource_rejected() {
        let items = vec![
            LineItem::new(ResourceId::new(1), 10),
            LineItem::new(ResourceId::new(2), 5),
            LineItem::new(ResourceId::new(1), 3),
        ];
        let err = validate_line_items(&items).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            "APPROVED".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::Approved
        );
        assert!("cancelled".parse::<ApplicationStatus>().is_err());
        assert!(ApplicationStatus::Rejected.is_terminal());
        assert!(!ApplicationStatus::Pending.is_terminal());
    }

    #[test]
    fn resource_tracks_consumption() {
        let mut resource = Resource::new(ResourceId::new(1), GroupingKey::new("SOLENT"), 5000);
        resource.remaining = 4600;
        assert_eq!(resource.consumed(), 400);
    }
}
