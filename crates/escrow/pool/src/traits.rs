use escrow_types::{EscrowResult, GroupingKey, LineItem, ResourceId};

/// Contract the application registry relies on for resource metadata and capacity.
///
/// Implementations must make [`ResourcePool::decrement_all`] atomic: either every
/// line item's capacity is decremented or none is, and an item that exceeds its
/// remaining capacity fails the whole batch with `InsufficientCapacity`.
pub trait ResourcePool: Send + Sync {
    /// Grouping key (catchment) the resource was created under.
    fn grouping_key(&self, resource: ResourceId) -> EscrowResult<GroupingKey>;

    /// Remaining issuable capacity.
    fn remaining(&self, resource: ResourceId) -> EscrowResult<u64>;

    /// Decrease remaining capacity by `amount`.
    fn decrement_remaining(&self, resource: ResourceId, amount: u64) -> EscrowResult<()>;

    /// Decrease capacity for every line item, or for none of them.
    fn decrement_all(&self, items: &[LineItem]) -> EscrowResult<()>;
}
