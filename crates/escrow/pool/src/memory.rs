use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use escrow_ledger::{Journal, JournalEvent};
use escrow_types::{
    validate_line_items, EscrowError, EscrowResult, GroupingKey, LineItem, Resource, ResourceId,
};
use tracing::info;

use crate::traits::ResourcePool;

/// In-memory resource table used for tests, the CLI, and embedding.
pub struct InMemoryResourcePool {
    resources: RwLock<BTreeMap<ResourceId, Resource>>,
    journal: Option<Arc<Journal>>,
}

impl InMemoryResourcePool {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            journal: None,
        }
    }

    pub fn with_journal(journal: Arc<Journal>) -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            journal: Some(journal),
        }
    }

    /// Rebuild the table from persisted rows.
    pub fn restore(resources: Vec<Resource>, journal: Option<Arc<Journal>>) -> EscrowResult<Self> {
        let mut table = BTreeMap::new();
        for resource in resources {
            resource.id.validate()?;
            resource.grouping_key.validate()?;
            if resource.remaining > resource.original {
                return Err(EscrowError::InvalidInput(format!(
                    "{} has remaining {} above original {}",
                    resource.id, resource.remaining, resource.original
                )));
            }
            let id = resource.id;
            if table.insert(id, resource).is_some() {
                return Err(EscrowError::DuplicateResource(id));
            }
        }
        Ok(Self {
            resources: RwLock::new(table),
            journal,
        })
    }

    /// Create a resource with its full capacity remaining.
    pub fn register(
        &self,
        id: ResourceId,
        grouping_key: GroupingKey,
        capacity: u64,
    ) -> EscrowResult<Resource> {
        id.validate()?;
        grouping_key.validate()?;

        let mut resources = self.resources.write().map_err(|_| EscrowError::LockPoisoned)?;
        if resources.contains_key(&id) {
            return Err(EscrowError::DuplicateResource(id));
        }

        let resource = Resource::new(id, grouping_key, capacity);
        if let Some(journal) = &self.journal {
            journal.append(JournalEvent::ResourceRegistered {
                resource: id,
                grouping_key: resource.grouping_key.clone(),
                capacity,
            })?;
        }
        resources.insert(id, resource.clone());

        info!(
            resource = %id,
            grouping_key = %resource.grouping_key,
            capacity,
            "Resource registered"
        );
        Ok(resource)
    }

    pub fn get(&self, id: ResourceId) -> EscrowResult<Resource> {
        let resources = self.resources.read().map_err(|_| EscrowError::LockPoisoned)?;
        resources
            .get(&id)
            .cloned()
            .ok_or(EscrowError::ResourceNotFound(id))
    }

    pub fn list(&self) -> EscrowResult<Vec<Resource>> {
        let resources = self.resources.read().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(resources.values().cloned().collect())
    }

    /// Resources registered under one grouping key.
    pub fn resources_in(&self, grouping_key: &GroupingKey) -> EscrowResult<Vec<Resource>> {
        let resources = self.resources.read().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(resources
            .values()
            .filter(|r| &r.grouping_key == grouping_key)
            .cloned()
            .collect())
    }
}

impl Default for InMemoryResourcePool {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourcePool for InMemoryResourcePool {
    fn grouping_key(&self, resource: ResourceId) -> EscrowResult<GroupingKey> {
        Ok(self.get(resource)?.grouping_key)
    }

    fn remaining(&self, resource: ResourceId) -> EscrowResult<u64> {
        Ok(self.get(resource)?.remaining)
    }

    fn decrement_remaining(&self, resource: ResourceId, amount: u64) -> EscrowResult<()> {
        self.decrement_all(&[LineItem::new(resource, amount)])
    }

    fn decrement_all(&self, items: &[LineItem]) -> EscrowResult<()> {
        validate_line_items(items)?;
        let mut resources = self.resources.write().map_err(|_| EscrowError::LockPoisoned)?;

        for item in items {
            let resource = resources
                .get(&item.resource)
                .ok_or(EscrowError::ResourceNotFound(item.resource))?;
            if item.amount > resource.remaining {
                return Err(EscrowError::InsufficientCapacity {
                    resource: item.resource,
                    requested: item.amount,
                    remaining: resource.remaining,
                });
            }
        }

        if let Some(journal) = &self.journal {
            journal.append_all(
                items
                    .iter()
                    .map(|item| JournalEvent::CapacityDecremented {
                        resource: item.resource,
                        amount: item.amount,
                    })
                    .collect(),
            )?;
        }

        for item in items {
            if let Some(resource) = resources.get_mut(&item.resource) {
                resource.remaining -= item.amount;
                info!(
                    resource = %item.resource,
                    amount = item.amount,
                    remaining = resource.remaining,
                    "Capacity decremented"
                );
            }
        }
        Ok(())
    }
}
