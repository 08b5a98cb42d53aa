use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use escrow_ledger::{BalanceLedger, Journal, JournalEntry};
use escrow_pool::{InMemoryResourcePool, ResourcePool};
use escrow_registry::{ApplicationFilter, ApplicationRegistry};
use escrow_types::{
    Application, ApplicationId, BalanceView, CallerId, GroupingKey, HolderId, LineItem, Resource,
    ResourceId, Supply,
};
use tracing::{info, warn};

use crate::config::EscrowConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::snapshot::{StateSnapshot, SCHEMA_VERSION};

/// Wires the pool, ledger and registry around one shared journal.
pub struct EscrowService {
    config: EscrowConfig,
    journal: Arc<Journal>,
    ledger: Arc<BalanceLedger>,
    pool: Arc<InMemoryResourcePool>,
    registry: ApplicationRegistry,
}

impl EscrowService {
    /// Fresh state seeded from the configured genesis.
    pub fn from_config(config: EscrowConfig) -> ServiceResult<Self> {
        let authority = CallerId::new(config.authority.clone());
        let journal = Arc::new(Journal::new());
        let ledger = Arc::new(BalanceLedger::with_journal(authority.clone(), journal.clone()));
        let pool = Arc::new(InMemoryResourcePool::with_journal(journal.clone()));
        let registry = ApplicationRegistry::new(authority, ledger.clone(), pool.clone());

        for seed in &config.genesis.resources {
            pool.register(
                ResourceId(seed.id),
                GroupingKey::new(seed.grouping_key.clone()),
                seed.capacity,
            )?;
        }
        for seed in &config.genesis.credits {
            ledger.credit(ResourceId(seed.resource), &HolderId::new(seed.holder.clone()), seed.amount)?;
        }

        info!(
            authority = %config.authority,
            resources = config.genesis.resources.len(),
            credits = config.genesis.credits.len(),
            "Escrow state initialized from genesis"
        );

        Ok(Self {
            config,
            journal,
            ledger,
            pool,
            registry,
        })
    }

    /// Rebuild from a snapshot. The snapshot must match the configured authority.
    pub fn restore(config: EscrowConfig, snapshot: StateSnapshot) -> ServiceResult<Self> {
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(ServiceError::SchemaVersion {
                found: snapshot.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        if snapshot.authority != config.authority {
            return Err(ServiceError::AuthorityMismatch {
                found: snapshot.authority,
                expected: config.authority,
            });
        }

        let authority = CallerId::new(config.authority.clone());
        let journal = Arc::new(Journal::from_entries(snapshot.journal)?);
        let ledger = Arc::new(BalanceLedger::restore(
            authority.clone(),
            snapshot.ledger,
            journal.clone(),
        )?);
        let pool = Arc::new(InMemoryResourcePool::restore(
            snapshot.resources,
            Some(journal.clone()),
        )?);
        let registry =
            ApplicationRegistry::restore(authority, ledger.clone(), pool.clone(), snapshot.registry)?;

        info!(
            entries = journal.len()?,
            saved_at = %snapshot.saved_at,
            "Escrow state restored"
        );

        Ok(Self {
            config,
            journal,
            ledger,
            pool,
            registry,
        })
    }

    /// Restore from the configured state path, or start from genesis if it does not exist.
    pub fn load_or_init(config: EscrowConfig) -> ServiceResult<Self> {
        let path = PathBuf::from(&config.state.path);
        if path.exists() {
            let snapshot = StateSnapshot::read_from(&path)?;
            Self::restore(config, snapshot)
        } else {
            warn!(path = %path.display(), "No state snapshot found, starting from genesis");
            Self::from_config(config)
        }
    }

    /// Capture a restorable state. The registry lock is held throughout, so no
    /// application can change state between reading the applications and the
    /// balances that back them.
    pub fn snapshot(&self) -> ServiceResult<StateSnapshot> {
        self.registry.snapshot_with(|registry| {
            Ok(StateSnapshot {
                schema_version: SCHEMA_VERSION,
                authority: self.config.authority.clone(),
                saved_at: Utc::now(),
                resources: self.pool.list()?,
                ledger: self.ledger.snapshot()?,
                registry,
                journal: self.journal.entries()?,
            })
        })
    }

    /// Persist to the configured state path.
    pub fn save(&self) -> ServiceResult<PathBuf> {
        let path = PathBuf::from(&self.config.state.path);
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> ServiceResult<()> {
        let snapshot = self.snapshot()?;
        snapshot.write_to(path, self.config.state.pretty)?;
        info!(path = %path.display(), entries = snapshot.journal.len(), "Escrow state saved");
        Ok(())
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<BalanceLedger> {
        &self.ledger
    }

    pub fn pool(&self) -> &Arc<InMemoryResourcePool> {
        &self.pool
    }

    pub fn registry(&self) -> &ApplicationRegistry {
        &self.registry
    }

    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }

    // Facade used by the CLI

    pub fn register_resource(
        &self,
        id: ResourceId,
        grouping_key: GroupingKey,
        capacity: u64,
    ) -> ServiceResult<Resource> {
        Ok(self.pool.register(id, grouping_key, capacity)?)
    }

    pub fn resource(&self, id: ResourceId) -> ServiceResult<Resource> {
        Ok(self.pool.get(id)?)
    }

    /// All resources, or only those under `grouping_key`.
    pub fn resources(&self, grouping_key: Option<&GroupingKey>) -> ServiceResult<Vec<Resource>> {
        Ok(match grouping_key {
            Some(key) => self.pool.resources_in(key)?,
            None => self.pool.list()?,
        })
    }

    pub fn credit(&self, resource: ResourceId, holder: &HolderId, amount: u64) -> ServiceResult<BalanceView> {
        self.pool.get(resource)?;
        self.ledger.credit(resource, holder, amount)?;
        Ok(self.ledger.balance(resource, holder)?)
    }

    pub fn transfer(
        &self,
        resource: ResourceId,
        from: &HolderId,
        to: &HolderId,
        amount: u64,
    ) -> ServiceResult<(BalanceView, BalanceView)> {
        self.ledger.transfer(resource, from, to, amount)?;
        Ok((
            self.ledger.balance(resource, from)?,
            self.ledger.balance(resource, to)?,
        ))
    }

    pub fn submit(
        &self,
        submitter: &HolderId,
        line_items: Vec<LineItem>,
        grouping_key: &GroupingKey,
    ) -> ServiceResult<Application> {
        let id = self.registry.submit(submitter, line_items, grouping_key)?;
        Ok(self.registry.get(id)?)
    }

    pub fn approve(&self, id: ApplicationId) -> ServiceResult<Application> {
        Ok(self.registry.approve(id)?)
    }

    pub fn reject(&self, id: ApplicationId) -> ServiceResult<Application> {
        Ok(self.registry.reject(id)?)
    }

    pub fn application(&self, id: ApplicationId) -> ServiceResult<Application> {
        Ok(self.registry.get(id)?)
    }

    pub fn applications(&self, filter: &ApplicationFilter) -> ServiceResult<Vec<Application>> {
        Ok(self.registry.list(filter)?)
    }

    pub fn balance(&self, resource: ResourceId, holder: &HolderId) -> ServiceResult<BalanceView> {
        Ok(self.ledger.balance(resource, holder)?)
    }

    pub fn balances_of(&self, holder: &HolderId) -> ServiceResult<Vec<BalanceView>> {
        Ok(self.ledger.balances_of(holder)?)
    }

    pub fn supply(&self, resource: ResourceId) -> ServiceResult<Supply> {
        Ok(self.ledger.supply(resource)?)
    }

    pub fn remaining(&self, resource: ResourceId) -> ServiceResult<u64> {
        Ok(self.pool.remaining(resource)?)
    }

    pub fn journal_entries(&self) -> ServiceResult<Vec<JournalEntry>> {
        Ok(self.journal.entries()?)
    }

    pub fn verify_journal(&self) -> ServiceResult<bool> {
        Ok(self.journal.verify_chain()?)
    }
}
