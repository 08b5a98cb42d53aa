use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use escrow_ledger::{BalanceLedger, JournalEvent};
use escrow_pool::ResourcePool;
use escrow_types::{
    validate_line_items, Application, ApplicationId, ApplicationStatus, CallerId, EscrowError,
    EscrowResult, GroupingKey, HolderId, LineItem, ResourceId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Filter for [`ApplicationRegistry::list`]. Unset fields match everything.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ApplicationFilter {
    pub submitter: Option<HolderId>,
    pub status: Option<ApplicationStatus>,
    pub grouping_key: Option<GroupingKey>,
}

impl ApplicationFilter {
    fn matches(&self, application: &Application) -> bool {
        if let Some(ref submitter) = self.submitter {
            if &application.submitter != submitter {
                return false;
            }
        }
        if let Some(status) = self.status {
            if application.status != status {
                return false;
            }
        }
        if let Some(ref key) = self.grouping_key {
            if &application.grouping_key != key {
                return false;
            }
        }
        true
    }
}

/// Serializable copy of the applications table and the id counter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub applications: Vec<Application>,
    pub next_id: u64,
}

struct RegistryState {
    applications: BTreeMap<ApplicationId, Application>,
    next_id: u64,
}

impl Default for RegistryState {
    fn default() -> Self {
        Self {
            applications: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// Orchestrates the lock-then-resolve workflow of escrow applications.
///
/// The registry calls the ledger's restricted operations with its own identity,
/// which must match the ledger authority. The registry mutex is held for the
/// whole of every submit/approve/reject, so an application is never visible
/// half-locked and a pending application resolves exactly once.
pub struct ApplicationRegistry {
    identity: CallerId,
    ledger: Arc<BalanceLedger>,
    pool: Arc<dyn ResourcePool>,
    state: Mutex<RegistryState>,
}

impl ApplicationRegistry {
    pub fn new(identity: CallerId, ledger: Arc<BalanceLedger>, pool: Arc<dyn ResourcePool>) -> Self {
        Self {
            identity,
            ledger,
            pool,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Rebuild a registry from persisted applications.
    ///
    /// Every line item must name a pool resource under the application's grouping
    /// key, and pending applications must still be covered by locked ledger balances.
    pub fn restore(
        identity: CallerId,
        ledger: Arc<BalanceLedger>,
        pool: Arc<dyn ResourcePool>,
        snapshot: RegistrySnapshot,
    ) -> EscrowResult<Self> {
        let mut applications = BTreeMap::new();
        let mut highest = 0;
        for application in snapshot.applications {
            validate_line_items(&application.line_items)?;
            for item in &application.line_items {
                let actual = pool.grouping_key(item.resource)?;
                if actual != application.grouping_key {
                    return Err(EscrowError::GroupingKeyMismatch {
                        resource: item.resource,
                        expected: application.grouping_key.clone(),
                        actual,
                    });
                }
            }
            highest = highest.max(application.id.0);
            let id = application.id;
            if applications.insert(id, application).is_some() {
                return Err(EscrowError::InvalidInput(format!(
                    "duplicate persisted {}",
                    id
                )));
            }
        }
        if snapshot.next_id <= highest {
            return Err(EscrowError::InvalidInput(format!(
                "next application id {} would reuse {}",
                snapshot.next_id, highest
            )));
        }

        let registry = Self {
            identity,
            ledger,
            pool,
            state: Mutex::new(RegistryState {
                applications,
                next_id: snapshot.next_id,
            }),
        };
        registry.check_coverage()?;
        Ok(registry)
    }

    pub fn identity(&self) -> &CallerId {
        &self.identity
    }

    pub fn ledger(&self) -> &Arc<BalanceLedger> {
        &self.ledger
    }

    /// Lock every line item against the submitter and record a pending application.
    ///
    /// Validation runs in this order: input shape, resource existence and
    /// grouping key for every item, then free balances (inside the ledger's
    /// all-or-nothing lock). A failure at any step leaves no lock and no record.
    pub fn submit(
        &self,
        submitter: &HolderId,
        line_items: Vec<LineItem>,
        grouping_key: &GroupingKey,
    ) -> EscrowResult<ApplicationId> {
        submitter.validate()?;
        grouping_key.validate()?;
        validate_line_items(&line_items)?;

        let mut state = self.state.lock().map_err(|_| EscrowError::LockPoisoned)?;

        for item in &line_items {
            let actual = self.pool.grouping_key(item.resource)?;
            if &actual != grouping_key {
                debug!(
                    resource = %item.resource,
                    expected = %grouping_key,
                    actual = %actual,
                    "Grouping key mismatch"
                );
                return Err(EscrowError::GroupingKeyMismatch {
                    resource: item.resource,
                    expected: grouping_key.clone(),
                    actual,
                });
            }
        }

        self.ledger.lock_all(&self.identity, submitter, &line_items)?;

        let id = ApplicationId(state.next_id);
        state.next_id += 1;
        let application = Application {
            id,
            submitter: submitter.clone(),
            grouping_key: grouping_key.clone(),
            line_items,
            status: ApplicationStatus::Pending,
        };

        self.ledger
            .journal()
            .append(JournalEvent::ApplicationSubmitted {
                application: id,
                submitter: application.submitter.clone(),
                grouping_key: application.grouping_key.clone(),
                line_items: application.line_items.clone(),
            })?;

        info!(
            application = %id,
            submitter = %submitter,
            grouping_key = %grouping_key,
            items = application.line_items.len(),
            amount = application.total_amount(),
            "Application submitted"
        );
        state.applications.insert(id, application);
        Ok(id)
    }

    /// Burn the locked credits and consume pool capacity for every line item.
    pub fn approve(&self, id: ApplicationId) -> EscrowResult<Application> {
        self.resolve(id, ApplicationStatus::Approved)
    }

    /// Return the locked credits to the submitter's free balance.
    pub fn reject(&self, id: ApplicationId) -> EscrowResult<Application> {
        self.resolve(id, ApplicationStatus::Rejected)
    }

    fn resolve(&self, id: ApplicationId, outcome: ApplicationStatus) -> EscrowResult<Application> {
        let mut state = self.state.lock().map_err(|_| EscrowError::LockPoisoned)?;
        let application = state
            .applications
            .get(&id)
            .ok_or(EscrowError::ApplicationNotFound(id))?;
        if !application.is_pending() {
            return Err(EscrowError::ApplicationNotPending {
                id,
                status: application.status,
            });
        }

        let submitter = application.submitter.clone();
        let items = application.line_items.clone();

        let event = match outcome {
            ApplicationStatus::Approved => {
                // Pool before burn: a failed decrement must leave the locked
                // credits and the pending status untouched.
                self.ensure_locked(&submitter, &items)?;
                self.pool.decrement_all(&items)?;
                self.ledger
                    .burn_locked_all(&self.identity, &submitter, &items)?;
                JournalEvent::ApplicationApproved { application: id }
            }
            ApplicationStatus::Rejected => {
                self.ledger.unlock_all(&self.identity, &submitter, &items)?;
                JournalEvent::ApplicationRejected { application: id }
            }
            ApplicationStatus::Pending => {
                return Err(EscrowError::InvalidInput(
                    "pending is not a resolution".to_string(),
                ))
            }
        };
        self.ledger.journal().append(event)?;

        let application = state
            .applications
            .get_mut(&id)
            .ok_or(EscrowError::ApplicationNotFound(id))?;
        application.status = outcome;

        info!(
            application = %id,
            submitter = %submitter,
            status = %outcome,
            "Application resolved"
        );
        Ok(application.clone())
    }

    pub fn get(&self, id: ApplicationId) -> EscrowResult<Application> {
        let state = self.state.lock().map_err(|_| EscrowError::LockPoisoned)?;
        state
            .applications
            .get(&id)
            .cloned()
            .ok_or(EscrowError::ApplicationNotFound(id))
    }

    /// Applications matching `filter`, ordered by id.
    pub fn list(&self, filter: &ApplicationFilter) -> EscrowResult<Vec<Application>> {
        let state = self.state.lock().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(state
            .applications
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    pub fn pending_count(&self) -> EscrowResult<usize> {
        let state = self.state.lock().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(state.applications.values().filter(|a| a.is_pending()).count())
    }

    pub fn snapshot(&self) -> EscrowResult<RegistrySnapshot> {
        self.snapshot_with(Ok)
    }

    /// Run `f` on the registry snapshot while the registry lock is still held.
    ///
    /// No submit, approve or reject can commit until `f` returns, so ledger and
    /// pool state read inside `f` agree with the applications it receives.
    pub fn snapshot_with<T, E>(
        &self,
        f: impl FnOnce(RegistrySnapshot) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<EscrowError>,
    {
        let state = self.state.lock().map_err(|_| EscrowError::LockPoisoned)?;
        f(RegistrySnapshot {
            applications: state.applications.values().cloned().collect(),
            next_id: state.next_id,
        })
    }

    /// Locked balances must cover `items` before any pool capacity is taken.
    fn ensure_locked(&self, submitter: &HolderId, items: &[LineItem]) -> EscrowResult<()> {
        for item in items {
            let locked = self.ledger.locked_balance(item.resource, submitter)?;
            if item.amount > locked {
                return Err(EscrowError::InsufficientLockedBalance {
                    resource: item.resource,
                    holder: submitter.clone(),
                    requested: item.amount,
                    available: locked,
                });
            }
        }
        Ok(())
    }

    /// Verify that the ledger's locked balances cover every pending application.
    pub fn check_coverage(&self) -> EscrowResult<()> {
        let state = self.state.lock().map_err(|_| EscrowError::LockPoisoned)?;
        let mut escrowed: HashMap<(ResourceId, HolderId), u64> = HashMap::new();
        for application in state.applications.values().filter(|a| a.is_pending()) {
            for item in &application.line_items {
                let sum = escrowed
                    .entry((item.resource, application.submitter.clone()))
                    .or_insert(0);
                *sum = sum.saturating_add(item.amount);
            }
        }

        for ((resource, holder), amount) in escrowed {
            let locked = self.ledger.locked_balance(resource, &holder)?;
            if locked < amount {
                return Err(EscrowError::InsufficientLockedBalance {
                    resource,
                    holder,
                    requested: amount,
                    available: locked,
                });
            }
        }
        Ok(())
    }
}
