use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use escrow_types::{
    validate_line_items, Balance, BalanceView, CallerId, EscrowError, EscrowResult, HolderId,
    LineItem, ResourceId, Supply,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::journal::{Journal, JournalEvent};

/// Persisted row of the balances table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub resource: ResourceId,
    pub holder: HolderId,
    pub total: u64,
    pub locked: u64,
}

/// Persisted supply counters for one resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyRecord {
    pub resource: ResourceId,
    pub credited: u64,
    pub burned: u64,
}

/// Serializable copy of the ledger tables.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub balances: Vec<BalanceRecord>,
    pub supply: Vec<SupplyRecord>,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: BTreeMap<(ResourceId, HolderId), Balance>,
    supply: BTreeMap<ResourceId, Supply>,
}

impl LedgerState {
    fn balance(&self, resource: ResourceId, holder: &HolderId) -> Balance {
        self.balances
            .get(&(resource, holder.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn balance_mut(&mut self, resource: ResourceId, holder: &HolderId) -> &mut Balance {
        self.balances.entry((resource, holder.clone())).or_default()
    }
}

/// Which restricted mutation a batch applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Restricted {
    Lock,
    Unlock,
    Burn,
}

/// Authoritative store of total and locked balances per (resource, holder).
///
/// Only the free portion (`total - locked`) moves between holders. Locking,
/// unlocking and burning are reserved for the single authority identity the
/// ledger was built with. Every mutation validates all of its preconditions
/// before writing, so a failed call leaves every balance untouched.
#[derive(Debug)]
pub struct BalanceLedger {
    authority: CallerId,
    state: RwLock<LedgerState>,
    journal: Arc<Journal>,
}

impl BalanceLedger {
    pub fn new(authority: CallerId) -> Self {
        Self::with_journal(authority, Arc::new(Journal::new()))
    }

    pub fn with_journal(authority: CallerId, journal: Arc<Journal>) -> Self {
        Self {
            authority,
            state: RwLock::new(LedgerState::default()),
            journal,
        }
    }

    /// Rebuild a ledger from persisted tables.
    ///
    /// Rejects rows with `locked > total` and supply counters that disagree with
    /// the sum of holder totals.
    pub fn restore(
        authority: CallerId,
        snapshot: LedgerSnapshot,
        journal: Arc<Journal>,
    ) -> EscrowResult<Self> {
        let mut state = LedgerState::default();
        let mut totals: HashMap<ResourceId, u64> = HashMap::new();

        for row in snapshot.balances {
            row.resource.validate()?;
            row.holder.validate()?;
            if row.locked > row.total {
                return Err(EscrowError::InvalidInput(format!(
                    "balance of {} for {} has locked {} above total {}",
                    row.resource, row.holder, row.locked, row.total
                )));
            }
            let sum = totals.entry(row.resource).or_insert(0);
            *sum = sum
                .checked_add(row.total)
                .ok_or_else(|| EscrowError::Overflow(format!("supply of {}", row.resource)))?;
            let previous = state.balances.insert(
                (row.resource, row.holder.clone()),
                Balance {
                    total: row.total,
                    locked: row.locked,
                },
            );
            if previous.is_some() {
                return Err(EscrowError::InvalidInput(format!(
                    "duplicate balance row for {} / {}",
                    row.resource, row.holder
                )));
            }
        }

        for row in snapshot.supply {
            if row.burned > row.credited {
                return Err(EscrowError::InvalidInput(format!(
                    "{} burned {} more than credited {}",
                    row.resource, row.burned, row.credited
                )));
            }
            state.supply.insert(
                row.resource,
                Supply {
                    credited: row.credited,
                    burned: row.burned,
                },
            );
        }

        let resources: BTreeSet<ResourceId> =
            totals.keys().chain(state.supply.keys()).copied().collect();
        for resource in &resources {
            let total = totals.get(resource).copied().unwrap_or(0);
            let outstanding = state
                .supply
                .get(resource)
                .map(Supply::outstanding)
                .unwrap_or(0);
            if outstanding != total {
                return Err(EscrowError::InvalidInput(format!(
                    "{} holder totals {} do not match outstanding supply {}",
                    resource, total, outstanding
                )));
            }
        }

        Ok(Self {
            authority,
            state: RwLock::new(state),
            journal,
        })
    }

    pub fn authority(&self) -> &CallerId {
        &self.authority
    }

    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }

    // --- Unrestricted mutations ---

    /// Mint `amount` into a holder's balance. Open to any caller.
    pub fn credit(&self, resource: ResourceId, holder: &HolderId, amount: u64) -> EscrowResult<()> {
        resource.validate()?;
        holder.validate()?;
        require_positive(amount)?;

        let mut state = self.state.write().map_err(|_| EscrowError::LockPoisoned)?;
        let balance = state.balance(resource, holder);
        let supply = state.supply.get(&resource).copied().unwrap_or_default();
        let new_total = balance
            .total
            .checked_add(amount)
            .ok_or_else(|| EscrowError::Overflow(format!("balance of {} for {}", resource, holder)))?;
        let new_credited = supply
            .credited
            .checked_add(amount)
            .ok_or_else(|| EscrowError::Overflow(format!("supply of {}", resource)))?;

        self.journal.append(JournalEvent::Credited {
            resource,
            holder: holder.clone(),
            amount,
        })?;
        state.balance_mut(resource, holder).total = new_total;
        state.supply.entry(resource).or_default().credited = new_credited;

        info!(resource = %resource, holder = %holder, amount, "Credit applied");
        Ok(())
    }

    /// Move `amount` from the sender's free balance to the recipient.
    ///
    /// A self-transfer is accepted when the free balance covers it and leaves
    /// balances unchanged.
    pub fn transfer(
        &self,
        resource: ResourceId,
        from: &HolderId,
        to: &HolderId,
        amount: u64,
    ) -> EscrowResult<()> {
        resource.validate()?;
        from.validate()?;
        to.validate()?;
        require_positive(amount)?;

        let mut state = self.state.write().map_err(|_| EscrowError::LockPoisoned)?;
        let sender = state.balance(resource, from);
        if amount > sender.free() {
            debug!(
                resource = %resource,
                holder = %from,
                requested = amount,
                free = sender.free(),
                "Transfer exceeds free balance"
            );
            return Err(EscrowError::InsufficientFreeBalance {
                resource,
                holder: from.clone(),
                requested: amount,
                available: sender.free(),
            });
        }

        let recipient_total = if from == to {
            sender.total
        } else {
            state
                .balance(resource, to)
                .total
                .checked_add(amount)
                .ok_or_else(|| EscrowError::Overflow(format!("balance of {} for {}", resource, to)))?
        };

        self.journal.append(JournalEvent::Transferred {
            resource,
            from: from.clone(),
            to: to.clone(),
            amount,
        })?;
        if from != to {
            state.balance_mut(resource, from).total = sender.total - amount;
            state.balance_mut(resource, to).total = recipient_total;
        }

        info!(resource = %resource, from = %from, to = %to, amount, "Transfer completed");
        Ok(())
    }

    // --- Restricted mutations ---

    /// Move `amount` of a holder's free balance into its locked portion.
    pub fn lock(
        &self,
        caller: &CallerId,
        resource: ResourceId,
        holder: &HolderId,
        amount: u64,
    ) -> EscrowResult<()> {
        self.apply_restricted(caller, holder, &[LineItem::new(resource, amount)], Restricted::Lock)
    }

    /// Return `amount` of a holder's locked balance to its free portion.
    pub fn unlock(
        &self,
        caller: &CallerId,
        resource: ResourceId,
        holder: &HolderId,
        amount: u64,
    ) -> EscrowResult<()> {
        self.apply_restricted(
            caller,
            holder,
            &[LineItem::new(resource, amount)],
            Restricted::Unlock,
        )
    }

    /// Permanently destroy `amount` of a holder's locked balance.
    pub fn burn_locked(
        &self,
        caller: &CallerId,
        resource: ResourceId,
        holder: &HolderId,
        amount: u64,
    ) -> EscrowResult<()> {
        self.apply_restricted(caller, holder, &[LineItem::new(resource, amount)], Restricted::Burn)
    }

    /// Lock every line item for one holder, or none of them.
    pub fn lock_all(
        &self,
        caller: &CallerId,
        holder: &HolderId,
        items: &[LineItem],
    ) -> EscrowResult<()> {
        self.apply_restricted(caller, holder, items, Restricted::Lock)
    }

    /// Unlock every line item for one holder, or none of them.
    pub fn unlock_all(
        &self,
        caller: &CallerId,
        holder: &HolderId,
        items: &[LineItem],
    ) -> EscrowResult<()> {
        self.apply_restricted(caller, holder, items, Restricted::Unlock)
    }

    /// Burn every line item from one holder's locked balance, or none of them.
    pub fn burn_locked_all(
        &self,
        caller: &CallerId,
        holder: &HolderId,
        items: &[LineItem],
    ) -> EscrowResult<()> {
        self.apply_restricted(caller, holder, items, Restricted::Burn)
    }

    /// Two-phase restricted mutation: every item is checked against the current
    /// state under the write lock, then all are applied. Nothing is written if
    /// any check fails.
    fn apply_restricted(
        &self,
        caller: &CallerId,
        holder: &HolderId,
        items: &[LineItem],
        op: Restricted,
    ) -> EscrowResult<()> {
        self.authorize(caller)?;
        holder.validate()?;
        validate_line_items(items)?;

        let mut state = self.state.write().map_err(|_| EscrowError::LockPoisoned)?;

        for item in items {
            let balance = state.balance(item.resource, holder);
            match op {
                Restricted::Lock if item.amount > balance.free() => {
                    return Err(EscrowError::InsufficientFreeBalance {
                        resource: item.resource,
                        holder: holder.clone(),
                        requested: item.amount,
                        available: balance.free(),
                    });
                }
                Restricted::Unlock | Restricted::Burn if item.amount > balance.locked => {
                    return Err(EscrowError::InsufficientLockedBalance {
                        resource: item.resource,
                        holder: holder.clone(),
                        requested: item.amount,
                        available: balance.locked,
                    });
                }
                _ => {}
            }
        }

        let events = items
            .iter()
            .map(|item| {
                let resource = item.resource;
                let holder = holder.clone();
                let amount = item.amount;
                match op {
                    Restricted::Lock => JournalEvent::Locked {
                        resource,
                        holder,
                        amount,
                    },
                    Restricted::Unlock => JournalEvent::Unlocked {
                        resource,
                        holder,
                        amount,
                    },
                    Restricted::Burn => JournalEvent::Burned {
                        resource,
                        holder,
                        amount,
                    },
                }
            })
            .collect();
        self.journal.append_all(events)?;

        for item in items {
            let balance = state.balance_mut(item.resource, holder);
            match op {
                Restricted::Lock => balance.locked += item.amount,
                Restricted::Unlock => balance.locked -= item.amount,
                Restricted::Burn => {
                    balance.locked -= item.amount;
                    balance.total -= item.amount;
                }
            }
            if op == Restricted::Burn {
                state.supply.entry(item.resource).or_default().burned += item.amount;
            }
            info!(
                resource = %item.resource,
                holder = %holder,
                amount = item.amount,
                op = ?op,
                "Restricted balance mutation applied"
            );
        }

        Ok(())
    }

    fn authorize(&self, caller: &CallerId) -> EscrowResult<()> {
        if caller != &self.authority {
            warn!(caller = %caller, "Rejected restricted ledger call from non-authority");
            return Err(EscrowError::Unauthorized(caller.clone()));
        }
        Ok(())
    }

    // --- Queries ---

    pub fn free_balance(&self, resource: ResourceId, holder: &HolderId) -> EscrowResult<u64> {
        Ok(self.read_balance(resource, holder)?.free())
    }

    pub fn locked_balance(&self, resource: ResourceId, holder: &HolderId) -> EscrowResult<u64> {
        Ok(self.read_balance(resource, holder)?.locked)
    }

    pub fn total_balance(&self, resource: ResourceId, holder: &HolderId) -> EscrowResult<u64> {
        Ok(self.read_balance(resource, holder)?.total)
    }

    pub fn balance(&self, resource: ResourceId, holder: &HolderId) -> EscrowResult<BalanceView> {
        let balance = self.read_balance(resource, holder)?;
        Ok(BalanceView::new(resource, holder.clone(), balance))
    }

    /// Every non-zero balance held by one holder, ordered by resource.
    pub fn balances_of(&self, holder: &HolderId) -> EscrowResult<Vec<BalanceView>> {
        let state = self.state.read().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(state
            .balances
            .iter()
            .filter(|((_, h), balance)| h == holder && !balance.is_zero())
            .map(|((resource, h), balance)| BalanceView::new(*resource, h.clone(), *balance))
            .collect())
    }

    /// Every non-zero balance of one resource, ordered by holder.
    pub fn holders_of(&self, resource: ResourceId) -> EscrowResult<Vec<BalanceView>> {
        let state = self.state.read().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(state
            .balances
            .iter()
            .filter(|((r, _), balance)| *r == resource && !balance.is_zero())
            .map(|((r, holder), balance)| BalanceView::new(*r, holder.clone(), *balance))
            .collect())
    }

    pub fn supply(&self, resource: ResourceId) -> EscrowResult<Supply> {
        let state = self.state.read().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(state.supply.get(&resource).copied().unwrap_or_default())
    }

    pub fn snapshot(&self) -> EscrowResult<LedgerSnapshot> {
        let state = self.state.read().map_err(|_| EscrowError::LockPoisoned)?;
        let balances = state
            .balances
            .iter()
            .filter(|(_, balance)| !balance.is_zero())
            .map(|((resource, holder), balance)| BalanceRecord {
                resource: *resource,
                holder: holder.clone(),
                total: balance.total,
                locked: balance.locked,
            })
            .collect();
        let supply = state
            .supply
            .iter()
            .map(|(resource, supply)| SupplyRecord {
                resource: *resource,
                credited: supply.credited,
                burned: supply.burned,
            })
            .collect();
        Ok(LedgerSnapshot { balances, supply })
    }

    fn read_balance(&self, resource: ResourceId, holder: &HolderId) -> EscrowResult<Balance> {
        let state = self.state.read().map_err(|_| EscrowError::LockPoisoned)?;
        Ok(state.balance(resource, holder))
    }
}

fn require_positive(amount: u64) -> EscrowResult<()> {
    if amount == 0 {
        return Err(EscrowError::InvalidInput(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
