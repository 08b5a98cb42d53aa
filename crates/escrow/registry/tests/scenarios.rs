//! End-to-end escrow walkthroughs: credit, submit, transfer attempts, approve, reject.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use escrow_ledger::BalanceLedger;
use escrow_pool::{InMemoryResourcePool, ResourcePool};
use escrow_registry::ApplicationRegistry;
use escrow_types::{
    ApplicationStatus, CallerId, EscrowError, GroupingKey, HolderId, LineItem, ResourceId,
};

const R: ResourceId = ResourceId(1);
const R1: ResourceId = ResourceId(11);
const R2: ResourceId = ResourceId(12);

struct World {
    ledger: Arc<BalanceLedger>,
    pool: Arc<InMemoryResourcePool>,
    registry: ApplicationRegistry,
}

fn world() -> World {
    let identity = CallerId::new("application-registry");
    let ledger = Arc::new(BalanceLedger::new(identity.clone()));
    let pool = Arc::new(InMemoryResourcePool::with_journal(ledger.journal().clone()));
    pool.register(R, GroupingKey::new("SOLENT"), 10_000).unwrap();
    pool.register(R1, GroupingKey::new("SOLENT"), 10_000).unwrap();
    pool.register(R2, GroupingKey::new("SOLENT"), 10_000).unwrap();
    let registry = ApplicationRegistry::new(identity, ledger.clone(), pool.clone());
    World {
        ledger,
        pool,
        registry,
    }
}

fn h() -> HolderId {
    HolderId::new("developer-h")
}

fn solent() -> GroupingKey {
    GroupingKey::new("SOLENT")
}

#[test]
fn solent_walkthrough() {
    let w = world();

    // 1. credit
    w.ledger.credit(R, &h(), 1000).unwrap();
    assert_eq!(w.ledger.free_balance(R, &h()).unwrap(), 1000);

    // 2. submit
    let id = w
        .registry
        .submit(&h(), vec![LineItem::new(R, 400)], &solent())
        .unwrap();
    assert_eq!(w.ledger.locked_balance(R, &h()).unwrap(), 400);
    assert_eq!(w.ledger.free_balance(R, &h()).unwrap(), 600);

    // 3. transfer beyond free balance
    let err = w
        .ledger
        .transfer(R, &h(), &HolderId::new("broker"), 700)
        .unwrap_err();
    assert!(matches!(
        err,
        EscrowError::InsufficientFreeBalance {
            available: 600,
            ..
        }
    ));
    assert_eq!(w.ledger.total_balance(R, &h()).unwrap(), 1000);
    assert_eq!(w.ledger.locked_balance(R, &h()).unwrap(), 400);

    // 4. approve
    let remaining_before = w.pool.remaining(R).unwrap();
    w.registry.approve(id).unwrap();
    assert_eq!(w.ledger.total_balance(R, &h()).unwrap(), 600);
    assert_eq!(w.ledger.locked_balance(R, &h()).unwrap(), 0);
    assert_eq!(w.pool.remaining(R).unwrap(), remaining_before - 400);

    // 5. wrong catchment
    let pending_before = w.registry.pending_count().unwrap();
    let err = w
        .registry
        .submit(&h(), vec![LineItem::new(R, 100)], &GroupingKey::new("THAMES"))
        .unwrap_err();
    assert!(matches!(err, EscrowError::GroupingKeyMismatch { .. }));
    assert_eq!(w.ledger.locked_balance(R, &h()).unwrap(), 0);
    assert_eq!(w.registry.pending_count().unwrap(), pending_before);
    assert!(w.registry.snapshot().unwrap().applications.len() == 1);

    assert!(w.ledger.journal().verify_chain().unwrap());
}

#[test]
fn failed_multi_item_submission_locks_nothing() {
    let w = world();
    w.ledger.credit(R1, &h(), 50).unwrap();
    w.ledger.credit(R2, &h(), 10).unwrap();

    let err = w
        .registry
        .submit(
            &h(),
            vec![LineItem::new(R1, 60), LineItem::new(R2, 5)],
            &solent(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EscrowError::InsufficientFreeBalance { resource: R1, .. }
    ));
    assert_eq!(w.ledger.free_balance(R2, &h()).unwrap(), 10);
    assert_eq!(w.ledger.locked_balance(R1, &h()).unwrap(), 0);
    assert!(w.registry.snapshot().unwrap().applications.is_empty());
}

#[test]
fn submit_then_reject_restores_everything() {
    let w = world();
    w.ledger.credit(R1, &h(), 300).unwrap();
    w.ledger.credit(R2, &h(), 200).unwrap();
    let id = w
        .registry
        .submit(&h(), vec![LineItem::new(R1, 120)], &solent())
        .unwrap();

    let locked_r1 = w.ledger.locked_balance(R1, &h()).unwrap();
    let locked_r2 = w.ledger.locked_balance(R2, &h()).unwrap();
    let remaining_r1 = w.pool.remaining(R1).unwrap();

    let second = w
        .registry
        .submit(
            &h(),
            vec![LineItem::new(R1, 100), LineItem::new(R2, 150)],
            &solent(),
        )
        .unwrap();
    w.registry.reject(second).unwrap();

    assert_eq!(w.ledger.locked_balance(R1, &h()).unwrap(), locked_r1);
    assert_eq!(w.ledger.locked_balance(R2, &h()).unwrap(), locked_r2);
    assert_eq!(w.ledger.total_balance(R1, &h()).unwrap(), 300);
    assert_eq!(w.ledger.total_balance(R2, &h()).unwrap(), 200);
    assert_eq!(w.pool.remaining(R1).unwrap(), remaining_r1);
    assert!(w.registry.get(id).unwrap().is_pending());
}

#[test]
fn second_approve_fails_without_touching_ledger() {
    let w = world();
    w.ledger.credit(R, &h(), 1000).unwrap();
    let id = w
        .registry
        .submit(&h(), vec![LineItem::new(R, 400)], &solent())
        .unwrap();
    w.registry.approve(id).unwrap();

    let total = w.ledger.total_balance(R, &h()).unwrap();
    let remaining = w.pool.remaining(R).unwrap();
    let journal_len = w.ledger.journal().len().unwrap();

    let err = w.registry.approve(id).unwrap_err();
    assert!(matches!(
        err,
        EscrowError::ApplicationNotPending {
            status: ApplicationStatus::Approved,
            ..
        }
    ));
    assert!(matches!(
        w.registry.reject(id),
        Err(EscrowError::ApplicationNotPending { .. })
    ));
    assert_eq!(w.ledger.total_balance(R, &h()).unwrap(), total);
    assert_eq!(w.pool.remaining(R).unwrap(), remaining);
    assert_eq!(w.ledger.journal().len().unwrap(), journal_len);
    assert_eq!(w.registry.get(id).unwrap().status, ApplicationStatus::Approved);
}

#[test]
fn single_item_and_multi_item_resolve_alike() {
    let w = world();
    w.ledger.credit(R1, &h(), 100).unwrap();
    w.ledger.credit(R2, &h(), 100).unwrap();

    let single = w
        .registry
        .submit(&h(), vec![LineItem::new(R1, 10)], &solent())
        .unwrap();
    let multi = w
        .registry
        .submit(
            &h(),
            vec![LineItem::new(R1, 10), LineItem::new(R2, 10)],
            &solent(),
        )
        .unwrap();

    w.registry.approve(single).unwrap();
    w.registry.approve(multi).unwrap();

    assert_eq!(w.ledger.total_balance(R1, &h()).unwrap(), 80);
    assert_eq!(w.ledger.total_balance(R2, &h()).unwrap(), 90);
    assert_eq!(w.pool.remaining(R1).unwrap(), 9_980);
    assert_eq!(w.pool.remaining(R2).unwrap(), 9_990);
}

#[test]
fn resolution_uses_recorded_submitter() {
    let w = world();
    let other = HolderId::new("landowner");
    w.ledger.credit(R, &h(), 100).unwrap();
    w.ledger.credit(R, &other, 100).unwrap();

    let id = w
        .registry
        .submit(&h(), vec![LineItem::new(R, 40)], &solent())
        .unwrap();
    w.registry.approve(id).unwrap();

    assert_eq!(w.ledger.total_balance(R, &h()).unwrap(), 60);
    assert_eq!(w.ledger.total_balance(R, &other).unwrap(), 100);
    assert_eq!(w.ledger.locked_balance(R, &other).unwrap(), 0);
}

/// Pool whose batch decrement can be switched off to model an unavailable backend.
struct UnavailablePool {
    inner: InMemoryResourcePool,
    down: AtomicBool,
}

impl ResourcePool for UnavailablePool {
    fn grouping_key(&self, resource: ResourceId) -> escrow_types::EscrowResult<GroupingKey> {
        self.inner.grouping_key(resource)
    }

    fn remaining(&self, resource: ResourceId) -> escrow_types::EscrowResult<u64> {
        self.inner.remaining(resource)
    }

    fn decrement_remaining(&self, resource: ResourceId, amount: u64) -> escrow_types::EscrowResult<()> {
        self.decrement_all(&[LineItem::new(resource, amount)])
    }

    fn decrement_all(&self, items: &[LineItem]) -> escrow_types::EscrowResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(EscrowError::InvalidInput("pool backend unavailable".to_string()));
        }
        self.inner.decrement_all(items)
    }
}

#[test]
fn failed_pool_decrement_leaves_application_pending_and_credits_locked() {
    let identity = CallerId::new("application-registry");
    let ledger = Arc::new(BalanceLedger::new(identity.clone()));
    let inner = InMemoryResourcePool::new();
    inner.register(R, solent(), 5_000).unwrap();
    let pool = Arc::new(UnavailablePool {
        inner,
        down: AtomicBool::new(true),
    });
    let registry = ApplicationRegistry::new(identity, ledger.clone(), pool.clone());

    ledger.credit(R, &h(), 1000).unwrap();
    let id = registry
        .submit(&h(), vec![LineItem::new(R, 400)], &solent())
        .unwrap();
    let journal_len = ledger.journal().len().unwrap();

    assert!(matches!(
        registry.approve(id),
        Err(EscrowError::InvalidInput(_))
    ));
    assert_eq!(ledger.total_balance(R, &h()).unwrap(), 1000);
    assert_eq!(ledger.locked_balance(R, &h()).unwrap(), 400);
    assert_eq!(ledger.supply(R).unwrap().burned, 0);
    assert_eq!(pool.remaining(R).unwrap(), 5_000);
    assert_eq!(registry.get(id).unwrap().status, ApplicationStatus::Pending);
    assert_eq!(ledger.journal().len().unwrap(), journal_len);
    registry.check_coverage().unwrap();

    // Once the pool recovers the same application approves normally.
    pool.down.store(false, Ordering::SeqCst);
    registry.approve(id).unwrap();
    assert_eq!(ledger.total_balance(R, &h()).unwrap(), 600);
    assert_eq!(ledger.locked_balance(R, &h()).unwrap(), 0);
    assert_eq!(pool.remaining(R).unwrap(), 4_600);
}

#[test]
fn capacity_taken_outside_the_registry_blocks_approval_without_burning() {
    let w = world();
    w.ledger.credit(R, &h(), 1000).unwrap();
    let id = w
        .registry
        .submit(&h(), vec![LineItem::new(R, 400)], &solent())
        .unwrap();

    w.pool.decrement_remaining(R, 9_800).unwrap();

    assert!(matches!(
        w.registry.approve(id),
        Err(EscrowError::InsufficientCapacity { remaining: 200, .. })
    ));
    assert_eq!(w.ledger.total_balance(R, &h()).unwrap(), 1000);
    assert_eq!(w.ledger.locked_balance(R, &h()).unwrap(), 400);
    assert_eq!(w.pool.remaining(R).unwrap(), 200);
    assert_eq!(w.registry.get(id).unwrap().status, ApplicationStatus::Pending);

    w.registry.reject(id).unwrap();
    assert_eq!(w.ledger.free_balance(R, &h()).unwrap(), 1000);
}
