//! Sync primitives conformance suite.
//!
//! Test coverage:
//! - SYNC-001: SpinLock mutual exclusion
//! - SYNC-002: TicketLock mutual exclusion
//! - SYNC-003: TicketLock FIFO entry order under stress
//! - SYNC-004: Semaphore two permits, three acquirers
//! - SYNC-005: Semaphore bound and overflow
//! - SYNC-006: Semaphore in-flight accounting under stress
//! - SYNC-007: Generic `RawLock` usage

#![allow(clippy::significant_drop_tightening)]

mod common;

use common::{complete, init_test, wait_until};
use niggly::sync::{
    AcquireError, LockGuard, RawLock, ReleaseError, Semaphore, SpinLock, TicketLock,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn hammer<L: RawLock + Send + Sync + 'static>(lock: Arc<L>, threads: usize, iters: usize) -> (usize, usize) {
    let inside = Arc::new(AtomicUsize::new(0));
    let violations = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let (lock, inside, violations, total) = (
                Arc::clone(&lock),
                Arc::clone(&inside),
                Arc::clone(&violations),
                Arc::clone(&total),
            );
            thread::spawn(move || {
                for _ in 0..iters {
                    let _guard = LockGuard::new(&*lock);
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    let v = total.load(Ordering::Relaxed);
                    total.store(v + 1, Ordering::Relaxed);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker panicked");
    }
    (violations.load(Ordering::SeqCst), total.load(Ordering::SeqCst))
}

/// SYNC-001: at most one thread inside a SpinLock critical section.
#[test]
fn sync_001_spin_lock_mutual_exclusion() {
    init_test("sync_001_spin_lock_mutual_exclusion");
    let (violations, total) = hammer(Arc::new(SpinLock::new()), 8, 5_000);
    assert_eq!(violations, 0, "two threads inside the critical section");
    assert_eq!(total, 40_000, "lost updates");
    complete("sync_001_spin_lock_mutual_exclusion");
}

/// SYNC-002: at most one thread inside a TicketLock critical section.
#[test]
fn sync_002_ticket_lock_mutual_exclusion() {
    init_test("sync_002_ticket_lock_mutual_exclusion");
    let (violations, total) = hammer(Arc::new(TicketLock::new()), 8, 2_000);
    assert_eq!(violations, 0, "two threads inside the critical section");
    assert_eq!(total, 16_000, "lost updates");
    complete("sync_002_ticket_lock_mutual_exclusion");
}

/// SYNC-003: a thread that queued first enters first.
///
/// Each waiter is started only after the previous one holds a ticket, so
/// arrival order is known. Entry order must match it.
#[test]
fn sync_003_ticket_lock_fifo_entry() {
    init_test("sync_003_ticket_lock_fifo_entry");
    const WAITERS: usize = 16;

    let lock = Arc::new(TicketLock::new());
    let entered = Arc::new(Mutex::new(Vec::with_capacity(WAITERS)));
    lock.lock();

    let mut handles = Vec::with_capacity(WAITERS);
    for id in 0..WAITERS {
        let (l, e) = (Arc::clone(&lock), Arc::clone(&entered));
        handles.push(thread::spawn(move || {
            let _guard = l.guard();
            e.lock().push(id);
        }));
        assert!(
            wait_until(Duration::from_secs(5), || lock.queue_len() == id + 2),
            "waiter {id} never queued"
        );
    }

    unsafe { lock.unlock() };
    for h in handles {
        h.join().expect("waiter panicked");
    }
    let entered = entered.lock().clone();
    assert_eq!(entered, (0..WAITERS).collect::<Vec<_>>());
    assert!(!lock.is_locked());
    complete("sync_003_ticket_lock_fifo_entry");
}

/// SYNC-004: count 2, max 2, three `acquire(1)` callers: two proceed, one
/// waits for `release(1)`.
#[test]
fn sync_004_semaphore_two_of_three() {
    init_test("sync_004_semaphore_two_of_three");
    let sem = Arc::new(Semaphore::bounded(2, 2).expect("valid bound"));
    let through = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let (s, t) = (Arc::clone(&sem), Arc::clone(&through));
            thread::spawn(move || {
                s.acquire(1).expect("acquire");
                t.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    assert!(wait_until(Duration::from_secs(5), || {
        through.load(Ordering::SeqCst) == 2 && sem.waiters() == 1
    }));
    thread::sleep(Duration::from_millis(25));
    assert_eq!(through.load(Ordering::SeqCst), 2, "third acquirer must block");

    sem.release(1).expect("release within bound");
    for h in handles {
        h.join().expect("acquirer panicked");
    }
    assert_eq!(through.load(Ordering::SeqCst), 3);
    complete("sync_004_semaphore_two_of_three");
}

/// SYNC-005: bounded semaphores reject overflow and oversize requests.
#[test]
fn sync_005_semaphore_bounds() {
    init_test("sync_005_semaphore_bounds");
    let sem = Semaphore::bounded(2, 2).expect("valid bound");
    assert!(matches!(
        sem.release(1),
        Err(ReleaseError::Overflow { released: 1, available: 2, max: 2 })
    ));
    assert_eq!(sem.available_permits(), 2, "overflow must not clamp");
    assert_eq!(
        sem.acquire(3),
        Err(AcquireError::ExceedsMax { requested: 3, max: 2 })
    );
    assert!(Semaphore::bounded(3, 2).is_err());

    let err: niggly::Error = sem.release(5).expect_err("overflow").into();
    assert_eq!(err.kind(), niggly::ErrorKind::PermitOverflow);
    complete("sync_005_semaphore_bounds");
}

/// SYNC-006: acquired-minus-released never exceeds the initial count.
#[test]
fn sync_006_semaphore_in_flight_bound() {
    init_test("sync_006_semaphore_in_flight_bound");
    const PERMITS: usize = 4;
    let sem = Arc::new(Semaphore::bounded(PERMITS, PERMITS).expect("valid bound"));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let (s, f, p) = (Arc::clone(&sem), Arc::clone(&in_flight), Arc::clone(&peak));
            thread::spawn(move || {
                let want = 1 + i % 2;
                for _ in 0..300 {
                    let permit = s.acquire_permit(want).expect("permit");
                    let now = f.fetch_add(want, Ordering::SeqCst) + want;
                    p.fetch_max(now, Ordering::SeqCst);
                    f.fetch_sub(want, Ordering::SeqCst);
                    drop(permit);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("acquirer panicked");
    }
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= PERMITS, "peak in flight {peak} exceeds {PERMITS}");
    assert_eq!(sem.available_permits(), PERMITS);
    complete("sync_006_semaphore_in_flight_bound");
}

/// SYNC-007: both locks work through the trait object.
#[test]
fn sync_007_raw_lock_trait_objects() {
    init_test("sync_007_raw_lock_trait_objects");
    let spin = SpinLock::new();
    let ticket = TicketLock::new();
    let locks: [&dyn RawLock; 2] = [&spin, &ticket];
    for lock in locks {
        {
            let _guard = LockGuard::new(lock);
            assert!(lock.is_locked());
            assert!(!lock.try_lock());
            assert!(LockGuard::try_new_for(lock, Duration::from_millis(5)).is_none());
        }
        assert!(!lock.is_locked());
        let guard = LockGuard::try_new(lock).expect("free lock");
        guard.release();
        assert!(!lock.is_locked());
    }
    complete("sync_007_raw_lock_trait_objects");
}
