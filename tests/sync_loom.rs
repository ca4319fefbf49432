//! Loom models of the lock and queue protocols.
//!
//! Each model restates one protocol with loom types and lets loom explore
//! every interleaving: mutual exclusion for both locks, FIFO hand-off for the
//! ticket lock, and the "closed before empty pop" exit rule of pool workers.
//!
//! Run with: cargo test --test sync_loom --features loom-tests --release
//!
//! Under normal `cargo test`, this file compiles to an empty module.

#![cfg(feature = "loom-tests")]

use loom::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use loom::sync::{Arc, Mutex};
use loom::thread;
use std::collections::VecDeque;

// ============================================================================
// Spin lock model
// ============================================================================

struct LoomSpinLock {
    locked: AtomicBool,
}

impl LoomSpinLock {
    fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn lock(&self) {
        loop {
            while self.locked.load(Ordering::Relaxed) {
                thread::yield_now();
            }
            if self.try_lock() {
                return;
            }
        }
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

#[test]
fn loom_spin_lock_mutual_exclusion() {
    loom::model(|| {
        let lock = Arc::new(LoomSpinLock::new());
        let data = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let (lock, data) = (lock.clone(), data.clone());
                thread::spawn(move || {
                    lock.lock();
                    // Relaxed read-modify-write: only the lock orders it.
                    let v = data.load(Ordering::Relaxed);
                    data.store(v + 1, Ordering::Relaxed);
                    lock.unlock();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(data.load(Ordering::Relaxed), 2, "lost update");
    });
}

// ============================================================================
// Ticket lock model
// ============================================================================

struct LoomTicketLock {
    next_ticket: AtomicUsize,
    now_serving: AtomicUsize,
}

impl LoomTicketLock {
    fn starting_at(ticket: usize) -> Self {
        Self {
            next_ticket: AtomicUsize::new(ticket),
            now_serving: AtomicUsize::new(ticket),
        }
    }

    fn take_ticket(&self) -> usize {
        self.next_ticket.fetch_add(1, Ordering::Relaxed)
    }

    fn wait_for(&self, ticket: usize) {
        while self.now_serving.load(Ordering::Acquire) != ticket {
            thread::yield_now();
        }
    }

    fn try_lock(&self) -> bool {
        let serving = self.now_serving.load(Ordering::Acquire);
        self.next_ticket
            .compare_exchange(
                serving,
                serving.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    fn unlock(&self) {
        self.now_serving.fetch_add(1, Ordering::Release);
    }
}

#[test]
fn loom_ticket_lock_mutual_exclusion_across_wrap() {
    loom::model(|| {
        let lock = Arc::new(LoomTicketLock::starting_at(usize::MAX));
        let data = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let (lock, data) = (lock.clone(), data.clone());
                thread::spawn(move || {
                    let ticket = lock.take_ticket();
                    lock.wait_for(ticket);
                    let v = data.load(Ordering::Relaxed);
                    data.store(v + 1, Ordering::Relaxed);
                    lock.unlock();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(data.load(Ordering::Relaxed), 2);
        assert_eq!(
            lock.next_ticket.load(Ordering::Relaxed),
            lock.now_serving.load(Ordering::Relaxed)
        );
    });
}

#[test]
fn loom_ticket_lock_enters_in_ticket_order() {
    loom::model(|| {
        let lock = Arc::new(LoomTicketLock::starting_at(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let (lock, order) = (lock.clone(), order.clone());
                thread::spawn(move || {
                    let ticket = lock.take_ticket();
                    lock.wait_for(ticket);
                    order.lock().unwrap().push(ticket);
                    lock.unlock();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1]);
    });
}

#[test]
fn loom_ticket_try_lock_never_leaks_a_ticket() {
    loom::model(|| {
        let lock = Arc::new(LoomTicketLock::starting_at(0));

        let l = lock.clone();
        let h = thread::spawn(move || {
            if l.try_lock() {
                l.unlock();
            }
        });

        let ticket = lock.take_ticket();
        lock.wait_for(ticket);
        lock.unlock();
        h.join().unwrap();

        assert_eq!(
            lock.next_ticket.load(Ordering::Relaxed),
            lock.now_serving.load(Ordering::Relaxed),
            "a failed try_lock left a ticket behind"
        );
    });
}

// ============================================================================
// Pool worker exit model
// ============================================================================
//
// Submitters push while holding the admission gate; shutdown flips `closed`
// after taking the gate exclusively. A worker reads `closed` *before* it
// pops, and only exits on (closed, empty pop). No accepted task may be
// stranded.

struct LoomPoolQueue {
    gate: Mutex<bool>,
    tasks: Mutex<VecDeque<usize>>,
    closed: AtomicBool,
}

#[test]
fn loom_worker_never_strands_an_accepted_task() {
    loom::model(|| {
        let queue = Arc::new(LoomPoolQueue {
            gate: Mutex::new(true),
            tasks: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        });
        let ran = Arc::new(AtomicUsize::new(0));

        let q = queue.clone();
        let submitter = thread::spawn(move || {
            let running = q.gate.lock().unwrap();
            if *running {
                q.tasks.lock().unwrap().push_back(1);
                true
            } else {
                false
            }
        });

        let q = queue.clone();
        let shutdown = thread::spawn(move || {
            *q.gate.lock().unwrap() = false;
            q.closed.store(true, Ordering::Release);
        });

        let (q, r) = (queue.clone(), ran.clone());
        let worker = thread::spawn(move || {
            loop {
                let closed = q.closed.load(Ordering::Acquire);
                let task = q.tasks.lock().unwrap().pop_front();
                match task {
                    Some(_) => {
                        r.fetch_add(1, Ordering::Relaxed);
                    }
                    None if closed => break,
                    None => thread::yield_now(),
                }
            }
        });

        let accepted = submitter.join().unwrap();
        shutdown.join().unwrap();
        worker.join().unwrap();

        assert_eq!(ran.load(Ordering::Relaxed), usize::from(accepted));
    });
}
