//! Bounded, priority-ordered admission of crawl tasks
//!
//! The pool performs no work itself: a task awaits [`ConcurrencyPool::acquire`]
//! and holds the returned [`PoolSlot`] for its whole lifetime, including retry
//! delays. Dropping the slot admits the best waiter:
//! - higher priority first
//! - FIFO among equal priorities
//! - an admitted task is never preempted

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Shared handle to the admission pool
#[derive(Clone)]
pub struct ConcurrencyPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    max_connections: usize,
    priority_range: u32,
    state: Mutex<PoolState>,
}

struct PoolState {
    active: usize,
    next_seq: u64,
    waiters: BinaryHeap<Waiter>,
}

struct Waiter {
    priority: u32,
    seq: u64,
    admit: oneshot::Sender<PoolSlot>,
}

// Max-heap: highest priority pops first, then the earliest arrival
impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Waiter {}

/// Proof of admission; releases its slot exactly once, on drop
pub struct PoolSlot {
    pool: Arc<PoolInner>,
    priority: u32,
}

impl PoolSlot {
    /// Priority the slot was admitted at (after clamping)
    pub fn priority(&self) -> u32 {
        self.priority
    }
}

impl std::fmt::Debug for PoolSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolSlot")
            .field("priority", &self.priority)
            .finish()
    }
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        PoolInner::release(&self.pool);
    }
}

impl ConcurrencyPool {
    /// Creates a pool admitting at most `max_connections` tasks at once
    ///
    /// Priorities are clamped into `0..priority_range`.
    pub fn new(max_connections: usize, priority_range: u32) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                max_connections: max_connections.max(1),
                priority_range: priority_range.max(1),
                state: Mutex::new(PoolState {
                    active: 0,
                    next_seq: 0,
                    waiters: BinaryHeap::new(),
                }),
            }),
        }
    }

    /// Waits for a slot at the given priority
    ///
    /// Dropping the returned future gives up the place in line; a slot that
    /// was already handed to it is passed on to the next waiter.
    pub async fn acquire(&self, priority: u32) -> PoolSlot {
        let priority = priority.min(self.inner.priority_range - 1);

        loop {
            let admitted = {
                let mut state = self.inner.lock();
                if state.active < self.inner.max_connections && state.waiters.is_empty() {
                    state.active += 1;
                    tracing::trace!(
                        "Admitted task at priority {} ({} active)",
                        priority,
                        state.active
                    );
                    return PoolSlot {
                        pool: Arc::clone(&self.inner),
                        priority,
                    };
                }

                let (admit, admitted) = oneshot::channel();
                let seq = state.next_seq;
                state.next_seq += 1;
                state.waiters.push(Waiter {
                    priority,
                    seq,
                    admit,
                });
                tracing::trace!(
                    "Task waiting at priority {} ({} waiting)",
                    priority,
                    state.waiters.len()
                );
                admitted
            };

            if let Ok(slot) = admitted.await {
                return slot;
            }
        }
    }

    /// Number of slots currently held
    pub fn active(&self) -> usize {
        self.inner.lock().active
    }

    /// Number of tasks waiting for admission
    pub fn waiting(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    pub fn max_connections(&self) -> usize {
        self.inner.max_connections
    }

    pub fn priority_range(&self) -> u32 {
        self.inner.priority_range
    }
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands the slot to the best waiter, or frees it
    fn release(this: &Arc<Self>) {
        let waiter = {
            let mut state = this.lock();
            match state.waiters.pop() {
                Some(waiter) => waiter,
                None => {
                    state.active = state.active.saturating_sub(1);
                    return;
                }
            }
        };

        let slot = PoolSlot {
            pool: Arc::clone(this),
            priority: waiter.priority,
        };
        // A waiter that already gave up returns the slot here, and dropping
        // it moves on to the next waiter
        let _ = waiter.admit.send(slot);
    }
}
