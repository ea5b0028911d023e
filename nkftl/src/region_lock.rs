//! Region Lock Pool: one exclusive, FIFO-ordered lock per logical region,
//! acquired by both foreground I/O and GC.
//!
//! Built on a `Waker`-driven ticket queue rather than `Mutex`/atomics: a
//! single cooperative executor drives every task here, so a ticket counter
//! behind a `RefCell` is enough, and mutual exclusion degrades to "whoever
//! holds the next ticket gets woken first".

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::types::RegionId;

#[derive(Default)]
struct RegionState {
    next_ticket: u64,
    serving_ticket: u64,
    held: bool,
    waiters: HashMap<u64, Waker>,
}

#[derive(Clone, Default)]
pub struct RegionLockPool {
    states: Rc<RefCell<HashMap<RegionId, RegionState>>>,
}

impl RegionLockPool {
    pub fn new() -> Self {
        RegionLockPool::default()
    }

    pub fn acquire(&self, region_id: RegionId) -> AcquireFuture {
        AcquireFuture {
            pool: self.states.clone(),
            region_id,
            ticket: None,
        }
    }
}

pub struct AcquireFuture {
    pool: Rc<RefCell<HashMap<RegionId, RegionState>>>,
    region_id: RegionId,
    ticket: Option<u64>,
}

impl Future for AcquireFuture {
    type Output = RegionLockGuard;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut states = this.pool.borrow_mut();
        let state = states.entry(this.region_id).or_default();

        let ticket = *this.ticket.get_or_insert_with(|| {
            let t = state.next_ticket;
            state.next_ticket += 1;
            t
        });

        if !state.held && ticket == state.serving_ticket {
            state.held = true;
            state.waiters.remove(&ticket);
            drop(states);
            return Poll::Ready(RegionLockGuard {
                pool: this.pool.clone(),
                region_id: this.region_id,
            });
        }

        state.waiters.insert(ticket, cx.waker().clone());
        Poll::Pending
    }
}

/// Released on `Drop`, handing the lock to the next queued ticket in FIFO
/// order.
pub struct RegionLockGuard {
    pool: Rc<RefCell<HashMap<RegionId, RegionState>>>,
    region_id: RegionId,
}

impl Drop for RegionLockGuard {
    fn drop(&mut self) {
        let mut states = self.pool.borrow_mut();
        if let Some(state) = states.get_mut(&self.region_id) {
            state.held = false;
            state.serving_ticket += 1;
            if let Some(waker) = state.waiters.remove(&state.serving_ticket) {
                waker.wake();
            }
        }
    }
}
