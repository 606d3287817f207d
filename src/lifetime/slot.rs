use core::mem;
use parking_lot::{const_mutex, Condvar, Mutex};
use std::thread::{self, ThreadId};
use tracing::warn;

use crate::any::Instance;

/// Wait-for edges between threads blocked on a slot: (waiting thread, thread building the slot)
static WAITS: Mutex<Vec<(ThreadId, ThreadId)>> = const_mutex(Vec::new());

/// Records that `waiter` blocks on a slot built by `owner`.
/// Returns `false` without recording anything when `owner` already waits, directly or transitively, on `waiter`.
fn start_waiting(waiter: ThreadId, owner: ThreadId) -> bool {
    let mut waits = WAITS.lock();
    let mut next = owner;
    for _ in 0..=waits.len() {
        if next == waiter {
            return false;
        }
        match waits.iter().find(|(blocked, _)| *blocked == next) {
            Some((_, building)) => next = *building,
            None => break,
        }
    }
    waits.push((waiter, owner));
    true
}

fn stop_waiting(waiter: ThreadId) {
    WAITS.lock().retain(|(blocked, _)| *blocked != waiter);
}

enum SlotState {
    Empty,
    Building(ThreadId),
    Ready(Instance),
}

/// Single cached value that at most one thread builds at a time.
///
/// A miss reserves the slot for the calling thread, other threads wait until it's filled or released.
/// A second miss from the reserving thread returns `None` without waiting.
/// So does a miss that would close a wait cycle between threads: the caller builds without a reservation
/// and the cycle surfaces through the resolution path.
pub(crate) struct SynchronizedSlot {
    state: Mutex<SlotState>,
    changed: Condvar,
}

impl SynchronizedSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn get(&self) -> Option<Instance> {
        let current = thread::current().id();
        let mut state = self.state.lock();
        loop {
            let owner = match &*state {
                SlotState::Ready(instance) => return Some(instance.clone()),
                SlotState::Building(owner) => Some(*owner),
                SlotState::Empty => None,
            };
            match owner {
                None => {
                    *state = SlotState::Building(current);
                    return None;
                }
                Some(owner) if owner == current => return None,
                Some(owner) => {
                    if !start_waiting(current, owner) {
                        warn!("Waiting for a value built on another thread would deadlock, building without reservation");
                        return None;
                    }
                    self.changed.wait(&mut state);
                    stop_waiting(current);
                }
            }
        }
    }

    pub(crate) fn set(&self, instance: Instance) {
        *self.state.lock() = SlotState::Ready(instance);
        self.changed.notify_all();
    }

    /// Drops the reservation of the current thread, if it holds one
    pub(crate) fn release(&self) {
        let current = thread::current().id();
        let mut state = self.state.lock();
        if matches!(&*state, SlotState::Building(owner) if *owner == current) {
            *state = SlotState::Empty;
            self.changed.notify_all();
        }
    }

    /// Takes the cached value out, leaving the slot empty
    pub(crate) fn take(&self) -> Option<Instance> {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, SlotState::Empty) {
            SlotState::Ready(instance) => {
                self.changed.notify_all();
                Some(instance)
            }
            other => {
                *state = other;
                None
            }
        }
    }

    /// Cached value without reserving anything
    pub(crate) fn peek(&self) -> Option<Instance> {
        match &*self.state.lock() {
            SlotState::Ready(instance) => Some(instance.clone()),
            SlotState::Empty | SlotState::Building(_) => None,
        }
    }
}
