use core::mem;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::{container::ContainerInner, lifetime::LifetimeManager};

enum Entry {
    Manager(Arc<dyn LifetimeManager>),
    Child(Weak<ContainerInner>),
}

/// Disposables owned by a container: disposable lifetime managers and child containers.
///
/// Children are held weakly so a parent never keeps its children alive.
#[derive(Default)]
pub struct LifetimeContainer {
    entries: Mutex<Vec<Entry>>,
}

impl LifetimeContainer {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, manager: Arc<dyn LifetimeManager>) {
        self.entries.lock().push(Entry::Manager(manager));
    }

    pub(crate) fn add_child(&self, child: Weak<ContainerInner>) {
        self.entries.lock().push(Entry::Child(child));
    }

    /// Stops tracking `manager` without disposing it
    pub fn remove(&self, manager: &Arc<dyn LifetimeManager>) -> bool {
        let id = manager.state().id();
        let mut entries = self.entries.lock();
        let len = entries.len();
        entries.retain(|entry| !matches!(entry, Entry::Manager(tracked) if tracked.state().id() == id));
        entries.len() != len
    }

    pub(crate) fn remove_child(&self, child: *const ContainerInner) {
        self.entries
            .lock()
            .retain(|entry| !matches!(entry, Entry::Child(tracked) if tracked.as_ptr() == child));
    }

    #[must_use]
    pub fn contains(&self, manager: &Arc<dyn LifetimeManager>) -> bool {
        let id = manager.state().id();
        self.entries
            .lock()
            .iter()
            .any(|entry| matches!(entry, Entry::Manager(tracked) if tracked.state().id() == id))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Disposes everything in reverse insertion order.
    /// Entries added while disposing are disposed too. `owner` is never disposed from here.
    pub(crate) fn dispose(&self, owner: *const ContainerInner) {
        loop {
            let entries = mem::take(&mut *self.entries.lock());
            if entries.is_empty() {
                break;
            }
            debug!(count = entries.len(), "Disposing lifetime entries");

            for entry in entries.into_iter().rev() {
                match entry {
                    Entry::Manager(manager) => manager.dispose(),
                    Entry::Child(child) => {
                        if child.as_ptr() == owner {
                            continue;
                        }
                        if let Some(child) = child.upgrade() {
                            child.dispose();
                        }
                    }
                }
            }
        }
    }
}
