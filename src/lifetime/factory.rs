use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

use super::LifetimeManager;

/// Stands in for a lifetime manager on open generic registrations.
///
/// Each closed type resolved through the registration gets its own manager made from the prototype.
pub struct LifetimeFactory {
    prototype: Arc<dyn LifetimeManager>,
    lock: Mutex<()>,
}

impl LifetimeFactory {
    #[inline]
    #[must_use]
    pub fn new(prototype: Arc<dyn LifetimeManager>) -> Self {
        Self {
            prototype,
            lock: Mutex::new(()),
        }
    }

    #[inline]
    #[must_use]
    pub fn prototype(&self) -> &Arc<dyn LifetimeManager> {
        &self.prototype
    }

    /// New manager of the prototype's kind, already attached and sharing its finalizer
    #[must_use]
    pub fn create(&self) -> Arc<dyn LifetimeManager> {
        let manager = self.prototype.create_new();
        manager.state().try_acquire();
        if let Some(finalizer) = self.prototype.state().finalizer() {
            manager.state().set_finalizer(finalizer);
        }
        manager
    }

    /// Serializes installation of managers created by this factory
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }
}
