use std::sync::Arc;

use super::{slot::SynchronizedSlot, LifetimeContext, LifetimeManager, LifetimeState};
use crate::any::Instance;

/// One instance per registration, owned and disposed by the container that holds the registration.
///
/// Concurrent first resolutions build the instance once, the other callers wait for it.
pub struct ContainerControlledLifetimeManager {
    state: LifetimeState,
    slot: SynchronizedSlot,
}

impl ContainerControlledLifetimeManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: LifetimeState::new(),
            slot: SynchronizedSlot::new(),
        }
    }

    /// Cached instance, without waiting for a build in progress
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<Instance> {
        self.slot.peek()
    }
}

impl Default for ContainerControlledLifetimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifetimeManager for ContainerControlledLifetimeManager {
    #[inline]
    fn state(&self) -> &LifetimeState {
        &self.state
    }

    fn get_value(&self, _context: &LifetimeContext<'_>) -> Option<Instance> {
        self.slot.get()
    }

    fn set_value(&self, instance: Instance, _context: &LifetimeContext<'_>) {
        self.slot.set(instance);
    }

    fn remove_value(&self, _context: &LifetimeContext<'_>) {
        self.slot.take();
    }

    fn create_new(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::new())
    }

    fn recover(&self) {
        self.slot.release();
    }

    #[inline]
    fn requires_recovery(&self) -> bool {
        true
    }

    #[inline]
    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        if let Some(instance) = self.slot.take() {
            self.state.finalize(instance);
        }
    }
}

/// Container-controlled lifetime, always registered in the root container
#[derive(Default)]
pub struct SingletonLifetimeManager(ContainerControlledLifetimeManager);

impl SingletonLifetimeManager {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for SingletonLifetimeManager {
    #[inline]
    fn state(&self) -> &LifetimeState {
        self.0.state()
    }

    fn get_value(&self, context: &LifetimeContext<'_>) -> Option<Instance> {
        self.0.get_value(context)
    }

    fn set_value(&self, instance: Instance, context: &LifetimeContext<'_>) {
        self.0.set_value(instance, context);
    }

    fn remove_value(&self, context: &LifetimeContext<'_>) {
        self.0.remove_value(context);
    }

    fn create_new(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::new())
    }

    fn recover(&self) {
        self.0.recover();
    }

    #[inline]
    fn requires_recovery(&self) -> bool {
        true
    }

    #[inline]
    fn is_singleton(&self) -> bool {
        true
    }

    #[inline]
    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        self.0.dispose();
    }
}

/// Container-controlled lifetime where every container below the registering one
/// gets its own instance on first resolution from it
#[derive(Default)]
pub struct HierarchicalLifetimeManager(ContainerControlledLifetimeManager);

impl HierarchicalLifetimeManager {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for HierarchicalLifetimeManager {
    #[inline]
    fn state(&self) -> &LifetimeState {
        self.0.state()
    }

    fn get_value(&self, context: &LifetimeContext<'_>) -> Option<Instance> {
        self.0.get_value(context)
    }

    fn set_value(&self, instance: Instance, context: &LifetimeContext<'_>) {
        self.0.set_value(instance, context);
    }

    fn remove_value(&self, context: &LifetimeContext<'_>) {
        self.0.remove_value(context);
    }

    fn create_new(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::new())
    }

    fn create_scope(&self) -> Option<Arc<dyn LifetimeManager>> {
        let scope = Self::new();
        if let Some(finalizer) = self.state().finalizer() {
            scope.state().set_finalizer(finalizer);
        }
        Some(Arc::new(scope))
    }

    fn recover(&self) {
        self.0.recover();
    }

    #[inline]
    fn requires_recovery(&self) -> bool {
        true
    }

    #[inline]
    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        self.0.dispose();
    }
}
