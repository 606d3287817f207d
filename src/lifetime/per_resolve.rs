use parking_lot::Mutex;
use std::sync::Arc;

use super::{LifetimeContext, LifetimeManager, LifetimeState};
use crate::any::Instance;

/// One instance per top-level resolve call, shared by every consumer within that object graph.
///
/// A value set outside a resolution (instance registration) is handed out to every resolution.
#[derive(Default)]
pub struct PerResolveLifetimeManager {
    state: LifetimeState,
    registered: Mutex<Option<Instance>>,
}

impl PerResolveLifetimeManager {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for PerResolveLifetimeManager {
    #[inline]
    fn state(&self) -> &LifetimeState {
        &self.state
    }

    fn get_value(&self, context: &LifetimeContext<'_>) -> Option<Instance> {
        if let Some(instance) = self.registered.lock().clone() {
            return Some(instance);
        }
        context.resolution()?.per_resolve_value(self.state.id())
    }

    fn set_value(&self, instance: Instance, context: &LifetimeContext<'_>) {
        match context.resolution() {
            Some(resolution) => resolution.set_per_resolve_value(self.state.id(), instance),
            None => *self.registered.lock() = Some(instance),
        }
    }

    fn remove_value(&self, context: &LifetimeContext<'_>) {
        match context.resolution() {
            Some(resolution) => resolution.remove_per_resolve_value(self.state.id()),
            None => *self.registered.lock() = None,
        }
    }

    fn create_new(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::new())
    }
}
