use parking_lot::Mutex;
use std::sync::Arc;

use super::{LifetimeContext, LifetimeManager, LifetimeState};
use crate::any::{Instance, WeakInstance};

/// Keeps only a weak handle, the instance lives as long as someone outside the container holds it
#[derive(Default)]
pub struct ExternallyControlledLifetimeManager {
    state: LifetimeState,
    value: Mutex<Option<WeakInstance>>,
}

impl ExternallyControlledLifetimeManager {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for ExternallyControlledLifetimeManager {
    #[inline]
    fn state(&self) -> &LifetimeState {
        &self.state
    }

    fn get_value(&self, _context: &LifetimeContext<'_>) -> Option<Instance> {
        self.value.lock().as_ref()?.upgrade()
    }

    fn set_value(&self, instance: Instance, _context: &LifetimeContext<'_>) {
        *self.value.lock() = Some(instance.downgrade());
    }

    fn remove_value(&self, _context: &LifetimeContext<'_>) {
        self.value.lock().take();
    }

    fn create_new(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::new())
    }
}
