use std::sync::Arc;

use super::{LifetimeContext, LifetimeManager, LifetimeState};
use crate::any::Instance;

/// Builds a new instance on every resolution
#[derive(Default)]
pub struct TransientLifetimeManager {
    state: LifetimeState,
}

impl TransientLifetimeManager {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for TransientLifetimeManager {
    #[inline]
    fn state(&self) -> &LifetimeState {
        &self.state
    }

    #[inline]
    fn get_value(&self, _context: &LifetimeContext<'_>) -> Option<Instance> {
        None
    }

    #[inline]
    fn set_value(&self, _instance: Instance, _context: &LifetimeContext<'_>) {}

    #[inline]
    fn remove_value(&self, _context: &LifetimeContext<'_>) {}

    fn create_new(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::new())
    }
}
