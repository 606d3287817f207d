use std::sync::Arc;

use super::{LifetimeContext, LifetimeManager, LifetimeState};
use crate::any::Instance;

/// Resolves `Container` to the container the resolution runs on
#[derive(Default)]
pub struct ContainerSelfLifetimeManager {
    state: LifetimeState,
}

impl ContainerSelfLifetimeManager {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for ContainerSelfLifetimeManager {
    #[inline]
    fn state(&self) -> &LifetimeState {
        &self.state
    }

    fn get_value(&self, context: &LifetimeContext<'_>) -> Option<Instance> {
        Some(Instance::new(Arc::new(context.container().clone())))
    }

    #[inline]
    fn set_value(&self, _instance: Instance, _context: &LifetimeContext<'_>) {}

    #[inline]
    fn remove_value(&self, _context: &LifetimeContext<'_>) {}

    fn create_new(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::new())
    }
}
