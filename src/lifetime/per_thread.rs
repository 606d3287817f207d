use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::Arc,
    thread::{self, ThreadId},
};

use super::{LifetimeContext, LifetimeManager, LifetimeState};
use crate::any::Instance;

/// One instance per calling thread
#[derive(Default)]
pub struct PerThreadLifetimeManager {
    state: LifetimeState,
    values: Mutex<HashMap<ThreadId, Instance>>,
}

impl PerThreadLifetimeManager {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for PerThreadLifetimeManager {
    #[inline]
    fn state(&self) -> &LifetimeState {
        &self.state
    }

    fn get_value(&self, _context: &LifetimeContext<'_>) -> Option<Instance> {
        self.values.lock().get(&thread::current().id()).cloned()
    }

    fn set_value(&self, instance: Instance, _context: &LifetimeContext<'_>) {
        self.values.lock().insert(thread::current().id(), instance);
    }

    fn remove_value(&self, _context: &LifetimeContext<'_>) {
        self.values.lock().remove(&thread::current().id());
    }

    fn create_new(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::new())
    }
}
