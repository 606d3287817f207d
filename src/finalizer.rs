use core::any::type_name;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::any::Instance;

/// Called once when a container disposes an instance it owns
pub trait Finalizer<Dep: ?Sized>: Clone + Send + Sync + 'static {
    fn finalize(&mut self, dependency: Arc<Dep>);
}

pub(crate) type BoxedFinalizer = Arc<dyn Fn(Instance) + Send + Sync>;

#[must_use]
pub(crate) fn boxed_finalizer<Dep, Fin>(finalizer: Fin) -> BoxedFinalizer
where
    Dep: ?Sized + Send + Sync + 'static,
    Fin: Finalizer<Dep>,
{
    Arc::new(move |instance: Instance| match instance.downcast::<Dep>() {
        Some(dependency) => {
            finalizer.clone().finalize(dependency);
            debug!(dependency = type_name::<Dep>(), "Finalized");
        }
        None => {
            warn!(
                expected = type_name::<Dep>(),
                actual = instance.type_info().name,
                "Finalizer skipped, instance has another type"
            );
        }
    })
}

impl<F, Dep> Finalizer<Dep> for F
where
    F: FnMut(Arc<Dep>) + Clone + Send + Sync + 'static,
    Dep: ?Sized,
{
    #[inline]
    fn finalize(&mut self, dependency: Arc<Dep>) {
        self(dependency);
    }
}
