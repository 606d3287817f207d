mod container_controlled;
mod container_self;
mod externally_controlled;
mod factory;
mod per_resolve;
mod per_thread;
mod slot;
mod transient;

pub use container_controlled::{ContainerControlledLifetimeManager, HierarchicalLifetimeManager, SingletonLifetimeManager};
pub use container_self::ContainerSelfLifetimeManager;
pub use externally_controlled::ExternallyControlledLifetimeManager;
pub use factory::LifetimeFactory;
pub use per_resolve::PerResolveLifetimeManager;
pub use per_thread::PerThreadLifetimeManager;
pub use transient::TransientLifetimeManager;

use core::{
    any::type_name,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::{any::Instance, container::Container, context::ResolutionState, finalizer::BoxedFinalizer};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// Bookkeeping shared by every lifetime manager
pub struct LifetimeState {
    id: u64,
    in_use: AtomicBool,
    finalizer: Mutex<Option<BoxedFinalizer>>,
}

impl LifetimeState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            in_use: AtomicBool::new(false),
            finalizer: Mutex::new(None),
        }
    }

    /// Unique per manager, used as the slot key of per-resolve values
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Marks the manager as attached to a registration. Fails if it already is.
    #[inline]
    pub(crate) fn try_acquire(&self) -> bool {
        self.in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn set_finalizer(&self, finalizer: BoxedFinalizer) {
        *self.finalizer.lock() = Some(finalizer);
    }

    pub(crate) fn finalizer(&self) -> Option<BoxedFinalizer> {
        self.finalizer.lock().clone()
    }

    /// Runs the registered finalizer, if any, on an instance leaving the manager
    pub fn finalize(&self, instance: Instance) {
        if let Some(finalizer) = self.finalizer() {
            finalizer(instance);
        }
    }
}

impl Default for LifetimeState {
    fn default() -> Self {
        Self::new()
    }
}

/// What a lifetime manager sees of the build in progress
pub struct LifetimeContext<'a> {
    container: &'a Container,
    resolution: Option<&'a ResolutionState<'a>>,
}

impl<'a> LifetimeContext<'a> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(container: &'a Container, resolution: Option<&'a ResolutionState<'a>>) -> Self {
        Self { container, resolution }
    }

    /// Container the resolution was started on
    #[inline]
    #[must_use]
    pub const fn container(&self) -> &'a Container {
        self.container
    }

    #[inline]
    #[must_use]
    pub(crate) const fn resolution(&self) -> Option<&'a ResolutionState<'a>> {
        self.resolution
    }
}

/// Decides whether a registration builds a new instance or hands out a cached one.
///
/// A manager instance belongs to exactly one registration, see [`LifetimeState::in_use`].
pub trait LifetimeManager: Send + Sync + 'static {
    fn state(&self) -> &LifetimeState;

    fn get_value(&self, context: &LifetimeContext<'_>) -> Option<Instance>;

    fn set_value(&self, instance: Instance, context: &LifetimeContext<'_>);

    fn remove_value(&self, context: &LifetimeContext<'_>);

    /// Fresh manager of the same kind, used for closed types of an open generic registration
    fn create_new(&self) -> Arc<dyn LifetimeManager>;

    /// Copy installed into a child container on first resolution from it.
    /// `None` means the child shares this manager.
    fn create_scope(&self) -> Option<Arc<dyn LifetimeManager>> {
        None
    }

    /// Releases whatever `get_value` reserved for a build that failed
    fn recover(&self) {}

    fn requires_recovery(&self) -> bool {
        false
    }

    /// Registrations with singleton managers always land in the root container
    fn is_singleton(&self) -> bool {
        false
    }

    /// Disposable managers are tracked by the owning container and disposed with it
    fn is_disposable(&self) -> bool {
        false
    }

    fn dispose(&self) {}

    fn kind_name(&self) -> &'static str {
        type_name::<Self>()
    }
}
