use core::any::Any;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::{
    build_plan::{BuildPlanCreator, DynamicBuildPlanCreator},
    container::Container,
    lifetime_container::LifetimeContainer,
    policy::PolicyList,
    registration::ContainerRegistration,
    strategies::{BuildKeyMappingStrategy, BuildPlanStrategy, LifetimeStrategy},
    strategy::{StagedStrategyChain, Stage},
};

/// Plug-in that configures a container when it's added
pub trait ContainerExtension: Any + Send + Sync {
    fn initialize(&self, context: &ExtensionContext<'_>);
}

type RegistrationCallback = Arc<dyn Fn(&ContainerRegistration) + Send + Sync>;
type ChildCallback = Arc<dyn Fn(&Container) + Send + Sync>;

#[derive(Default)]
pub(crate) struct ContainerEvents {
    registering: RwLock<Vec<RegistrationCallback>>,
    registering_instance: RwLock<Vec<RegistrationCallback>>,
    child_created: RwLock<Vec<ChildCallback>>,
}

impl ContainerEvents {
    pub(crate) fn fire_registering(&self, registration: &ContainerRegistration) {
        let callbacks = self.registering.read().clone();
        for callback in callbacks {
            callback(registration);
        }
    }

    pub(crate) fn fire_registering_instance(&self, registration: &ContainerRegistration) {
        let callbacks = self.registering_instance.read().clone();
        for callback in callbacks {
            callback(registration);
        }
    }

    pub(crate) fn fire_child_created(&self, child: &Container) {
        let callbacks = self.child_created.read().clone();
        for callback in callbacks {
            callback(child);
        }
    }
}

/// Access an extension gets to the container internals
pub struct ExtensionContext<'a> {
    container: &'a Container,
}

impl<'a> ExtensionContext<'a> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(container: &'a Container) -> Self {
        Self { container }
    }

    #[inline]
    #[must_use]
    pub const fn container(&self) -> &'a Container {
        self.container
    }

    #[inline]
    #[must_use]
    pub fn strategies(&self) -> &'a StagedStrategyChain {
        self.container.strategies()
    }

    #[inline]
    #[must_use]
    pub fn policies(&self) -> &'a Arc<PolicyList> {
        self.container.policies()
    }

    #[inline]
    #[must_use]
    pub fn lifetime(&self) -> &'a LifetimeContainer {
        self.container.lifetime()
    }

    /// Called after every type registration on this container
    pub fn on_registering(&self, callback: impl Fn(&ContainerRegistration) + Send + Sync + 'static) {
        self.container.events().registering.write().push(Arc::new(callback));
    }

    /// Called after every instance registration on this container
    pub fn on_registering_instance(&self, callback: impl Fn(&ContainerRegistration) + Send + Sync + 'static) {
        self.container.events().registering_instance.write().push(Arc::new(callback));
    }

    /// Called with every child container created from this container
    pub fn on_child_container_created(&self, callback: impl Fn(&Container) + Send + Sync + 'static) {
        self.container.events().child_created.write().push(Arc::new(callback));
    }
}

/// Key mapping, lifetime and build plan strategies plus the dynamic plan creator as the default creator.
///
/// Added to every root container on construction.
pub struct DefaultStrategies;

impl ContainerExtension for DefaultStrategies {
    fn initialize(&self, context: &ExtensionContext<'_>) {
        let strategies = context.strategies();
        strategies.add(BuildKeyMappingStrategy, Stage::TypeMapping);
        strategies.add(LifetimeStrategy, Stage::Lifetime);
        strategies.add(BuildPlanStrategy, Stage::Creation);

        context
            .policies()
            .set_default::<dyn BuildPlanCreator>(Arc::new(DynamicBuildPlanCreator));

        debug!("Default strategies installed");
    }
}
