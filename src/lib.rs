#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod any;
pub(crate) mod build_key;
pub(crate) mod build_plan;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod extension;
pub(crate) mod finalizer;
pub(crate) mod injection;
pub(crate) mod instantiator;
pub(crate) mod lifetime;
pub(crate) mod lifetime_container;
pub(crate) mod overrides;
pub(crate) mod policy;
pub(crate) mod registration;
pub(crate) mod strategies;
pub(crate) mod strategy;

pub mod catalog;

pub use any::{Assignable, Caster, GenericDef, GenericType, Instance, TypeInfo, WeakInstance};
pub use build_key::BuildKey;
pub use build_plan::{
    BuildPlan, BuildPlanCreator, Constructor, DynamicBuildPlan, DynamicBuildPlanCreator, Initializer, Initializers,
    OverriddenBuildPlanMarker,
};
pub use config::ContainerConfig;
pub use container::Container;
pub use context::{BuilderContext, RecoveryStack};
pub use dependency_resolver::{DependencyName, DependencyResolver, Inject, InjectNamed};
pub use errors::{BuildErrorKind, InstantiateErrorKind, InstantiatorErrorKind, RegistrationErrorKind, ResolutionFailed};
pub use extension::{ContainerExtension, DefaultStrategies, ExtensionContext};
pub use finalizer::Finalizer;
pub use injection::{InjectionConstructor, InjectionFactory, InjectionMember, InjectionMethod};
pub use instantiator::{Instantiator, Method};
pub use lifetime::{
    ContainerControlledLifetimeManager, ContainerSelfLifetimeManager, ExternallyControlledLifetimeManager,
    HierarchicalLifetimeManager, LifetimeContext, LifetimeFactory, LifetimeManager, LifetimeState, PerResolveLifetimeManager,
    PerThreadLifetimeManager, SingletonLifetimeManager, TransientLifetimeManager,
};
pub use lifetime_container::LifetimeContainer;
pub use overrides::ResolverOverride;
pub use policy::PolicyList;
pub use registration::{ContainerRegistration, GenericMapping, Registration, RegistrationContext};
pub use strategies::{BuildKeyMappingPolicy, BuildKeyMappingStrategy, BuildPlanStrategy, LifetimeStrategy};
pub use strategy::{BuilderStrategy, RegistrationAware, Stage, StagedStrategyChain, StrategyChain};
