use core::{
    any::Any,
    sync::atomic::{AtomicBool, Ordering},
};
use parking_lot::{Mutex, RwLock};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, debug_span, error, info_span, warn};

use crate::{
    any::{GenericType, Instance, TypeInfo},
    build_key::BuildKey,
    build_plan::{BuildPlanCreator, Initializers},
    config::ContainerConfig,
    context::{BuilderContext, ResolutionState},
    errors::{BuildErrorKind, RegistrationErrorKind, ResolutionFailed},
    extension::{ContainerEvents, ContainerExtension, DefaultStrategies, ExtensionContext},
    lifetime::{
        ContainerControlledLifetimeManager, ContainerSelfLifetimeManager, LifetimeContext, LifetimeFactory, LifetimeManager,
        TransientLifetimeManager,
    },
    lifetime_container::LifetimeContainer,
    overrides::ResolverOverride,
    policy::PolicyList,
    registration::{ContainerRegistration, Registration, RegistrationContext},
    strategy::StagedStrategyChain,
};

/// Handle to a container. Clones share the same container.
///
/// The container is disposed with [`Container::dispose`] or when its last handle is dropped.
/// Child containers keep their parent alive, parents only track their children weakly.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    parent: Option<Container>,
    policies: Arc<PolicyList>,
    strategies: Arc<StagedStrategyChain>,
    lifetime: LifetimeContainer,
    config: ContainerConfig,
    events: ContainerEvents,
    extensions: RwLock<Vec<Arc<dyn Any + Send + Sync>>>,
    registration_lock: Mutex<()>,
    disposed: AtomicBool,
}

impl ContainerInner {
    /// Disposes owned lifetime managers and child containers, then detaches from the parent.
    /// Only the first call has an effect.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Disposing container");

        self.lifetime.dispose(self);
        self.policies.clear_all();

        if let Some(parent) = &self.parent {
            parent.inner.lifetime.remove_child(self);
        }
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Container {
    /// Creates root container with default config
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    #[must_use]
    pub fn with_config(config: ContainerConfig) -> Self {
        let container = Self {
            inner: Arc::new(ContainerInner {
                parent: None,
                policies: Arc::new(PolicyList::new()),
                strategies: Arc::new(StagedStrategyChain::new()),
                lifetime: LifetimeContainer::new(),
                config,
                events: ContainerEvents::default(),
                extensions: RwLock::new(Vec::new()),
                registration_lock: Mutex::new(()),
                disposed: AtomicBool::new(false),
            }),
        };
        container.add_extension(DefaultStrategies);
        container.register_self();
        container
    }

    /// Creates a child container.
    ///
    /// The child sees every registration and strategy of its ancestors, its own registrations shadow theirs.
    /// It's disposed together with this container.
    #[must_use]
    pub fn create_child_container(&self) -> Container {
        if self.is_disposed() {
            warn!("Child container created from a disposed container");
        }

        let inner = Arc::new(ContainerInner {
            parent: Some(self.clone()),
            policies: Arc::new(PolicyList::with_parent(self.inner.policies.clone())),
            strategies: Arc::new(StagedStrategyChain::with_parent(self.inner.strategies.clone())),
            lifetime: LifetimeContainer::new(),
            config: self.inner.config,
            events: ContainerEvents::default(),
            extensions: RwLock::new(Vec::new()),
            registration_lock: Mutex::new(()),
            disposed: AtomicBool::new(false),
        });
        self.inner.lifetime.add_child(Arc::downgrade(&inner));

        let child = Container { inner };
        child.register_self();
        debug!("Child container created");

        self.inner.events.fire_child_created(&child);
        child
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    #[must_use]
    pub fn root(&self) -> &Container {
        let mut container = self;
        while let Some(parent) = container.parent() {
            container = parent;
        }
        container
    }

    /// Container in this container's ancestry owning `policies`
    #[must_use]
    pub(crate) fn owner_of(&self, policies: &Arc<PolicyList>) -> Option<Container> {
        let mut container = Some(self);
        while let Some(current) = container {
            if Arc::ptr_eq(&current.inner.policies, policies) {
                return Some(current.clone());
            }
            container = current.parent();
        }
        None
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    #[inline]
    #[must_use]
    pub fn policies(&self) -> &Arc<PolicyList> {
        &self.inner.policies
    }

    #[inline]
    #[must_use]
    pub fn strategies(&self) -> &StagedStrategyChain {
        &self.inner.strategies
    }

    #[inline]
    #[must_use]
    pub fn lifetime(&self) -> &LifetimeContainer {
        &self.inner.lifetime
    }

    #[inline]
    pub(crate) fn events(&self) -> &ContainerEvents {
        &self.inner.events
    }

    /// Initializes `extension` against this container and keeps it for [`Container::configure`]
    pub fn add_extension<E: ContainerExtension>(&self, extension: E) -> &Self {
        let span = debug_span!("add_extension", extension = core::any::type_name::<E>());
        let _guard = span.enter();

        let extension = Arc::new(extension);
        extension.initialize(&ExtensionContext::new(self));
        self.inner.extensions.write().push(extension);
        debug!("Extension added");

        self
    }

    /// Extension of type `E` added to this container or one of its ancestors
    #[must_use]
    pub fn configure<E: ContainerExtension>(&self) -> Option<Arc<E>> {
        let mut container = Some(self);
        while let Some(current) = container {
            let found = current
                .inner
                .extensions
                .read()
                .iter()
                .find_map(|extension| extension.clone().downcast::<E>().ok());
            if found.is_some() {
                return found;
            }
            container = current.parent();
        }
        None
    }

    fn register_self(&self) {
        let manager: Arc<dyn LifetimeManager> = Arc::new(ContainerSelfLifetimeManager::new());
        manager.state().try_acquire();

        let build_key = BuildKey::of::<Container>();
        let record = ContainerRegistration {
            registered_type: TypeInfo::of::<Container>(),
            mapped_to_type: TypeInfo::of::<Container>(),
            name: None,
            lifetime_manager_type: manager.kind_name(),
        };
        self.inner.policies.set::<dyn LifetimeManager>(&build_key, manager);
        self.inner.policies.set(&build_key, Arc::new(record));
    }

    /// Applies a registration.
    ///
    /// Registrations with a singleton lifetime are applied to the root container.
    /// A previous registration of the same key is replaced, its tracked lifetime manager disposed.
    ///
    /// # Errors
    /// - Returns [`RegistrationErrorKind::TypeMismatch`] if the mapped-to type can't be handed out as the registered type
    /// - Returns [`RegistrationErrorKind::LifetimeManagerInUse`] if the lifetime manager is attached to another registration
    /// - Returns [`RegistrationErrorKind::Disposed`] if the container is disposed
    pub fn register(&self, registration: Registration) -> Result<&Self, RegistrationErrorKind> {
        let span = debug_span!(
            "register",
            from = registration.from.name,
            to = registration.to.name,
            name = registration.name.as_deref()
        );
        let _guard = span.enter();

        if self.is_disposed() {
            let err = RegistrationErrorKind::Disposed;
            error!("{}", err);
            return Err(err);
        }
        if let Err(err) = registration.validate() {
            error!("{}", err);
            return Err(err);
        }

        let Registration {
            from,
            to,
            name,
            lifetime,
            members,
            caster,
            generic_mapping,
            instance,
            finalizer,
            plan_creator,
        } = registration;

        let manager = lifetime.unwrap_or_else(|| -> Arc<dyn LifetimeManager> {
            if instance.is_some() {
                Arc::new(ContainerControlledLifetimeManager::new())
            } else {
                Arc::new(TransientLifetimeManager::new())
            }
        });
        if !manager.state().try_acquire() {
            let err = RegistrationErrorKind::LifetimeManagerInUse {
                manager: manager.kind_name(),
            };
            error!("{}", err);
            return Err(err);
        }

        let target = if manager.is_singleton() { self.root() } else { self };
        let open = from.is_open_generic();
        let from_key = BuildKey::from_parts(from.clone(), name.clone());
        let to_key = BuildKey::from_parts(to.clone(), name.clone());
        let record = ContainerRegistration {
            registered_type: from.clone(),
            mapped_to_type: to,
            name,
            lifetime_manager_type: manager.kind_name(),
        };

        {
            let _lock = target.inner.registration_lock.lock();
            let policies = target.policies();

            if let Some(previous) = policies.get_local::<dyn LifetimeManager>(&from_key) {
                if target.lifetime().remove(&previous) {
                    debug!(kind = previous.kind_name(), "Previous lifetime manager disposed");
                    previous.dispose();
                }
            }
            policies.clear_key(&from_key);
            if open {
                Self::clear_closed_managers(target, &from_key);
            }
            if !members.is_empty() && to_key != from_key {
                policies.clear::<Initializers>(&to_key);
            }

            if let Some(finalizer) = finalizer {
                manager.state().set_finalizer(finalizer);
            }
            if open {
                policies.set(&from_key, Arc::new(LifetimeFactory::new(manager.clone())));
            } else {
                policies.set::<dyn LifetimeManager>(&from_key, manager.clone());
                if manager.is_disposable() {
                    target.lifetime().add(manager.clone());
                }
            }
            if let Some(instance) = &instance {
                manager.set_value(instance.clone(), &LifetimeContext::new(target, None));
            }

            if let Some(creator) = plan_creator {
                policies.set::<dyn BuildPlanCreator>(&to_key, creator);
            }
            for member in &members {
                member.add_policies(&from, &to_key, policies);
            }
            policies.set(&from_key, Arc::new(record.clone()));

            let chain = target.strategies().make_chain();
            let context = RegistrationContext {
                from: from_key,
                to: to_key,
                caster: caster.as_ref(),
                generic_mapping: generic_mapping.as_ref(),
                policies,
            };
            for strategy in chain.registration_aware() {
                if instance.is_some() {
                    strategy.on_register_instance(&context);
                } else {
                    strategy.on_register_type(&context);
                }
            }
        }
        debug!(kind = record.lifetime_manager_type, "Registered");

        if instance.is_some() {
            self.inner.events.fire_registering_instance(&record);
        } else {
            self.inner.events.fire_registering(&record);
        }

        Ok(self)
    }

    /// Shortcut for [`Registration::instance`] with an optional name
    ///
    /// # Errors
    /// See [`Container::register`]
    pub fn register_instance<T: ?Sized + Send + Sync + 'static>(
        &self,
        instance: Arc<T>,
        name: Option<&str>,
    ) -> Result<&Self, RegistrationErrorKind> {
        let registration = Registration::instance(instance);
        match name {
            Some(name) => self.register(registration.named(name)),
            None => self.register(registration),
        }
    }

    /// Resolves the unnamed registration of `T`
    ///
    /// # Errors
    /// Returns [`ResolutionFailed`] wrapping the reason the build failed
    #[inline]
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolutionFailed> {
        self.resolve_with(None, &[])
    }

    /// # Errors
    /// Returns [`ResolutionFailed`] wrapping the reason the build failed
    #[inline]
    pub fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolutionFailed> {
        self.resolve_with(Some(name), &[])
    }

    /// Resolves `T`, using `overrides` instead of building matching dependencies
    ///
    /// # Errors
    /// Returns [`ResolutionFailed`] wrapping the reason the build failed
    pub fn resolve_with<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: Option<&str>,
        overrides: &[ResolverOverride],
    ) -> Result<Arc<T>, ResolutionFailed> {
        let build_key = BuildKey::new(TypeInfo::of::<T>(), name);
        let instance = self.build(&build_key, None, overrides)?;
        Self::downcast(&build_key, &instance)
    }

    /// Resolves a type known only at runtime
    ///
    /// # Errors
    /// Returns [`ResolutionFailed`] wrapping the reason the build failed
    #[inline]
    pub fn resolve_type(
        &self,
        type_info: &TypeInfo,
        name: Option<&str>,
        overrides: &[ResolverOverride],
    ) -> Result<Instance, ResolutionFailed> {
        self.build(&BuildKey::new(type_info.clone(), name), None, overrides)
    }

    /// Resolves a closed generic type, falling back to the registration of its open definition
    ///
    /// # Errors
    /// Returns [`ResolutionFailed`] wrapping the reason the build failed
    pub fn resolve_generic<T: GenericType + Send + Sync>(&self, name: Option<&str>) -> Result<Arc<T>, ResolutionFailed> {
        let build_key = BuildKey::new(T::type_info(), name);
        let instance = self.build(&build_key, None, &[])?;
        Self::downcast(&build_key, &instance)
    }

    /// Resolves every named registration of `T`, ordered by name. The unnamed registration isn't included.
    ///
    /// # Errors
    /// Returns the first [`ResolutionFailed`]
    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolutionFailed> {
        let type_info = TypeInfo::of::<T>();
        let mut names: Vec<Arc<str>> = self
            .registrations()
            .filter(|registration| registration.registered_type() == &type_info)
            .filter_map(|registration| registration.name)
            .collect();
        names.sort();

        names.iter().map(|name| self.resolve_named::<T>(name)).collect()
    }

    /// Runs the build pipeline over an existing instance, the constructor isn't called
    ///
    /// # Errors
    /// Returns [`ResolutionFailed`] wrapping the reason the build failed
    pub fn build_up<T: ?Sized + Send + Sync + 'static>(
        &self,
        existing: Arc<T>,
        name: Option<&str>,
        overrides: &[ResolverOverride],
    ) -> Result<Arc<T>, ResolutionFailed> {
        let build_key = BuildKey::new(TypeInfo::of::<T>(), name);
        let instance = self.build(&build_key, Some(Instance::new(existing)), overrides)?;
        Self::downcast(&build_key, &instance)
    }

    fn build(&self, build_key: &BuildKey, existing: Option<Instance>, overrides: &[ResolverOverride]) -> Result<Instance, ResolutionFailed> {
        let span = info_span!("resolve", dependency = build_key.type_info().name, name = build_key.name());
        let _guard = span.enter();

        if self.is_disposed() {
            let err = ResolutionFailed::new(build_key, BuildErrorKind::Disposed);
            error!("{}", err);
            return Err(err);
        }

        let chain = self.strategies().make_chain();
        let resolution = ResolutionState::new(overrides, self.inner.config);
        let mut context = BuilderContext::new(self, &chain, &resolution, build_key.clone(), existing);

        match context.execute() {
            Ok(instance) => {
                debug!("Resolved");
                Ok(instance)
            }
            Err(err) => {
                let err = ResolutionFailed::new(build_key, err);
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Disposes managers that the previous lifetime factory of `definition_key` made for closed types.
    /// Closed types with a registration of their own keep their manager.
    fn clear_closed_managers(target: &Container, definition_key: &BuildKey) {
        let policies = target.policies();
        let definition = definition_key.type_info().generic_definition();
        let closed: Vec<_> = policies
            .keys()
            .into_iter()
            .filter(|key| {
                !key.is_open_generic()
                    && key.name == definition_key.name
                    && key.type_info().generic_definition() == definition
                    && policies.get_local::<ContainerRegistration>(key).is_none()
            })
            .collect();

        for key in closed {
            let Some(previous) = policies.clear::<dyn LifetimeManager>(&key) else {
                continue;
            };
            if target.lifetime().remove(&previous) {
                previous.dispose();
            }
            debug!(key = %key, kind = previous.kind_name(), "Closed generic lifetime manager dropped");
        }
    }

    fn downcast<T: ?Sized + 'static>(build_key: &BuildKey, instance: &Instance) -> Result<Arc<T>, ResolutionFailed> {
        instance.downcast::<T>().ok_or_else(|| {
            let err = ResolutionFailed::new(
                build_key,
                BuildErrorKind::IncorrectType {
                    expected: build_key.type_info().name,
                    actual: instance.type_info().name,
                },
            );
            error!("{}", err);
            err
        })
    }

    /// Whether `T` has a registration in this container or an ancestor
    #[inline]
    #[must_use]
    pub fn is_registered<T: ?Sized + 'static>(&self, name: Option<&str>) -> bool {
        self.is_registered_type(&TypeInfo::of::<T>(), name)
    }

    #[inline]
    #[must_use]
    pub fn is_registered_type(&self, type_info: &TypeInfo, name: Option<&str>) -> bool {
        self.is_registered_key(&BuildKey::new(type_info.clone(), name))
    }

    pub(crate) fn is_registered_key(&self, build_key: &BuildKey) -> bool {
        self.inner.policies.get_exact::<ContainerRegistration>(build_key).is_some()
    }

    /// Snapshot of the registrations visible from this container.
    /// Registrations of a child shadow those of its ancestors with the same key.
    pub fn registrations(&self) -> impl Iterator<Item = ContainerRegistration> {
        let mut seen = HashSet::new();
        let mut registrations = Vec::new();

        let mut container = Some(self);
        while let Some(current) = container {
            let policies = current.policies();
            for build_key in policies.keys() {
                if seen.contains(&build_key) {
                    continue;
                }
                if let Some(registration) = policies.get_local::<ContainerRegistration>(&build_key) {
                    registrations.push((*registration).clone());
                    seen.insert(build_key);
                }
            }
            container = current.parent();
        }

        registrations.into_iter()
    }

    /// Disposes this container and its child containers. Repeated calls do nothing.
    #[inline]
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Container {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Container")
            .field("root", &self.inner.parent.is_none())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
