use core::cell::RefCell;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, debug_span, error};

use crate::{
    any::{Caster, Instance, TypeInfo},
    build_key::BuildKey,
    config::ContainerConfig,
    container::Container,
    dependency_resolver::resolve_key,
    errors::BuildErrorKind,
    lifetime::{LifetimeContext, LifetimeManager},
    lifetime_container::LifetimeContainer,
    overrides::ResolverOverride,
    policy::PolicyList,
    strategy::StrategyChain,
};

/// State shared by every build within one top-level resolve call
pub(crate) struct ResolutionState<'a> {
    overrides: &'a [ResolverOverride],
    config: ContainerConfig,
    path: RefCell<Vec<BuildKey>>,
    per_resolve: RefCell<HashMap<u64, Instance>>,
}

impl<'a> ResolutionState<'a> {
    pub(crate) fn new(overrides: &'a [ResolverOverride], config: ContainerConfig) -> Self {
        Self {
            overrides,
            config,
            path: RefCell::new(Vec::new()),
            per_resolve: RefCell::new(HashMap::new()),
        }
    }

    /// Pushes `key` onto the build path. The returned guard pops it.
    pub(crate) fn enter(&self, key: &BuildKey) -> Result<PathGuard<'_, 'a>, BuildErrorKind> {
        let mut path = self.path.borrow_mut();

        if self.config.detect_cycles && path.contains(key) {
            let start = path.iter().position(|entered| entered == key).unwrap_or_default();
            let mut cycle = path[start..].to_vec();
            cycle.push(key.clone());
            return Err(BuildErrorKind::CyclicDependency { path: cycle });
        }
        if path.len() >= self.config.max_resolution_depth {
            return Err(BuildErrorKind::MaxDepthExceeded {
                key: key.clone(),
                limit: self.config.max_resolution_depth,
            });
        }

        path.push(key.clone());
        Ok(PathGuard { state: self })
    }

    pub(crate) fn find_override(&self, key: &BuildKey) -> Option<Instance> {
        self.overrides
            .iter()
            .find(|resolver_override| resolver_override.matches(key))
            .map(|resolver_override| resolver_override.value().clone())
    }

    pub(crate) fn per_resolve_value(&self, id: u64) -> Option<Instance> {
        self.per_resolve.borrow().get(&id).cloned()
    }

    pub(crate) fn set_per_resolve_value(&self, id: u64, instance: Instance) {
        self.per_resolve.borrow_mut().insert(id, instance);
    }

    pub(crate) fn remove_per_resolve_value(&self, id: u64) {
        self.per_resolve.borrow_mut().remove(&id);
    }
}

pub(crate) struct PathGuard<'s, 'a> {
    state: &'s ResolutionState<'a>,
}

impl Drop for PathGuard<'_, '_> {
    fn drop(&mut self) {
        self.state.path.borrow_mut().pop();
    }
}

/// Undo actions registered by strategies, run in reverse order when a build fails
#[derive(Default)]
pub struct RecoveryStack {
    actions: Vec<Box<dyn FnOnce()>>,
}

impl RecoveryStack {
    #[inline]
    pub fn add(&mut self, action: impl FnOnce() + 'static) {
        self.actions.push(Box::new(action));
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn execute_recovery(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }
}

/// Per-build state carried through the strategy chain.
///
/// Nested dependencies are built with [`BuilderContext::new_build_up`], which runs a child context
/// over the same chain and resolution state.
pub struct BuilderContext<'a> {
    container: &'a Container,
    chain: &'a StrategyChain,
    resolution: &'a ResolutionState<'a>,
    original_build_key: BuildKey,
    build_key: BuildKey,
    existing: Option<Instance>,
    build_complete: bool,
    recovery_stack: RecoveryStack,
    child_build_key: Option<BuildKey>,
    lifetime_manager: Option<Arc<dyn LifetimeManager>>,
    type_mapping: Option<Caster>,
}

impl<'a> BuilderContext<'a> {
    pub(crate) fn new(
        container: &'a Container,
        chain: &'a StrategyChain,
        resolution: &'a ResolutionState<'a>,
        build_key: BuildKey,
        existing: Option<Instance>,
    ) -> Self {
        Self {
            container,
            chain,
            resolution,
            original_build_key: build_key.clone(),
            build_key,
            existing,
            build_complete: false,
            recovery_stack: RecoveryStack::default(),
            child_build_key: None,
            lifetime_manager: None,
            type_mapping: None,
        }
    }

    /// Container the resolution was started on
    #[inline]
    #[must_use]
    pub const fn container(&self) -> &'a Container {
        self.container
    }

    /// Policies of the resolving container, lookups fall through to its ancestors
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

    #[inline]
    #[must_use]
    pub const fn strategies(&self) -> &'a StrategyChain {
        self.chain
    }

    /// Key requested by the caller, before any mapping
    #[inline]
    #[must_use]
    pub const fn original_build_key(&self) -> &BuildKey {
        &self.original_build_key
    }

    /// Key currently being built
    #[inline]
    #[must_use]
    pub const fn build_key(&self) -> &BuildKey {
        &self.build_key
    }

    #[inline]
    pub fn set_build_key(&mut self, build_key: BuildKey) {
        self.build_key = build_key;
    }

    #[inline]
    #[must_use]
    pub const fn existing(&self) -> Option<&Instance> {
        self.existing.as_ref()
    }

    #[inline]
    pub fn set_existing(&mut self, existing: Option<Instance>) {
        self.existing = existing;
    }

    #[inline]
    #[must_use]
    pub const fn is_build_complete(&self) -> bool {
        self.build_complete
    }

    /// Stops the forward pass after the current strategy
    #[inline]
    pub fn set_build_complete(&mut self, build_complete: bool) {
        self.build_complete = build_complete;
    }

    #[inline]
    pub fn recovery_stack_mut(&mut self) -> &mut RecoveryStack {
        &mut self.recovery_stack
    }

    /// Key of the dependency currently being built, kept after a failure for diagnostics
    #[inline]
    #[must_use]
    pub const fn child_build_key(&self) -> Option<&BuildKey> {
        self.child_build_key.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn lifetime_manager(&self) -> Option<&Arc<dyn LifetimeManager>> {
        self.lifetime_manager.as_ref()
    }

    #[inline]
    pub(crate) fn set_lifetime_manager(&mut self, manager: Option<Arc<dyn LifetimeManager>>) {
        self.lifetime_manager = manager;
    }

    #[inline]
    pub(crate) fn set_type_mapping(&mut self, caster: Option<Caster>) {
        self.type_mapping = caster;
    }

    #[inline]
    #[must_use]
    pub fn lifetime_context(&self) -> LifetimeContext<'_> {
        LifetimeContext::new(self.container, Some(self.resolution))
    }

    /// Converts the built instance to the requested contract, if the key was mapped
    pub(crate) fn apply_type_mapping(&mut self) -> Result<(), BuildErrorKind> {
        let Some(caster) = self.type_mapping.take() else {
            return Ok(());
        };
        let Some(existing) = self.existing.take() else {
            return Ok(());
        };
        if existing.type_info() == caster.target() {
            self.existing = Some(existing);
            return Ok(());
        }

        match caster.cast(&existing) {
            Some(instance) => {
                self.existing = Some(instance);
                Ok(())
            }
            None => {
                let err = BuildErrorKind::IncorrectType {
                    expected: caster.source().name,
                    actual: existing.type_info().name,
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Builds a dependency of the current build with its own child context
    pub fn new_build_up(&mut self, build_key: BuildKey) -> Result<Instance, BuildErrorKind> {
        let span = debug_span!("build_up", dependency = %build_key);
        let _guard = span.enter();

        if let Some(instance) = self.resolution.find_override(&build_key) {
            debug!("Found in overrides");
            return Ok(instance);
        }

        self.child_build_key = Some(build_key.clone());
        let mut child = BuilderContext::new(self.container, self.chain, self.resolution, build_key.clone(), None);

        match child.execute() {
            Ok(instance) => {
                self.child_build_key = None;
                Ok(instance)
            }
            Err(err) => {
                debug!("{}", err);
                Err(BuildErrorKind::Dependency {
                    key: build_key,
                    source: Box::new(err),
                })
            }
        }
    }

    /// Resolves a dependency within the current resolution, sharing its overrides and build path
    ///
    /// # Errors
    /// Returns the reason the dependency could not be built
    pub fn resolve<T: ?Sized + 'static>(&mut self, name: Option<&str>) -> Result<Arc<T>, BuildErrorKind> {
        resolve_key(self, BuildKey::new(TypeInfo::of::<T>(), name))
    }

    pub(crate) fn execute(&mut self) -> Result<Instance, BuildErrorKind> {
        if self.original_build_key.is_open_generic() {
            let err = BuildErrorKind::OpenGenericResolution {
                type_name: self.original_build_key.type_info().name,
            };
            error!("{}", err);
            return Err(err);
        }

        let resolution = self.resolution;
        let _path = resolution.enter(&self.original_build_key)?;

        let chain = self.chain;
        chain.execute_build_up(self)?;

        match &self.existing {
            Some(instance) => Ok(instance.clone()),
            None => {
                let err = BuildErrorKind::NoInstance {
                    key: self.original_build_key.clone(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RecoveryStack, ResolutionState};
    use crate::{build_key::BuildKey, config::ContainerConfig, errors::BuildErrorKind};

    use core::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_recovery_runs_in_reverse() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut stack = RecoveryStack::default();
        for value in 1..=3 {
            let order = order.clone();
            stack.add(move || order.borrow_mut().push(value));
        }

        stack.execute_recovery();
        assert!(stack.is_empty());
        assert_eq!(*order.borrow(), vec![3, 2, 1]);
    }

    #[test]
    fn test_cycle_detection() {
        let state = ResolutionState::new(&[], ContainerConfig::default());
        let a = BuildKey::of::<u8>();
        let b = BuildKey::of::<u16>();

        let _a = state.enter(&a).unwrap();
        let _b = state.enter(&b).unwrap();
        match state.enter(&a) {
            Err(BuildErrorKind::CyclicDependency { path }) => assert_eq!(path, vec![a.clone(), b.clone(), a.clone()]),
            _ => panic!("cycle not detected"),
        };
    }

    #[test]
    fn test_path_guard_pops() {
        let state = ResolutionState::new(&[], ContainerConfig::default());
        let key = BuildKey::of::<u8>();

        drop(state.enter(&key).unwrap());
        assert!(state.enter(&key).is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let config = ContainerConfig {
            detect_cycles: false,
            max_resolution_depth: 2,
        };
        let state = ResolutionState::new(&[], config);
        let key = BuildKey::of::<u8>();

        let _first = state.enter(&key).unwrap();
        let _second = state.enter(&key).unwrap();
        assert!(matches!(state.enter(&key), Err(BuildErrorKind::MaxDepthExceeded { limit: 2, .. })));
    }
}
