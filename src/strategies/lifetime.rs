use std::sync::Arc;
use tracing::debug;

use crate::{
    build_key::BuildKey,
    context::BuilderContext,
    errors::BuildErrorKind,
    lifetime::{LifetimeFactory, LifetimeManager},
    policy::PolicyList,
    strategy::BuilderStrategy,
};

/// Serves cached instances from the lifetime manager of the requested key and stores new ones in it
pub struct LifetimeStrategy;

impl LifetimeStrategy {
    fn lifetime_manager(context: &BuilderContext<'_>) -> Option<Arc<dyn LifetimeManager>> {
        let build_key = context.original_build_key();
        let policies = context.policies();

        if let Some((manager, list)) = policies.get_exact_with_list::<dyn LifetimeManager>(build_key) {
            return Some(Self::scoped(context, build_key, manager, &list));
        }

        let (factory, list) = policies.get_with_list::<LifetimeFactory>(build_key)?;
        let _guard = factory.lock();
        if let Some(manager) = list.get_local::<dyn LifetimeManager>(build_key) {
            return Some(Self::scoped(context, build_key, manager, &list));
        }

        let created = factory.create();
        let manager = list.set_if_absent::<dyn LifetimeManager>(build_key, created.clone());
        if Arc::ptr_eq(&manager, &created) && manager.is_disposable() {
            if let Some(owner) = context.container().owner_of(&list) {
                owner.lifetime().add(manager.clone());
            }
        }
        debug!(key = %build_key, kind = manager.kind_name(), "Lifetime manager created from open generic registration");

        Some(Self::scoped(context, build_key, manager, &list))
    }

    /// Replaces a manager found in an ancestor with its per-container copy, if the manager has one
    fn scoped(
        context: &BuilderContext<'_>,
        build_key: &BuildKey,
        manager: Arc<dyn LifetimeManager>,
        list: &Arc<PolicyList>,
    ) -> Arc<dyn LifetimeManager> {
        let policies = context.policies();
        if Arc::ptr_eq(list, policies) {
            return manager;
        }
        let Some(scope) = manager.create_scope() else {
            return manager;
        };

        scope.state().try_acquire();
        let installed = policies.set_if_absent::<dyn LifetimeManager>(build_key, scope.clone());
        if Arc::ptr_eq(&installed, &scope) && installed.is_disposable() {
            context.lifetime().add(installed.clone());
            debug!(key = %build_key, "Scoped lifetime manager installed");
        }
        installed
    }
}

impl BuilderStrategy for LifetimeStrategy {
    fn pre_build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        let Some(manager) = Self::lifetime_manager(context) else {
            return Ok(());
        };

        if manager.requires_recovery() {
            let recovering = manager.clone();
            context.recovery_stack_mut().add(move || recovering.recover());
        }

        let cached = manager.get_value(&context.lifetime_context());
        context.set_lifetime_manager(Some(manager));

        if let Some(instance) = cached {
            debug!("Found in lifetime manager");
            context.set_existing(Some(instance));
            context.set_build_complete(true);
        }

        Ok(())
    }

    fn post_build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        let Some(manager) = context.lifetime_manager().cloned() else {
            return Ok(());
        };

        match context.existing().cloned() {
            Some(instance) => manager.set_value(instance, &context.lifetime_context()),
            None => manager.recover(),
        }

        Ok(())
    }
}
