use std::sync::Arc;
use tracing::debug;

use crate::{
    any::{Instance, TypeInfo},
    build_key::BuildKey,
    build_plan::{Constructor, Initializer, Initializers},
    context::BuilderContext,
    dependency_resolver::DependencyResolver,
    errors::{BuildErrorKind, InstantiateErrorKind, InstantiatorErrorKind},
    instantiator::{Instantiator, Method},
    policy::PolicyList,
};

/// Registration-time configuration of how the mapped-to type is built
pub trait InjectionMember: Send + Sync + 'static {
    /// Type the member builds or initializes, checked against the mapped-to type of the registration
    fn target_type(&self) -> &TypeInfo;

    fn add_policies(&self, registered_type: &TypeInfo, build_key: &BuildKey, policies: &PolicyList);
}

/// Constructor used for the mapped-to type instead of the catalog default
pub struct InjectionConstructor(Constructor);

impl InjectionConstructor {
    #[must_use]
    pub fn new<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Error = InstantiateErrorKind> + Send + Sync,
        Inst::Provides: Send + Sync,
        Deps: DependencyResolver,
    {
        Self(Constructor::new(instantiator))
    }
}

impl From<Constructor> for InjectionConstructor {
    fn from(constructor: Constructor) -> Self {
        Self(constructor)
    }
}

impl InjectionMember for InjectionConstructor {
    #[inline]
    fn target_type(&self) -> &TypeInfo {
        self.0.type_info()
    }

    fn add_policies(&self, _registered_type: &TypeInfo, build_key: &BuildKey, policies: &PolicyList) {
        policies.set(build_key, Arc::new(self.0.clone()));
        debug!(key = %build_key, "Constructor policy set");
    }
}

/// Builds the registered type with a function of the build in progress, bypassing constructor injection.
///
/// Dependencies the function resolves through [`BuilderContext::resolve`] take part in the same resolution.
pub struct InjectionFactory(Constructor);

impl InjectionFactory {
    #[must_use]
    pub fn new<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&mut BuilderContext<'_>) -> Result<Arc<T>, InstantiateErrorKind> + Send + Sync + 'static,
    {
        let construct = move |context: &mut BuilderContext<'_>| match factory(context) {
            Ok(value) => Ok(Instance::new(value)),
            Err(err) => Err(BuildErrorKind::Instantiator(InstantiatorErrorKind::Factory(err))),
        };
        Self(Constructor::from_parts(TypeInfo::of::<T>(), Arc::new(construct)))
    }
}

impl InjectionMember for InjectionFactory {
    #[inline]
    fn target_type(&self) -> &TypeInfo {
        self.0.type_info()
    }

    fn add_policies(&self, _registered_type: &TypeInfo, build_key: &BuildKey, policies: &PolicyList) {
        policies.set(build_key, Arc::new(self.0.clone()));
        debug!(key = %build_key, "Factory policy set");
    }
}

/// Method called on every newly built (or built up) instance, in registration order
pub struct InjectionMethod(Initializer);

impl InjectionMethod {
    #[must_use]
    pub fn new<Target, M, Deps>(method: M) -> Self
    where
        Target: ?Sized + Send + Sync + 'static,
        M: Method<Target, Deps, Error = InstantiateErrorKind> + Send + Sync,
        Deps: DependencyResolver,
    {
        Self(Initializer::new(method))
    }
}

impl InjectionMember for InjectionMethod {
    #[inline]
    fn target_type(&self) -> &TypeInfo {
        self.0.type_info()
    }

    fn add_policies(&self, _registered_type: &TypeInfo, build_key: &BuildKey, policies: &PolicyList) {
        let mut initializers = policies
            .get_local::<Initializers>(build_key)
            .map(|initializers| (*initializers).clone())
            .unwrap_or_default();
        initializers.push(self.0.clone());
        policies.set(build_key, Arc::new(initializers));
        debug!(key = %build_key, "Initializer policy appended");
    }
}

#[cfg(test)]
mod tests {
    use super::{InjectionConstructor, InjectionMember, InjectionMethod};
    use crate::{
        any::TypeInfo,
        build_key::BuildKey,
        build_plan::{Constructor, Initializers},
        errors::InstantiateErrorKind,
        policy::PolicyList,
    };

    use std::sync::Arc;

    struct Service;

    #[test]
    fn test_members_set_policies() {
        let policies = PolicyList::new();
        let key = BuildKey::of::<Service>();

        let constructor = InjectionConstructor::new(|| Ok::<_, InstantiateErrorKind>(Service));
        assert_eq!(constructor.target_type(), &TypeInfo::of::<Service>());
        constructor.add_policies(&TypeInfo::of::<Service>(), &key, &policies);
        assert!(policies.get_local::<Constructor>(&key).is_some());

        for _ in 0..2 {
            InjectionMethod::new(|_: Arc<Service>| Ok::<_, InstantiateErrorKind>(())).add_policies(
                &TypeInfo::of::<Service>(),
                &key,
                &policies,
            );
        }
        assert_eq!(policies.get_local::<Initializers>(&key).map(|initializers| initializers.len()), Some(2));
    }
}
