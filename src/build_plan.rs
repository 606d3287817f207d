use core::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    any::{Instance, TypeInfo},
    build_key::BuildKey,
    catalog,
    context::BuilderContext,
    dependency_resolver::DependencyResolver,
    errors::{BuildErrorKind, InstantiateErrorKind},
    instantiator::{boxed_instantiator, boxed_method, BoxedInstantiator, BoxedMethod, Instantiator, Method},
};

/// Compiled recipe for building one key
pub trait BuildPlan: Send + Sync + 'static {
    fn build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind>;

    /// Tombstones mark plans that must be recreated on next use
    fn is_overridden(&self) -> bool {
        false
    }
}

/// Produces a [`BuildPlan`] for a key that has none cached
pub trait BuildPlanCreator: Send + Sync + 'static {
    fn create_plan(&self, context: &mut BuilderContext<'_>, build_key: &BuildKey) -> Result<Arc<dyn BuildPlan>, BuildErrorKind>;
}

impl<F> BuildPlanCreator for F
where
    F: Fn(&mut BuilderContext<'_>, &BuildKey) -> Result<Arc<dyn BuildPlan>, BuildErrorKind> + Send + Sync + 'static,
{
    #[inline]
    fn create_plan(&self, context: &mut BuilderContext<'_>, build_key: &BuildKey) -> Result<Arc<dyn BuildPlan>, BuildErrorKind> {
        self(context, build_key)
    }
}

/// Placeholder stored by registration over any cached plan of the registered keys
pub struct OverriddenBuildPlanMarker;

impl BuildPlan for OverriddenBuildPlanMarker {
    fn build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        Err(BuildErrorKind::NoBuildPlanCreator {
            key: context.build_key().clone(),
        })
    }

    #[inline]
    fn is_overridden(&self) -> bool {
        true
    }
}

/// Creates a new instance of a single type
#[derive(Clone)]
pub struct Constructor {
    type_info: TypeInfo,
    construct: BoxedInstantiator,
}

impl Constructor {
    #[must_use]
    pub fn new<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Error = InstantiateErrorKind> + Send + Sync,
        Inst::Provides: Send + Sync,
        Deps: DependencyResolver,
    {
        Self {
            type_info: TypeInfo::of::<Inst::Provides>(),
            construct: boxed_instantiator(instantiator),
        }
    }

    /// Same as [`Constructor::new`], with the provided type spelled out
    #[inline]
    #[must_use]
    pub fn of<T, Inst, Deps>(instantiator: Inst) -> Self
    where
        T: Send + Sync + 'static,
        Inst: Instantiator<Deps, Provides = T, Error = InstantiateErrorKind> + Send + Sync,
        Deps: DependencyResolver,
    {
        Self::new(instantiator)
    }

    #[inline]
    #[must_use]
    pub(crate) fn from_parts(type_info: TypeInfo, construct: BoxedInstantiator) -> Self {
        Self { type_info, construct }
    }

    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    #[inline]
    pub fn construct(&self, context: &mut BuilderContext<'_>) -> Result<Instance, BuildErrorKind> {
        (self.construct)(context)
    }
}

impl Debug for Constructor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor").field("type", &self.type_info).finish_non_exhaustive()
    }
}

/// Runs on a built instance before it's handed out
#[derive(Clone)]
pub struct Initializer {
    type_info: TypeInfo,
    initialize: BoxedMethod,
}

impl Initializer {
    #[must_use]
    pub fn new<Target, M, Deps>(method: M) -> Self
    where
        Target: ?Sized + Send + Sync + 'static,
        M: Method<Target, Deps, Error = InstantiateErrorKind> + Send + Sync,
        Deps: DependencyResolver,
    {
        Self {
            type_info: TypeInfo::of::<Target>(),
            initialize: boxed_method(method),
        }
    }

    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    #[inline]
    pub fn initialize(&self, instance: &Instance, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        (self.initialize)(instance, context)
    }
}

/// Ordered initializers of a key
#[derive(Clone, Default)]
pub struct Initializers(Vec<Initializer>);

impl Initializers {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, initializer: Initializer) {
        self.0.push(initializer);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Initializer> {
        self.0.iter()
    }
}

/// Constructor followed by initializers. The constructor is skipped when an instance already exists.
pub struct DynamicBuildPlan {
    constructor: Option<Constructor>,
    initializers: Initializers,
}

impl DynamicBuildPlan {
    #[inline]
    #[must_use]
    pub fn new(constructor: Option<Constructor>, initializers: Initializers) -> Self {
        Self {
            constructor,
            initializers,
        }
    }

    #[inline]
    #[must_use]
    pub fn from_constructor(constructor: Constructor) -> Self {
        Self::new(Some(constructor), Initializers::new())
    }
}

impl BuildPlan for DynamicBuildPlan {
    fn build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        if context.existing().is_none() {
            let Some(constructor) = &self.constructor else {
                let err = BuildErrorKind::NoConstructor {
                    key: context.build_key().clone(),
                };
                error!("{}", err);
                return Err(err);
            };
            let instance = constructor.construct(context)?;
            context.set_existing(Some(instance));
        }

        if self.initializers.is_empty() {
            return Ok(());
        }
        let Some(instance) = context.existing().cloned() else {
            return Ok(());
        };
        for initializer in self.initializers.iter() {
            initializer.initialize(&instance, context)?;
        }
        debug!(count = self.initializers.len(), "Initializers applied");

        Ok(())
    }
}

/// Default creator: constructor from the key's policies or from the catalog, plus registered initializers
pub struct DynamicBuildPlanCreator;

impl BuildPlanCreator for DynamicBuildPlanCreator {
    fn create_plan(&self, context: &mut BuilderContext<'_>, build_key: &BuildKey) -> Result<Arc<dyn BuildPlan>, BuildErrorKind> {
        let policies = context.policies();
        let constructor = policies
            .get_exact::<Constructor>(build_key)
            .map(|constructor| (*constructor).clone())
            .or_else(|| catalog::default_constructor(build_key.type_info()));
        let initializers = policies
            .get_exact::<Initializers>(build_key)
            .map(|initializers| (*initializers).clone())
            .unwrap_or_default();

        if constructor.is_none() {
            debug!(key = %build_key, "No constructor available, plan can only build up existing instances");
        }

        Ok(Arc::new(DynamicBuildPlan::new(constructor, initializers)))
    }
}
