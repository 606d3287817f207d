use core::{any::type_name, marker::PhantomData};
use std::sync::Arc;
use tracing::{debug, debug_span, error};

use crate::{build_key::BuildKey, context::BuilderContext, errors::BuildErrorKind};

/// Value that can be produced from the build in progress, typically by building a nested dependency
pub trait DependencyResolver: Sized {
    type Error: Into<BuildErrorKind>;

    fn resolve(context: &mut BuilderContext<'_>) -> Result<Self, Self::Error>;
}

pub(crate) fn resolve_key<Dep: ?Sized + 'static>(context: &mut BuilderContext<'_>, build_key: BuildKey) -> Result<Arc<Dep>, BuildErrorKind> {
    let instance = context.new_build_up(build_key)?;
    match instance.downcast::<Dep>() {
        Some(dependency) => Ok(dependency),
        None => {
            let err = BuildErrorKind::IncorrectType {
                expected: type_name::<Dep>(),
                actual: instance.type_info().name,
            };
            error!("{}", err);
            Err(err)
        }
    }
}

/// Default registration of `Dep`
pub struct Inject<Dep: ?Sized>(pub Arc<Dep>);

impl<Dep: ?Sized + 'static> DependencyResolver for Inject<Dep> {
    type Error = BuildErrorKind;

    fn resolve(context: &mut BuilderContext<'_>) -> Result<Self, Self::Error> {
        let span = debug_span!("resolve", dependency = type_name::<Dep>());
        let _guard = span.enter();

        resolve_key(context, BuildKey::of::<Dep>()).map(Self)
    }
}

/// Registration name usable at the type level
pub trait DependencyName: 'static {
    const NAME: &'static str;
}

/// Named registration of `Dep`
pub struct InjectNamed<Dep: ?Sized, Name: DependencyName>(pub Arc<Dep>, PhantomData<Name>);

impl<Dep: ?Sized, Name: DependencyName> InjectNamed<Dep, Name> {
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Arc<Dep> {
        self.0
    }
}

impl<Dep: ?Sized + 'static, Name: DependencyName> DependencyResolver for InjectNamed<Dep, Name> {
    type Error = BuildErrorKind;

    fn resolve(context: &mut BuilderContext<'_>) -> Result<Self, Self::Error> {
        let span = debug_span!("resolve", dependency = type_name::<Dep>(), name = Name::NAME);
        let _guard = span.enter();

        resolve_key(context, BuildKey::named::<Dep>(Name::NAME)).map(|dependency| Self(dependency, PhantomData))
    }
}

/// Resolves to `None` when nothing is registered for `Dep` and it cannot be built
impl<Dep: ?Sized + 'static> DependencyResolver for Option<Inject<Dep>> {
    type Error = BuildErrorKind;

    fn resolve(context: &mut BuilderContext<'_>) -> Result<Self, Self::Error> {
        let span = debug_span!("resolve", dependency = type_name::<Dep>(), optional = true);
        let _guard = span.enter();

        let build_key = BuildKey::of::<Dep>();
        let registered = context.container().is_registered_key(&build_key);
        match resolve_key(context, build_key) {
            Ok(dependency) => Ok(Some(Inject(dependency))),
            Err(err) if !registered => {
                debug!("Optional dependency not available: {}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = BuildErrorKind;

            #[inline]
            fn resolve(context: &mut BuilderContext<'_>) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(context).map_err(Into::into)?,)*))
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);

#[cfg(test)]
mod tests {
    use super::{DependencyName, DependencyResolver, Inject, InjectNamed};
    use crate::{
        build_key::BuildKey,
        config::ContainerConfig,
        container::Container,
        context::{BuilderContext, ResolutionState},
        errors::BuildErrorKind,
        overrides::ResolverOverride,
        registration::Registration,
    };

    use std::sync::Arc;
    use tracing_test::traced_test;

    struct Primary;

    impl DependencyName for Primary {
        const NAME: &'static str = "primary";
    }

    struct Settings(&'static str);

    trait Missing: Send + Sync {}

    #[test]
    #[traced_test]
    fn test_inject_and_named() {
        let container = Container::new();
        let overrides = [
            ResolverOverride::dependency(Arc::new(Settings("default"))),
            ResolverOverride::named_dependency("primary", Arc::new(Settings("primary"))),
        ];
        let chain = container.strategies().make_chain();
        let resolution = ResolutionState::new(&overrides, ContainerConfig::default());
        let mut context = BuilderContext::new(&container, &chain, &resolution, BuildKey::of::<()>(), None);

        let (Inject(default), named) = <(Inject<Settings>, InjectNamed<Settings, Primary>)>::resolve(&mut context).unwrap();
        assert_eq!(default.0, "default");
        assert_eq!(named.into_inner().0, "primary");
    }

    #[test]
    #[traced_test]
    fn test_optional() {
        let container = Container::new();
        let chain = container.strategies().make_chain();
        let resolution = ResolutionState::new(&[], ContainerConfig::default());
        let mut context = BuilderContext::new(&container, &chain, &resolution, BuildKey::of::<()>(), None);

        assert!(Option::<Inject<dyn Missing>>::resolve(&mut context).unwrap().is_none());
        assert!(Inject::<dyn Missing>::resolve(&mut context).is_err());
    }

    #[test]
    #[traced_test]
    fn test_optional_keeps_errors_of_registered_types() {
        struct Broken;

        let container = Container::new();
        container.register(Registration::of::<Broken>()).unwrap();

        let chain = container.strategies().make_chain();
        let resolution = ResolutionState::new(&[], ContainerConfig::default());
        let mut context = BuilderContext::new(&container, &chain, &resolution, BuildKey::of::<()>(), None);

        assert!(matches!(
            Option::<Inject<Broken>>::resolve(&mut context),
            Err(BuildErrorKind::Dependency { .. })
        ));
    }
}
