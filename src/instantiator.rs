use core::any::type_name;
use std::sync::Arc;
use tracing::debug;

use crate::{
    any::Instance,
    context::BuilderContext,
    dependency_resolver::DependencyResolver,
    errors::{BuildErrorKind, InstantiateErrorKind, InstantiatorErrorKind},
};

/// Function that builds a value from resolved dependencies.
///
/// Implemented for closures of up to twelve arguments, each argument being a [`DependencyResolver`].
pub trait Instantiator<Deps>: Clone + 'static
where
    Deps: DependencyResolver,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

/// Function called on an already built instance, with resolved dependencies.
///
/// The first argument is the instance, the rest are [`DependencyResolver`]s.
pub trait Method<Target: ?Sized, Deps>: Clone + 'static
where
    Deps: DependencyResolver,
{
    type Error: Into<InstantiateErrorKind>;

    fn invoke(&mut self, target: Arc<Target>, dependencies: Deps) -> Result<(), Self::Error>;
}

pub(crate) type BoxedInstantiator = Arc<dyn Fn(&mut BuilderContext<'_>) -> Result<Instance, BuildErrorKind> + Send + Sync>;

pub(crate) type BoxedMethod = Arc<dyn Fn(&Instance, &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> + Send + Sync>;

#[inline]
fn deps_error<E: Into<BuildErrorKind>>(err: E) -> BuildErrorKind {
    BuildErrorKind::Instantiator(InstantiatorErrorKind::Deps(Box::new(err.into())))
}

#[inline]
fn factory_error<E: Into<InstantiateErrorKind>>(err: E) -> BuildErrorKind {
    BuildErrorKind::Instantiator(InstantiatorErrorKind::Factory(err.into()))
}

#[must_use]
pub(crate) fn boxed_instantiator<Inst, Deps>(instantiator: Inst) -> BoxedInstantiator
where
    Inst: Instantiator<Deps> + Send + Sync,
    Inst::Provides: Send + Sync,
    Deps: DependencyResolver,
{
    Arc::new(move |context: &mut BuilderContext<'_>| {
        let dependencies = match Deps::resolve(context) {
            Ok(dependencies) => dependencies,
            Err(err) => return Err(deps_error(err)),
        };
        let dependency = match instantiator.clone().instantiate(dependencies) {
            Ok(dependency) => dependency,
            Err(err) => return Err(factory_error(err)),
        };

        debug!(dependency = type_name::<Inst::Provides>(), "Instantiated");

        Ok(Instance::new(Arc::new(dependency)))
    })
}

#[must_use]
pub(crate) fn boxed_method<Target, M, Deps>(method: M) -> BoxedMethod
where
    Target: ?Sized + Send + Sync + 'static,
    M: Method<Target, Deps> + Send + Sync,
    Deps: DependencyResolver,
{
    Arc::new(move |target: &Instance, context: &mut BuilderContext<'_>| {
        let Some(target_value) = target.downcast::<Target>() else {
            return Err(BuildErrorKind::IncorrectType {
                expected: type_name::<Target>(),
                actual: target.type_info().name,
            });
        };
        let dependencies = match Deps::resolve(context) {
            Ok(dependencies) => dependencies,
            Err(err) => return Err(deps_error(err)),
        };
        method.clone().invoke(target_value, dependencies).map_err(factory_error)?;

        debug!(target = type_name::<Target>(), "Method invoked");

        Ok(())
    })
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

macro_rules! impl_method {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Target, Err, $($ty,)*> Method<Target, ($($ty,)*)> for F
        where
            F: FnMut(Arc<Target>, $($ty,)*) -> Result<(), Err> + Clone + 'static,
            Target: ?Sized,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Error = Err;

            fn invoke(&mut self, target: Arc<Target>, ($($ty,)*): ($($ty,)*)) -> Result<(), Self::Error> {
                self(target, $($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_method);
