//! Link-time catalog of default constructors.
//!
//! Types declared with [`injectable!`](crate::injectable) can be resolved without registration,
//! the way unregistered concrete classes are built in reflection-based containers.

use std::{collections::HashMap, sync::OnceLock};
use tracing::debug;

use crate::{any::TypeInfo, build_plan::Constructor};

#[doc(hidden)]
pub use linkme;

#[linkme::distributed_slice]
pub static DEFAULT_CONSTRUCTORS: [fn() -> Constructor];

static CATALOG: OnceLock<HashMap<TypeInfo, Constructor>> = OnceLock::new();

fn catalog() -> &'static HashMap<TypeInfo, Constructor> {
    CATALOG.get_or_init(|| {
        let catalog: HashMap<_, _> = DEFAULT_CONSTRUCTORS
            .iter()
            .map(|entry| {
                let constructor = entry();
                (constructor.type_info().clone(), constructor)
            })
            .collect();

        debug!(len = catalog.len(), "Default constructor catalog built");
        catalog
    })
}

#[must_use]
pub(crate) fn default_constructor(type_info: &TypeInfo) -> Option<Constructor> {
    catalog().get(type_info).cloned()
}

/// Declares the default constructor of a type.
///
/// ```
/// use tessera::{injectable, Container, InstantiateErrorKind};
///
/// struct Clock;
///
/// injectable!(Clock, || Ok::<_, InstantiateErrorKind>(Clock));
///
/// let container = Container::new();
/// assert!(container.resolve::<Clock>().is_ok());
/// ```
#[macro_export]
macro_rules! injectable {
    ($ty:ty, $instantiator:expr $(,)?) => {
        const _: () = {
            fn __default_constructor() -> $crate::Constructor {
                $crate::Constructor::of::<$ty, _, _>($instantiator)
            }

            #[$crate::catalog::linkme::distributed_slice($crate::catalog::DEFAULT_CONSTRUCTORS)]
            #[linkme(crate = $crate::catalog::linkme)]
            static __DEFAULT_CONSTRUCTOR: fn() -> $crate::Constructor = __default_constructor;
        };
    };
}
