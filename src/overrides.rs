use std::sync::Arc;

use crate::{any::Instance, build_key::BuildKey};

/// Value supplied for one resolve call, used instead of building a matching dependency.
///
/// Overrides apply to dependencies of the requested object, never to the requested key itself.
#[derive(Clone, Debug)]
pub struct ResolverOverride {
    key: BuildKey,
    value: Instance,
}

impl ResolverOverride {
    #[inline]
    #[must_use]
    pub fn new(key: BuildKey, value: Instance) -> Self {
        Self { key, value }
    }

    #[inline]
    #[must_use]
    pub fn dependency<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::new(BuildKey::of::<T>(), Instance::new(value))
    }

    #[inline]
    #[must_use]
    pub fn named_dependency<T: ?Sized + Send + Sync + 'static>(name: &str, value: Arc<T>) -> Self {
        Self::new(BuildKey::named::<T>(name), Instance::new(value))
    }

    #[inline]
    #[must_use]
    pub const fn key(&self) -> &BuildKey {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn matches(&self, key: &BuildKey) -> bool {
        &self.key == key
    }

    #[inline]
    #[must_use]
    pub(crate) const fn value(&self) -> &Instance {
        &self.value
    }
}
