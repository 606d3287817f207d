use core::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use crate::any::TypeInfo;

/// A type plus an optional registration name.
///
/// `None` is the default registration, it's distinct from every named one.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildKey {
    type_info: TypeInfo,
    pub(crate) name: Option<Arc<str>>,
}

impl BuildKey {
    #[inline]
    #[must_use]
    pub fn new(type_info: TypeInfo, name: Option<&str>) -> Self {
        Self {
            type_info,
            name: name.map(Arc::from),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) const fn from_parts(type_info: TypeInfo, name: Option<Arc<str>>) -> Self {
        Self { type_info, name }
    }

    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeInfo::of::<T>(), None)
    }

    #[inline]
    #[must_use]
    pub fn named<T: ?Sized + 'static>(name: &str) -> Self {
        Self::new(TypeInfo::of::<T>(), Some(name))
    }

    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Same name, different type
    #[inline]
    #[must_use]
    pub fn remap(&self, type_info: TypeInfo) -> Self {
        Self {
            type_info,
            name: self.name.clone(),
        }
    }

    /// Key of the open generic definition with the same name, if this key is a closed generic
    #[must_use]
    pub fn generic_definition_key(&self) -> Option<Self> {
        if self.type_info.is_open_generic() {
            return None;
        }
        let definition = self.type_info.generic_definition()?;
        Some(self.remap(TypeInfo::open(definition)))
    }

    #[inline]
    #[must_use]
    pub const fn is_open_generic(&self) -> bool {
        self.type_info.is_open_generic()
    }
}

impl Display for BuildKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} (\"{name}\")", self.type_info),
            None => Display::fmt(&self.type_info, f),
        }
    }
}

impl Debug for BuildKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
