use super::build::BuildErrorKind;
use crate::build_key::BuildKey;

/// Error returned from every top-level resolve call
#[derive(thiserror::Error, Debug)]
#[error("Resolution failed, type = {type_name}, name = {}: {source}", .name.as_deref().unwrap_or("(none)"))]
pub struct ResolutionFailed {
    pub type_name: &'static str,
    pub name: Option<String>,
    #[source]
    pub source: BuildErrorKind,
}

impl ResolutionFailed {
    #[must_use]
    pub fn new(key: &BuildKey, source: BuildErrorKind) -> Self {
        Self {
            type_name: key.type_info().name,
            name: key.name().map(ToOwned::to_owned),
            source,
        }
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &BuildErrorKind {
        &self.source
    }
}
