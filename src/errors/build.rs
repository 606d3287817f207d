use core::fmt::{self, Display, Formatter};

use super::{instantiate::InstantiateErrorKind, instantiator::InstantiatorErrorKind};
use crate::build_key::BuildKey;

#[derive(thiserror::Error, Debug)]
pub enum BuildErrorKind {
    #[error("Open generic type {type_name} cannot be built, resolve a closed type instead")]
    OpenGenericResolution { type_name: &'static str },
    #[error("No constructor found for {key}")]
    NoConstructor { key: BuildKey },
    #[error("No build plan creator found for {key}")]
    NoBuildPlanCreator { key: BuildKey },
    #[error("Build of {key} completed without an instance")]
    NoInstance { key: BuildKey },
    #[error("Incorrect instance type. Actual: {actual}, expected: {expected}")]
    IncorrectType { expected: &'static str, actual: &'static str },
    #[error("Cyclic dependency: {}", KeyPath(.path))]
    CyclicDependency { path: Vec<BuildKey> },
    #[error("Resolution depth limit of {limit} exceeded while building {key}")]
    MaxDepthExceeded { key: BuildKey, limit: usize },
    #[error("Failed to build dependency {key}: {source}")]
    Dependency {
        key: BuildKey,
        #[source]
        source: Box<BuildErrorKind>,
    },
    #[error(transparent)]
    Instantiator(InstantiatorErrorKind<Box<BuildErrorKind>, InstantiateErrorKind>),
    #[error(transparent)]
    Strategy(#[from] anyhow::Error),
    #[error("Container is disposed")]
    Disposed,
}

impl BuildErrorKind {
    /// Innermost error, skipping the dependency chain wrappers
    #[must_use]
    pub fn root_cause(&self) -> &BuildErrorKind {
        let mut err = self;
        loop {
            match err {
                Self::Dependency { source, .. } => err = &**source,
                Self::Instantiator(InstantiatorErrorKind::Deps(source)) => err = &**source,
                _ => return err,
            }
        }
    }

    /// Key of the innermost dependency that failed, if the failure happened below the requested key
    #[must_use]
    pub fn failing_key(&self) -> Option<&BuildKey> {
        let mut err = self;
        let mut key = None;
        loop {
            match err {
                Self::Dependency { key: dependency, source } => {
                    key = Some(dependency);
                    err = &**source;
                }
                Self::Instantiator(InstantiatorErrorKind::Deps(source)) => err = &**source,
                _ => return key,
            }
        }
    }
}

struct KeyPath<'a>(&'a [BuildKey]);

impl Display for KeyPath<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, key) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            Display::fmt(key, f)?;
        }
        Ok(())
    }
}
