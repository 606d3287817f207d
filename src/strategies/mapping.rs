use std::sync::Arc;
use tracing::debug;

use crate::{
    any::Caster,
    build_key::BuildKey,
    context::BuilderContext,
    errors::BuildErrorKind,
    registration::{GenericMapping, RegistrationContext},
    strategy::{BuilderStrategy, RegistrationAware},
};

/// Where requests for a key are redirected
#[derive(Clone)]
pub enum BuildKeyMappingPolicy {
    Key { target: BuildKey, caster: Option<Caster> },
    Generic(GenericMapping),
}

impl BuildKeyMappingPolicy {
    #[must_use]
    pub fn map(&self, build_key: &BuildKey) -> Option<(BuildKey, Option<Caster>)> {
        match self {
            Self::Key { target, caster } => Some((target.clone(), caster.clone())),
            Self::Generic(mapping) => mapping.map(build_key).map(|(target, caster)| (target, Some(caster))),
        }
    }
}

/// Rewrites the build key according to the mapping registered for it.
///
/// The lifetime of the requested key still applies, building happens under the new key.
pub struct BuildKeyMappingStrategy;

impl BuilderStrategy for BuildKeyMappingStrategy {
    fn pre_build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        let build_key = context.build_key().clone();
        let Some(policy) = context.policies().get::<BuildKeyMappingPolicy>(&build_key) else {
            return Ok(());
        };
        let Some((target, caster)) = policy.map(&build_key) else {
            debug!(key = %build_key, "Mapping produced no target");
            return Ok(());
        };
        if target == build_key {
            return Ok(());
        }
        debug!(from = %build_key, to = %target, "Build key mapped");

        context.set_build_key(target);
        context.set_type_mapping(caster);

        Ok(())
    }

    fn registration_aware(&self) -> Option<&dyn RegistrationAware> {
        Some(self)
    }
}

impl RegistrationAware for BuildKeyMappingStrategy {
    fn on_register_type(&self, registration: &RegistrationContext<'_>) {
        let policy = match registration.generic_mapping() {
            Some(mapping) => BuildKeyMappingPolicy::Generic(mapping.clone()),
            None if registration.from_key() != registration.to_key() => BuildKeyMappingPolicy::Key {
                target: registration.to_key().clone(),
                caster: registration.caster().cloned(),
            },
            None => return,
        };
        registration.policies().set(registration.from_key(), Arc::new(policy));
    }
}
