use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    build_key::BuildKey,
    build_plan::{BuildPlan, BuildPlanCreator, OverriddenBuildPlanMarker},
    context::BuilderContext,
    errors::BuildErrorKind,
    policy::PolicyList,
    registration::{ContainerRegistration, RegistrationContext},
    strategy::{BuilderStrategy, RegistrationAware},
};

/// Executes the cached build plan of the current key, creating and caching it first if needed.
///
/// A mapped key whose target is a registration of its own is built through that registration instead.
pub struct BuildPlanStrategy;

impl BuildPlanStrategy {
    fn plan_creator(context: &BuilderContext<'_>, build_key: &BuildKey) -> Option<(Arc<dyn BuildPlanCreator>, Option<Arc<PolicyList>>)> {
        let policies = context.policies();
        policies
            .get_exact_with_list::<dyn BuildPlanCreator>(build_key)
            .or_else(|| {
                let definition = build_key.generic_definition_key()?;
                policies.get_exact_with_list::<dyn BuildPlanCreator>(&definition)
            })
            .map(|(creator, list)| (creator, Some(list)))
            .or_else(|| policies.get_default::<dyn BuildPlanCreator>().map(|creator| (creator, None)))
    }

    fn build_plan(context: &mut BuilderContext<'_>, build_key: &BuildKey) -> Result<Arc<dyn BuildPlan>, BuildErrorKind> {
        let tombstone_list = match context.policies().get_exact_with_list::<dyn BuildPlan>(build_key) {
            Some((plan, _)) if !plan.is_overridden() => return Ok(plan),
            Some((_, list)) => Some(list),
            None => None,
        };

        let Some((creator, creator_list)) = Self::plan_creator(context, build_key) else {
            let err = BuildErrorKind::NoBuildPlanCreator { key: build_key.clone() };
            error!("{}", err);
            return Err(err);
        };
        let plan = creator.create_plan(context, build_key)?;

        let list = tombstone_list
            .or(creator_list)
            .unwrap_or_else(|| context.policies().root());
        list.set::<dyn BuildPlan>(build_key, plan.clone());
        debug!(key = %build_key, "Build plan created");

        Ok(plan)
    }
}

impl BuilderStrategy for BuildPlanStrategy {
    fn pre_build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        let build_key = context.build_key().clone();
        if build_key.is_open_generic() {
            let err = BuildErrorKind::OpenGenericResolution {
                type_name: build_key.type_info().name,
            };
            error!("{}", err);
            return Err(err);
        }

        if context.existing().is_none()
            && build_key != *context.original_build_key()
            && context.policies().get_exact::<ContainerRegistration>(&build_key).is_some()
        {
            debug!(key = %build_key, "Mapped target built through its own registration");
            let instance = context.new_build_up(build_key)?;
            context.set_existing(Some(instance));
            return context.apply_type_mapping();
        }

        let plan = Self::build_plan(context, &build_key)?;
        plan.build_up(context)?;
        context.apply_type_mapping()
    }

    fn registration_aware(&self) -> Option<&dyn RegistrationAware> {
        Some(self)
    }
}

impl RegistrationAware for BuildPlanStrategy {
    fn on_register_type(&self, registration: &RegistrationContext<'_>) {
        let policies = registration.policies();

        if registration.from_key().is_open_generic() {
            let definitions = [
                registration.from_key().type_info().generic_definition(),
                registration.to_key().type_info().generic_definition(),
            ];
            let removed = policies.clear_where::<dyn BuildPlan>(|key| {
                !key.is_open_generic() && key.type_info().generic_definition().is_some_and(|definition| definitions.contains(&Some(definition)))
            });
            debug!(removed, "Cached plans of closed generic types cleared");
        }

        for build_key in [registration.to_key(), registration.from_key()] {
            let supplied = policies
                .get_local::<dyn BuildPlan>(build_key)
                .is_some_and(|plan| !plan.is_overridden());
            if !supplied {
                policies.set::<dyn BuildPlan>(build_key, Arc::new(OverriddenBuildPlanMarker));
            }
        }
    }

    fn on_register_instance(&self, registration: &RegistrationContext<'_>) {
        registration
            .policies()
            .set::<dyn BuildPlan>(registration.from_key(), Arc::new(OverriddenBuildPlanMarker));
    }
}
