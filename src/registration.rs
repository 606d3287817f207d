use core::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::{
    any::{Assignable, Caster, GenericDef, Instance, TypeInfo},
    build_key::BuildKey,
    build_plan::BuildPlanCreator,
    errors::RegistrationErrorKind,
    finalizer::{boxed_finalizer, BoxedFinalizer, Finalizer},
    injection::InjectionMember,
    lifetime::LifetimeManager,
    policy::PolicyList,
};

type GenericMappingFn = dyn Fn(&BuildKey) -> Option<(BuildKey, Caster)> + Send + Sync;

/// Maps a closed key of an open generic contract to the closed implementation key,
/// with the caster converting implementation instances back to the contract
#[derive(Clone)]
pub struct GenericMapping(Arc<GenericMappingFn>);

impl GenericMapping {
    #[inline]
    #[must_use]
    pub fn new<F>(mapping: F) -> Self
    where
        F: Fn(&BuildKey) -> Option<(BuildKey, Caster)> + Send + Sync + 'static,
    {
        Self(Arc::new(mapping))
    }

    #[inline]
    #[must_use]
    pub fn map(&self, build_key: &BuildKey) -> Option<(BuildKey, Caster)> {
        (self.0)(build_key)
    }
}

/// Describes one registration, applied with [`crate::Container::register`]
pub struct Registration {
    pub(crate) from: TypeInfo,
    pub(crate) to: TypeInfo,
    pub(crate) name: Option<Arc<str>>,
    pub(crate) lifetime: Option<Arc<dyn LifetimeManager>>,
    pub(crate) members: Vec<Box<dyn InjectionMember>>,
    pub(crate) caster: Option<Caster>,
    pub(crate) generic_mapping: Option<GenericMapping>,
    pub(crate) instance: Option<Instance>,
    pub(crate) finalizer: Option<BoxedFinalizer>,
    pub(crate) plan_creator: Option<Arc<dyn BuildPlanCreator>>,
}

impl Registration {
    fn new(from: TypeInfo, to: TypeInfo) -> Self {
        Self {
            from,
            to,
            name: None,
            lifetime: None,
            members: Vec::new(),
            caster: None,
            generic_mapping: None,
            instance: None,
            finalizer: None,
            plan_creator: None,
        }
    }

    /// Registers `T` as itself
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeInfo::of::<T>(), TypeInfo::of::<T>())
    }

    /// Requests for `Contract` build `Implementation`
    #[must_use]
    pub fn mapping<Contract, Implementation>() -> Self
    where
        Contract: ?Sized + Send + Sync + 'static,
        Implementation: Assignable<Contract> + ?Sized,
    {
        let mut registration = Self::new(TypeInfo::of::<Contract>(), TypeInfo::of::<Implementation>());
        registration.caster = Some(Caster::of::<Contract, Implementation>());
        registration
    }

    /// Mapping between runtime type identities. Needs [`Registration::with_caster`] when `from != to`.
    #[inline]
    #[must_use]
    pub fn dynamic(from: TypeInfo, to: TypeInfo) -> Self {
        Self::new(from, to)
    }

    /// Registration for every closed type built from `definition`
    #[inline]
    #[must_use]
    pub fn open_generic(definition: GenericDef) -> Self {
        Self::new(TypeInfo::open(definition), TypeInfo::open(definition))
    }

    /// Existing instance handed out for `T`
    #[inline]
    #[must_use]
    pub fn instance<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Self::instance_of(TypeInfo::of::<T>(), Instance::new(instance))
    }

    #[must_use]
    pub fn instance_of(type_info: TypeInfo, instance: Instance) -> Self {
        let mut registration = Self::new(type_info.clone(), type_info);
        registration.instance = Some(instance);
        registration
    }

    #[inline]
    #[must_use]
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn lifetime<L: LifetimeManager>(self, manager: L) -> Self {
        self.shared_lifetime(Arc::new(manager))
    }

    /// Lifetime manager shared with the caller, it's still attached to this registration only
    #[inline]
    #[must_use]
    pub fn shared_lifetime(mut self, manager: Arc<dyn LifetimeManager>) -> Self {
        self.lifetime = Some(manager);
        self
    }

    #[inline]
    #[must_use]
    pub fn with<M: InjectionMember>(mut self, member: M) -> Self {
        self.members.push(Box::new(member));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_caster(mut self, caster: Caster) -> Self {
        self.caster = Some(caster);
        self
    }

    /// Maps closed keys of this open generic registration to closed keys of `to`
    #[must_use]
    pub fn map_generic<F>(mut self, to: GenericDef, mapping: F) -> Self
    where
        F: Fn(&BuildKey) -> Option<(BuildKey, Caster)> + Send + Sync + 'static,
    {
        self.to = TypeInfo::open(to);
        self.generic_mapping = Some(GenericMapping::new(mapping));
        self
    }

    /// Called when the container disposes an instance owned by this registration
    #[inline]
    #[must_use]
    pub fn with_finalizer<Dep, Fin>(mut self, finalizer: Fin) -> Self
    where
        Dep: ?Sized + Send + Sync + 'static,
        Fin: Finalizer<Dep>,
    {
        self.finalizer = Some(boxed_finalizer(finalizer));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_plan_creator<C: BuildPlanCreator>(mut self, creator: C) -> Self {
        self.plan_creator = Some(Arc::new(creator));
        self
    }

    #[inline]
    #[must_use]
    pub const fn registered_type(&self) -> &TypeInfo {
        &self.from
    }

    #[inline]
    #[must_use]
    pub const fn mapped_to_type(&self) -> &TypeInfo {
        &self.to
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn validate(&self) -> Result<(), RegistrationErrorKind> {
        let mismatch = |from: &TypeInfo, to: &TypeInfo| RegistrationErrorKind::TypeMismatch {
            from: from.name,
            to: to.name,
        };

        if let Some(instance) = &self.instance {
            if instance.type_info() != &self.from {
                return Err(mismatch(&self.from, instance.type_info()));
            }
        }

        let open = self.from.is_open_generic() || self.to.is_open_generic();
        if open {
            if self.from.is_open_generic() != self.to.is_open_generic() {
                return Err(mismatch(&self.from, &self.to));
            }
            if self.from != self.to && self.generic_mapping.is_none() {
                return Err(mismatch(&self.from, &self.to));
            }
        } else if self.from != self.to {
            match &self.caster {
                Some(caster) if caster.source() == &self.to && caster.target() == &self.from => {}
                _ => return Err(mismatch(&self.from, &self.to)),
            }
        }

        if !open {
            if let Some(member) = self.members.iter().find(|member| member.target_type() != &self.to) {
                return Err(mismatch(&self.to, member.target_type()));
            }
        }

        Ok(())
    }
}

impl Debug for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("name", &self.name)
            .field("members", &self.members.len())
            .finish_non_exhaustive()
    }
}

/// Record of a registration, stored with the registered key
#[derive(Clone, Debug)]
pub struct ContainerRegistration {
    pub(crate) registered_type: TypeInfo,
    pub(crate) mapped_to_type: TypeInfo,
    pub(crate) name: Option<Arc<str>>,
    pub(crate) lifetime_manager_type: &'static str,
}

impl ContainerRegistration {
    #[inline]
    #[must_use]
    pub const fn registered_type(&self) -> &TypeInfo {
        &self.registered_type
    }

    #[inline]
    #[must_use]
    pub const fn mapped_to_type(&self) -> &TypeInfo {
        &self.mapped_to_type
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    #[must_use]
    pub const fn lifetime_manager_type(&self) -> &'static str {
        self.lifetime_manager_type
    }

    #[inline]
    #[must_use]
    pub fn build_key(&self) -> BuildKey {
        BuildKey::from_parts(self.registered_type.clone(), self.name.clone())
    }
}

/// What registration-aware strategies see of a registration being applied
pub struct RegistrationContext<'a> {
    pub(crate) from: BuildKey,
    pub(crate) to: BuildKey,
    pub(crate) caster: Option<&'a Caster>,
    pub(crate) generic_mapping: Option<&'a GenericMapping>,
    pub(crate) policies: &'a PolicyList,
}

impl RegistrationContext<'_> {
    #[inline]
    #[must_use]
    pub const fn from_key(&self) -> &BuildKey {
        &self.from
    }

    #[inline]
    #[must_use]
    pub const fn to_key(&self) -> &BuildKey {
        &self.to
    }

    #[inline]
    #[must_use]
    pub const fn caster(&self) -> Option<&Caster> {
        self.caster
    }

    #[inline]
    #[must_use]
    pub const fn generic_mapping(&self) -> Option<&GenericMapping> {
        self.generic_mapping
    }

    /// Policies of the container the registration is applied to
    #[inline]
    #[must_use]
    pub const fn policies(&self) -> &PolicyList {
        self.policies
    }
}
