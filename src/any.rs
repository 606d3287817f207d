use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
};
use std::sync::Arc;

/// Identity of an open generic type definition, e.g. `Repository<_>`.
///
/// Rust has no runtime notion of an unbound generic, so definitions are named explicitly
/// and closed types point back to them through [`GenericType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenericDef {
    pub name: &'static str,
    pub arity: u8,
}

impl GenericDef {
    #[inline]
    #[must_use]
    pub const fn new(name: &'static str, arity: u8) -> Self {
        Self { name, arity }
    }
}

impl Display for GenericDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        f.write_str("<")?;
        for index in 0..self.arity {
            if index > 0 {
                f.write_str(", ")?;
            }
            f.write_str("_")?;
        }
        f.write_str(">")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum TypeIdent {
    Concrete(TypeId),
    Open(GenericDef),
}

struct GenericArguments {
    definition: GenericDef,
    arguments: Box<[TypeInfo]>,
}

/// Runtime identity of a type.
///
/// Equality, ordering and hashing only look at the identity, never at the name
/// or the generic metadata.
#[derive(Clone)]
pub struct TypeInfo {
    pub name: &'static str,
    ident: TypeIdent,
    generic: Option<Arc<GenericArguments>>,
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: type_name::<T>(),
            ident: TypeIdent::Concrete(TypeId::of::<T>()),
            generic: None,
        }
    }

    /// Closed generic type `T`, built from `definition` with the given type arguments
    #[must_use]
    pub fn closed<T: ?Sized + 'static>(definition: GenericDef, arguments: impl IntoIterator<Item = TypeInfo>) -> Self {
        Self {
            name: type_name::<T>(),
            ident: TypeIdent::Concrete(TypeId::of::<T>()),
            generic: Some(Arc::new(GenericArguments {
                definition,
                arguments: arguments.into_iter().collect(),
            })),
        }
    }

    /// Open generic type definition. Cannot be built, only registered.
    #[inline]
    #[must_use]
    pub const fn open(definition: GenericDef) -> Self {
        Self {
            name: definition.name,
            ident: TypeIdent::Open(definition),
            generic: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> Option<TypeId> {
        match self.ident {
            TypeIdent::Concrete(id) => Some(id),
            TypeIdent::Open(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id() == Some(TypeId::of::<T>())
    }

    #[inline]
    #[must_use]
    pub const fn is_open_generic(&self) -> bool {
        matches!(self.ident, TypeIdent::Open(_))
    }

    #[inline]
    #[must_use]
    pub fn is_closed_generic(&self) -> bool {
        self.generic.is_some()
    }

    /// Definition of an open generic, or the definition a closed generic was built from
    #[must_use]
    pub fn generic_definition(&self) -> Option<GenericDef> {
        match (&self.ident, &self.generic) {
            (TypeIdent::Open(definition), _) => Some(*definition),
            (TypeIdent::Concrete(_), Some(generic)) => Some(generic.definition),
            (TypeIdent::Concrete(_), None) => None,
        }
    }

    #[must_use]
    pub fn generic_arguments(&self) -> &[TypeInfo] {
        self.generic.as_ref().map_or(&[], |generic| &generic.arguments)
    }

    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let name = self.name.split('<').next().unwrap_or(self.name);
        name.rsplit("::").next().unwrap_or(name)
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.ident == other.ident
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ident.hash(state);
    }
}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ident.cmp(&other.ident)
    }
}

impl Debug for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.ident {
            TypeIdent::Concrete(_) => f.write_str(self.name),
            TypeIdent::Open(definition) => Display::fmt(definition, f),
        }
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Closed generic type that knows the open definition it was built from.
///
/// Registrations made against [`TypeInfo::open`] apply to every implementor whose
/// `DEFINITION` matches.
pub trait GenericType: 'static {
    const DEFINITION: GenericDef;

    fn arguments() -> Vec<TypeInfo>;

    #[must_use]
    fn type_info() -> TypeInfo {
        TypeInfo::closed::<Self>(Self::DEFINITION, Self::arguments())
    }
}

/// Type-erased shared instance.
///
/// Always holds an `Arc<T>` where `T` is the type described by [`Instance::type_info`],
/// so trait objects survive the erasure.
#[derive(Clone)]
pub struct Instance {
    type_info: TypeInfo,
    value: Arc<dyn Any + Send + Sync>,
    addr: usize,
    downgrade: fn(&Instance) -> WeakInstance,
}

impl Instance {
    #[inline]
    #[must_use]
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::with_type_info(TypeInfo::of::<T>(), value)
    }

    /// Same as [`Instance::new`], but keeps generic metadata of `type_info`.
    /// The identity of `type_info` must be the identity of `T`.
    #[must_use]
    pub fn with_type_info<T: ?Sized + Send + Sync + 'static>(type_info: TypeInfo, value: Arc<T>) -> Self {
        debug_assert!(type_info.is::<T>(), "{type_info} is not {}", type_name::<T>());

        Self {
            type_info,
            addr: Arc::as_ptr(&value).cast::<()>() as usize,
            value: Arc::new(value),
            downgrade: downgrade::<T>,
        }
    }

    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    #[inline]
    #[must_use]
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    #[inline]
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.value.is::<Arc<T>>()
    }

    /// `true` if both handles point to the same allocation, whatever view they expose
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }

    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakInstance {
        (self.downgrade)(self)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("type", &self.type_info).finish_non_exhaustive()
    }
}

fn downgrade<T: ?Sized + Send + Sync + 'static>(instance: &Instance) -> WeakInstance {
    let weak = instance.downcast::<T>().map(|value| Arc::downgrade(&value));
    let type_info = instance.type_info.clone();

    WeakInstance {
        upgrade: Arc::new(move || {
            let value = weak.as_ref()?.upgrade()?;
            Some(Instance::with_type_info(type_info.clone(), value))
        }),
    }
}

/// Non-owning handle to an [`Instance`]
#[derive(Clone)]
pub struct WeakInstance {
    upgrade: Arc<dyn Fn() -> Option<Instance> + Send + Sync>,
}

impl WeakInstance {
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<Instance> {
        (self.upgrade)()
    }
}

/// Conversion of a shared implementation into a shared contract view.
///
/// Every type is assignable to itself. Trait object contracts are declared with [`assignable!`].
pub trait Assignable<Contract: ?Sized>: Send + Sync + 'static {
    fn assign(self: Arc<Self>) -> Arc<Contract>;
}

impl<T: ?Sized + Send + Sync + 'static> Assignable<T> for T {
    #[inline]
    fn assign(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Declares that an implementation can be handed out as one or more trait object contracts.
///
/// ```
/// trait Logger: Send + Sync {}
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {}
///
/// tessera::assignable!(ConsoleLogger => dyn Logger);
/// ```
#[macro_export]
macro_rules! assignable {
    ($ty:ty => $($contract:ty),+ $(,)?) => {
        $(
            impl $crate::Assignable<$contract> for $ty {
                #[inline]
                fn assign(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$contract> {
                    self
                }
            }
        )+
    };
}

type CastFn = dyn Fn(&Instance) -> Option<Instance> + Send + Sync;

/// Converts instances of `source` into instances of `target`
#[derive(Clone)]
pub struct Caster {
    source: TypeInfo,
    target: TypeInfo,
    cast: Arc<CastFn>,
}

impl Caster {
    #[must_use]
    pub fn of<Contract, Implementation>() -> Self
    where
        Contract: ?Sized + Send + Sync + 'static,
        Implementation: Assignable<Contract> + ?Sized,
    {
        Self::new(TypeInfo::of::<Implementation>(), TypeInfo::of::<Contract>(), |instance| {
            let value = instance.downcast::<Implementation>()?;
            Some(Instance::new(<Implementation as Assignable<Contract>>::assign(value)))
        })
    }

    #[must_use]
    pub fn new<F>(source: TypeInfo, target: TypeInfo, cast: F) -> Self
    where
        F: Fn(&Instance) -> Option<Instance> + Send + Sync + 'static,
    {
        Self {
            source,
            target,
            cast: Arc::new(cast),
        }
    }

    #[inline]
    #[must_use]
    pub const fn source(&self) -> &TypeInfo {
        &self.source
    }

    #[inline]
    #[must_use]
    pub const fn target(&self) -> &TypeInfo {
        &self.target
    }

    #[inline]
    #[must_use]
    pub fn cast(&self, instance: &Instance) -> Option<Instance> {
        (self.cast)(instance)
    }
}

impl Debug for Caster {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caster")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Caster, GenericDef, GenericType, Instance, TypeInfo};

    use core::marker::PhantomData;
    use std::{collections::HashSet, sync::Arc};

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    assignable!(English => dyn Greeter);

    const BOX: GenericDef = GenericDef::new("Box", 1);

    struct Boxed<T>(PhantomData<fn() -> T>);

    impl<T: 'static> GenericType for Boxed<T> {
        const DEFINITION: GenericDef = BOX;

        fn arguments() -> Vec<TypeInfo> {
            vec![TypeInfo::of::<T>()]
        }
    }

    #[test]
    fn test_type_info_identity() {
        assert_eq!(TypeInfo::of::<English>(), TypeInfo::of::<English>());
        assert_ne!(TypeInfo::of::<English>(), TypeInfo::of::<dyn Greeter>());
        assert_eq!(TypeInfo::of::<Boxed<u8>>(), Boxed::<u8>::type_info());
        assert_ne!(TypeInfo::open(BOX), Boxed::<u8>::type_info());

        let set: HashSet<_> = [TypeInfo::of::<Boxed<u8>>(), Boxed::<u8>::type_info()].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_generic_metadata() {
        let closed = Boxed::<u8>::type_info();
        assert!(closed.is_closed_generic());
        assert!(!closed.is_open_generic());
        assert_eq!(closed.generic_definition(), Some(BOX));
        assert_eq!(closed.generic_arguments(), &[TypeInfo::of::<u8>()]);

        let open = TypeInfo::open(BOX);
        assert!(open.is_open_generic());
        assert_eq!(open.generic_definition(), Some(BOX));
        assert!(open.id().is_none());
        assert_eq!(open.to_string(), "Box<_>");

        assert!(TypeInfo::of::<u8>().generic_definition().is_none());
        assert_eq!(TypeInfo::of::<Boxed<u8>>().short_name(), "Boxed");
    }

    #[test]
    fn test_instance_downcast() {
        let instance = Instance::new(Arc::new(English));
        assert!(instance.is::<English>());
        assert!(instance.downcast::<dyn Greeter>().is_none());
        assert_eq!(instance.downcast::<English>().map(|value| value.greet()), Some("hello"));
    }

    #[test]
    fn test_caster() {
        let value = Arc::new(English);
        let instance = Instance::new(value.clone());
        let caster = Caster::of::<dyn Greeter, English>();

        assert_eq!(caster.source(), &TypeInfo::of::<English>());
        assert_eq!(caster.target(), &TypeInfo::of::<dyn Greeter>());

        let cast = caster.cast(&instance).unwrap();
        assert_eq!(cast.type_info(), &TypeInfo::of::<dyn Greeter>());
        assert_eq!(cast.downcast::<dyn Greeter>().unwrap().greet(), "hello");
        assert!(cast.ptr_eq(&instance));

        assert!(caster.cast(&Instance::new(Arc::new(1_u8))).is_none());
    }

    #[test]
    fn test_weak_instance() {
        let value = Arc::new(English);
        let weak = Instance::new(value.clone()).downgrade();
        assert!(weak.upgrade().is_some());

        drop(value);
        assert!(weak.upgrade().is_none());
    }
}
