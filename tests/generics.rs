use std::{
    any::type_name,
    marker::PhantomData,
    sync::Arc,
    thread,
};
use tessera::{
    BuildErrorKind, BuildKey, BuildPlan, BuilderContext, Constructor, Container, ContainerControlledLifetimeManager,
    DynamicBuildPlan, GenericDef, GenericType, InstantiateErrorKind, Registration, TransientLifetimeManager, TypeInfo,
};
use tracing_test::traced_test;

const REPOSITORY: GenericDef = GenericDef::new("Repository", 1);

struct Repository<T> {
    entity: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Repository<T> {
    fn new() -> Self {
        Self {
            entity: type_name::<T>(),
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> GenericType for Repository<T> {
    const DEFINITION: GenericDef = REPOSITORY;

    fn arguments() -> Vec<TypeInfo> {
        vec![TypeInfo::of::<T>()]
    }
}

struct User;
struct Order;

fn repository_plan(_context: &mut BuilderContext<'_>, build_key: &BuildKey) -> Result<Arc<dyn BuildPlan>, BuildErrorKind> {
    let entity = build_key.type_info().generic_arguments().first().cloned();
    let constructor = match entity {
        Some(entity) if entity.is::<User>() => Constructor::new(|| Ok::<_, InstantiateErrorKind>(Repository::<User>::new())),
        Some(entity) if entity.is::<Order>() => Constructor::new(|| Ok::<_, InstantiateErrorKind>(Repository::<Order>::new())),
        _ => {
            return Err(BuildErrorKind::NoConstructor {
                key: build_key.clone(),
            })
        }
    };
    Ok(Arc::new(DynamicBuildPlan::from_constructor(constructor)))
}

fn container() -> Container {
    let container = Container::new();
    container
        .register(
            Registration::open_generic(REPOSITORY)
                .lifetime(ContainerControlledLifetimeManager::new())
                .with_plan_creator(repository_plan),
        )
        .unwrap();
    container
}

#[test]
#[traced_test]
fn test_open_generic_cannot_be_resolved() {
    let container = container();

    let err = container.resolve_type(&TypeInfo::open(REPOSITORY), None, &[]).unwrap_err();
    assert!(matches!(err.kind(), BuildErrorKind::OpenGenericResolution { .. }));
}

#[test]
#[traced_test]
fn test_closed_types_fall_back_to_definition() {
    let container = container();

    let users = container.resolve_generic::<Repository<User>>(None).unwrap();
    let orders = container.resolve_generic::<Repository<Order>>(None).unwrap();
    assert!(users.entity.ends_with("User"));
    assert!(orders.entity.ends_with("Order"));

    let users_again = container.resolve_generic::<Repository<User>>(None).unwrap();
    assert!(Arc::ptr_eq(&users, &users_again));
    assert!(container.is_registered_type(&TypeInfo::open(REPOSITORY), None));
}

#[test]
#[traced_test]
fn test_concurrent_closed_resolution_shares_manager() {
    let container = container();

    let resolved: Vec<Arc<Repository<Order>>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| container.resolve_generic::<Repository<Order>>(None).unwrap()))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert!(resolved.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(container.lifetime().len(), 1);
}

#[test]
#[traced_test]
fn test_closed_registration_shadows_definition() {
    let container = container();
    let repository = Arc::new(Repository::<User>::new());
    container.register_instance(repository.clone(), None).unwrap();

    let resolved = container.resolve_generic::<Repository<User>>(None).unwrap();
    assert!(Arc::ptr_eq(&resolved, &repository));
}

#[test]
#[traced_test]
fn test_closed_managers_live_with_the_registration() {
    let container = container();
    let child = container.create_child_container();

    let from_child = child.resolve_generic::<Repository<User>>(None).unwrap();
    let from_root = container.resolve_generic::<Repository<User>>(None).unwrap();
    assert!(Arc::ptr_eq(&from_child, &from_root));

    drop(child);
    let again = container.resolve_generic::<Repository<User>>(None).unwrap();
    assert!(Arc::ptr_eq(&again, &from_root));
}

#[test]
#[traced_test]
fn test_reregistered_definition_replaces_closed_lifetimes() {
    let container = container();
    let first = container.resolve_generic::<Repository<User>>(None).unwrap();
    let tracked = container.lifetime().len();

    container
        .register(
            Registration::open_generic(REPOSITORY)
                .lifetime(TransientLifetimeManager::new())
                .with_plan_creator(repository_plan),
        )
        .unwrap();
    assert_eq!(container.lifetime().len(), tracked - 1);

    let second = container.resolve_generic::<Repository<User>>(None).unwrap();
    let third = container.resolve_generic::<Repository<User>>(None).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(&second, &third));
}
