use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tessera::{
    assignable, injectable, BuildErrorKind, BuilderContext, Container, ContainerConfig, ContainerControlledLifetimeManager, Inject,
    InjectionConstructor, InjectionFactory, InjectionMethod, InstantiateErrorKind, Registration, RegistrationErrorKind,
    ResolverOverride, SingletonLifetimeManager, TypeInfo,
};
use tracing_test::traced_test;

trait Logger: Send + Sync {
    fn target(&self) -> &'static str;
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn target(&self) -> &'static str {
        "console"
    }
}

struct FileLogger;

impl Logger for FileLogger {
    fn target(&self) -> &'static str {
        "file"
    }
}

assignable!(ConsoleLogger => dyn Logger);
assignable!(FileLogger => dyn Logger);

injectable!(ConsoleLogger, || Ok::<_, InstantiateErrorKind>(ConsoleLogger));
injectable!(FileLogger, || Ok::<_, InstantiateErrorKind>(FileLogger));

trait Cache: Send + Sync {
    fn backend(&self) -> &'static str;
}

struct RedisCache;

impl Cache for RedisCache {
    fn backend(&self) -> &'static str {
        "redis"
    }
}

struct MemoryCache;

impl Cache for MemoryCache {
    fn backend(&self) -> &'static str {
        "memory"
    }
}

assignable!(RedisCache => dyn Cache);
assignable!(MemoryCache => dyn Cache);

fn redis() -> InjectionConstructor {
    InjectionConstructor::new(|| Ok::<_, InstantiateErrorKind>(RedisCache))
}

fn memory() -> InjectionConstructor {
    InjectionConstructor::new(|| Ok::<_, InstantiateErrorKind>(MemoryCache))
}

#[test]
#[traced_test]
fn test_transient_logger() {
    let container = Container::new();
    container.register(Registration::mapping::<dyn Logger, ConsoleLogger>()).unwrap();

    let first = container.resolve::<dyn Logger>().unwrap();
    let second = container.resolve::<dyn Logger>().unwrap();
    assert_eq!(first.target(), "console");
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
#[traced_test]
fn test_named_cache_singleton() {
    let container = Container::new();
    container
        .register(
            Registration::mapping::<dyn Cache, RedisCache>()
                .named("redis")
                .lifetime(ContainerControlledLifetimeManager::new())
                .with(redis()),
        )
        .unwrap();

    let first = container.resolve_named::<dyn Cache>("redis").unwrap();
    let second = container.resolve_named::<dyn Cache>("redis").unwrap();
    assert_eq!(first.backend(), "redis");
    assert!(Arc::ptr_eq(&first, &second));

    let Err(err) = container.resolve::<dyn Cache>() else {
        panic!("unnamed cache resolved");
    };
    assert!(matches!(err.kind(), BuildErrorKind::NoConstructor { .. }));
    assert_eq!(err.name, None);
    assert!(!container.is_registered::<dyn Cache>(None));
    assert!(container.is_registered::<dyn Cache>(Some("redis")));
}

#[test]
#[traced_test]
fn test_instance_identity() {
    let container = Container::new();
    let logger: Arc<dyn Logger> = Arc::new(FileLogger);
    container.register_instance(logger.clone(), None).unwrap();

    let resolved = container.resolve::<dyn Logger>().unwrap();
    assert!(Arc::ptr_eq(&resolved, &logger));
}

#[test]
#[traced_test]
fn test_reregistration_replaces_mapping() {
    let container = Container::new();
    container.register(Registration::mapping::<dyn Logger, ConsoleLogger>()).unwrap();
    assert_eq!(container.resolve::<dyn Logger>().unwrap().target(), "console");

    container.register(Registration::mapping::<dyn Logger, FileLogger>()).unwrap();
    assert_eq!(container.resolve::<dyn Logger>().unwrap().target(), "file");
}

#[test]
#[traced_test]
fn test_type_mismatch() {
    let container = Container::new();
    let result = container.register(Registration::dynamic(TypeInfo::of::<dyn Logger>(), TypeInfo::of::<RedisCache>()));
    assert!(matches!(result, Err(RegistrationErrorKind::TypeMismatch { .. })));
    assert!(!container.is_registered::<dyn Logger>(None));
}

#[test]
#[traced_test]
fn test_child_scoping() {
    let container = Container::new();
    let child = container.create_child_container();
    child.register(Registration::mapping::<dyn Cache, MemoryCache>().with(memory())).unwrap();

    assert_eq!(child.resolve::<dyn Cache>().unwrap().backend(), "memory");
    assert!(container.resolve::<dyn Cache>().is_err());

    container.register(Registration::mapping::<dyn Cache, RedisCache>().with(redis())).unwrap();
    assert_eq!(container.resolve::<dyn Cache>().unwrap().backend(), "redis");
    assert_eq!(child.resolve::<dyn Cache>().unwrap().backend(), "memory");

    let sibling = container.create_child_container();
    assert_eq!(sibling.resolve::<dyn Cache>().unwrap().backend(), "redis");
}

#[test]
#[traced_test]
fn test_singleton_registered_from_child() {
    let container = Container::new();
    let child = container.create_child_container();
    child
        .register(
            Registration::mapping::<dyn Cache, RedisCache>()
                .lifetime(SingletonLifetimeManager::new())
                .with(redis()),
        )
        .unwrap();

    let from_root = container.resolve::<dyn Cache>().unwrap();
    let from_sibling = container.create_child_container().resolve::<dyn Cache>().unwrap();
    assert!(Arc::ptr_eq(&from_root, &from_sibling));
}

#[test]
#[traced_test]
fn test_mapping_to_registered_target() {
    let container = Container::new();
    container
        .register(Registration::of::<ConsoleLogger>().lifetime(ContainerControlledLifetimeManager::new()))
        .unwrap();
    container.register(Registration::mapping::<dyn Logger, ConsoleLogger>()).unwrap();

    let concrete = container.resolve::<ConsoleLogger>().unwrap();
    let contract = container.resolve::<dyn Logger>().unwrap();
    assert_eq!(
        Arc::as_ptr(&concrete).cast::<()>(),
        Arc::as_ptr(&contract).cast::<()>()
    );
}

#[test]
#[traced_test]
fn test_mapping_lifetime_over_registered_target() {
    let container = Container::new();
    container
        .register(Registration::of::<ConsoleLogger>())
        .unwrap()
        .register(Registration::mapping::<dyn Logger, ConsoleLogger>().lifetime(ContainerControlledLifetimeManager::new()))
        .unwrap();

    let first = container.resolve::<dyn Logger>().unwrap();
    let second = container.resolve::<dyn Logger>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let concrete = container.resolve::<ConsoleLogger>().unwrap();
    assert_ne!(Arc::as_ptr(&concrete).cast::<()>(), Arc::as_ptr(&first).cast::<()>());
}

struct Settings(u8);

struct Service {
    settings: Arc<Settings>,
    logger: Arc<dyn Logger>,
}

fn register_service(container: &Container) {
    container.register_instance(Arc::new(Settings(1)), None).unwrap();
    container.register(Registration::mapping::<dyn Logger, ConsoleLogger>()).unwrap();
    container
        .register(Registration::of::<Service>().with(InjectionConstructor::new(
            |Inject(settings): Inject<Settings>, Inject(logger): Inject<dyn Logger>| {
                Ok::<_, InstantiateErrorKind>(Service { settings, logger })
            },
        )))
        .unwrap();
}

#[test]
#[traced_test]
fn test_constructor_injection() {
    let container = Container::new();
    register_service(&container);

    let service = container.resolve::<Service>().unwrap();
    assert_eq!(service.settings.0, 1);
    assert_eq!(service.logger.target(), "console");
}

#[test]
#[traced_test]
fn test_overrides() {
    let container = Container::new();
    register_service(&container);

    let overrides = [
        ResolverOverride::dependency(Arc::new(Settings(2))),
        ResolverOverride::dependency::<dyn Logger>(Arc::new(FileLogger)),
    ];
    let service = container.resolve_with::<Service>(None, &overrides).unwrap();
    assert_eq!(service.settings.0, 2);
    assert_eq!(service.logger.target(), "file");

    let settings = container.resolve_with::<Settings>(None, &overrides[..1]).unwrap();
    assert_eq!(settings.0, 1);
}

#[test]
#[traced_test]
fn test_factory() {
    let container = Container::new();
    container.register_instance(Arc::new(Settings(7)), None).unwrap();
    container
        .register(Registration::of::<dyn Logger>().with(InjectionFactory::new(|context: &mut BuilderContext<'_>| {
            let settings = context.resolve::<Settings>(None).map_err(anyhow::Error::from)?;
            let logger: Arc<dyn Logger> = if settings.0 > 5 { Arc::new(FileLogger) } else { Arc::new(ConsoleLogger) };
            Ok(logger)
        })))
        .unwrap();

    assert_eq!(container.resolve::<dyn Logger>().unwrap().target(), "file");
}

#[test]
#[traced_test]
fn test_factory_shares_resolution() {
    let container = Container::new();
    container.register_instance(Arc::new(Settings(1)), None).unwrap();
    container
        .register(Registration::of::<Service>().with(InjectionFactory::new(|context: &mut BuilderContext<'_>| {
            let settings = context.resolve::<Settings>(None).map_err(anyhow::Error::from)?;
            let logger = context.resolve::<dyn Logger>(None).map_err(anyhow::Error::from)?;
            Ok(Arc::new(Service { settings, logger }))
        })))
        .unwrap()
        .register(Registration::of::<dyn Logger>().with(InjectionFactory::new(|context: &mut BuilderContext<'_>| {
            context.resolve::<dyn Logger>(None).map_err(|err| anyhow::Error::from(err).into())
        })))
        .unwrap();

    let overrides = [
        ResolverOverride::dependency(Arc::new(Settings(9))),
        ResolverOverride::dependency::<dyn Logger>(Arc::new(FileLogger)),
    ];
    let service = container.resolve_with::<Service>(None, &overrides).unwrap();
    assert_eq!(service.settings.0, 9);
    assert_eq!(service.logger.target(), "file");

    let Err(err) = container.resolve::<dyn Logger>() else {
        panic!("self-referencing factory resolved");
    };
    assert!(matches!(err.kind(), BuildErrorKind::Instantiator(_)));
    assert!(err.to_string().contains("Cyclic dependency"));
}

#[derive(Default)]
struct Widget {
    configured: AtomicUsize,
}

#[test]
#[traced_test]
fn test_build_up_existing() {
    let container = Container::new();
    container.register_instance(Arc::new(Settings(3)), None).unwrap();
    container
        .register(Registration::of::<Widget>().with(InjectionMethod::new(
            |widget: Arc<Widget>, Inject(settings): Inject<Settings>| {
                widget.configured.fetch_add(usize::from(settings.0), Ordering::Relaxed);
                Ok::<_, InstantiateErrorKind>(())
            },
        )))
        .unwrap();

    let widget = Arc::new(Widget::default());
    let built = container.build_up(widget.clone(), None, &[]).unwrap();
    assert!(Arc::ptr_eq(&widget, &built));
    assert_eq!(widget.configured.load(Ordering::Relaxed), 3);

    let Err(err) = container.resolve::<Widget>() else {
        panic!("widget built without a constructor");
    };
    assert!(matches!(err.kind(), BuildErrorKind::NoConstructor { .. }));
}

struct Clock;

injectable!(Clock, || Ok::<_, InstantiateErrorKind>(Clock));

struct Scheduler(Arc<Clock>);

injectable!(Scheduler, |Inject(clock): Inject<Clock>| Ok::<_, InstantiateErrorKind>(Scheduler(clock)));

#[test]
#[traced_test]
fn test_unregistered_concrete_types() {
    let container = Container::new();
    let scheduler = container.resolve::<Scheduler>().unwrap();
    let clock = container.resolve::<Clock>().unwrap();
    assert!(!Arc::ptr_eq(&scheduler.0, &clock));
    assert!(!container.is_registered::<Clock>(None));
}

#[test]
#[traced_test]
fn test_optional_dependency() {
    struct Reporter(Option<Arc<dyn Cache>>);

    let container = Container::new();
    container
        .register(Registration::of::<Reporter>().with(InjectionConstructor::new(|cache: Option<Inject<dyn Cache>>| {
            Ok::<_, InstantiateErrorKind>(Reporter(cache.map(|Inject(cache)| cache)))
        })))
        .unwrap();
    assert!(container.resolve::<Reporter>().unwrap().0.is_none());

    container.register(Registration::mapping::<dyn Cache, MemoryCache>().with(memory())).unwrap();
    assert_eq!(container.resolve::<Reporter>().unwrap().0.as_ref().map(|cache| cache.backend()), Some("memory"));
}

#[test]
#[traced_test]
fn test_resolve_all() {
    let container = Container::new();
    container
        .register(Registration::mapping::<dyn Cache, RedisCache>().named("redis").with(redis()))
        .unwrap()
        .register(Registration::mapping::<dyn Cache, MemoryCache>().named("memory").with(memory()))
        .unwrap()
        .register(Registration::mapping::<dyn Cache, MemoryCache>().with(memory()))
        .unwrap();
    let child = container.create_child_container();
    child
        .register(Registration::mapping::<dyn Cache, RedisCache>().named("memory").with(redis()))
        .unwrap();

    let backends: Vec<_> = container.resolve_all::<dyn Cache>().unwrap().iter().map(|cache| cache.backend()).collect();
    assert_eq!(backends, vec!["memory", "redis"]);

    let backends: Vec<_> = child.resolve_all::<dyn Cache>().unwrap().iter().map(|cache| cache.backend()).collect();
    assert_eq!(backends, vec!["redis", "redis"]);
}

struct Left(#[allow(dead_code)] Arc<Right>);
struct Right(#[allow(dead_code)] Arc<Left>);

#[test]
#[traced_test]
fn test_cycle_fails_fast() {
    let container = Container::new();
    container
        .register(Registration::of::<Left>().with(InjectionConstructor::new(|Inject(right): Inject<Right>| {
            Ok::<_, InstantiateErrorKind>(Left(right))
        })))
        .unwrap()
        .register(Registration::of::<Right>().with(InjectionConstructor::new(|Inject(left): Inject<Left>| {
            Ok::<_, InstantiateErrorKind>(Right(left))
        })))
        .unwrap();

    let Err(err) = container.resolve::<Left>() else {
        panic!("cycle resolved");
    };
    match err.kind().root_cause() {
        BuildErrorKind::CyclicDependency { path } => {
            let names: Vec<_> = path.iter().map(|key| key.type_info().short_name()).collect();
            assert_eq!(names, vec!["Left", "Right", "Left"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

struct Level1(#[allow(dead_code)] Arc<Level2>);
struct Level2(#[allow(dead_code)] Arc<Level3>);
struct Level3;

injectable!(Level1, |Inject(next): Inject<Level2>| Ok::<_, InstantiateErrorKind>(Level1(next)));
injectable!(Level2, |Inject(next): Inject<Level3>| Ok::<_, InstantiateErrorKind>(Level2(next)));
injectable!(Level3, || Ok::<_, InstantiateErrorKind>(Level3));

#[test]
#[traced_test]
fn test_depth_limit() {
    let shallow = Container::with_config(ContainerConfig {
        max_resolution_depth: 2,
        ..ContainerConfig::default()
    });
    let Err(err) = shallow.resolve::<Level1>() else {
        panic!("depth limit ignored");
    };
    assert!(matches!(err.kind().root_cause(), BuildErrorKind::MaxDepthExceeded { limit: 2, .. }));
    assert_eq!(err.kind().failing_key().map(|key| key.type_info().short_name()), Some("Level3"));

    let deep = shallow.create_child_container();
    assert_eq!(deep.config().max_resolution_depth, 2);
    assert!(Container::new().resolve::<Level1>().is_ok());
}

#[test]
#[traced_test]
fn test_failed_build_recovers() {
    struct Flaky;

    let attempts = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container
        .register(
            Registration::of::<Flaky>()
                .lifetime(ContainerControlledLifetimeManager::new())
                .with(InjectionConstructor::new({
                    let attempts = attempts.clone();
                    move || {
                        if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                            return Err(InstantiateErrorKind::from(anyhow::anyhow!("not ready")));
                        }
                        Ok(Flaky)
                    }
                })),
        )
        .unwrap();

    let Err(err) = container.resolve::<Flaky>() else {
        panic!("first attempt succeeded");
    };
    assert!(matches!(err.kind(), BuildErrorKind::Instantiator(_)));

    let first = container.resolve::<Flaky>().unwrap();
    let second = container.resolve::<Flaky>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
#[traced_test]
fn test_resolve_type_at_runtime() {
    let container = Container::new();
    container.register(Registration::mapping::<dyn Logger, FileLogger>()).unwrap();

    let instance = container.resolve_type(&TypeInfo::of::<dyn Logger>(), None, &[]).unwrap();
    assert!(instance.is::<dyn Logger>());
    assert_eq!(instance.downcast::<dyn Logger>().map(|logger| logger.target()), Some("file"));
}
