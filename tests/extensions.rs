use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tessera::{
    BuildErrorKind, BuilderContext, BuilderStrategy, Container, ContainerExtension, ExtensionContext, Instance,
    InstantiateErrorKind, Registration, RegistrationAware, RegistrationContext, Stage,
};
use tracing_test::traced_test;

struct Clock;

tessera::injectable!(Clock, || Ok::<_, InstantiateErrorKind>(Clock));

/// Counts every build that reaches the setup stage
struct CountingStrategy(Arc<AtomicUsize>);

impl BuilderStrategy for CountingStrategy {
    fn pre_build_up(&self, _context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
#[traced_test]
fn test_strategy_added_after_first_resolve() {
    let container = Container::new();
    let child = container.create_child_container();
    child.resolve::<Clock>().unwrap();

    let builds = Arc::new(AtomicUsize::new(0));
    let revision = child.strategies().revision();
    container.strategies().add(CountingStrategy(builds.clone()), Stage::Setup);
    assert!(child.strategies().revision() > revision);

    child.resolve::<Clock>().unwrap();
    container.resolve::<Clock>().unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

/// Replaces the instance built for `Clock` with a pre-made one after creation
struct Substitute(Arc<Clock>);

impl BuilderStrategy for Substitute {
    fn post_build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        if context.build_key().type_info().is::<Clock>() {
            context.set_existing(Some(Instance::new(self.0.clone())));
        }
        Ok(())
    }
}

#[test]
#[traced_test]
fn test_child_strategy_runs_only_in_child() {
    let container = Container::new();
    let child = container.create_child_container();
    let clock = Arc::new(Clock);
    child.strategies().add(Substitute(clock.clone()), Stage::PostInitialization);

    assert!(Arc::ptr_eq(&child.resolve::<Clock>().unwrap(), &clock));
    assert!(!Arc::ptr_eq(&container.resolve::<Clock>().unwrap(), &clock));
}

struct FailingStrategy;

impl BuilderStrategy for FailingStrategy {
    fn pre_build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        Err(anyhow::anyhow!("{} rejected", context.build_key()).into())
    }
}

#[test]
#[traced_test]
fn test_strategy_error_reaches_caller() {
    let container = Container::new();
    container.strategies().add(FailingStrategy, Stage::PreCreation);

    let Err(err) = container.resolve::<Clock>() else {
        panic!("strategy error swallowed");
    };
    assert!(matches!(err.kind(), BuildErrorKind::Strategy(_)));
    assert!(container.resolve::<Container>().is_ok());
}

#[derive(Default)]
struct Audit {
    registered: Mutex<Vec<String>>,
    instances: AtomicUsize,
    children: AtomicUsize,
    policies_seen: AtomicUsize,
}

/// Records registrations and child containers, and watches registrations from the pipeline side
struct AuditExtension(Arc<Audit>);

struct AuditStrategy(Arc<Audit>);

impl BuilderStrategy for AuditStrategy {
    fn registration_aware(&self) -> Option<&dyn RegistrationAware> {
        Some(self)
    }
}

impl RegistrationAware for AuditStrategy {
    fn on_register_type(&self, registration: &RegistrationContext<'_>) {
        if registration.policies().contains_key(registration.from_key()) {
            self.0.policies_seen.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl ContainerExtension for AuditExtension {
    fn initialize(&self, context: &ExtensionContext<'_>) {
        let audit = self.0.clone();
        context.on_registering(move |registration| {
            audit.registered.lock().push(registration.registered_type().short_name().to_owned());
        });

        let audit = self.0.clone();
        context.on_registering_instance(move |_| {
            audit.instances.fetch_add(1, Ordering::SeqCst);
        });

        let audit = self.0.clone();
        context.on_child_container_created(move |child| {
            assert!(child.parent().is_some());
            audit.children.fetch_add(1, Ordering::SeqCst);
        });

        context.strategies().add(AuditStrategy(self.0.clone()), Stage::Setup);
    }
}

#[test]
#[traced_test]
fn test_extension_notifications() {
    let audit = Arc::new(Audit::default());
    let container = Container::new();
    container.add_extension(AuditExtension(audit.clone()));

    container
        .register(Registration::of::<Clock>())
        .unwrap()
        .register(Registration::of::<Clock>().named("utc"))
        .unwrap()
        .register_instance(Arc::new(Clock), Some("fixed"))
        .unwrap();
    let _child = container.create_child_container();

    assert_eq!(*audit.registered.lock(), vec!["Clock".to_owned(), "Clock".to_owned()]);
    assert_eq!(audit.instances.load(Ordering::SeqCst), 1);
    assert_eq!(audit.children.load(Ordering::SeqCst), 1);
    assert_eq!(audit.policies_seen.load(Ordering::SeqCst), 2);

    let configured = container.configure::<AuditExtension>().unwrap();
    assert!(Arc::ptr_eq(&configured.0, &audit));
}

#[test]
#[traced_test]
fn test_registrations_snapshot() {
    let container = Container::new();
    container.register(Registration::of::<Clock>().named("utc")).unwrap();
    let child = container.create_child_container();
    child.register(Registration::of::<Clock>().named("local")).unwrap();

    let mut names: Vec<_> = child
        .registrations()
        .filter(|registration| registration.registered_type().is::<Clock>())
        .filter_map(|registration| registration.name().map(ToOwned::to_owned))
        .collect();
    names.sort();
    assert_eq!(names, vec!["local".to_owned(), "utc".to_owned()]);

    let containers = child
        .registrations()
        .filter(|registration| registration.registered_type().is::<Container>())
        .count();
    assert_eq!(containers, 1);
    assert_eq!(container.registrations().count(), 2);
}
