use scopeline::{
    DiError, DiResult, Lifetime, Provides, ResolutionContext, ServiceCollection,
    ServiceCollectionExt, ServiceModule,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;
}

struct Email;
struct Sms;
struct Push;

impl Notifier for Email {
    fn channel(&self) -> &'static str {
        "email"
    }
}
impl Notifier for Sms {
    fn channel(&self) -> &'static str {
        "sms"
    }
}
impl Notifier for Push {
    fn channel(&self) -> &'static str {
        "push"
    }
}

impl Provides<dyn Notifier> for Email {
    fn upcast(self: Arc<Self>) -> Arc<dyn Notifier> {
        self
    }
}
impl Provides<dyn Notifier> for Sms {
    fn upcast(self: Arc<Self>) -> Arc<dyn Notifier> {
        self
    }
}
impl Provides<dyn Notifier> for Push {
    fn upcast(self: Arc<Self>) -> Arc<dyn Notifier> {
        self
    }
}

fn channels(notifiers: &[Arc<dyn Notifier>]) -> Vec<&'static str> {
    notifiers.iter().map(|n| n.channel()).collect()
}

#[test]
fn test_get_all_follows_registration_order() {
    let mut sc = ServiceCollection::new();
    sc.register::<dyn Notifier, Sms, _>(|_| Ok(Sms))
        .register::<dyn Notifier, Email, _>(|_| Ok(Email))
        .register::<dyn Notifier, Push, _>(|_| Ok(Push));
    let container = sc.build().unwrap();
    let ctx = ResolutionContext::application(&container);

    let all = ctx.get_all::<dyn Notifier>(Lifetime::Singleton).unwrap();
    assert_eq!(channels(&all), ["sms", "email", "push"]);
}

#[test]
fn test_last_registration_wins_for_get() {
    let mut sc = ServiceCollection::new();
    sc.register::<dyn Notifier, Email, _>(|_| Ok(Email))
        .register::<dyn Notifier, Sms, _>(|_| Ok(Sms));
    let container = sc.build().unwrap();
    let ctx = ResolutionContext::application(&container);

    assert_eq!(ctx.get::<dyn Notifier>(Lifetime::Singleton).unwrap().channel(), "sms");
}

#[test]
fn test_each_concrete_type_has_its_own_slot() {
    let mut sc = ServiceCollection::new();
    sc.register::<dyn Notifier, Email, _>(|_| Ok(Email))
        .register::<dyn Notifier, Sms, _>(|_| Ok(Sms));
    let container = sc.build().unwrap();
    let ctx = ResolutionContext::application(&container);

    let first = ctx.get_all::<dyn Notifier>(Lifetime::Singleton).unwrap();
    let second = ctx.get_all::<dyn Notifier>(Lifetime::Singleton).unwrap();
    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert!(Arc::ptr_eq(&first[1], &second[1]));
    assert!(!Arc::ptr_eq(&first[0], &first[1]));

    // get() and get_all() share the slot of the winning registration
    let single = ctx.get::<dyn Notifier>(Lifetime::Singleton).unwrap();
    assert!(Arc::ptr_eq(&single, &first[1]));
}

#[test]
fn test_same_concrete_twice_is_a_configuration_error() {
    let mut sc = ServiceCollection::new();
    sc.register::<dyn Notifier, Email, _>(|_| Ok(Email))
        .register::<dyn Notifier, Email, _>(|_| Ok(Email));

    match sc.build() {
        Err(err @ DiError::DuplicateRegistration { .. }) => {
            assert!(err.is_configuration());
            assert!(err.to_string().contains("Email"));
        }
        other => panic!("expected DuplicateRegistration, got {:?}", other.err()),
    }
}

#[test]
fn test_one_concrete_under_two_capabilities() {
    let mut sc = ServiceCollection::new();
    sc.register::<dyn Notifier, Email, _>(|_| Ok(Email));
    sc.add_service(|_| Ok(Email));
    let container = sc.build().unwrap();
    let ctx = ResolutionContext::application(&container);

    assert_eq!(ctx.get::<dyn Notifier>(Lifetime::Singleton).unwrap().channel(), "email");
    assert!(ctx.get::<Email>(Lifetime::Singleton).is_ok());
}

#[test]
fn test_require_checks_capabilities_at_build() {
    let mut sc = ServiceCollection::new();
    sc.require::<dyn Notifier>();
    assert!(matches!(sc.build(), Err(DiError::MissingRequired(_))));

    let mut sc = ServiceCollection::new();
    sc.require::<dyn Notifier>()
        .register::<dyn Notifier, Push, _>(|_| Ok(Push));
    assert!(sc.build().is_ok());
}

#[test]
fn test_prewarm_builds_singletons_up_front() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();

    let mut sc = ServiceCollection::new();
    sc.register::<dyn Notifier, Email, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Email)
    })
    .prewarm::<dyn Notifier>();
    let container = sc.build().unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 0);

    container.prewarm().unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    let ctx = ResolutionContext::application(&container);
    ctx.get::<dyn Notifier>(Lifetime::Singleton).unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

struct NotificationModule;

impl ServiceModule for NotificationModule {
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
        services
            .register::<dyn Notifier, Email, _>(|_| Ok(Email))
            .register::<dyn Notifier, Sms, _>(|_| Ok(Sms));
        Ok(())
    }
}

#[test]
fn test_modules_register_in_order() {
    let mut sc = ServiceCollection::new();
    sc.register::<dyn Notifier, Push, _>(|_| Ok(Push));
    sc.add_module(NotificationModule).unwrap();
    let container = sc.build().unwrap();

    let registered: Vec<_> = container
        .registrations()
        .into_iter()
        .map(|(_, concrete)| concrete.rsplit("::").next().unwrap_or(concrete))
        .collect();
    assert_eq!(registered, ["Push", "Email", "Sms"]);
}
