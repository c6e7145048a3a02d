use scopeline::{
    request_scope_id, CancellationToken, DiError, Lifetime, ResolutionContext, ServiceCollection,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_singleton_built_once_under_contention() {
    struct Expensive;

    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();

    let mut sc = ServiceCollection::new();
    sc.add_service(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok(Expensive)
    });
    let container = sc.build().unwrap();

    let threads = 100;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                ResolutionContext::application(&container)
                    .get::<Expensive>(Lifetime::Singleton)
                    .unwrap()
            })
        })
        .collect();

    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
}

#[test]
fn test_singleton_identity_across_many_requests() {
    struct Shared;

    let mut sc = ServiceCollection::new();
    sc.add_service(|_| Ok(Shared));
    let container = sc.build().unwrap();

    let workers = 8;
    let per_worker = 50;
    let handles: Vec<_> = (0..workers)
        .map(|w| {
            let container = container.clone();
            thread::spawn(move || {
                (0..per_worker)
                    .map(|i| {
                        let id = format!("{}-{}", w, i);
                        container.store().create_scope(request_scope_id(&id)).unwrap();
                        let ctx = ResolutionContext::for_request(&container, &id, CancellationToken::new());
                        let shared = ctx.get::<Shared>(Lifetime::Singleton).unwrap();
                        container.store().delete_scope(&request_scope_id(&id)).unwrap();
                        Arc::as_ptr(&shared) as usize
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let pointers: HashSet<usize> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(pointers.len(), 1);
    assert_eq!(container.store().len(), 1);
}

#[test]
fn test_scoped_instances_are_isolated_per_request() {
    struct Session(usize);

    let next = Arc::new(AtomicUsize::new(0));
    let counter = next.clone();

    let mut sc = ServiceCollection::new();
    sc.add_service(move |_| Ok(Session(counter.fetch_add(1, Ordering::SeqCst))));
    let container = sc.build().unwrap();

    let requests = 32;
    let handles: Vec<_> = (0..requests)
        .map(|r| {
            let container = container.clone();
            thread::spawn(move || {
                let id = r.to_string();
                container.store().create_scope(request_scope_id(&id)).unwrap();
                let ctx = ResolutionContext::for_request(&container, &id, CancellationToken::new());

                let first = ctx.get::<Session>(Lifetime::Scoped).unwrap();
                let again = ctx.get::<Session>(Lifetime::Scoped).unwrap();
                assert!(Arc::ptr_eq(&first, &again));

                container.store().delete_scope(&request_scope_id(&id)).unwrap();
                first.0
            })
        })
        .collect();

    let sessions: HashSet<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(sessions.len(), requests);
    assert_eq!(next.load(Ordering::SeqCst), requests);
}

#[test]
fn test_scoped_build_once_within_one_request() {
    struct Slow;

    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();

    let mut sc = ServiceCollection::new();
    sc.add_service(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        Ok(Slow)
    });
    let container = sc.build().unwrap();
    container.store().create_scope(request_scope_id("fan-out")).unwrap();
    let ctx = ResolutionContext::for_request(&container, "fan-out", CancellationToken::new());

    let threads = 100;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let ctx = ctx.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                ctx.get::<Slow>(Lifetime::Scoped).unwrap()
            })
        })
        .collect();

    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
}

#[test]
fn test_scope_deleted_mid_build() {
    struct Slow;

    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let (s, r) = (started.clone(), release.clone());

    let mut sc = ServiceCollection::new();
    sc.add_service(move |_| {
        s.wait();
        r.wait();
        Ok(Slow)
    });
    let container = sc.build().unwrap();
    container.store().create_scope(request_scope_id("doomed")).unwrap();

    let worker = {
        let container = container.clone();
        thread::spawn(move || {
            let ctx = ResolutionContext::for_request(&container, "doomed", CancellationToken::new());
            ctx.get::<Slow>(Lifetime::Scoped).map(|_| ())
        })
    };

    started.wait();
    container.store().delete_scope(&request_scope_id("doomed")).unwrap();
    release.wait();

    assert!(matches!(worker.join().unwrap(), Err(DiError::ScopeDeleted(_))));
    assert!(!container.store().contains(&request_scope_id("doomed")));
}
