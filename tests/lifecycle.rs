extern crate env_logger;
extern crate futures;
extern crate linkerd_namer;
extern crate tokio;

mod mocks;

use futures::FutureExt;
use linkerd_namer::resolver::Error;
use linkerd_namer::{combiner, Lifecycle, ResolutionResult, WeightedAddr};
use std::thread;

fn result(addr: &str) -> ResolutionResult {
    ResolutionResult::new(WeightedAddr::uniform(vec![addr.parse().unwrap()]))
}

#[tokio::test]
async fn orphan_signals_pending_next() {
    mocks::init_logging();
    let (combiner, exec) = combiner::new();
    tokio::spawn(exec);
    let (mut resolver, handle) = mocks::mock_push(&combiner);

    let next = resolver.next();
    mocks::settle(&combiner).await;
    assert!(handle.has_pending());

    resolver.orphan();
    assert_eq!(next.await, Err(Error::Shutdown));
    assert_eq!(handle.shutdown_calls(), 1);
}

#[tokio::test]
async fn orphan_from_another_thread() {
    mocks::init_logging();
    let (combiner, exec) = combiner::new();
    tokio::spawn(exec);
    let (mut resolver, handle) = mocks::mock_push(&combiner);
    let watch = resolver.watch();

    let next = resolver.next();
    thread::spawn(move || resolver.orphan()).join().unwrap();
    assert_ne!(watch.lifecycle(), Lifecycle::Active);

    assert_eq!(next.await, Err(Error::Shutdown));
    mocks::settle(&combiner).await;
    assert_eq!(handle.shutdown_calls(), 1);
    assert!(watch.is_destroyed());
}

#[tokio::test]
async fn dropping_the_owner_orphans() {
    mocks::init_logging();
    let (combiner, exec) = combiner::new();
    tokio::spawn(exec);
    let (mut resolver, handle) = mocks::mock_push(&combiner);
    let watch = resolver.watch();

    let next = resolver.next();
    drop(resolver);
    assert_eq!(next.await, Err(Error::Shutdown));
    mocks::settle(&combiner).await;
    assert_eq!(handle.shutdown_calls(), 1);
    assert!(watch.is_destroyed());
}

#[tokio::test]
async fn no_results_after_shutdown() {
    mocks::init_logging();
    let (combiner, exec) = combiner::new();
    tokio::spawn(exec);
    let (mut resolver, handle) = mocks::mock_push(&combiner);

    handle.push(Ok(result("10.0.0.1:80")));
    assert_eq!(resolver.next().await, Ok(result("10.0.0.1:80")));

    resolver.orphan();
    handle.push(Ok(result("10.0.0.2:80")));
    mocks::settle(&combiner).await;

    assert_eq!(handle.shutdown_calls(), 1);
    assert_eq!(handle.next_calls(), 1);
    assert!(!handle.has_pending());
}

#[tokio::test]
async fn destroyed_once_shutdown_has_run() {
    mocks::init_logging();
    let (combiner, exec) = combiner::new();
    let (resolver, handle) = mocks::mock_push(&combiner);
    let watch = resolver.watch();
    assert_eq!(watch.lifecycle(), Lifecycle::Active);

    // Shutdown is only scheduled until the combiner executes.
    resolver.orphan();
    assert_eq!(watch.lifecycle(), Lifecycle::ShuttingDown);
    assert_eq!(handle.shutdown_calls(), 0);

    tokio::spawn(exec);
    mocks::settle(&combiner).await;
    assert_eq!(handle.shutdown_calls(), 1);
    assert!(watch.is_destroyed());
}

#[tokio::test]
async fn next_fails_when_the_combiner_is_gone() {
    mocks::init_logging();
    let (combiner, exec) = combiner::new();
    let (mut resolver, _handle) = mocks::mock_push(&combiner);
    drop(exec);

    let next = resolver.next();
    assert_eq!(next.now_or_never(), Some(Err(Error::Shutdown)));
}
