use super::completion::{self, Next};
use super::{trace_refcount, Resolver};
use crate::combiner::{Closed, Combiner, Confined, Exclusive};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

/// The lifecycle of a resolver.
///
/// `Active` until orphaned; `ShuttingDown` while shutdown is scheduled or running
/// and other references remain; `Destroyed` once the last reference is released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    ShuttingDown,
    Destroyed,
}

const ACTIVE: u8 = 0;
const SHUTTING_DOWN: u8 = 1;

struct Inner<R> {
    combiner: Combiner,
    resolver: Confined<R>,
    lifecycle: Arc<AtomicU8>,
    /// Raised while a `next()` completion is outstanding.
    next_pending: Arc<AtomicBool>,
}

impl<R> Drop for Inner<R> {
    fn drop(&mut self) {
        debug!("resolver {:p} destroyed", self);
    }
}

/// The owning handle to a resolver.
///
/// There is exactly one owner. Releasing it, by `orphan()` or by dropping it,
/// schedules the resolver's shutdown onto its combiner; the resolver is reclaimed
/// once shutdown has run and every internal reference is gone.
pub struct OrphanablePtr<R: Resolver> {
    inner: Option<ResolverRef<R>>,
}

impl<R: Resolver> OrphanablePtr<R> {
    /// Binds `resolver` to `combiner`.
    ///
    /// The combiner is not driven or stopped by the resolver; it must be executing
    /// for any of the resolver's work to happen.
    pub fn new(combiner: &Combiner, resolver: R) -> OrphanablePtr<R> {
        let inner = Inner {
            combiner: combiner.clone(),
            resolver: Confined::new(combiner, resolver),
            lifecycle: Arc::new(AtomicU8::new(ACTIVE)),
            next_pending: Arc::new(AtomicBool::new(false)),
        };
        let this = ResolverRef(Arc::new(inner));
        debug!("resolver {:p} created on combiner {}",
               &*this.0,
               combiner.id());
        OrphanablePtr { inner: Some(this) }
    }

    /// Requests the next result.
    ///
    /// Only one call may be outstanding at a time: the returned `Next` must
    /// complete before `next` is called again.
    pub fn next(&mut self) -> Next {
        let this = self.this();
        let was_pending = this.0.next_pending.swap(true, Ordering::AcqRel);
        debug_assert!(!was_pending,
                      "next() called while a previous next() is pending");
        if was_pending {
            error!("resolver {:p}: next() called while a previous next() is pending",
                   &*this.0);
        }

        let (on_complete, next) = completion::pair(this.0.next_pending.clone());
        // If the combiner is closed the completion is dropped, which signals shutdown.
        let _ = this.schedule(move |resolver, cx| resolver.next_locked(cx, on_complete));
        next
    }

    /// Hints that the owner wants fresher data.
    pub fn request_reresolution(&self) {
        let _ = self.this()
            .schedule(|resolver, cx| resolver.request_reresolution_locked(cx));
    }

    /// Releases ownership.
    ///
    /// May be called from any thread. Shutdown runs later on the resolver's combiner,
    /// after any work already scheduled there.
    pub fn orphan(mut self) {
        self.release();
    }

    /// Observes the resolver's lifecycle without keeping it alive.
    pub fn watch(&self) -> Watch {
        self.this().watch()
    }

    pub fn combiner(&self) -> &Combiner {
        &self.this().0.combiner
    }

    fn this(&self) -> &ResolverRef<R> {
        match self.inner {
            Some(ref this) => this,
            None => panic!("resolver used after orphan"),
        }
    }

    fn release(&mut self) {
        let this = match self.inner.take() {
            Some(this) => this,
            None => return,
        };

        this.0.lifecycle.store(SHUTTING_DOWN, Ordering::Release);
        debug!("resolver {:p} orphaned", &*this.0);

        let combiner = this.0.combiner.clone();
        // The owner's reference moves into the work item and is released only after
        // shutdown has run.
        let scheduled = combiner.run(move |exclusive| {
                                         this.run_locked(exclusive,
                                                         |resolver, cx| {
                                                             resolver.shutdown_locked(cx)
                                                         });
                                         drop(this);
                                     });
        if let Err(e) = scheduled {
            warn!("resolver could not be shut down: {}", e);
        }
    }
}

impl<R: Resolver> Drop for OrphanablePtr<R> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<R: Resolver> fmt::Debug for OrphanablePtr<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.inner {
            Some(ref this) => fmt::Debug::fmt(this, f),
            None => f.write_str("OrphanablePtr(orphaned)"),
        }
    }
}

/// An internal, reference-counted handle to a resolver.
///
/// Resolver implementations take these (through `Locked::this`) so that work they
/// schedule for later can find its way back to the resolver. Holding one keeps the
/// resolver from being reclaimed, though not from being shut down.
pub struct ResolverRef<R: Resolver>(Arc<Inner<R>>);

impl<R: Resolver> ResolverRef<R> {
    /// Schedules `f` to run on the resolver's combiner with exclusive access to the
    /// resolver.
    pub fn schedule<F>(&self, f: F) -> Result<(), Closed>
        where F: FnOnce(&mut R, &Locked<'_, R>) + Send + 'static
    {
        let this = self.clone();
        self.0
            .combiner
            .run(move |exclusive| this.run_locked(exclusive, f))
    }

    pub fn lifecycle(&self) -> Lifecycle {
        lifecycle_of(&self.0.lifecycle)
    }

    pub fn downgrade(&self) -> WeakRef<R> {
        WeakRef(Arc::downgrade(&self.0))
    }

    pub fn watch(&self) -> Watch {
        Watch(Arc::downgrade(&self.0.lifecycle))
    }

    fn run_locked<F, T>(&self, exclusive: &Exclusive, f: F) -> T
        where F: FnOnce(&mut R, &Locked<'_, R>) -> T
    {
        let mut resolver = self.0.resolver.lock(exclusive);
        let cx = Locked {
            exclusive,
            this: self,
        };
        f(&mut *resolver, &cx)
    }
}

impl<R: Resolver> Clone for ResolverRef<R> {
    fn clone(&self) -> Self {
        let this = ResolverRef(self.0.clone());
        if trace_refcount() {
            let refs = Arc::strong_count(&self.0);
            trace!("resolver {:p} ref {} -> {}", &*self.0, refs - 1, refs);
        }
        this
    }
}

impl<R: Resolver> Drop for ResolverRef<R> {
    fn drop(&mut self) {
        if trace_refcount() {
            let refs = Arc::strong_count(&self.0);
            trace!("resolver {:p} unref {} -> {}", &*self.0, refs, refs - 1);
        }
    }
}

impl<R: Resolver> fmt::Debug for ResolverRef<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResolverRef")
            .field("combiner", &self.0.combiner.id())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

/// A reference that doesn't keep the resolver alive.
///
/// Long-lived background tasks (subscriptions, timers) hold these so that a resolver
/// is reclaimed as soon as its shutdown has run.
pub struct WeakRef<R: Resolver>(Weak<Inner<R>>);

impl<R: Resolver> WeakRef<R> {
    pub fn upgrade(&self) -> Option<ResolverRef<R>> {
        self.0.upgrade().map(ResolverRef)
    }

    /// Schedules `f` if the resolver still exists.
    pub fn schedule<F>(&self, f: F) -> Result<(), Closed>
        where F: FnOnce(&mut R, &Locked<'_, R>) + Send + 'static
    {
        match self.upgrade() {
            Some(this) => this.schedule(f),
            None => Ok(()),
        }
    }
}

impl<R: Resolver> Clone for WeakRef<R> {
    fn clone(&self) -> Self {
        WeakRef(self.0.clone())
    }
}

/// Proof of running on a resolver's combiner, handed to each `Resolver` method.
pub struct Locked<'a, R: Resolver> {
    exclusive: &'a Exclusive,
    this: &'a ResolverRef<R>,
}

impl<'a, R: Resolver> Locked<'a, R> {
    pub fn exclusive(&self) -> &Exclusive {
        self.exclusive
    }

    pub fn combiner(&self) -> &Combiner {
        &self.this.0.combiner
    }

    /// Takes a new internal reference to the resolver.
    pub fn this(&self) -> ResolverRef<R> {
        self.this.clone()
    }

    pub fn weak(&self) -> WeakRef<R> {
        self.this.downgrade()
    }

    /// Schedules `f` to run on the combiner after the current work item.
    pub fn schedule<F>(&self, f: F) -> Result<(), Closed>
        where F: FnOnce(&mut R, &Locked<'_, R>) + Send + 'static
    {
        self.this.schedule(f)
    }
}

/// Observes a resolver's lifecycle without keeping it alive.
#[derive(Clone, Debug)]
pub struct Watch(Weak<AtomicU8>);

impl Watch {
    pub fn lifecycle(&self) -> Lifecycle {
        match self.0.upgrade() {
            None => Lifecycle::Destroyed,
            Some(state) => lifecycle_of(&state),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle() == Lifecycle::Destroyed
    }
}

fn lifecycle_of(state: &AtomicU8) -> Lifecycle {
    match state.load(Ordering::Acquire) {
        ACTIVE => Lifecycle::Active,
        _ => Lifecycle::ShuttingDown,
    }
}

/// An owned resolver of any type.
///
/// Lets differently-typed resolvers be created by one registry and driven by one
/// consumer.
pub trait DynResolver: Send {
    fn next(&mut self) -> Next;

    fn request_reresolution(&self);

    fn watch(&self) -> Watch;

    fn orphan(self: Box<Self>);
}

impl<R: Resolver> DynResolver for OrphanablePtr<R> {
    fn next(&mut self) -> Next {
        OrphanablePtr::next(self)
    }

    fn request_reresolution(&self) {
        OrphanablePtr::request_reresolution(self)
    }

    fn watch(&self) -> Watch {
        OrphanablePtr::watch(self)
    }

    fn orphan(self: Box<Self>) {
        OrphanablePtr::orphan(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Completion, Error, ResolutionResult};
    use super::*;
    use crate::combiner;

    /// Holds the pending completion until told to deliver.
    #[derive(Default)]
    struct Holding {
        next: Option<Completion>,
        shutdown: bool,
    }

    impl Resolver for Holding {
        fn next_locked(&mut self, _: &Locked<'_, Self>, on_complete: Completion) {
            assert!(!self.shutdown);
            self.next = Some(on_complete);
        }

        fn request_reresolution_locked(&mut self, _: &Locked<'_, Self>) {
            if let Some(c) = self.next.take() {
                c.succeed(ResolutionResult::default());
            }
        }

        fn shutdown_locked(&mut self, _: &Locked<'_, Self>) {
            self.shutdown = true;
            if let Some(c) = self.next.take() {
                c.fail(Error::Shutdown);
            }
        }
    }

    #[tokio::test]
    async fn orphan_signals_pending_next_with_shutdown() {
        let (combiner, exec) = combiner::new();
        let exec = tokio::spawn(exec);

        let mut resolver = OrphanablePtr::new(&combiner, Holding::default());
        let watch = resolver.watch();
        let next = resolver.next();
        assert_eq!(watch.lifecycle(), Lifecycle::Active);

        resolver.orphan();
        assert_eq!(next.await, Err(Error::Shutdown));

        drop(combiner);
        exec.await.unwrap();
        assert!(watch.is_destroyed());
    }

    #[tokio::test]
    async fn reresolution_completes_pending_next() {
        let (combiner, exec) = combiner::new();
        tokio::spawn(exec);

        let mut resolver = OrphanablePtr::new(&combiner, Holding::default());
        let next = resolver.next();
        resolver.request_reresolution();
        assert_eq!(next.await, Ok(ResolutionResult::default()));

        // The first call has completed, so another may be issued.
        let next = resolver.next();
        drop(resolver);
        assert_eq!(next.await, Err(Error::Shutdown));
    }

    #[tokio::test]
    async fn internal_refs_delay_reclamation() {
        let (combiner, exec) = combiner::new();
        tokio::spawn(exec);

        let resolver = OrphanablePtr::new(&combiner, Holding::default());
        let held = resolver.this().clone();
        let watch = resolver.watch();
        resolver.orphan();

        // Work runs in scheduling order, so shutdown has run once this fires.
        let (tx, rx) = futures::channel::oneshot::channel();
        combiner.run(move |_| { let _ = tx.send(()); }).unwrap();
        rx.await.unwrap();
        assert_eq!(watch.lifecycle(), Lifecycle::ShuttingDown);
        assert_eq!(held.lifecycle(), Lifecycle::ShuttingDown);

        drop(held);
        assert!(watch.is_destroyed());
    }

    #[tokio::test]
    #[should_panic(expected = "previous next() is pending")]
    async fn second_pending_next_is_detected() {
        let (combiner, exec) = combiner::new();
        tokio::spawn(exec);

        let mut resolver = OrphanablePtr::new(&combiner, Holding::default());
        let _first = resolver.next();
        let _second = resolver.next();
    }

    #[test]
    fn orphan_without_executor_still_signals() {
        let (combiner, exec) = combiner::new();
        let mut resolver = OrphanablePtr::new(&combiner, Holding::default());
        let watch = resolver.watch();
        let next = resolver.next();

        // Nothing ever runs: dropping the executor drops the queued work.
        drop(exec);
        resolver.orphan();
        assert!(watch.is_destroyed());
        assert_eq!(futures::executor::block_on(next), Err(Error::Shutdown));
    }

    /// Records which combiner each of its methods ran on.
    #[derive(Default)]
    struct Recording {
        seen: Arc<std::sync::Mutex<Vec<usize>>>,
    }

    impl Resolver for Recording {
        fn next_locked(&mut self, cx: &Locked<'_, Self>, on_complete: Completion) {
            self.seen.lock().unwrap().push(cx.exclusive().combiner_id());
            // Deliver from a follow-up work item.
            cx.schedule(move |_, _| on_complete.succeed(ResolutionResult::default()))
                .unwrap();
        }

        fn request_reresolution_locked(&mut self, _: &Locked<'_, Self>) {}

        fn shutdown_locked(&mut self, cx: &Locked<'_, Self>) {
            self.seen.lock().unwrap().push(cx.exclusive().combiner_id());
        }
    }

    #[tokio::test]
    async fn methods_run_on_the_resolvers_combiner() {
        let (combiner, exec) = combiner::new();
        tokio::spawn(exec);
        let (other, other_exec) = combiner::new();
        tokio::spawn(other_exec);

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut resolver = OrphanablePtr::new(&combiner, Recording { seen: seen.clone() });
        assert_eq!(resolver.next().await, Ok(ResolutionResult::default()));
        resolver.orphan();

        let (tx, rx) = futures::channel::oneshot::channel();
        combiner.run(move |_| { let _ = tx.send(()); }).unwrap();
        rx.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![combiner.id(), combiner.id()]);
        assert_ne!(combiner.id(), other.id());
    }

    #[test]
    fn trace_refcount_flag() {
        super::super::set_trace_refcount(true);
        assert!(trace_refcount());
        super::super::set_trace_refcount(false);
        assert!(!trace_refcount());
    }
}
