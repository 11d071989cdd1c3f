//! An in-process naming service that pushes updates to its resolvers.
//!
//! Names are bound to a set of addresses, rebound as they change, or marked `neg`
//! when they cannot be resolved. Every resolver watching a name receives each change
//! without asking for it.

use super::{Completion, Error, Locked, ResolutionResult, Resolver, Result};
use crate::Path;
use futures::channel::mpsc;
use futures::StreamExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime;
use tokio::task::JoinHandle;

/// The state of a name in a `Namespace`.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    Bound(ResolutionResult),
    /// The name is known not to resolve.
    Neg,
}

/// A shared table of name bindings.
#[derive(Clone, Default)]
pub struct Namespace(Arc<Mutex<Names>>);

#[derive(Default)]
struct Names {
    bindings: HashMap<Path, Binding>,
    watchers: HashMap<Path, Vec<mpsc::UnboundedSender<Binding>>>,
}

impl Namespace {
    pub fn new() -> Namespace {
        Namespace::default()
    }

    /// Binds `name`, notifying its watchers.
    pub fn bind(&self, name: &Path, result: ResolutionResult) {
        self.update(name, Binding::Bound(result));
    }

    /// Marks `name` as unresolvable, notifying its watchers.
    pub fn neg(&self, name: &Path) {
        self.update(name, Binding::Neg);
    }

    pub fn get(&self, name: &Path) -> Option<Binding> {
        self.names().bindings.get(name).cloned()
    }

    /// Streams every binding of `name`, starting with the current one, if any.
    pub fn watch(&self, name: &Path) -> mpsc::UnboundedReceiver<Binding> {
        let (tx, rx) = mpsc::unbounded();
        let mut names = self.names();
        if let Some(binding) = names.bindings.get(name) {
            // The receiver is held right here.
            let _ = tx.unbounded_send(binding.clone());
        }
        let watchers = names.watchers.entry(name.clone()).or_insert_with(Vec::new);
        watchers.retain(|w| !w.is_closed());
        watchers.push(tx);
        rx
    }

    /// The number of watchers registered for `name`, including any that have
    /// gone away since it was last updated or watched.
    pub fn watchers(&self, name: &Path) -> usize {
        self.names().watchers.get(name).map_or(0, Vec::len)
    }

    fn update(&self, name: &Path, binding: Binding) {
        let mut names = self.names();
        debug!("{} updated: {:?}", name, binding);
        let unwatched = match names.watchers.get_mut(name) {
            Some(watchers) => {
                watchers.retain(|w| w.unbounded_send(binding.clone()).is_ok());
                watchers.is_empty()
            }
            None => false,
        };
        if unwatched {
            names.watchers.remove(name);
        }
        names.bindings.insert(name.clone(), binding);
    }

    fn names(&self) -> MutexGuard<Names> {
        match self.0.lock() {
            Ok(names) => names,
            Err(p) => p.into_inner(),
        }
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = self.names();
        f.debug_struct("Namespace")
            .field("bindings", &names.bindings.len())
            .finish()
    }
}

/// Watches a single name in a `Namespace`.
pub struct NamespaceResolver {
    name: Path,
    namespace: Namespace,
    runtime: runtime::Handle,
    subscription: Option<JoinHandle<()>>,
    next: Option<Completion>,
    last: Option<Result<ResolutionResult>>,
    /// Set when `last` has not yet been handed to the owner.
    fresh: bool,
    shutdown: bool,
}

impl NamespaceResolver {
    pub fn new(name: Path, namespace: Namespace, runtime: runtime::Handle) -> NamespaceResolver {
        NamespaceResolver {
            name,
            namespace,
            runtime,
            subscription: None,
            next: None,
            last: None,
            fresh: false,
            shutdown: false,
        }
    }

    fn subscribe(&mut self, cx: &Locked<'_, Self>) {
        debug!("watching {}", self.name);
        let mut updates = self.namespace.watch(&self.name);
        let resolver = cx.weak();
        let subscription = self.runtime.spawn(async move {
            while let Some(binding) = updates.next().await {
                let scheduled = match resolver.upgrade() {
                    Some(resolver) => resolver.schedule(move |ns, _| ns.on_update(binding)),
                    None => return,
                };
                if scheduled.is_err() {
                    return;
                }
            }
        });
        self.subscription = Some(subscription);
    }

    fn on_update(&mut self, binding: Binding) {
        if self.shutdown {
            return;
        }
        if let Some(Err(_)) = self.last {
            // Resolution already failed for good.
            return;
        }
        self.last = Some(match binding {
                             Binding::Bound(result) => Ok(result),
                             Binding::Neg => {
                                 Err(Error::Unavailable(format!("{} is not bound", self.name)))
                             }
                         });
        self.fresh = true;
        self.maybe_finish();
    }

    fn maybe_finish(&mut self) {
        if !self.fresh {
            return;
        }
        if let Some(ref last) = self.last {
            if let Some(c) = self.next.take() {
                self.fresh = false;
                c.complete(last.clone());
            }
        }
    }
}

impl Resolver for NamespaceResolver {
    fn next_locked(&mut self, cx: &Locked<'_, Self>, on_complete: Completion) {
        debug_assert!(self.next.is_none());
        if self.shutdown {
            on_complete.fail(Error::Shutdown);
            return;
        }
        self.next = Some(on_complete);
        if self.subscription.is_none() {
            self.subscribe(cx);
        }
        self.maybe_finish();
    }

    fn request_reresolution_locked(&mut self, _: &Locked<'_, Self>) {
        // Updates arrive unsolicited; hand over another copy of what we have.
        if self.last.is_some() {
            self.fresh = true;
            self.maybe_finish();
        }
    }

    fn shutdown_locked(&mut self, _: &Locked<'_, Self>) {
        debug!("no longer watching {}", self.name);
        self.shutdown = true;
        if let Some(subscription) = self.subscription.take() {
            subscription.abort();
        }
        if let Some(c) = self.next.take() {
            c.fail(Error::Shutdown);
        }
    }
}

impl Drop for NamespaceResolver {
    fn drop(&mut self) {
        // Shutdown doesn't run if the combiner stopped first.
        if let Some(subscription) = self.subscription.take() {
            subscription.abort();
        }
    }
}
