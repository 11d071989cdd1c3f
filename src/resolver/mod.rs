//! The resolver contract.
//!
//! A `Resolver` is owned by a single `OrphanablePtr`. The owner asks for results
//! with `next()`, one at a time, and may hint that fresher data is wanted with
//! `request_reresolution()`. All of the resolver's own methods run on the combiner
//! it was created with; the owner never touches resolver state directly.

use std::error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

mod completion;
pub mod config;
pub mod dns;
pub mod fixed;
pub mod namespace;
mod orphanable;
pub mod registry;
mod resolution;
mod result;

pub use self::completion::{Completion, Next};
pub use self::orphanable::{DynResolver, Lifecycle, Locked, OrphanablePtr, ResolverRef, Watch,
                           WeakRef};
pub use self::registry::{ResolverArgs, ResolverFactory, ResolverRegistry};
pub use self::resolution::Resolution;
pub use self::result::{ResolutionResult, WeightedAddr};

pub type Result<T> = ::std::result::Result<T, Error>;

/// The ways a pending `next()` may fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The resolver was orphaned while the call was pending. No further calls should
    /// be made.
    Shutdown,

    /// Resolution has permanently failed. No further results will be produced.
    Unavailable(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Shutdown => f.write_str("resolver shutdown"),
            Error::Unavailable(ref why) => write!(f, "resolution unavailable: {}", why),
        }
    }
}

impl error::Error for Error {}

/// A name resolution strategy.
///
/// Methods are only ever invoked from work items on the resolver's combiner, so an
/// implementation may freely mutate itself. `Locked` provides the combiner
/// context, and a way to schedule more work on it (for instance when a timer fires
/// or a lookup finishes).
///
/// Push-based implementations deliver data whenever the naming service sends it.
/// Pull-based implementations must query the naming service themselves.
pub trait Resolver: Send + Sized + 'static {
    /// Registers `on_complete` to be signaled with the next result.
    ///
    /// The owner almost always has a call pending: when it is signaled it processes
    /// the result and immediately calls `next` again, which lets push-based
    /// resolvers hand over new data as soon as it arrives.
    ///
    /// `on_complete` is signaled with `Ok` when new data is available, or with
    /// `Err(Error::Unavailable)` if resolution is permanently broken. At most one call
    /// is pending at a time.
    fn next_locked(&mut self, cx: &Locked<'_, Self>, on_complete: Completion);

    /// Asks the resolver to obtain an updated result, if applicable.
    ///
    /// Pull-based implementations need not query immediately; they may wait out a
    /// minimum interval between queries. Push-based implementations may do nothing.
    ///
    /// In every case a pending `next_locked` must be signaled shortly after this
    /// call. An implementation that delays its query signals a copy of the
    /// last-known result right away and delivers the updated data later.
    fn request_reresolution_locked(&mut self, cx: &Locked<'_, Self>);

    /// Shuts down the resolver.
    ///
    /// A pending `next_locked` must be signaled with `Error::Shutdown`. No results
    /// may be delivered afterwards.
    fn shutdown_locked(&mut self, cx: &Locked<'_, Self>);
}

static TRACE_REFCOUNT: AtomicBool = AtomicBool::new(false);

/// Enables trace logging of every resolver reference taken or released.
pub fn set_trace_refcount(enabled: bool) {
    TRACE_REFCOUNT.store(enabled, Ordering::Relaxed);
}

pub fn trace_refcount() -> bool {
    TRACE_REFCOUNT.load(Ordering::Relaxed)
}
