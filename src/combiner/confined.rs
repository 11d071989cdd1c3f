use super::Combiner;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, TryLockError};

/// Proof that the current code is running as a work item on a particular combiner.
///
/// Only `Execute` creates these, and only for the duration of a work item. It cannot
/// be sent to another thread.
pub struct Exclusive {
    combiner: usize,
    _not_send: PhantomData<*const ()>,
}

impl Exclusive {
    pub(super) fn enter(combiner: usize) -> Exclusive {
        Exclusive {
            combiner,
            _not_send: PhantomData,
        }
    }

    pub fn combiner_id(&self) -> usize {
        self.combiner
    }
}

impl fmt::Debug for Exclusive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Exclusive")
            .field("combiner", &self.combiner)
            .finish()
    }
}

/// State that may only be accessed from work items on one combiner.
///
/// The combiner already serializes access, so the inner lock is never contended.
/// Finding it held means the state was reached reentrantly, which panics.
pub struct Confined<T> {
    combiner: usize,
    state: Mutex<T>,
}

impl<T> Confined<T> {
    pub fn new(combiner: &Combiner, state: T) -> Confined<T> {
        Confined {
            combiner: combiner.id(),
            state: Mutex::new(state),
        }
    }

    /// Borrows the state for the duration of the current work item.
    pub fn lock<'a>(&'a self, exclusive: &'a Exclusive) -> MutexGuard<'a, T> {
        assert_eq!(self.combiner,
                   exclusive.combiner,
                   "confined state accessed from combiner {} but belongs to combiner {}",
                   exclusive.combiner,
                   self.combiner);
        match self.state.try_lock() {
            Ok(state) => state,
            // A panicking work item doesn't invalidate the state for later items.
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => {
                panic!("confined state borrowed reentrantly on combiner {}",
                       self.combiner)
            }
        }
    }

    pub fn into_inner(self) -> T {
        match self.state.into_inner() {
            Ok(state) => state,
            Err(p) => p.into_inner(),
        }
    }
}

impl<T> fmt::Debug for Confined<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Confined")
            .field("combiner", &self.combiner)
            .finish()
    }
}
