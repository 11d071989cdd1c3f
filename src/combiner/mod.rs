use futures::channel::mpsc;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

mod confined;
mod execute;

pub use self::confined::{Confined, Exclusive};
pub use self::execute::Execute;

type Work = Box<dyn FnOnce(&Exclusive) + Send>;

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Creates a serialized execution context.
///
/// Work items scheduled through the returned `Combiner` (or any of its clones) run
/// one at a time, in scheduling order, when the `Execute` future is driven. Work
/// items never run concurrently with one another, so state that is only touched
/// from work items needs no further synchronization.
///
/// `Execute` completes once every `Combiner` handle has been dropped and all
/// scheduled work has run.
pub fn new() -> (Combiner, Execute) {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::unbounded();
    let combiner = Combiner { id, work: tx };
    let exec = execute::new(id, rx);
    (combiner, exec)
}

/// Schedules work onto a serialized execution context.
///
/// Handles may be cloned and shared across threads.
#[derive(Clone)]
pub struct Combiner {
    id: usize,
    work: mpsc::UnboundedSender<Work>,
}

impl Combiner {
    /// Schedules `f` to run on this combiner.
    ///
    /// If the combiner's `Execute` has been dropped, `f` is dropped without being run.
    pub fn run<F>(&self, f: F) -> Result<(), Closed>
        where F: FnOnce(&Exclusive) + Send + 'static
    {
        self.work
            .unbounded_send(Box::new(f))
            .map_err(|_| {
                debug!("combiner {} closed; dropping work", self.id);
                Closed(self.id)
            })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Indicates whether the combiner's `Execute` is gone.
    pub fn is_closed(&self) -> bool {
        self.work.is_closed()
    }
}

impl fmt::Debug for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Combiner").field("id", &self.id).finish()
    }
}

/// Work could not be scheduled because the combiner is no longer executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed(usize);

impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "combiner {} is closed", self.0)
    }
}

impl Error for Closed {}
