use super::{Exclusive, Work};
use futures::channel::mpsc;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Limits how many work items run in a single poll so that a busy combiner doesn't
/// starve other tasks on the same executor.
const MAX_WORK_PER_POLL: usize = 128;

pub fn new(id: usize, work: mpsc::UnboundedReceiver<Work>) -> Execute {
    Execute { id, work }
}

/// Drives a combiner's work queue.
///
/// Typically spawned onto a runtime, e.g. `tokio::spawn(execute)`.
#[must_use = "combiner work only runs while Execute is polled"]
pub struct Execute {
    id: usize,
    work: mpsc::UnboundedReceiver<Work>,
}

impl Future for Execute {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        for _ in 0..MAX_WORK_PER_POLL {
            match Pin::new(&mut self.work).poll_next(cx) {
                Poll::Ready(Some(work)) => {
                    let exclusive = Exclusive::enter(self.id);
                    work(&exclusive);
                }
                Poll::Ready(None) => {
                    debug!("combiner {} finished", self.id);
                    return Poll::Ready(());
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        trace!("combiner {} yielding", self.id);
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
