use super::{Error, ResolutionResult, Result};
use futures::channel::oneshot;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Creates a completion and the future it signals.
///
/// `pending` is raised for as long as the completion is outstanding.
pub(super) fn pair(pending: Arc<AtomicBool>) -> (Completion, Next) {
    let (tx, rx) = oneshot::channel();
    let completion = Completion {
        tx: Some(tx),
        pending,
    };
    (completion, Next(rx))
}

/// Signals the outcome of a single `next()` call.
///
/// A completion is consumed when signaled, so it can't be signaled twice. One that is
/// dropped without being signaled reports `Error::Shutdown`, so the caller is never
/// left waiting forever.
pub struct Completion {
    tx: Option<oneshot::Sender<Result<ResolutionResult>>>,
    pending: Arc<AtomicBool>,
}

impl Completion {
    /// Creates a completion that isn't associated with any resolver.
    pub fn detached() -> (Completion, Next) {
        pair(Arc::new(AtomicBool::new(true)))
    }

    pub fn complete(mut self, result: Result<ResolutionResult>) {
        self.signal(result);
    }

    pub fn succeed(self, result: ResolutionResult) {
        self.complete(Ok(result));
    }

    pub fn fail(self, error: Error) {
        self.complete(Err(error));
    }

    /// Indicates whether the owner has stopped waiting on this completion.
    pub fn is_canceled(&self) -> bool {
        self.tx.as_ref().map(|tx| tx.is_canceled()).unwrap_or(true)
    }

    fn signal(&mut self, result: Result<ResolutionResult>) {
        if let Some(tx) = self.tx.take() {
            // Lower the flag first so the owner may call next() as soon as it wakes.
            self.pending.store(false, Ordering::Release);
            if tx.send(result).is_err() {
                debug!("next result dropped by owner");
            }
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!("completion dropped without being signaled");
            self.signal(Err(Error::Shutdown));
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Completion")
            .field("signaled", &self.tx.is_none())
            .finish()
    }
}

/// The eventual result of a `next()` call.
#[must_use = "futures do nothing unless polled"]
#[derive(Debug)]
pub struct Next(oneshot::Receiver<Result<ResolutionResult>>);

impl Future for Next {
    type Output = Result<ResolutionResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.0).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(Error::Shutdown)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn complete_delivers_value_and_lowers_pending() {
        let pending = Arc::new(AtomicBool::new(true));
        let (completion, next) = pair(pending.clone());
        let result = ResolutionResult::new(vec![]);
        completion.succeed(result.clone());
        assert!(!pending.load(Ordering::Acquire));
        assert_eq!(next.now_or_never(), Some(Ok(result)));
    }

    #[test]
    fn dropped_completion_reports_shutdown() {
        let pending = Arc::new(AtomicBool::new(true));
        let (completion, next) = pair(pending.clone());
        drop(completion);
        assert!(!pending.load(Ordering::Acquire));
        assert_eq!(next.now_or_never(), Some(Err(Error::Shutdown)));
    }

    #[test]
    fn unsignaled_completion_is_pending() {
        let (completion, mut next) = Completion::detached();
        assert!((&mut next).now_or_never().is_none());
        completion.fail(Error::Unavailable("gone".into()));
        assert_eq!(next.now_or_never(),
                   Some(Err(Error::Unavailable("gone".into()))));
    }

    #[test]
    fn canceled_once_next_is_dropped() {
        let (completion, next) = Completion::detached();
        assert!(!completion.is_canceled());
        drop(next);
        assert!(completion.is_canceled());
        completion.succeed(ResolutionResult::default());
    }
}
