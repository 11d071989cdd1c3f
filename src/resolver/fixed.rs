//! Resolves a target to a fixed list of addresses.
//!
//! Behaves like a push-based resolver whose naming service never changes: the
//! configured result is delivered once, and again only when re-resolution is
//! requested.

use super::{Completion, Error, Locked, ResolutionResult, Resolver, Result};

pub struct Fixed {
    result: Result<ResolutionResult>,
    next: Option<Completion>,
    /// Set once the current result has been delivered.
    published: bool,
    shutdown: bool,
}

impl Fixed {
    pub fn new(result: ResolutionResult) -> Fixed {
        let result = if result.is_empty() {
            Err(Error::Unavailable("no addresses".into()))
        } else {
            Ok(result)
        };
        Fixed {
            result,
            next: None,
            published: false,
            shutdown: false,
        }
    }

    fn maybe_finish(&mut self) {
        if self.published {
            return;
        }
        if let Some(c) = self.next.take() {
            self.published = true;
            c.complete(self.result.clone());
        }
    }
}

impl Resolver for Fixed {
    fn next_locked(&mut self, _: &Locked<'_, Self>, on_complete: Completion) {
        debug_assert!(self.next.is_none());
        if self.shutdown {
            on_complete.fail(Error::Shutdown);
            return;
        }
        self.next = Some(on_complete);
        self.maybe_finish();
    }

    fn request_reresolution_locked(&mut self, _: &Locked<'_, Self>) {
        trace!("re-resolving fixed addresses");
        self.published = false;
        self.maybe_finish();
    }

    fn shutdown_locked(&mut self, _: &Locked<'_, Self>) {
        self.shutdown = true;
        if let Some(c) = self.next.take() {
            c.fail(Error::Shutdown);
        }
    }
}
