use super::{DynResolver, Next, OrphanablePtr, ResolutionResult, Resolver, Result};
use futures::Stream;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stream of name resolutions.
///
/// Keeps a `next()` pending on the resolver at all times: as soon as one result is
/// received the next request is issued, so push-based resolvers can deliver updates
/// as they arrive. The stream ends after yielding an error. Dropping the stream
/// orphans the resolver.
pub struct Resolution {
    resolver: Option<Box<dyn DynResolver>>,
    pending: Option<Next>,
}

impl Resolution {
    pub fn new(resolver: Box<dyn DynResolver>) -> Resolution {
        Resolution {
            resolver: Some(resolver),
            pending: None,
        }
    }

    /// Asks the resolver for fresher data.
    ///
    /// The next item is produced shortly afterwards, possibly a copy of the
    /// previous one.
    pub fn request_reresolution(&mut self) {
        if let Some(ref mut resolver) = self.resolver {
            if self.pending.is_none() {
                self.pending = Some(resolver.next());
            }
            resolver.request_reresolution();
        }
    }

    /// Indicates whether the resolver is still owned by this stream.
    pub fn is_active(&self) -> bool {
        self.resolver.is_some()
    }

    fn orphan(&mut self) {
        if let Some(resolver) = self.resolver.take() {
            resolver.orphan();
        }
    }
}

impl<R: Resolver> From<OrphanablePtr<R>> for Resolution {
    fn from(resolver: OrphanablePtr<R>) -> Resolution {
        Resolution::new(Box::new(resolver))
    }
}

impl Stream for Resolution {
    type Item = Result<ResolutionResult>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let mut next = match this.pending.take() {
            Some(next) => next,
            None => {
                match this.resolver {
                    None => return Poll::Ready(None),
                    Some(ref mut resolver) => resolver.next(),
                }
            }
        };

        match Pin::new(&mut next).poll(cx) {
            Poll::Pending => {
                this.pending = Some(next);
                Poll::Pending
            }
            Poll::Ready(Ok(result)) => {
                trace!("resolved {} addresses", result.addrs.len());
                if let Some(ref mut resolver) = this.resolver {
                    this.pending = Some(resolver.next());
                }
                Poll::Ready(Some(Ok(result)))
            }
            Poll::Ready(Err(e)) => {
                debug!("resolution ended: {}", e);
                this.orphan();
                Poll::Ready(Some(Err(e)))
            }
        }
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("active", &self.resolver.is_some())
            .field("pending", &self.pending.is_some())
            .finish()
    }
}
