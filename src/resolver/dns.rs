//! A pull-based resolver that looks up host names.
//!
//! Each lookup is a query against the system's host resolution. Queries are spaced at
//! least `min_resolution_interval` apart; re-resolution requested sooner than that is
//! answered right away with the last-known addresses while the real query waits for
//! the interval to pass.

use super::{Completion, Error, Locked, ResolutionResult, Resolver, WeightedAddr};
use crate::ConfigError;
use futures::future::BoxFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt, io};
use tokio::runtime;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

pub const DEFAULT_MIN_RESOLUTION_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PORT: u16 = 443;

/// Looks up the addresses of a host.
pub trait Lookup: Send + Sync + 'static {
    fn lookup(&self, host: &str, port: u16) -> BoxFuture<'static, io::Result<Vec<SocketAddr>>>;
}

/// Looks up hosts through the runtime's resolver (`getaddrinfo`).
#[derive(Clone, Copy, Debug, Default)]
pub struct HostLookup;

impl Lookup for HostLookup {
    fn lookup(&self, host: &str, port: u16) -> BoxFuture<'static, io::Result<Vec<SocketAddr>>> {
        let host = host.to_owned();
        Box::pin(async move {
                     let addrs = tokio::net::lookup_host((host.as_str(), port)).await?;
                     Ok(addrs.collect())
                 })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub min_resolution_interval: Duration,
    pub retry_interval: Duration,
    /// A lookup that takes longer than this fails and is retried.
    pub lookup_timeout: Duration,
    pub default_port: u16,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            min_resolution_interval: DEFAULT_MIN_RESOLUTION_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            default_port: DEFAULT_PORT,
        }
    }
}

pub struct Dns {
    host: String,
    port: u16,
    settings: Settings,
    lookup: Arc<dyn Lookup>,
    runtime: runtime::Handle,

    next: Option<Completion>,
    last: Option<ResolutionResult>,
    /// Set when `last` has not yet been handed to the owner.
    fresh: bool,
    reresolution_requested: bool,

    resolving: Option<JoinHandle<()>>,
    last_query: Option<Instant>,
    timer: Option<(u64, JoinHandle<()>)>,
    timer_gen: u64,
    shutdown: bool,
}

impl Dns {
    /// Creates a resolver for `name`, given as `host` or `host:port`.
    pub fn new(name: &str,
               settings: Settings,
               lookup: Arc<dyn Lookup>,
               runtime: runtime::Handle)
               -> Result<Dns, ConfigError> {
        let (host, port) = split_host_port(name, settings.default_port)?;
        Ok(Dns {
               host,
               port,
               settings,
               lookup,
               runtime,
               next: None,
               last: None,
               fresh: false,
               reresolution_requested: false,
               resolving: None,
               last_query: None,
               timer: None,
               timer_gen: 0,
               shutdown: false,
           })
    }

    fn start_resolving(&mut self, cx: &Locked<'_, Self>) {
        debug_assert!(self.resolving.is_none());
        debug!("resolving {}:{}", self.host, self.port);
        self.last_query = Some(Instant::now());

        let lookup = self.lookup.lookup(&self.host, self.port);
        let timeout = self.settings.lookup_timeout;
        let resolver = cx.weak();
        let resolving = self.runtime.spawn(async move {
            let result = match time::timeout(timeout, lookup).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "lookup timed out")),
            };
            let _ = resolver.schedule(move |dns, cx| dns.on_resolved(cx, result));
        });
        self.resolving = Some(resolving);
    }

    fn on_resolved(&mut self, cx: &Locked<'_, Self>, result: io::Result<Vec<SocketAddr>>) {
        self.resolving = None;
        if self.shutdown {
            return;
        }

        match result {
            Ok(ref addrs) if !addrs.is_empty() => {
                debug!("resolved {}:{} to {} addresses",
                       self.host,
                       self.port,
                       addrs.len());
                let result = ResolutionResult::new(WeightedAddr::uniform(addrs.iter().cloned()));
                self.last = Some(result);
                self.fresh = true;
                self.maybe_finish();
                return;
            }
            Ok(_) => warn!("{}:{} resolved to no addresses", self.host, self.port),
            Err(e) => warn!("failed to resolve {}:{}: {}", self.host, self.port, e),
        }

        // The owner asked for something new; give it what we know while we retry.
        if self.reresolution_requested && self.last.is_some() {
            self.fresh = true;
            self.maybe_finish();
        }
        if self.timer.is_none() {
            let retry = self.settings.retry_interval;
            self.start_timer(cx, retry);
        }
    }

    fn start_timer(&mut self, cx: &Locked<'_, Self>, delay: Duration) {
        self.cancel_timer();
        self.timer_gen += 1;
        let gen = self.timer_gen;
        trace!("resolving {}:{} again in {:?}", self.host, self.port, delay);

        let resolver = cx.weak();
        let timer = self.runtime.spawn(async move {
            time::sleep(delay).await;
            let _ = resolver.schedule(move |dns, cx| dns.on_timer(cx, gen));
        });
        self.timer = Some((gen, timer));
    }

    fn cancel_timer(&mut self) {
        if let Some((_, timer)) = self.timer.take() {
            timer.abort();
        }
    }

    fn on_timer(&mut self, cx: &Locked<'_, Self>, gen: u64) {
        match self.timer {
            Some((g, _)) if g == gen => {}
            // Canceled after it fired.
            _ => return,
        }
        self.timer = None;
        if !self.shutdown && self.resolving.is_none() {
            self.start_resolving(cx);
        }
    }

    fn maybe_finish(&mut self) {
        if !self.fresh {
            return;
        }
        if let Some(ref last) = self.last {
            if let Some(c) = self.next.take() {
                self.fresh = false;
                self.reresolution_requested = false;
                c.succeed(last.clone());
            }
        }
    }
}

impl Resolver for Dns {
    fn next_locked(&mut self, cx: &Locked<'_, Self>, on_complete: Completion) {
        debug_assert!(self.next.is_none());
        if self.shutdown {
            on_complete.fail(Error::Shutdown);
            return;
        }
        self.next = Some(on_complete);
        if self.last.is_none() && self.resolving.is_none() && self.timer.is_none() {
            self.start_resolving(cx);
        } else {
            self.maybe_finish();
        }
    }

    fn request_reresolution_locked(&mut self, cx: &Locked<'_, Self>) {
        if self.shutdown {
            return;
        }
        self.reresolution_requested = true;
        if self.resolving.is_some() {
            // Hand over what we have; the answer in flight goes to a later call.
            if self.last.is_some() {
                self.fresh = true;
                self.maybe_finish();
            }
            return;
        }

        let now = Instant::now();
        let earliest = self.last_query
            .map(|t| t + self.settings.min_resolution_interval);
        match earliest {
            Some(earliest) if now < earliest => {
                if self.timer.is_none() {
                    debug!("deferring resolution of {}:{} for {:?}",
                           self.host,
                           self.port,
                           earliest - now);
                    self.start_timer(cx, earliest - now);
                }
                if self.last.is_some() {
                    self.fresh = true;
                    self.maybe_finish();
                }
            }
            _ => {
                self.cancel_timer();
                self.start_resolving(cx);
            }
        }
    }

    fn shutdown_locked(&mut self, _: &Locked<'_, Self>) {
        debug!("shutting down resolver for {}:{}", self.host, self.port);
        self.shutdown = true;
        self.cancel_timer();
        if let Some(resolving) = self.resolving.take() {
            resolving.abort();
        }
        if let Some(c) = self.next.take() {
            c.fail(Error::Shutdown);
        }
    }
}

impl Drop for Dns {
    fn drop(&mut self) {
        // Shutdown doesn't run if the combiner stopped first.
        self.cancel_timer();
        if let Some(resolving) = self.resolving.take() {
            resolving.abort();
        }
    }
}

impl fmt::Debug for Dns {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Dns")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Splits `host[:port]`, accepting bracketed IPv6 literals.
pub fn split_host_port(name: &str, default_port: u16) -> Result<(String, u16), ConfigError> {
    let (host, port) = if name.starts_with('[') {
        let end = match name.find(']') {
            Some(end) => end,
            None => return Err(format!("unterminated IPv6 literal: {}", name).into()),
        };
        let rest = &name[end + 1..];
        let port = if rest.is_empty() {
            None
        } else if rest.starts_with(':') {
            Some(&rest[1..])
        } else {
            return Err(format!("invalid host: {}", name).into());
        };
        (&name[1..end], port)
    } else {
        match name.rfind(':') {
            // More than one colon: a bare IPv6 literal.
            Some(i) if !name[..i].contains(':') => (&name[..i], Some(&name[i + 1..])),
            _ => (name, None),
        }
    };

    if host.is_empty() {
        return Err(format!("missing host: {:?}", name).into());
    }
    let port = match port {
        None => default_port,
        Some(p) => {
            p.parse()
                .map_err(|e| ConfigError::from(format!("invalid port in {}: {}", name, e)))?
        }
    };
    Ok((host.to_owned(), port))
}
