//! Maps target URIs to resolvers.
//!
//! A target such as `dns:///svc.example:8080` names the resolver by its scheme. A
//! target without a registered scheme is resolved with the registry's default scheme
//! (`dns`), so `svc.example:8080` means `dns:///svc.example:8080`.

use super::dns::{self, Dns, HostLookup, Lookup};
use super::fixed::Fixed;
use super::namespace::{Namespace, NamespaceResolver};
use super::{DynResolver, OrphanablePtr, Resolution, ResolutionResult, WeightedAddr};
use crate::{Combiner, ConfigError, Path};
use serde_json;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::runtime;
use url::Url;

pub const DEFAULT_SCHEME: &str = "dns";

/// What a factory needs to build a resolver.
#[derive(Clone, Debug)]
pub struct ResolverArgs {
    /// The combiner the resolver is bound to.
    pub combiner: Combiner,

    /// The runtime on which the resolver may run background work.
    pub runtime: runtime::Handle,
}

/// Builds resolvers for targets with a particular URI scheme.
pub trait ResolverFactory: Send + Sync {
    fn scheme(&self) -> &str;

    fn create(&self, target: &Url, args: &ResolverArgs) -> Result<Box<dyn DynResolver>, ConfigError>;

    /// The authority a channel using this target should present; by default the
    /// target's path without its leading slash.
    fn default_authority(&self, target: &Url) -> String {
        target.path().trim_start_matches('/').to_owned()
    }
}

pub struct ResolverRegistry {
    factories: HashMap<String, Arc<dyn ResolverFactory>>,
    default_scheme: String,
}

impl ResolverRegistry {
    pub fn new<S: Into<String>>(default_scheme: S) -> ResolverRegistry {
        ResolverRegistry {
            factories: HashMap::new(),
            default_scheme: default_scheme.into(),
        }
    }

    /// A registry with the `dns` and `static` schemes.
    pub fn with_defaults() -> ResolverRegistry {
        let mut registry = ResolverRegistry::new(DEFAULT_SCHEME);
        registry.register(DnsFactory::default());
        registry.register(FixedFactory::default());
        registry
    }

    /// Registers `factory`, replacing any factory for the same scheme.
    pub fn register<F: ResolverFactory + 'static>(&mut self, factory: F) {
        let scheme = factory.scheme().to_owned();
        if self.factories.contains_key(&scheme) {
            info!("replacing resolver factory for {}", scheme);
        }
        self.factories.insert(scheme, Arc::new(factory));
    }

    pub fn is_registered(&self, scheme: &str) -> bool {
        self.factories.contains_key(scheme)
    }

    pub fn default_scheme(&self) -> &str {
        &self.default_scheme
    }

    pub fn set_default_scheme<S: Into<String>>(&mut self, scheme: S) {
        self.default_scheme = scheme.into();
    }

    /// Parses `target`, applying the default scheme if it names no registered one.
    pub fn parse_target(&self, target: &str) -> Result<Url, ConfigError> {
        if let Ok(url) = Url::parse(target) {
            if self.is_registered(url.scheme()) {
                return Ok(url);
            }
        }

        let prefixed = format!("{}:///{}", self.default_scheme, target);
        match Url::parse(&prefixed) {
            Ok(ref url) if self.is_registered(url.scheme()) => Ok(url.clone()),
            Ok(_) => Err(format!("no resolver registered for {}", target).into()),
            Err(e) => Err(format!("invalid target {}: {}", target, e).into()),
        }
    }

    /// Creates a resolver for `target`.
    pub fn create(&self, target: &str, args: &ResolverArgs) -> Result<Box<dyn DynResolver>, ConfigError> {
        let url = self.parse_target(target)?;
        let factory = self.factory(&url)?;
        debug!("creating {} resolver for {}", url.scheme(), url);
        factory.create(&url, args)
    }

    /// Creates a resolver for `target` and subscribes to its results.
    pub fn resolve(&self, target: &str, args: &ResolverArgs) -> Result<Resolution, ConfigError> {
        self.create(target, args).map(Resolution::new)
    }

    pub fn default_authority(&self, target: &str) -> Result<String, ConfigError> {
        let url = self.parse_target(target)?;
        Ok(self.factory(&url)?.default_authority(&url))
    }

    fn factory(&self, url: &Url) -> Result<&Arc<dyn ResolverFactory>, ConfigError> {
        self.factories
            .get(url.scheme())
            .ok_or_else(|| format!("no resolver registered for {}", url.scheme()).into())
    }
}

impl Default for ResolverRegistry {
    fn default() -> ResolverRegistry {
        ResolverRegistry::with_defaults()
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut schemes: Vec<&String> = self.factories.keys().collect();
        schemes.sort();
        f.debug_struct("ResolverRegistry")
            .field("schemes", &schemes)
            .field("default_scheme", &self.default_scheme)
            .finish()
    }
}

/// Resolves `dns:///host[:port]` targets.
pub struct DnsFactory {
    settings: dns::Settings,
    lookup: Arc<dyn Lookup>,
}

impl DnsFactory {
    pub fn new(settings: dns::Settings, lookup: Arc<dyn Lookup>) -> DnsFactory {
        DnsFactory { settings, lookup }
    }
}

impl Default for DnsFactory {
    fn default() -> DnsFactory {
        DnsFactory::new(dns::Settings::default(), Arc::new(HostLookup))
    }
}

impl ResolverFactory for DnsFactory {
    fn scheme(&self) -> &str {
        "dns"
    }

    fn create(&self, target: &Url, args: &ResolverArgs) -> Result<Box<dyn DynResolver>, ConfigError> {
        let name = target.path().trim_start_matches('/');
        let dns = Dns::new(name, self.settings, self.lookup.clone(), args.runtime.clone())?;
        Ok(Box::new(OrphanablePtr::new(&args.combiner, dns)))
    }
}

/// Resolves `static:///ip:port[,ip:port...]` targets to exactly those addresses.
#[derive(Clone, Debug, Default)]
pub struct FixedFactory {
    service_config: Option<serde_json::Value>,
}

impl FixedFactory {
    pub fn new(service_config: Option<serde_json::Value>) -> FixedFactory {
        FixedFactory { service_config }
    }
}

impl ResolverFactory for FixedFactory {
    fn scheme(&self) -> &str {
        "static"
    }

    fn create(&self, target: &Url, args: &ResolverArgs) -> Result<Box<dyn DynResolver>, ConfigError> {
        let addrs = parse_addrs(target.path().trim_start_matches('/'))?;
        let mut result = ResolutionResult::new(WeightedAddr::uniform(addrs));
        if let Some(ref config) = self.service_config {
            result = result.with_service_config(config.clone());
        }
        Ok(Box::new(OrphanablePtr::new(&args.combiner, Fixed::new(result))))
    }
}

fn parse_addrs(list: &str) -> Result<Vec<SocketAddr>, ConfigError> {
    let mut addrs = Vec::new();
    for a in list.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        let addr = a.parse::<SocketAddr>()
            .map_err(|e| ConfigError::from(format!("invalid address {}: {}", a, e)))?;
        addrs.push(addr);
    }
    if addrs.is_empty() {
        return Err(format!("no addresses in {:?}", list).into());
    }
    Ok(addrs)
}

/// Resolves `namespace:///path` targets by watching a `Namespace`.
#[derive(Clone, Debug)]
pub struct NamespaceFactory {
    namespace: Namespace,
}

impl NamespaceFactory {
    pub fn new(namespace: Namespace) -> NamespaceFactory {
        NamespaceFactory { namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

impl ResolverFactory for NamespaceFactory {
    fn scheme(&self) -> &str {
        "namespace"
    }

    fn create(&self, target: &Url, args: &ResolverArgs) -> Result<Box<dyn DynResolver>, ConfigError> {
        let name: Path = target.path()
            .parse()
            .map_err(|e| ConfigError::from(format!("{}", e)))?;
        let resolver = NamespaceResolver::new(name, self.namespace.clone(), args.runtime.clone());
        Ok(Box::new(OrphanablePtr::new(&args.combiner, resolver)))
    }

    fn default_authority(&self, target: &Url) -> String {
        target.path().to_owned()
    }
}
