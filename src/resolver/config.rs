use super::dns::{self, HostLookup};
use super::namespace::Namespace;
use super::registry::{DnsFactory, FixedFactory, NamespaceFactory, ResolverRegistry};
use super::{ResolutionResult, WeightedAddr};
use crate::{ConfigError, Path};
use serde_json;
use std::collections::HashMap;
use std::net;
use std::sync::Arc;
use std::time::Duration;

/// Configures the factory for one resolver scheme.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, tag = "kind")]
pub enum ResolverConfig {
    #[serde(rename = "io.l5d.dns")]
    Dns(DnsConfig),

    #[serde(rename = "io.l5d.static")]
    Static(StaticConfig),

    #[serde(rename = "io.l5d.namespace")]
    Namespace(NamespaceConfig),
}

impl ResolverConfig {
    /// Adds this resolver's factory to `registry`.
    pub fn register(&self, registry: &mut ResolverRegistry) -> Result<(), ConfigError> {
        match *self {
            ResolverConfig::Dns(ref cfg) => registry.register(cfg.mk_factory()?),
            ResolverConfig::Static(ref cfg) => registry.register(cfg.mk_factory()),
            ResolverConfig::Namespace(ref cfg) => registry.register(cfg.mk_factory()?),
        }
        Ok(())
    }
}

#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DnsConfig {
    pub min_resolution_interval_ms: Option<u64>,
    pub retry_interval_ms: Option<u64>,
    pub lookup_timeout_ms: Option<u64>,
    pub default_port: Option<u16>,
}

impl DnsConfig {
    pub fn mk_settings(&self) -> Result<dns::Settings, ConfigError> {
        let defaults = dns::Settings::default();
        let min_resolution_interval = match self.min_resolution_interval_ms {
            None => defaults.min_resolution_interval,
            Some(0) => return Err("`minResolutionIntervalMs` must be positive".into()),
            Some(ms) => Duration::from_millis(ms),
        };
        let retry_interval = match self.retry_interval_ms {
            None => defaults.retry_interval,
            Some(0) => return Err("`retryIntervalMs` must be positive".into()),
            Some(ms) => Duration::from_millis(ms),
        };
        let lookup_timeout = match self.lookup_timeout_ms {
            None => defaults.lookup_timeout,
            Some(0) => return Err("`lookupTimeoutMs` must be positive".into()),
            Some(ms) => Duration::from_millis(ms),
        };
        Ok(dns::Settings {
               min_resolution_interval,
               retry_interval,
               lookup_timeout,
               default_port: self.default_port.unwrap_or(defaults.default_port),
           })
    }

    pub fn mk_factory(&self) -> Result<DnsFactory, ConfigError> {
        Ok(DnsFactory::new(self.mk_settings()?, Arc::new(HostLookup)))
    }
}

#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct StaticConfig {
    /// Applied to every static target.
    pub service_config: Option<serde_json::Value>,
}

impl StaticConfig {
    pub fn mk_factory(&self) -> FixedFactory {
        FixedFactory::new(self.service_config.clone())
    }
}

#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NamespaceConfig {
    /// Initial bindings, by path.
    pub names: HashMap<String, Vec<Addr>>,
}

impl NamespaceConfig {
    pub fn mk_namespace(&self) -> Result<Namespace, ConfigError> {
        let namespace = Namespace::new();
        for (name, addrs) in &self.names {
            let path: Path = name.parse().map_err(|e| ConfigError::from(format!("{}", e)))?;
            let addrs = to_weighted_addrs(addrs)?;
            if addrs.is_empty() {
                namespace.neg(&path);
            } else {
                namespace.bind(&path, ResolutionResult::new(addrs));
            }
        }
        Ok(namespace)
    }

    pub fn mk_factory(&self) -> Result<NamespaceFactory, ConfigError> {
        Ok(NamespaceFactory::new(self.mk_namespace()?))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Addr {
    pub ip: String,
    pub port: u16,
    pub weight: Option<f64>,
}

fn to_weighted_addrs(addrs: &[Addr]) -> Result<Vec<WeightedAddr>, ConfigError> {
    let mut dsts: Vec<WeightedAddr> = Vec::with_capacity(addrs.len());
    for a in addrs {
        let ip: net::IpAddr = a.ip
            .parse()
            .map_err(|e| ConfigError::from(format!("invalid ip {}: {}", a.ip, e)))?;
        let w = a.weight.unwrap_or(1.0);
        if w < 0.0 {
            return Err(format!("negative weight for {}", a.ip).into());
        }
        dsts.push(WeightedAddr::new(net::SocketAddr::new(ip, a.port), w));
    }
    super::result::normalize(&mut dsts);
    Ok(dsts)
}
