use super::App;
use crate::resolver::config::ResolverConfig;
use crate::resolver::{self, ResolverRegistry};
use crate::ConfigError;
use serde_json;
use serde_yaml;
use std::str::FromStr;
use std::time::Duration;

/// Holds the configuration for a linkerd-namer instance.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AppConfig {
    /// Resolver factories, in addition to (or replacing) the default `dns` and
    /// `static` schemes.
    pub resolvers: Option<Vec<ResolverConfig>>,

    /// The scheme used for targets that don't name a registered one.
    pub default_scheme: Option<String>,

    /// Targets to watch.
    pub targets: Vec<String>,

    /// If set, re-resolution is requested for every target on this interval.
    pub reresolve_interval_secs: Option<u64>,

    /// Logs every resolver reference taken and released at trace level.
    pub trace_refcount: Option<bool>,
}

impl FromStr for AppConfig {
    type Err = ConfigError;

    /// Parses a JSON- or YAML-formatted configuration file.
    fn from_str(txt: &str) -> Result<AppConfig, ConfigError> {
        let txt = txt.trim_start();
        if txt.starts_with('{') {
            serde_json::from_str(txt).map_err(|e| format!("{}", e).into())
        } else {
            serde_yaml::from_str(txt).map_err(|e| format!("{}", e).into())
        }
    }
}

impl AppConfig {
    pub fn mk_registry(&self) -> Result<ResolverRegistry, ConfigError> {
        let mut registry = ResolverRegistry::with_defaults();
        if let Some(ref resolvers) = self.resolvers {
            for r in resolvers {
                r.register(&mut registry)?;
            }
        }
        if let Some(ref scheme) = self.default_scheme {
            if !registry.is_registered(scheme) {
                return Err(format!("default scheme `{}` has no resolver", scheme).into());
            }
            registry.set_default_scheme(scheme.clone());
        }
        Ok(registry)
    }

    /// Build an App from a configuration.
    pub fn into_app(self) -> Result<App, ConfigError> {
        let registry = self.mk_registry()?;
        for t in &self.targets {
            registry.parse_target(t)?;
        }

        let reresolve_interval = match self.reresolve_interval_secs {
            None => None,
            Some(0) => return Err("`reresolveIntervalSecs` must be positive".into()),
            Some(secs) => Some(Duration::from_secs(secs)),
        };

        resolver::set_trace_refcount(self.trace_refcount.unwrap_or(false));

        Ok(App {
               registry,
               targets: self.targets,
               reresolve_interval,
           })
    }
}

#[test]
fn parse_simple_yaml() {
    let yaml = "
traceRefcount: true
resolvers:
  - kind: io.l5d.dns
    minResolutionIntervalMs: 10000
  - kind: io.l5d.namespace
    names:
      /svc/users:
        - ip: 127.0.0.1
          port: 4140
targets:
  - svc.example:8080
  - namespace:///svc/users
";
    let app: AppConfig = yaml.parse().unwrap();
    assert_eq!(app.targets.len(), 2);
    assert_eq!(app.resolvers.as_ref().map(|r| r.len()), Some(2));
    let registry = app.mk_registry().unwrap();
    assert!(registry.is_registered("namespace"));
    assert_eq!(registry.default_scheme(), "dns");
}

#[test]
fn parse_simple_json() {
    let json = "{\"defaultScheme\": \"static\", \
                 \"targets\": [\"10.0.0.1:80,10.0.0.2:80\"]}";
    let app: AppConfig = json.parse().unwrap();
    let registry = app.mk_registry().unwrap();
    let url = registry.parse_target(&app.targets[0]).unwrap();
    assert_eq!(url.scheme(), "static");
}

#[test]
fn unknown_fields_rejected() {
    assert!("targets: []\nbufferSize: 8192".parse::<AppConfig>().is_err());
}

#[test]
fn unregistered_default_scheme_rejected() {
    let app: AppConfig = "{\"defaultScheme\": \"consul\", \"targets\": []}".parse().unwrap();
    assert!(app.into_app().is_err());
}

#[test]
fn zero_reresolve_interval_rejected() {
    let app: AppConfig = "targets: []\nreresolveIntervalSecs: 0".parse().unwrap();
    assert!(app.into_app().is_err());
}
