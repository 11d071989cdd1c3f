//! Name resolution for the linkerd client stack.
//!
//! A client channel holds a `Resolver` and keeps a request for the next resolution
//! result pending at all times. Resolvers may be push-based (the naming service streams
//! updates) or pull-based (the resolver must query again, e.g. DNS); both are driven
//! through the same contract.
//!
//! All resolver state is confined to a `Combiner`: a serialized execution context
//! onto which work is scheduled. Owners release a resolver with `orphan`, which may be
//! called from any thread and schedules shutdown onto the combiner.
//!
//! Copyright 2017 Buoyant, Inc.

extern crate futures;
#[macro_use]
extern crate log;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate serde_yaml;
extern crate tokio;
extern crate url;

use std::error::Error;
use std::fmt;

pub mod app;
pub mod combiner;
mod path;
pub mod resolver;

pub use combiner::{Combiner, Confined, Exclusive, Execute};
pub use path::{Path, ParseError};
pub use resolver::{Completion, DynResolver, Lifecycle, Locked, Next, OrphanablePtr,
                   Resolution, ResolutionResult, Resolver, ResolverRef, WeightedAddr};

/// Describes a configuration or target that cannot be turned into a resolver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConfigError {
    fn from(msg: String) -> ConfigError {
        ConfigError(msg)
    }
}

impl<'a> From<&'a str> for ConfigError {
    fn from(msg: &'a str) -> ConfigError {
        ConfigError(msg.into())
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for ConfigError {}
