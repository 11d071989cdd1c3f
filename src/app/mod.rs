//! Loads a configuration and watches its targets.

use crate::combiner;
use crate::resolver::{Resolution, ResolutionResult, ResolverArgs, ResolverRegistry};
use crate::ConfigError;
use futures::future;
use futures::StreamExt;
use std::time::Duration;
use tokio::runtime;
use tokio::time;

pub mod config;

pub use self::config::AppConfig;

/// Watches a set of targets, logging every update.
#[derive(Debug)]
pub struct App {
    registry: ResolverRegistry,
    targets: Vec<String>,
    reresolve_interval: Option<Duration>,
}

impl App {
    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Resolves every target until each has failed.
    ///
    /// All resolvers share one combiner, spawned on `runtime`.
    pub async fn run(self, runtime: runtime::Handle) -> Result<(), ConfigError> {
        let (combiner, exec) = combiner::new();
        let exec = runtime.spawn(exec);

        let watches = {
            let args = ResolverArgs {
                combiner,
                runtime: runtime.clone(),
            };
            let mut watches = Vec::with_capacity(self.targets.len());
            for target in &self.targets {
                info!("resolving {}", target);
                let resolution = self.registry.resolve(target, &args)?;
                watches.push(watch(target.clone(), resolution, self.reresolve_interval));
            }
            watches
        };

        future::join_all(watches).await;

        // Every resolver has been orphaned; let the combiner finish their shutdown.
        if let Err(e) = exec.await {
            error!("combiner failed: {}", e);
        }
        Ok(())
    }
}

async fn watch(target: String, mut resolution: Resolution, reresolve: Option<Duration>) {
    let mut reresolve = reresolve.map(|d| time::interval_at(time::Instant::now() + d, d));
    loop {
        let tick = async {
            match reresolve {
                Some(ref mut interval) => {
                    interval.tick().await;
                }
                None => future::pending::<()>().await,
            }
        };

        tokio::select! {
            update = resolution.next() => match update {
                Some(Ok(result)) => info!("{}: {}", target, describe(&result)),
                Some(Err(e)) => error!("{}: {}", target, e),
                None => return,
            },
            _ = tick => {
                debug!("{}: requesting re-resolution", target);
                resolution.request_reresolution();
            }
        }
    }
}

fn describe(result: &ResolutionResult) -> String {
    let addrs = result.addrs
        .iter()
        .map(|a| format!("{}*{:.3}", a.addr, a.weight))
        .collect::<Vec<_>>();
    format!("[{}]", addrs.join(", "))
}
