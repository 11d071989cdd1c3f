use serde_json;
use std::net;

/// A weighted concrete destination address.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedAddr {
    pub addr: net::SocketAddr,
    pub weight: f64,
}

impl WeightedAddr {
    pub fn new(addr: net::SocketAddr, weight: f64) -> WeightedAddr {
        WeightedAddr { addr, weight }
    }

    /// Weighs each address equally.
    pub fn uniform<I>(addrs: I) -> Vec<WeightedAddr>
        where I: IntoIterator<Item = net::SocketAddr>
    {
        let mut dsts: Vec<WeightedAddr> =
            addrs.into_iter().map(|a| WeightedAddr::new(a, 1.0)).collect();
        normalize(&mut dsts);
        dsts
    }
}

/// Normalizes weights on [0.0, 1.0].
pub fn normalize(dsts: &mut [WeightedAddr]) {
    let sum: f64 = dsts.iter().map(|d| d.weight).sum();
    if sum > 0.0 {
        for dst in dsts.iter_mut() {
            dst.weight /= sum;
        }
    }
}

/// The configuration produced by a successful resolution.
///
/// Resolvers hand each owner its own copy; the contents are opaque to the resolver
/// contract itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolutionResult {
    pub addrs: Vec<WeightedAddr>,

    /// A service config to be applied by the channel, if the naming service
    /// provides one.
    pub service_config: Option<serde_json::Value>,
}

impl ResolutionResult {
    pub fn new(addrs: Vec<WeightedAddr>) -> ResolutionResult {
        ResolutionResult {
            addrs,
            service_config: None,
        }
    }

    pub fn with_service_config(mut self, config: serde_json::Value) -> ResolutionResult {
        self.service_config = Some(config);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn socket_addrs(&self) -> Vec<net::SocketAddr> {
        self.addrs.iter().map(|a| a.addr).collect()
    }
}

#[test]
fn uniform_weights_sum_to_one() {
    let addrs = WeightedAddr::uniform(vec!["127.0.0.1:1".parse().unwrap(),
                                           "127.0.0.1:2".parse().unwrap(),
                                           "127.0.0.1:3".parse().unwrap(),
                                           "127.0.0.1:4".parse().unwrap()]);
    assert_eq!(addrs.len(), 4);
    for a in &addrs {
        assert_eq!(a.weight, 0.25);
    }
}

#[test]
fn normalize_ignores_zero_total() {
    let mut addrs = vec![WeightedAddr::new("127.0.0.1:1".parse().unwrap(), 0.0)];
    normalize(&mut addrs);
    assert_eq!(addrs[0].weight, 0.0);
}
