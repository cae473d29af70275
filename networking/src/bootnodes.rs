use std::fs::File;

use libp2p::{Multiaddr, PeerId, multiaddr::Protocol};
use tracing::warn;

pub trait BootnodeSource: Send + Sync {
    fn to_multiaddrs(&self) -> Vec<Multiaddr>;
}

impl BootnodeSource for Vec<Multiaddr> {
    fn to_multiaddrs(&self) -> Vec<Multiaddr> {
        self.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticBootnodes(Vec<Multiaddr>);

impl StaticBootnodes {
    pub fn new<T: Into<Vec<Multiaddr>>>(addrs: T) -> Self {
        StaticBootnodes(addrs.into())
    }

    /// Collect bootnodes from command line values.
    ///
    /// Each value is either a multiaddr or a path to a YAML file holding a
    /// list of multiaddrs. Unrecognized values are skipped with a warning.
    pub fn from_arguments<S: AsRef<str>>(args: &[S]) -> Self {
        StaticBootnodes(
            args.iter()
                .flat_map(|arg| parse_bootnode_argument(arg.as_ref()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl BootnodeSource for StaticBootnodes {
    fn to_multiaddrs(&self) -> Vec<Multiaddr> {
        self.0.clone()
    }
}

/// Peer id carried by the address's `/p2p/` component, if any.
pub fn peer_id_of(address: &Multiaddr) -> Option<PeerId> {
    address.iter().find_map(|protocol| match protocol {
        Protocol::P2p(peer_id) => Some(peer_id),
        _ => None,
    })
}

pub fn parse_bootnode_argument(arg: &str) -> Vec<Multiaddr> {
    if let Ok(value) = arg.parse::<Multiaddr>() {
        return vec![value];
    }

    let Ok(file) = File::open(arg) else {
        warn!(
            "value {arg:?} provided as bootnode is not recognized - it is not valid multiaddr nor valid path to file containing bootnodes."
        );

        return Vec::new();
    };

    let entries: Vec<String> = match serde_yaml::from_reader(file) {
        Ok(value) => value,
        Err(err) => {
            warn!("failed to read bootnodes from {arg:?}: {err:?}");

            return Vec::new();
        }
    };

    if entries.is_empty() {
        warn!("provided file with bootnodes {arg:?} is empty");
    }

    entries
        .iter()
        .filter_map(|entry| match entry.parse::<Multiaddr>() {
            Ok(addr) => Some(addr),
            Err(err) => {
                warn!("bootnode {entry:?} from {arg:?} is not a valid multiaddr: {err}");
                None
            }
        })
        .collect()
}
