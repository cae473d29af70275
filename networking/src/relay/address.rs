use std::fmt;

use libp2p::Multiaddr;
use libp2p::multiaddr::Protocol;

use crate::error::NetworkError;

/// Path appended to a circuit address to make it dialable by browser peers
/// over WebRTC, followed by the peer id.
pub const WEBRTC_PEER_SUFFIX: &str = "/webrtc/p2p/";

/// A relayed address other peers can dial over WebRTC.
///
/// Kept in textual form: it is derived by string concatenation and handed
/// to presentation as-is. Parsing is left to whoever dials it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelayAddress(String);

impl RelayAddress {
    /// `<circuit address>/webrtc/p2p/<peer id>`
    pub fn derive(circuit_address: &Multiaddr, peer_id: &str) -> Self {
        Self(format!("{circuit_address}{WEBRTC_PEER_SUFFIX}{peer_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn to_multiaddr(&self) -> Result<Multiaddr, NetworkError> {
        self.0
            .parse::<Multiaddr>()
            .map_err(|err| NetworkError::MalformedAddress {
                address: self.0.clone(),
                reason: err.to_string(),
            })
    }
}

impl fmt::Display for RelayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelayAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether the address routes through a circuit relay hop
/// (`p2p-circuit`, multicodec 290) anywhere in its segments.
pub fn is_circuit_address(address: &Multiaddr) -> bool {
    address
        .iter()
        .any(|protocol| matches!(protocol, Protocol::P2pCircuit))
}

/// Derive one relay address per circuit address, in input order.
///
/// Addresses without a circuit segment are skipped. Input is assumed to be
/// well-formed; nothing is validated.
pub fn derive_relay_addresses(peer_id: &str, addresses: &[Multiaddr]) -> Vec<RelayAddress> {
    addresses
        .iter()
        .filter(|address| is_circuit_address(address))
        .map(|address| RelayAddress::derive(address, peer_id))
        .collect()
}
