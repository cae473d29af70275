//! Chat session state.
//!
//! Everything the node knows about itself and its connections, owned by
//! the network service and shared with whoever needs it.
use std::collections::HashMap;

use libp2p::{Multiaddr, PeerId, multiaddr::Protocol};

use crate::types::{ConnectionState, Origin, PeerAddressesChanged};

#[derive(Debug, Clone)]
pub struct ChatSession {
    local_peer_id: PeerId,
    /// Local listen and confirmed external addresses, in discovery order,
    /// without a trailing `/p2p/<local peer id>`.
    listen_addrs: Vec<Multiaddr>,
    /// Remote addresses of established connections, unique by text, with
    /// the number of open connections sharing each.
    connections: Vec<(Multiaddr, usize)>,
    /// Peers that are connecting, connected or disconnecting.
    peers: HashMap<PeerId, ConnectionState>,
}

impl ChatSession {
    pub fn new(local_peer_id: PeerId) -> Self {
        Self {
            local_peer_id,
            listen_addrs: Vec::new(),
            connections: Vec::new(),
            peers: HashMap::new(),
        }
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    pub fn listen_addrs(&self) -> &[Multiaddr] {
        &self.listen_addrs
    }

    /// Strip a trailing `/p2p/<local peer id>`.
    ///
    /// The relay client reports reservations as
    /// `<relay>/p2p-circuit/p2p/<local peer id>`; the address set holds the
    /// bare form so derived relay addresses carry the peer id only once.
    fn local_form(&self, mut address: Multiaddr) -> Multiaddr {
        let ends_with_local = matches!(
            address.iter().last(),
            Some(Protocol::P2p(peer_id)) if peer_id == self.local_peer_id
        );
        if ends_with_local {
            address.pop();
        }
        address
    }

    /// Returns `true` if the address was not known yet.
    pub fn add_listen_addr(&mut self, address: Multiaddr) -> bool {
        let address = self.local_form(address);
        if self.listen_addrs.contains(&address) {
            return false;
        }
        self.listen_addrs.push(address);
        true
    }

    /// Returns `true` if the address was known.
    pub fn remove_listen_addr(&mut self, address: &Multiaddr) -> bool {
        let address = self.local_form(address.clone());
        let before = self.listen_addrs.len();
        self.listen_addrs.retain(|known| *known != address);
        self.listen_addrs.len() != before
    }

    /// Address change notification for the local peer's current set.
    pub fn address_change(&self) -> PeerAddressesChanged {
        PeerAddressesChanged {
            peer_id: self.local_peer_id,
            addresses: self.listen_addrs.clone(),
        }
    }

    /// Remote addresses of open connections, one entry per address text.
    pub fn connections(&self) -> Vec<Multiaddr> {
        self.connections
            .iter()
            .map(|(address, _)| address.clone())
            .collect()
    }

    /// Record the remote address of a new connection.
    ///
    /// Returns `false` if an address with the same text is already listed.
    pub fn record_connection(&mut self, remote_addr: Multiaddr) -> bool {
        let text = remote_addr.to_string();
        match self
            .connections
            .iter_mut()
            .find(|(known, _)| known.to_string() == text)
        {
            Some((_, open)) => {
                *open += 1;
                false
            }
            None => {
                self.connections.push((remote_addr, 1));
                true
            }
        }
    }

    /// Forget one connection to the address.
    ///
    /// Returns `true` once the last connection using the address text is
    /// gone and the address has left the list.
    pub fn remove_connection(&mut self, remote_addr: &Multiaddr) -> bool {
        let text = remote_addr.to_string();
        let Some(index) = self
            .connections
            .iter()
            .position(|(known, _)| known.to_string() == text)
        else {
            return false;
        };

        let open = &mut self.connections[index].1;
        *open -= 1;
        if *open > 0 {
            return false;
        }
        self.connections.remove(index);
        true
    }

    /// Disconnected peers are dropped rather than stored.
    pub fn set_peer_state(&mut self, peer_id: PeerId, state: ConnectionState) {
        if state == ConnectionState::Disconnected {
            self.peers.remove(&peer_id);
        } else {
            self.peers.insert(peer_id, state);
        }
    }

    /// `None` for peers that are not tracked, i.e. disconnected.
    pub fn peer_state(&self, peer_id: &PeerId) -> Option<ConnectionState> {
        self.peers.get(peer_id).copied()
    }

    pub fn tracked_peers(&self) -> usize {
        self.peers.len()
    }

    pub fn connected_peers(&self) -> usize {
        self.peers
            .values()
            .filter(|state| **state == ConnectionState::Connected)
            .count()
    }

    /// Whether a chat line was written by this node.
    pub fn origin_of(&self, author: Option<&PeerId>) -> Origin {
        match author {
            Some(peer_id) if *peer_id == self.local_peer_id => Origin::Me,
            _ => Origin::Them,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    #[test]
    fn listen_addrs_report_changes() {
        let mut session = ChatSession::new(PeerId::random());
        let a = addr("/ip4/127.0.0.1/tcp/9092");

        assert!(session.add_listen_addr(a.clone()));
        assert!(!session.add_listen_addr(a.clone()));
        assert_eq!(session.listen_addrs(), &[a.clone()]);

        assert!(session.remove_listen_addr(&a));
        assert!(!session.remove_listen_addr(&a));
        assert!(session.listen_addrs().is_empty());
    }

    #[test]
    fn address_change_describes_local_peer() {
        let local = PeerId::random();
        let mut session = ChatSession::new(local);
        session.add_listen_addr(addr("/ip4/127.0.0.1/tcp/9092"));
        session.add_listen_addr(addr("/ip4/10.0.0.1/tcp/4001/p2p-circuit"));

        let change = session.address_change();

        assert_eq!(change.peer_id, local);
        assert_eq!(change.addresses.len(), 2);
        assert_eq!(change.addresses[1], addr("/ip4/10.0.0.1/tcp/4001/p2p-circuit"));
    }

    #[test]
    fn connections_are_unique_by_text() {
        let mut session = ChatSession::new(PeerId::random());
        let remote = addr("/ip4/1.2.3.4/udp/9091/quic-v1");

        assert!(session.record_connection(remote.clone()));
        assert!(!session.record_connection(remote.clone()));
        assert_eq!(session.connections(), vec![remote.clone()]);

        // One of two connections sharing the address closes.
        assert!(!session.remove_connection(&remote));
        assert_eq!(session.connections(), vec![remote.clone()]);

        assert!(session.remove_connection(&remote));
        assert!(session.connections().is_empty());
        assert!(!session.remove_connection(&remote));
    }

    #[test]
    fn connected_peers_counts_only_connected() {
        let mut session = ChatSession::new(PeerId::random());
        let a = PeerId::random();
        let b = PeerId::random();

        session.set_peer_state(a, ConnectionState::Connected);
        session.set_peer_state(b, ConnectionState::Connecting);
        assert_eq!(session.connected_peers(), 1);

        session.set_peer_state(a, ConnectionState::Disconnected);
        assert_eq!(session.connected_peers(), 0);
        assert_eq!(session.peer_state(&b), Some(ConnectionState::Connecting));
    }

    #[test]
    fn disconnected_peers_are_dropped() {
        let mut session = ChatSession::new(PeerId::random());
        let peer = PeerId::random();

        session.set_peer_state(peer, ConnectionState::Connected);
        assert_eq!(session.tracked_peers(), 1);

        session.set_peer_state(peer, ConnectionState::Disconnected);
        assert_eq!(session.tracked_peers(), 0);
        assert_eq!(session.peer_state(&peer), None);
    }

    #[test]
    fn reservation_address_loses_local_peer_suffix() {
        let local = PeerId::random();
        let relay = PeerId::random();
        let mut session = ChatSession::new(local);
        let circuit: Multiaddr = format!("/ip4/10.0.0.1/tcp/4001/p2p/{relay}/p2p-circuit")
            .parse()
            .unwrap();
        let reported = circuit.clone().with(Protocol::P2p(local));

        assert!(session.add_listen_addr(reported.clone()));
        assert!(!session.add_listen_addr(circuit.clone()));
        assert_eq!(session.listen_addrs(), &[circuit.clone()]);

        assert!(session.remove_listen_addr(&reported));
        assert!(session.listen_addrs().is_empty());
    }

    #[test]
    fn foreign_peer_suffix_is_kept() {
        let mut session = ChatSession::new(PeerId::random());
        let other = PeerId::random();
        let address: Multiaddr = format!("/ip4/10.0.0.1/tcp/4001/p2p/{other}")
            .parse()
            .unwrap();

        session.add_listen_addr(address.clone());

        assert_eq!(session.listen_addrs(), &[address]);
    }

    #[test]
    fn origin_distinguishes_self() {
        let local = PeerId::random();
        let session = ChatSession::new(local);

        assert_eq!(session.origin_of(Some(&local)), Origin::Me);
        assert_eq!(session.origin_of(Some(&PeerId::random())), Origin::Them);
        assert_eq!(session.origin_of(None), Origin::Them);
    }
}
