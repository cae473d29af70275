use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};
use networking::relay::{RelayAddressHandler, RelayAddressResolver, RelayAddressSlot};
use networking::session::ChatSession;
use networking::types::PeerAddressesChanged;
use tokio::sync::mpsc;

fn addr(s: &str) -> Multiaddr {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_session_changes_drive_relay_address() {
    let local = PeerId::random();
    let mut session = ChatSession::new(local);
    let slot = RelayAddressSlot::new();
    let handler = RelayAddressHandler::new(RelayAddressResolver::new(slot.clone()));
    let (tx, rx) = mpsc::unbounded_channel();

    if session.add_listen_addr(addr("/ip4/127.0.0.1/tcp/9091")) {
        tx.send(session.address_change()).unwrap();
    }
    if session.add_listen_addr(addr("/ip4/10.0.0.1/tcp/4001/p2p-circuit")) {
        tx.send(session.address_change()).unwrap();
    }
    // Re-adding a known address is not a change.
    if session.add_listen_addr(addr("/ip4/10.0.0.1/tcp/4001/p2p-circuit")) {
        tx.send(session.address_change()).unwrap();
    }
    drop(tx);

    let handled = handler.run(rx).await;

    assert_eq!(handled, 2);
    assert_eq!(
        slot.current().unwrap().as_str(),
        format!("/ip4/10.0.0.1/tcp/4001/p2p-circuit/webrtc/p2p/{local}")
    );
    assert_eq!(slot.copy_requests(), 1);
}

#[tokio::test]
async fn test_expired_circuit_keeps_last_shown_address() {
    let local = PeerId::random();
    let mut session = ChatSession::new(local);
    let slot = RelayAddressSlot::new();
    let handler = RelayAddressHandler::new(RelayAddressResolver::new(slot.clone()));
    let (tx, rx) = mpsc::unbounded_channel();

    let circuit = addr("/ip4/10.0.0.1/tcp/4001/p2p-circuit");
    session.add_listen_addr(circuit.clone());
    tx.send(session.address_change()).unwrap();
    session.remove_listen_addr(&circuit);
    tx.send(session.address_change()).unwrap();
    drop(tx);

    assert_eq!(handler.run(rx).await, 2);
    assert!(slot.current().is_some());
    assert_eq!(slot.copy_requests(), 1);
}

#[test]
fn test_reservation_address_derives_single_peer_suffix() {
    let local = PeerId::random();
    let relay = PeerId::random();
    let mut session = ChatSession::new(local);
    let slot = RelayAddressSlot::new();
    let resolver = RelayAddressResolver::new(slot.clone());

    let circuit = addr(&format!("/ip4/10.0.0.1/tcp/4001/p2p/{relay}/p2p-circuit"));
    // Shape reported by the relay client for an accepted reservation.
    let reservation = circuit.clone().with(Protocol::P2p(local));
    session.add_listen_addr(reservation);

    let change: PeerAddressesChanged = session.address_change();
    let derived = resolver.resolve(&change);

    assert_eq!(derived.len(), 1);
    assert_eq!(
        derived[0].as_str(),
        format!("/ip4/10.0.0.1/tcp/4001/p2p/{relay}/p2p-circuit/webrtc/p2p/{local}")
    );
    assert_eq!(slot.current(), Some(derived[0].clone()));
}
