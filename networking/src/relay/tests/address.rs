use crate::error::NetworkError;
use crate::relay::{RelayAddress, derive_relay_addresses, is_circuit_address};
use libp2p::Multiaddr;
use rstest::rstest;

fn addr(s: &str) -> Multiaddr {
    s.parse().unwrap()
}

#[rstest]
#[case("/ip4/10.0.0.1/tcp/4001/p2p-circuit", true)]
#[case(
    "/ip4/147.75.83.83/udp/4001/quic-v1/p2p/QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN/p2p-circuit",
    true
)]
#[case("/ip4/10.0.0.1/tcp/4001", false)]
#[case("/ip4/10.0.0.1/udp/9090/webrtc-direct", false)]
#[case("/dns4/relay.example.com/tcp/443/wss", false)]
fn test_is_circuit_address(#[case] address: &str, #[case] expected: bool) {
    assert_eq!(is_circuit_address(&addr(address)), expected);
}

#[test]
fn test_derive_single_relay_address() {
    let addresses = vec![addr("/ip4/10.0.0.1/tcp/4001/p2p-circuit")];

    let derived = derive_relay_addresses("Qm123", &addresses);

    assert_eq!(
        derived,
        vec![RelayAddress::derive(&addresses[0], "Qm123")]
    );
    assert_eq!(
        derived[0].as_str(),
        "/ip4/10.0.0.1/tcp/4001/p2p-circuit/webrtc/p2p/Qm123"
    );
}

#[test]
fn test_derive_no_circuit_address() {
    let addresses = vec![addr("/ip4/10.0.0.1/tcp/4001")];

    assert!(derive_relay_addresses("Qm123", &addresses).is_empty());
    assert!(derive_relay_addresses("Qm123", &[]).is_empty());
}

#[test]
fn test_derive_keeps_input_order() {
    let addresses = vec![
        addr("/ip4/10.0.0.2/tcp/4001/p2p-circuit"),
        addr("/ip4/10.0.0.3/tcp/4001"),
        addr("/ip4/10.0.0.1/tcp/4001/p2p-circuit"),
    ];

    let derived: Vec<String> = derive_relay_addresses("Qm123", &addresses)
        .into_iter()
        .map(RelayAddress::into_string)
        .collect();

    assert_eq!(
        derived,
        vec![
            "/ip4/10.0.0.2/tcp/4001/p2p-circuit/webrtc/p2p/Qm123".to_string(),
            "/ip4/10.0.0.1/tcp/4001/p2p-circuit/webrtc/p2p/Qm123".to_string(),
        ]
    );
}

#[test]
fn test_relay_address_parses_with_real_peer_id() {
    let peer_id = libp2p::PeerId::random();
    let circuit = addr(
        "/ip4/147.75.83.83/udp/4001/quic-v1/p2p/QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN/p2p-circuit",
    );

    let relay = RelayAddress::derive(&circuit, &peer_id.to_string());
    let parsed = relay.to_multiaddr().unwrap();

    assert_eq!(parsed.to_string(), relay.as_str());
    assert!(is_circuit_address(&parsed));
}

#[test]
fn test_relay_address_with_invalid_peer_id_is_malformed() {
    let relay = RelayAddress::derive(&addr("/ip4/10.0.0.1/tcp/4001/p2p-circuit"), "Qm123");

    assert!(matches!(
        relay.to_multiaddr(),
        Err(NetworkError::MalformedAddress { .. })
    ));
}
