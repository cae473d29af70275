use std::sync::Arc;

use libp2p::{Multiaddr, PeerId};
use tokio::sync::mpsc;

use super::{RecordingSink, SinkCall};
use crate::relay::{RelayAddressHandler, RelayAddressResolver, RelayAddressSlot};
use crate::types::PeerAddressesChanged;

fn circuit(host: u8) -> Multiaddr {
    format!("/ip4/10.0.0.{host}/tcp/4001/p2p-circuit")
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_handler_applies_events_in_order() {
    let peer_id = PeerId::random();
    let slot = RelayAddressSlot::new();
    let handler = RelayAddressHandler::new(RelayAddressResolver::new(slot.clone()));
    let (tx, rx) = mpsc::unbounded_channel();

    for host in 1..=3 {
        tx.send(PeerAddressesChanged {
            peer_id,
            addresses: vec![circuit(host)],
        })
        .unwrap();
    }
    drop(tx);

    let handled = handler.run(rx).await;

    assert_eq!(handled, 3);
    assert_eq!(
        slot.current().map(|a| a.into_string()),
        Some(format!("{}/webrtc/p2p/{peer_id}", circuit(3)))
    );
    assert_eq!(slot.copy_requests(), 3);
}

#[tokio::test]
async fn test_handler_skips_events_without_circuit() {
    let sink = Arc::new(RecordingSink::default());
    let handler = RelayAddressHandler::new(RelayAddressResolver::new(sink.clone()));
    let (tx, rx) = mpsc::unbounded_channel();

    tx.send(PeerAddressesChanged {
        peer_id: PeerId::random(),
        addresses: vec!["/ip4/10.0.0.1/tcp/4001".parse().unwrap()],
    })
    .unwrap();
    drop(tx);

    assert_eq!(handler.run(rx).await, 1);
    assert_eq!(sink.calls(), Vec::<SinkCall>::new());
}

#[tokio::test]
async fn test_handler_runs_as_task_until_channel_closes() {
    let slot = RelayAddressSlot::new();
    let handler = RelayAddressHandler::new(RelayAddressResolver::new(slot.clone()));
    let (tx, rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(handler.run(rx));

    tx.send(PeerAddressesChanged {
        peer_id: PeerId::random(),
        addresses: vec![circuit(7)],
    })
    .unwrap();
    drop(tx);

    assert_eq!(task.await.unwrap(), 1);
    assert!(slot.current().is_some());
}
