pub mod server;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    peers: IntGauge,
    peer_connection_events: IntCounterVec,
    // Chat
    chat_messages_received: IntCounterVec,
    chat_messages_published: IntCounterVec,
    // Protocol core
    message_id_rejections: IntCounter,
    relay_addresses_derived: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let peers = IntGauge::with_opts(Opts::new(
            "network_peers_connected",
            "Number of connected peers",
        ))?;
        registry.register(Box::new(peers.clone()))?;

        // Network
        let peer_connection_events = IntCounterVec::new(
            Opts::new(
                "uc_peer_connection_events_total",
                "Total number of peer connection events",
            ),
            &["direction", "result"],
        )?;
        registry.register(Box::new(peer_connection_events.clone()))?;

        // Chat
        let chat_messages_received = IntCounterVec::new(
            Opts::new(
                "uc_chat_messages_received_total",
                "Total number of chat messages delivered by gossipsub",
            ),
            &["signed"],
        )?;
        registry.register(Box::new(chat_messages_received.clone()))?;

        let chat_messages_published = IntCounterVec::new(
            Opts::new(
                "uc_chat_messages_published_total",
                "Total number of chat messages published by this node",
            ),
            &["result"],
        )?;
        registry.register(Box::new(chat_messages_published.clone()))?;

        // Protocol core
        let message_id_rejections = IntCounter::with_opts(Opts::new(
            "uc_message_id_rejections_total",
            "Gossip messages dropped because no message id could be derived",
        ))?;
        registry.register(Box::new(message_id_rejections.clone()))?;

        let relay_addresses_derived = IntCounter::with_opts(Opts::new(
            "uc_relay_addresses_derived_total",
            "Browser-dialable relay addresses derived from circuit addresses",
        ))?;
        registry.register(Box::new(relay_addresses_derived.clone()))?;

        Ok(Self {
            registry,
            peers,
            peer_connection_events,
            chat_messages_received,
            chat_messages_published,
            message_id_rejections,
            relay_addresses_derived,
        })
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        let encoder = TextEncoder::new();
        if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(%err, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn set_peers(&self, v: i64) {
        self.peers.set(v);
    }

    // Network
    pub fn inc_peer_connection(&self, direction: &str, result: &str) {
        self.peer_connection_events
            .with_label_values(&[direction, result])
            .inc();
    }

    // Chat
    pub fn inc_chat_received(&self, signed: bool) {
        let signed = if signed { "true" } else { "false" };
        self.chat_messages_received.with_label_values(&[signed]).inc();
    }

    pub fn inc_chat_published(&self, result: &str) {
        self.chat_messages_published.with_label_values(&[result]).inc();
    }

    // Protocol core
    pub fn inc_message_id_rejections(&self) {
        self.message_id_rejections.inc();
    }

    pub fn inc_relay_addresses_derived(&self, count: u64) {
        self.relay_addresses_derived.inc_by(count);
    }
}

pub type SharedMetrics = Arc<Metrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_exposes_registered_families() {
        let metrics = Metrics::new().unwrap();
        metrics.set_peers(3);
        metrics.inc_chat_received(true);
        metrics.inc_chat_published("ok");
        metrics.inc_message_id_rejections();
        metrics.inc_relay_addresses_derived(2);

        let text = metrics.gather();

        assert!(text.contains("network_peers_connected 3"));
        assert!(text.contains("uc_chat_messages_received_total{signed=\"true\"} 1"));
        assert!(text.contains("uc_chat_messages_published_total{result=\"ok\"} 1"));
        assert!(text.contains("uc_message_id_rejections_total 1"));
        assert!(text.contains("uc_relay_addresses_derived_total 2"));
    }

    #[test]
    fn registries_are_independent() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.inc_relay_addresses_derived(1);

        assert!(second.gather().contains("uc_relay_addresses_derived_total 0"));
    }
}
