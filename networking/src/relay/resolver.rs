use std::sync::Arc;

use metrics::SharedMetrics;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::address::{RelayAddress, derive_relay_addresses};
use crate::types::PeerAddressesChanged;

/// Presentation side of relay address derivation.
///
/// Calls are made synchronously from the resolver, once per derived
/// address. Implementations must not block for long.
pub trait RelayAddressSink: Send + Sync {
    /// Show `address`, replacing whatever was shown before.
    fn set_relay_address(&self, address: &RelayAddress);

    /// Arm the one-shot copy-to-clipboard affordance for the shown address.
    fn trigger_clipboard_copy(&self);
}

impl<S: RelayAddressSink + ?Sized> RelayAddressSink for Arc<S> {
    fn set_relay_address(&self, address: &RelayAddress) {
        (**self).set_relay_address(address);
    }

    fn trigger_clipboard_copy(&self) {
        (**self).trigger_clipboard_copy();
    }
}

/// Single-value presentation slot with last-write-wins semantics.
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct RelayAddressSlot {
    inner: Arc<Mutex<SlotState>>,
}

#[derive(Debug, Default)]
struct SlotState {
    current: Option<RelayAddress>,
    copy_requests: u64,
}

impl RelayAddressSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The address currently shown, if any.
    pub fn current(&self) -> Option<RelayAddress> {
        self.inner.lock().current.clone()
    }

    /// Number of copy affordances armed so far.
    pub fn copy_requests(&self) -> u64 {
        self.inner.lock().copy_requests
    }
}

impl RelayAddressSink for RelayAddressSlot {
    fn set_relay_address(&self, address: &RelayAddress) {
        self.inner.lock().current = Some(address.clone());
    }

    fn trigger_clipboard_copy(&self) {
        self.inner.lock().copy_requests += 1;
    }
}

/// Turns peer address changes into relay addresses and pushes them to a sink.
pub struct RelayAddressResolver<S: RelayAddressSink> {
    sink: S,
    metrics: Option<SharedMetrics>,
}

impl<S: RelayAddressSink> RelayAddressResolver<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Derive relay addresses for the changed peer and emit each to the sink.
    ///
    /// Emission follows the order of `event.addresses`; with several circuit
    /// addresses the sink ends up showing the last one. No circuit address
    /// means no sink call at all.
    pub fn resolve(&self, event: &PeerAddressesChanged) -> Vec<RelayAddress> {
        let derived = derive_relay_addresses(&event.peer_id.to_string(), &event.addresses);

        if derived.is_empty() {
            debug!(
                peer = %event.peer_id,
                addresses = event.addresses.len(),
                "No circuit relay address"
            );
            return derived;
        }

        for address in &derived {
            info!(peer = %event.peer_id, %address, "Listening on relay address");
            self.sink.set_relay_address(address);
            self.sink.trigger_clipboard_copy();
        }

        if let Some(metrics) = &self.metrics {
            metrics.inc_relay_addresses_derived(derived.len() as u64);
        }

        derived
    }
}
