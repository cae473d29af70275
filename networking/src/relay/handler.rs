use tracing::debug;

use super::resolver::{RelayAddressResolver, RelayAddressSink};
use crate::types::{EventSource, PeerAddressesChanged};

/// Dedicated consumer of peer address change notifications.
///
/// Events are taken off the queue and resolved one at a time, so changes
/// for the same peer reach the sink in the order they were raised and a
/// stale address never overwrites a newer one.
pub struct RelayAddressHandler<S: RelayAddressSink> {
    resolver: RelayAddressResolver<S>,
}

impl<S: RelayAddressSink> RelayAddressHandler<S> {
    pub fn new(resolver: RelayAddressResolver<S>) -> Self {
        Self { resolver }
    }

    /// Consume events until the source is closed.
    ///
    /// Returns the number of events handled.
    pub async fn run<E>(self, mut events: E) -> usize
    where
        E: EventSource<PeerAddressesChanged>,
    {
        let mut handled = 0;
        while let Some(event) = events.recv().await {
            self.resolver.resolve(&event);
            handled += 1;
        }

        debug!(handled, "Peer address event source closed");
        handled
    }
}
