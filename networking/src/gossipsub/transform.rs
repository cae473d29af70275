use libp2p::gossipsub::{DataTransform, Message, RawMessage, TopicHash};
use metrics::SharedMetrics;
use tracing::debug;

use crate::error::NetworkError;

/// Inbound gate in front of the message id function.
///
/// The engine transforms a received message before asking for its id, and
/// drops the message if the transform fails. Rejecting messages without a
/// sequence number here is what lets identification fail cleanly.
/// Payloads pass through untouched in both directions.
#[derive(Clone, Default)]
pub struct SequenceGuard {
    metrics: Option<SharedMetrics>,
}

impl SequenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: SharedMetrics) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }
}

impl DataTransform for SequenceGuard {
    fn inbound_transform(&self, raw_message: RawMessage) -> Result<Message, std::io::Error> {
        if raw_message.sequence_number.is_none() {
            debug!(
                topic = %raw_message.topic,
                source = ?raw_message.source,
                "dropping gossip message without sequence number"
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_message_id_rejections();
            }
            return Err(NetworkError::missing_sequence_number().into());
        }

        Ok(Message {
            topic: raw_message.topic,
            data: raw_message.data,
            sequence_number: raw_message.sequence_number,
            source: raw_message.source,
        })
    }

    fn outbound_transform(
        &self,
        _topic: &TopicHash,
        data: Vec<u8>,
    ) -> Result<Vec<u8>, std::io::Error> {
        Ok(data)
    }
}
