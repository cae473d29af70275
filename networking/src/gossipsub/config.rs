use anyhow::{Result, anyhow};
use libp2p::gossipsub::{Config, ConfigBuilder, ValidationMode};
use std::time::Duration;

use crate::gossipsub::message::gossipsub_message_id;
use crate::gossipsub::topic::ChatTopic;

/// How long seen message ids are remembered for deduplication.
pub const DUPLICATE_CACHE_TIME: Duration = Duration::from_secs(60);

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct GossipsubConfig {
    pub config: Config,
    pub topics: Vec<ChatTopic>,
}

impl GossipsubConfig {
    pub fn new() -> Result<Self> {
        let config = ConfigBuilder::default()
            .heartbeat_interval(HEARTBEAT_INTERVAL)
            .check_explicit_peers_ticks(1)
            .duplicate_cache_time(DUPLICATE_CACHE_TIME)
            // Messages must be signed by their author; the id itself does
            // not depend on the signature.
            .validation_mode(ValidationMode::Strict)
            .message_id_fn(gossipsub_message_id)
            .build()
            .map_err(|err| anyhow!("Failed to build gossipsub config: {err:?}"))?;

        Ok(GossipsubConfig {
            config,
            topics: Vec::new(),
        })
    }

    pub fn set_topics(&mut self, topics: Vec<ChatTopic>) {
        self.topics = topics;
    }

    /// Whether delivered messages have had their signatures verified.
    pub fn verifies_signatures(&self) -> bool {
        matches!(self.config.validation_mode(), ValidationMode::Strict)
    }
}
