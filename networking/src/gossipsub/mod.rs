pub mod config;
pub mod message;
pub mod topic;
pub mod transform;
pub mod types;


use libp2p::gossipsub::{AllowAllSubscriptionFilter, Behaviour};

pub type GossipsubBehaviour = Behaviour<SequenceGuard, AllowAllSubscriptionFilter>;

// Re-export commonly used types
pub use config::GossipsubConfig;
pub use message::{
    GossipMessage, MESSAGE_ID_SCHEME, compute_message_id, digest_sequence_number,
    gossipsub_message_id,
};
pub use topic::{CHAT_TOPIC, ChatTopic, get_topics};
pub use transform::SequenceGuard;
pub use types::{MESSAGE_DIGEST_LEN, MessageDigest};
