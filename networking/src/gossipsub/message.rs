/// Gossipsub Message
///
/// Message representation and ID computation for the chat gossip network.
///
/// ## Overview
///
/// Each gossipsub message carries a topic, an optional author, a
/// per-author sequence number and a payload. The pubsub engine asks for a
/// message id on every message it handles, published or received, and
/// suppresses any message whose id it has already seen.
///
/// ## Message ID Function
///
/// ```text
/// message_id = SHA256(utf8(decimal(sequence_number)))
/// ```
///
/// | Component        | Description                                          |
/// |------------------|------------------------------------------------------|
/// | sequence_number  | Author-assigned `u64`, rendered as base-10 text      |
/// | utf8             | Text encoded as UTF-8 bytes                          |
/// | SHA256           | Full 32-byte digest, used raw (not hex)              |
///
/// Topic, payload, author and signature state do not take part, so the
/// id does not depend on signature verification having happened.
///
/// ## Network-wide Agreement
///
/// Every peer on the topic must derive ids with this exact function.
/// Peers using different functions disagree on what is a duplicate: one
/// side forwards what the other suppresses. The scheme is named by
/// [`MESSAGE_ID_SCHEME`]; a change to the derivation must come with a new
/// scheme name, since mixing old and new peers splits the dedup space.
///
/// ## Known Limitation
///
/// Sequence numbers are only unique per author. Two authors that happen
/// to pick the same sequence number produce the same id, and whichever
/// arrives second is dropped as a duplicate.
use libp2p::PeerId;
use libp2p::gossipsub::{Message, MessageId};
use sha2::{Digest, Sha256};
use tracing::error;

use crate::error::NetworkError;
use crate::gossipsub::types::{MESSAGE_DIGEST_LEN, MessageDigest};

/// Name and version of the message id derivation in use.
pub const MESSAGE_ID_SCHEME: &str = "sha256-seqno/1";

/// A gossip message as seen by the identity function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipMessage {
    /// Topic the message was published on.
    pub topic: String,

    /// Author of the message. Not yet trusted at identity time.
    pub source: Option<PeerId>,

    /// Author-assigned counter. Required for identification.
    pub sequence_number: Option<u64>,

    /// Raw payload (UTF-8 chat text for the chat topic).
    pub payload: Vec<u8>,

    /// Whether the transport verified the author's signature.
    pub signed: bool,
}

impl GossipMessage {
    pub fn new(topic: impl Into<String>, sequence_number: Option<u64>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            source: None,
            sequence_number,
            payload,
            signed: false,
        }
    }

    pub fn with_source(mut self, source: PeerId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    /// Build the typed view of a message delivered by the gossipsub engine.
    ///
    /// `signed` states whether the engine verified the signature, which
    /// depends on its validation mode rather than on the message itself.
    pub fn from_gossipsub(message: &Message, signed: bool) -> Self {
        Self {
            topic: message.topic.as_str().to_string(),
            source: message.source,
            sequence_number: message.sequence_number,
            payload: message.data.clone(),
            signed,
        }
    }

    /// Compute this message's id.
    pub fn id(&self) -> Result<MessageDigest, NetworkError> {
        compute_message_id(self)
    }

    /// Payload decoded as text, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Computes the message id of a gossip message.
///
/// Only the sequence number is used; see the module docs.
///
/// # Errors
///
/// Returns [`NetworkError::InvalidMessage`] if the message has no
/// sequence number. No placeholder id is ever produced.
pub fn compute_message_id(message: &GossipMessage) -> Result<MessageDigest, NetworkError> {
    digest_sequence_number(message.sequence_number)
}

/// Hashes the decimal text of a sequence number.
pub fn digest_sequence_number(
    sequence_number: Option<u64>,
) -> Result<MessageDigest, NetworkError> {
    let sequence_number = sequence_number.ok_or_else(NetworkError::missing_sequence_number)?;

    let encoded = sequence_number.to_string();
    let hash = Sha256::digest(encoded.as_bytes());

    let mut bytes = [0u8; MESSAGE_DIGEST_LEN];
    bytes.copy_from_slice(&hash);
    Ok(MessageDigest(bytes))
}

/// Message id function registered with the gossipsub engine.
///
/// The engine cannot be told that identification failed, so messages
/// without a sequence number must never reach this function: inbound ones
/// are rejected by [`SequenceGuard`](crate::gossipsub::transform::SequenceGuard)
/// before the engine asks for an id, and outbound ones always carry a
/// sequence number under signed authenticity.
pub fn gossipsub_message_id(message: &Message) -> MessageId {
    match digest_sequence_number(message.sequence_number) {
        Ok(digest) => digest.into(),
        Err(err) => {
            error!(%err, topic = %message.topic, "message reached id function unguarded");
            MessageId::new(&[])
        }
    }
}
