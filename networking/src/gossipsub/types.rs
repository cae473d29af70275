/// Gossipsub Type Definitions
///
/// Value types shared by the message identity function and its callers.
use std::fmt;

use libp2p::gossipsub::MessageId;

/// Length of a message digest in bytes (raw SHA-256 output).
pub const MESSAGE_DIGEST_LEN: usize = 32;

/// 32-byte message identifier.
///
/// Computed from the message's sequence number only:
/// `SHA256(utf8(decimal(sequence_number)))`
///
/// Used verbatim (not hex-encoded) as the gossipsub message id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageDigest(pub [u8; MESSAGE_DIGEST_LEN]);

impl MessageDigest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<MessageDigest> for MessageId {
    fn from(digest: MessageDigest) -> Self {
        MessageId::new(&digest.0)
    }
}

impl fmt::Display for MessageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for MessageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageDigest({self})")
    }
}
