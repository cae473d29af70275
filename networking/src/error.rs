/// Errors raised by the chat protocol core.
///
/// Both variants are terminal for the message or event that caused them:
/// the caller drops it and carries on. Nothing here is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The message cannot be identified, e.g. it carries no sequence number.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// An address string did not parse as a multiaddr.
    #[error("malformed address {address:?}: {reason}")]
    MalformedAddress { address: String, reason: String },
}

impl NetworkError {
    pub fn missing_sequence_number() -> Self {
        NetworkError::InvalidMessage("missing sequence number".to_string())
    }
}

impl From<NetworkError> for std::io::Error {
    fn from(err: NetworkError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}
