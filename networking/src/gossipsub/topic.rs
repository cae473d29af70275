/// Gossipsub Topics
///
/// Topic definitions for the chat gossip network.
///
/// ## Overview
///
/// Chat peers publish and subscribe on a single, flat topic name. Unlike
/// structured topic schemes there is no prefix, fork or encoding suffix:
/// the topic string is the channel name and is hashed as-is
/// (`IdentTopic`), so peers written against other libp2p
/// implementations see the same topic hash.
///
/// | Topic                    | Content                           |
/// |--------------------------|-----------------------------------|
/// | `universal-connectivity` | UTF-8 chat lines                  |
use libp2p::gossipsub::{IdentTopic, TopicHash};

/// Default chat channel shared by every client of the network.
pub const CHAT_TOPIC: &str = "universal-connectivity";

/// A chat channel topic.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ChatTopic {
    /// Channel name, used verbatim as the topic string.
    pub name: String,
}

impl ChatTopic {
    /// Create a topic for the given channel name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The default chat channel.
    pub fn chat() -> Self {
        Self::new(CHAT_TOPIC)
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Decode a TopicHash into a ChatTopic.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic string is empty.
    pub fn decode(topic: &TopicHash) -> Result<Self, String> {
        let name = topic.as_str();
        if name.is_empty() {
            return Err("Empty topic".to_string());
        }
        Ok(Self::new(name))
    }

    pub fn hash(&self) -> TopicHash {
        TopicHash::from_raw(self.name.clone())
    }
}

impl Default for ChatTopic {
    fn default() -> Self {
        Self::chat()
    }
}

impl std::fmt::Display for ChatTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<ChatTopic> for IdentTopic {
    fn from(topic: ChatTopic) -> IdentTopic {
        IdentTopic::new(topic.name)
    }
}

impl From<ChatTopic> for TopicHash {
    fn from(val: ChatTopic) -> Self {
        val.hash()
    }
}

/// Get the topics for the given channel names.
///
/// Falls back to the default chat channel when no names are given.
pub fn get_topics(names: &[String]) -> Vec<ChatTopic> {
    if names.is_empty() {
        return vec![ChatTopic::chat()];
    }
    names.iter().map(ChatTopic::new).collect()
}
