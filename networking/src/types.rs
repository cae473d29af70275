use std::fmt::Display;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use libp2p::{Multiaddr, PeerId};
use tokio::sync::mpsc;

/// Kademlia protocol spoken by chat peers. Peers only join each other's
/// routing tables if they advertise it.
pub const KADEMLIA_PROTOCOL: &str = "/universal-connectivity/lan/kad/1.0.0";

/// Protocol version announced through identify.
pub const IDENTIFY_PROTOCOL_VERSION: &str = "ipfs/0.1.0";

/// Number of trailing peer id characters shown next to a chat line.
pub const SHORT_PEER_ID_LEN: usize = 4;

/// Peer connection state machine.
///
/// DISCONNECTED -> CONNECTING -> CONNECTED -> DISCONNECTING -> DISCONNECTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Notification that the known addresses of a peer changed.
///
/// Carries the full current address set, not a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddressesChanged {
    pub peer_id: PeerId,
    pub addresses: Vec<Multiaddr>,
}

/// Who wrote a chat line, relative to this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Me,
    Them,
}

impl Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Me => f.write_str("me"),
            Origin::Them => f.write_str("them"),
        }
    }
}

/// A chat line delivered to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub topic: String,
    pub from: Option<PeerId>,
    pub text: String,
    pub signed: bool,
    pub origin: Origin,
}

impl ChatMessage {
    /// Last characters of the author's peer id, or `"????"` if anonymous.
    pub fn short_sender(&self) -> String {
        match &self.from {
            Some(peer_id) => {
                let id = peer_id.to_string();
                let start = id
                    .char_indices()
                    .rev()
                    .nth(SHORT_PEER_ID_LEN - 1)
                    .map_or(0, |(index, _)| index);
                id[start..].to_string()
            }
            None => "?".repeat(SHORT_PEER_ID_LEN),
        }
    }

    /// Only messages with a verified author are shown; the rest are discarded.
    pub fn should_display(&self) -> bool {
        self.signed
    }
}

impl Display for ChatMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.origin {
            Origin::Me => write!(f, "[me] {}", self.text),
            Origin::Them => write!(f, "[{}] {}", self.short_sender(), self.text),
        }
    }
}

/// Requests from the UI to the network task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Publish a chat line on the chat topic.
    Publish(String),
    /// Dial a peer at the given address.
    Dial(Multiaddr),
}

#[async_trait]
pub trait MessageSink<M>: Send + Sync + Clone {
    async fn send(&self, message: M) -> Result<()>;
}

#[async_trait]
impl<M: Send + 'static> MessageSink<M> for mpsc::UnboundedSender<M> {
    async fn send(&self, message: M) -> Result<()> {
        mpsc::UnboundedSender::send(self, message)
            .map_err(|err| anyhow!("failed to deliver message: {err}"))
    }
}

#[async_trait]
pub trait EventSource<T>: Send {
    async fn recv(&mut self) -> Option<T>;
}

#[async_trait]
impl<T: Send + 'static> EventSource<T> for mpsc::UnboundedReceiver<T> {
    async fn recv(&mut self) -> Option<T> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}
