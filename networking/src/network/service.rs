use std::{fmt::Debug, net::IpAddr, sync::Arc};

use anyhow::{Result, anyhow};
use futures::StreamExt;
use libp2p::{
    Multiaddr, StreamProtocol, SwarmBuilder,
    connection_limits::{self, ConnectionLimits},
    gossipsub::{Event, IdentTopic, MessageAuthenticity},
    identify,
    kad::{self, store::MemoryStore},
    multiaddr::Protocol,
    noise,
    swarm::{Config, Swarm, SwarmEvent, behaviour::toggle::Toggle},
    tcp, yamux,
};
use libp2p_identity::{Keypair, PeerId};
use metrics::SharedMetrics;
use parking_lot::Mutex;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, trace, warn};

use crate::{
    bootnodes::{BootnodeSource, StaticBootnodes, peer_id_of},
    gossipsub::{
        self, GossipMessage, MESSAGE_ID_SCHEME, SequenceGuard, config::GossipsubConfig,
    },
    network::behaviour::{ChatBehaviour, ChatBehaviourEvent},
    session::ChatSession,
    types::{
        ChatCommand, ChatMessage, ConnectionState, EventSource, IDENTIFY_PROTOCOL_VERSION,
        KADEMLIA_PROTOCOL, MessageSink, Origin, PeerAddressesChanged,
    },
};

const REDIAL_INTERVAL: Duration = Duration::from_secs(30);
const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct NetworkServiceConfig {
    pub gossipsub_config: GossipsubConfig,
    pub socket_address: IpAddr,
    pub socket_port: u16,
    pub enable_kademlia: bool,
    bootnodes: StaticBootnodes,
    relays: StaticBootnodes,
}

impl NetworkServiceConfig {
    pub fn new(
        gossipsub_config: GossipsubConfig,
        socket_address: IpAddr,
        socket_port: u16,
        bootnodes: Vec<String>,
    ) -> Self {
        NetworkServiceConfig {
            gossipsub_config,
            socket_address,
            socket_port,
            enable_kademlia: true,
            bootnodes: StaticBootnodes::from_arguments(&bootnodes),
            relays: StaticBootnodes::default(),
        }
    }

    /// Relays to reserve a circuit slot on. Each value is parsed like a
    /// bootnode argument.
    pub fn with_relays(mut self, relays: Vec<String>) -> Self {
        self.relays = StaticBootnodes::from_arguments(&relays);
        self
    }

    pub fn with_kademlia(mut self, enable: bool) -> Self {
        self.enable_kademlia = enable;
        self
    }

    pub fn bootnodes(&self) -> &StaticBootnodes {
        &self.bootnodes
    }

    pub fn relays(&self) -> &StaticBootnodes {
        &self.relays
    }
}

#[derive(Debug)]
pub enum NetworkEvent {
    PeerConnectedIncoming(PeerId),
    PeerConnectedOutgoing(PeerId),
    PeerDisconnected(PeerId),
    LocalAddressesChanged(usize),
}

/// How a chat publish ended.
///
/// Publishing to a topic nobody else subscribes to and publishing a line
/// that was already seen are both normal for a chat node and are not
/// reported as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    NoPeers,
    Duplicate,
    Failed,
}

impl PublishOutcome {
    pub fn from_result<T, E: Debug>(result: &Result<T, E>) -> Self {
        let Err(err) = result else {
            return PublishOutcome::Published;
        };

        let err_str = format!("{err:?}");
        if err_str.contains("Duplicate") {
            PublishOutcome::Duplicate
        } else if err_str.contains("NoPeersSubscribedToTopic")
            || err_str.contains("InsufficientPeers")
        {
            PublishOutcome::NoPeers
        } else {
            PublishOutcome::Failed
        }
    }

    /// Whether the line is shown locally as sent by this node.
    pub fn echoes(&self) -> bool {
        matches!(self, PublishOutcome::Published | PublishOutcome::NoPeers)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublishOutcome::Published => "published",
            PublishOutcome::NoPeers => "no_peers",
            PublishOutcome::Duplicate => "duplicate",
            PublishOutcome::Failed => "failed",
        }
    }
}

pub struct NetworkService<R, S>
where
    R: EventSource<ChatCommand> + Send + 'static,
    S: MessageSink<ChatMessage> + Send + 'static,
{
    network_config: Arc<NetworkServiceConfig>,
    swarm: Swarm<ChatBehaviour>,
    session: Arc<Mutex<ChatSession>>,
    commands: R,
    chat_sink: S,
    address_events: mpsc::UnboundedSender<PeerAddressesChanged>,
    metrics: Option<SharedMetrics>,
}

impl<R, S> NetworkService<R, S>
where
    R: EventSource<ChatCommand> + Send + 'static,
    S: MessageSink<ChatMessage> + Send + 'static,
{
    pub async fn new(
        network_config: Arc<NetworkServiceConfig>,
        commands: R,
        chat_sink: S,
        address_events: mpsc::UnboundedSender<PeerAddressesChanged>,
        metrics: Option<SharedMetrics>,
    ) -> Result<Self> {
        let local_key = Keypair::generate_secp256k1();
        Self::new_with_keypair(
            network_config,
            commands,
            chat_sink,
            address_events,
            metrics,
            local_key,
        )
        .await
    }

    pub async fn new_with_keypair(
        network_config: Arc<NetworkServiceConfig>,
        commands: R,
        chat_sink: S,
        address_events: mpsc::UnboundedSender<PeerAddressesChanged>,
        metrics: Option<SharedMetrics>,
        local_key: Keypair,
    ) -> Result<Self> {
        let identify = Self::build_identify(&local_key);
        let gossipsub = Self::build_gossipsub(&local_key, &network_config, metrics.clone())?;
        let kademlia = Self::build_kademlia(&local_key, &network_config);
        let connection_limits = connection_limits::Behaviour::new(
            ConnectionLimits::default()
                .with_max_pending_incoming(Some(5))
                .with_max_pending_outgoing(Some(16))
                .with_max_established_per_peer(Some(2)),
        );

        let swarm = SwarmBuilder::with_existing_identity(local_key.clone())
            .with_tokio()
            .with_tcp(
                tcp::Config::default(),
                noise::Config::new,
                yamux::Config::default,
            )?
            .with_quic()
            .with_dns()?
            .with_relay_client(noise::Config::new, yamux::Config::default)?
            .with_behaviour(|_, relay_client| ChatBehaviour {
                identify,
                gossipsub,
                kademlia,
                relay_client,
                connection_limits,
            })?
            .with_swarm_config(|_| {
                Config::with_tokio_executor().with_idle_connection_timeout(IDLE_CONNECTION_TIMEOUT)
            })
            .build();

        let session = ChatSession::new(*swarm.local_peer_id());

        let mut service = Self {
            network_config,
            swarm,
            session: Arc::new(Mutex::new(session)),
            commands,
            chat_sink,
            address_events,
            metrics,
        };

        for addr in Self::multiaddrs(&service.network_config) {
            service.listen(&addr)?;
        }
        service.listen_through_relays();
        service.subscribe_to_topics()?;

        Ok(service)
    }

    pub async fn start(&mut self) -> Result<()> {
        info!(
            peer = %self.local_peer_id(),
            message_id_scheme = MESSAGE_ID_SCHEME,
            "Chat node started"
        );

        // Periodic reconnect attempts to bootnodes
        let mut reconnect_interval = interval(REDIAL_INTERVAL);
        reconnect_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            select! {
                _ = reconnect_interval.tick() => {
                    self.connect_to_peers(self.network_config.bootnodes.to_multiaddrs());
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.dispatch_command(command).await,
                        None => {
                            info!("Command channel closed, stopping network service");
                            return Ok(());
                        }
                    }
                }
                event = self.swarm.select_next_some() => {
                    if let Some(event) = self.parse_swarm_event(event).await {
                        info!(?event, "Swarm event");
                    }
                }
            }
        }
    }

    async fn parse_swarm_event(
        &mut self,
        event: SwarmEvent<ChatBehaviourEvent>,
    ) -> Option<NetworkEvent> {
        match event {
            SwarmEvent::Behaviour(ChatBehaviourEvent::Gossipsub(event)) => {
                self.handle_gossipsub_event(event).await
            }
            SwarmEvent::Behaviour(ChatBehaviourEvent::Identify(event)) => {
                self.handle_identify_event(event)
            }
            SwarmEvent::Behaviour(ChatBehaviourEvent::Kademlia(event)) => {
                debug!(?event, "Kademlia event");
                None
            }
            SwarmEvent::Behaviour(ChatBehaviourEvent::RelayClient(event)) => {
                info!(?event, "Relay client event");
                None
            }
            SwarmEvent::Behaviour(_) => {
                // ConnectionLimits behaviour has no events
                None
            }
            SwarmEvent::ConnectionEstablished {
                peer_id, endpoint, ..
            } => {
                let remote_addr = endpoint.get_remote_address().clone();
                let connected = {
                    let mut session = self.session.lock();
                    session.set_peer_state(peer_id, ConnectionState::Connected);
                    session.record_connection(remote_addr.clone());
                    session.connected_peers()
                };

                let direction = if endpoint.is_dialer() {
                    "outbound"
                } else {
                    "inbound"
                };
                if let Some(metrics) = &self.metrics {
                    metrics.set_peers(connected as i64);
                    metrics.inc_peer_connection(direction, "success");
                }

                info!(peer = %peer_id, %remote_addr, "Connected to peer (total: {})", connected);

                if endpoint.is_dialer() {
                    Some(NetworkEvent::PeerConnectedOutgoing(peer_id))
                } else {
                    Some(NetworkEvent::PeerConnectedIncoming(peer_id))
                }
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                endpoint,
                num_established,
                ..
            } => {
                let connected = {
                    let mut session = self.session.lock();
                    session.remove_connection(endpoint.get_remote_address());
                    if num_established == 0 {
                        session.set_peer_state(peer_id, ConnectionState::Disconnected);
                    }
                    session.connected_peers()
                };

                if let Some(metrics) = &self.metrics {
                    metrics.set_peers(connected as i64);
                }

                info!(peer = %peer_id, "Disconnected from peer (total: {})", connected);
                (num_established == 0).then_some(NetworkEvent::PeerDisconnected(peer_id))
            }
            SwarmEvent::IncomingConnection { local_addr, .. } => {
                debug!(?local_addr, "Incoming connection");
                None
            }
            SwarmEvent::Dialing { peer_id, .. } => {
                debug!(?peer_id, "Dialing peer");
                None
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                if let Some(peer_id) = peer_id {
                    self.session
                        .lock()
                        .set_peer_state(peer_id, ConnectionState::Disconnected);
                }
                if let Some(metrics) = &self.metrics {
                    metrics.inc_peer_connection("outbound", "error");
                }
                warn!(?peer_id, ?error, "Failed to connect to peer");
                None
            }
            SwarmEvent::NewListenAddr {
                listener_id,
                address,
            } => {
                info!(?listener_id, %address, "New listen address");
                self.add_local_address(address)
            }
            SwarmEvent::ExpiredListenAddr { address, .. } => {
                info!(%address, "Listen address expired");
                self.remove_local_address(&address)
            }
            SwarmEvent::NewExternalAddrCandidate { address } => {
                // Observed by a remote peer, not verified.
                debug!(%address, "New external address candidate");
                None
            }
            SwarmEvent::ExternalAddrConfirmed { address } => {
                info!(%address, "External address confirmed");
                self.add_local_address(address)
            }
            SwarmEvent::ExternalAddrExpired { address } => {
                info!(%address, "External address expired");
                self.remove_local_address(&address)
            }
            _ => {
                trace!(?event, "Unhandled swarm event");
                None
            }
        }
    }

    fn add_local_address(&mut self, address: Multiaddr) -> Option<NetworkEvent> {
        let change = {
            let mut session = self.session.lock();
            session
                .add_listen_addr(address)
                .then(|| session.address_change())
        };
        change.map(|change| self.raise_address_change(change))
    }

    fn remove_local_address(&mut self, address: &Multiaddr) -> Option<NetworkEvent> {
        let change = {
            let mut session = self.session.lock();
            session
                .remove_listen_addr(address)
                .then(|| session.address_change())
        };
        change.map(|change| self.raise_address_change(change))
    }

    fn raise_address_change(&self, change: PeerAddressesChanged) -> NetworkEvent {
        let count = change.addresses.len();
        if let Err(err) = self.address_events.send(change) {
            warn!("failed to raise address change: {err}");
        }
        NetworkEvent::LocalAddressesChanged(count)
    }

    async fn handle_gossipsub_event(&mut self, event: Event) -> Option<NetworkEvent> {
        match event {
            Event::Subscribed { peer_id, topic } => {
                info!(peer = %peer_id, topic = %topic, "A peer subscribed to topic");
            }
            Event::Unsubscribed { peer_id, topic } => {
                info!(peer = %peer_id, topic = %topic, "A peer unsubscribed from topic");
            }
            Event::Message {
                propagation_source,
                message_id,
                message,
            } => {
                let signed = self.network_config.gossipsub_config.verifies_signatures()
                    && message.source.is_some();
                let gossip = GossipMessage::from_gossipsub(&message, signed);

                debug!(
                    %message_id,
                    from = ?message.source,
                    via = %propagation_source,
                    seqno = ?message.sequence_number,
                    "Received chat message"
                );

                if let Some(metrics) = &self.metrics {
                    metrics.inc_chat_received(signed);
                }

                let chat = ChatMessage {
                    topic: gossip.topic.clone(),
                    from: gossip.source,
                    text: gossip.text(),
                    signed,
                    origin: self.session.lock().origin_of(gossip.source.as_ref()),
                };

                if let Err(err) = self.chat_sink.send(chat).await {
                    warn!("failed to deliver chat message: {err:?}");
                }
            }
            _ => {
                debug!(?event, "Unhandled gossipsub event");
            }
        }
        None
    }

    fn handle_identify_event(&mut self, event: identify::Event) -> Option<NetworkEvent> {
        match event {
            identify::Event::Received {
                peer_id,
                info,
                connection_id: _,
            } => {
                info!(
                    peer = %peer_id,
                    agent_version = %info.agent_version,
                    protocol_version = %info.protocol_version,
                    listen_addrs = info.listen_addrs.len(),
                    protocols = info.protocols.len(),
                    "Received peer info"
                );

                let speaks_kademlia = info
                    .protocols
                    .iter()
                    .any(|protocol| protocol.as_ref() == KADEMLIA_PROTOCOL);

                if speaks_kademlia
                    && let Some(kademlia) = self.swarm.behaviour_mut().kademlia.as_mut()
                {
                    for addr in info.listen_addrs {
                        kademlia.add_address(&peer_id, addr);
                    }
                }

                None
            }
            identify::Event::Sent { peer_id, .. } => {
                trace!(peer = %peer_id, "Sent identify info");
                None
            }
            identify::Event::Pushed { peer_id, .. } => {
                trace!(peer = %peer_id, "Pushed identify update");
                None
            }
            identify::Event::Error { peer_id, error, .. } => {
                warn!(peer = %peer_id, ?error, "Identify error");
                None
            }
        }
    }

    fn connect_to_peers(&mut self, peers: Vec<Multiaddr>) {
        if peers.is_empty() {
            return;
        }

        debug!(?peers, "Redialing bootnodes");
        for peer in peers {
            if let Some(peer_id) = peer_id_of(&peer)
                && peer_id != self.local_peer_id()
            {
                let current_state = self.session.lock().peer_state(&peer_id);
                if !matches!(current_state, Some(ConnectionState::Disconnected) | None) {
                    trace!(?peer_id, "Already connected");
                    continue;
                }

                if let Err(err) = self.swarm.dial(peer.clone()) {
                    warn!(?err, "Failed to dial peer");
                    continue;
                }

                info!(peer = %peer_id, "Dialing peer");
                self.session
                    .lock()
                    .set_peer_state(peer_id, ConnectionState::Connecting);
            }
        }
    }

    async fn dispatch_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::Publish(text) => self.publish_chat(text).await,
            ChatCommand::Dial(addr) => {
                if let Err(err) = self.swarm.dial(addr.clone()) {
                    warn!(%addr, ?err, "Failed to dial");
                    return;
                }

                info!(%addr, "Dialing");
                if let Some(peer_id) = peer_id_of(&addr) {
                    self.session
                        .lock()
                        .set_peer_state(peer_id, ConnectionState::Connecting);
                }
            }
        }
    }

    async fn publish_chat(&mut self, text: String) {
        let Some(topic) = self.network_config.gossipsub_config.topics.first().cloned() else {
            warn!("No chat topic configured, dropping message");
            return;
        };

        let result = self
            .swarm
            .behaviour_mut()
            .gossipsub
            .publish(IdentTopic::from(topic.clone()), text.clone().into_bytes());
        let outcome = PublishOutcome::from_result(&result);

        match &result {
            Ok(message_id) => debug!(%message_id, "Published chat message"),
            Err(err) if outcome == PublishOutcome::Failed => {
                warn!(?err, "Publish chat message failed")
            }
            Err(err) => debug!(?err, "Publish chat message: {}", outcome.as_str()),
        }

        if let Some(metrics) = &self.metrics {
            metrics.inc_chat_published(outcome.as_str());
        }

        if !outcome.echoes() {
            return;
        }

        let chat = ChatMessage {
            topic: topic.to_string(),
            from: Some(self.local_peer_id()),
            text,
            signed: true,
            origin: Origin::Me,
        };

        if let Err(err) = self.chat_sink.send(chat).await {
            warn!("failed to deliver own chat message: {err:?}");
        }
    }

    pub fn session(&self) -> Arc<Mutex<ChatSession>> {
        self.session.clone()
    }

    pub fn local_peer_id(&self) -> PeerId {
        *self.swarm.local_peer_id()
    }

    /// Addresses the swarm advertises as confirmed external addresses.
    pub fn external_addresses(&self) -> Vec<Multiaddr> {
        self.swarm.external_addresses().cloned().collect()
    }

    pub fn swarm_mut(&mut self) -> &mut Swarm<ChatBehaviour> {
        &mut self.swarm
    }

    fn build_gossipsub(
        local_key: &Keypair,
        cfg: &NetworkServiceConfig,
        metrics: Option<SharedMetrics>,
    ) -> Result<gossipsub::GossipsubBehaviour> {
        let transform = match metrics {
            Some(metrics) => SequenceGuard::with_metrics(metrics),
            None => SequenceGuard::new(),
        };

        gossipsub::GossipsubBehaviour::new_with_transform(
            MessageAuthenticity::Signed(local_key.clone()),
            cfg.gossipsub_config.config.clone(),
            transform,
        )
        .map_err(|err| anyhow!("Failed to create gossipsub behaviour: {err:?}"))
    }

    fn build_identify(local_key: &Keypair) -> identify::Behaviour {
        let identify_config =
            identify::Config::new(IDENTIFY_PROTOCOL_VERSION.into(), local_key.public())
                .with_agent_version(format!("uc-chat/{}", env!("CARGO_PKG_VERSION")));

        identify::Behaviour::new(identify_config)
    }

    fn build_kademlia(
        local_key: &Keypair,
        cfg: &NetworkServiceConfig,
    ) -> Toggle<kad::Behaviour<MemoryStore>> {
        if !cfg.enable_kademlia {
            return Toggle::from(None);
        }

        let peer_id = local_key.public().to_peer_id();
        let kad_config = kad::Config::new(StreamProtocol::new(KADEMLIA_PROTOCOL));
        let mut kademlia =
            kad::Behaviour::with_config(peer_id, MemoryStore::new(peer_id), kad_config);
        kademlia.set_mode(Some(kad::Mode::Client));

        Toggle::from(Some(kademlia))
    }

    fn multiaddrs(cfg: &NetworkServiceConfig) -> Vec<Multiaddr> {
        let tcp = Multiaddr::from(cfg.socket_address).with(Protocol::Tcp(cfg.socket_port));
        let quic = Multiaddr::from(cfg.socket_address)
            .with(Protocol::Udp(cfg.socket_port))
            .with(Protocol::QuicV1);
        vec![tcp, quic]
    }

    fn listen(&mut self, addr: &Multiaddr) -> Result<()> {
        self.swarm
            .listen_on(addr.clone())
            .map_err(|e| anyhow!("Failed to listen on {addr:?}: {e:?}"))?;
        info!(%addr, "Listening on");
        Ok(())
    }

    fn listen_through_relays(&mut self) {
        for relay in self.network_config.relays.to_multiaddrs() {
            let circuit = relay.with(Protocol::P2pCircuit);
            match self.swarm.listen_on(circuit.clone()) {
                Ok(_) => info!(%circuit, "Listening through relay"),
                Err(err) => warn!(%circuit, ?err, "Failed to listen through relay"),
            }
        }
    }

    fn subscribe_to_topics(&mut self) -> Result<()> {
        for topic in &self.network_config.gossipsub_config.topics {
            self.swarm
                .behaviour_mut()
                .gossipsub
                .subscribe(&IdentTopic::from(topic.clone()))
                .map_err(|e| anyhow!("Subscribe failed for {topic:?}: {e:?}"))?;
            info!(topic = %topic, "Subscribed to topic");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use libp2p::gossipsub::PublishError;

    use super::*;

    #[test]
    fn test_publish_outcome_success() {
        let result: Result<(), PublishError> = Ok(());
        let outcome = PublishOutcome::from_result(&result);

        assert_eq!(outcome, PublishOutcome::Published);
        assert!(outcome.echoes());
    }

    #[test]
    fn test_duplicate_publish_is_not_a_failure() {
        let result: Result<(), PublishError> = Err(PublishError::Duplicate);
        let outcome = PublishOutcome::from_result(&result);

        assert_eq!(outcome, PublishOutcome::Duplicate);
        assert!(!outcome.echoes());
    }

    #[test]
    fn test_publish_without_peers_still_echoes() {
        let result: Result<(), &str> = Err("NoPeersSubscribedToTopic");
        let outcome = PublishOutcome::from_result(&result);

        assert_eq!(outcome, PublishOutcome::NoPeers);
        assert!(outcome.echoes());
    }

    #[test]
    fn test_other_publish_errors_fail() {
        let result: Result<(), PublishError> = Err(PublishError::MessageTooLarge);
        let outcome = PublishOutcome::from_result(&result);

        assert_eq!(outcome, PublishOutcome::Failed);
        assert_eq!(outcome.as_str(), "failed");
    }

    #[test]
    fn test_config_parses_bootnodes_and_relays() {
        let config = NetworkServiceConfig::new(
            GossipsubConfig::new().unwrap(),
            "127.0.0.1".parse().unwrap(),
            0,
            vec!["/ip4/10.0.0.1/tcp/9092".into(), "bogus".into()],
        )
        .with_relays(vec!["/ip4/10.0.0.2/tcp/4001".into()])
        .with_kademlia(false);

        assert_eq!(config.bootnodes().len(), 1);
        assert_eq!(config.relays().len(), 1);
        assert!(!config.enable_kademlia);
    }
}
