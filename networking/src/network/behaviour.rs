use libp2p::{
    connection_limits, identify,
    kad::{self, store::MemoryStore},
    relay,
    swarm::{NetworkBehaviour, behaviour::toggle::Toggle},
};

use crate::gossipsub::GossipsubBehaviour;

#[derive(NetworkBehaviour)]
pub struct ChatBehaviour {
    pub identify: identify::Behaviour,
    pub gossipsub: GossipsubBehaviour,
    /// Disabled with `--disable-kademlia`.
    pub kademlia: Toggle<kad::Behaviour<MemoryStore>>,
    pub relay_client: relay::client::Behaviour,
    pub connection_limits: connection_limits::Behaviour,
}
