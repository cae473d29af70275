mod behaviour;
mod service;

pub use behaviour::{ChatBehaviour, ChatBehaviourEvent};
pub use service::{NetworkEvent, NetworkService, NetworkServiceConfig, PublishOutcome};
