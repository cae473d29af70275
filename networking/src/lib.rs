pub mod bootnodes;
pub mod error;
pub mod gossipsub;
pub mod network;
pub mod relay;
pub mod session;
pub mod types;
