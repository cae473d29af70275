//! Relay address derivation.
//!
//! A peer that cannot be reached directly reserves a slot on a circuit
//! relay and becomes reachable at `<relay addr>/p2p-circuit`. Browser peers
//! connect to such a peer over WebRTC, signalled through the relay, by
//! dialing the circuit address extended with `/webrtc/p2p/<peer id>`.
//!
//! - [`address`]: detection of circuit addresses and derivation of the
//!   WebRTC relay address
//! - [`resolver`]: applies the derivation to an address change and feeds a
//!   presentation sink
//! - [`handler`]: consumes address change events from a queue in order
pub mod address;
pub mod handler;
pub mod resolver;

#[cfg(test)]
mod tests;

pub use address::{RelayAddress, WEBRTC_PEER_SUFFIX, derive_relay_addresses, is_circuit_address};
pub use handler::RelayAddressHandler;
pub use resolver::{RelayAddressResolver, RelayAddressSink, RelayAddressSlot};
