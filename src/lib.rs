//! VibeMQ Bridge - topic remapping and subscription mirroring for MQTT bridges
//!
//! Turns bridge topic rules into validated, prefix-aware forwarding rules,
//! rewrites topics arriving from a remote broker, and keeps one merged
//! upstream subscription per distinct local subscription covered by a
//! bridge's `sub` rules.

pub mod bridge;
pub mod config;
pub mod protocol;
pub mod topic;

pub use bridge::{Bridge, BridgeError, BridgeRegistry, BridgeTopic, UpstreamRequest};
pub use config::Config;
pub use protocol::QoS;
pub use topic::TopicTokens;
