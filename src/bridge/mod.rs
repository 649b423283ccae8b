//! MQTT Bridge Topics
//!
//! Topic rules for bridges between this broker and remote brokers.
//! Rules can forward messages, remap topic prefixes as messages cross the
//! bridge, and mirror local subscriptions upstream so the remote broker sees
//! one merged subscription instead of one per local client.
//!
//! # Prefix Remapping
//!
//! A rule `x/y in 0 local/ remote/` makes the remote topic `remote/x/y`
//! arrive locally as `local/x/y`. Prefixes are joined to topics verbatim, so
//! they normally end with `/`.
//!
//! # Example Configuration
//!
//! ```toml
//! [[bridge]]
//! name = "cloud"
//! address = "cloud.example.com:1883"
//! topics = [
//!   "sensors/# out 1 edge/ cloud/",
//!   { pattern = "status/+", direction = "sub", qos = 1 },
//! ]
//! ```

mod error;
mod mirror;
mod registry;
mod remap;
mod topic;


pub use error::{BridgeError, Result};
pub use mirror::{MirroredGuard, MirroredSubscriptions, UpstreamRequest};
pub use registry::BridgeRegistry;
pub use remap::{build_prefix, concat_topic, PrefixSide};
pub use topic::{Bridge, BridgeTopic};

// Re-export config types from the config module for convenience
pub use crate::config::{BridgeConfig, BridgeTopicConfig, Direction};
