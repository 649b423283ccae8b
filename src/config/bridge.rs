//! Bridge Configuration
//!
//! Configuration structures for bridges and their topic rules.
//!
//! A topic rule is written either as a table or as a single line in the
//! classic bridge syntax:
//!
//! ```text
//! <pattern> [[[out | in | both | sub] qos-level] local-prefix remote-prefix]
//! ```
//!
//! where `""` stands for an absent pattern or prefix.

use std::str::FromStr;

use serde::Deserialize;

use crate::bridge::BridgeError;

/// Marker used in line syntax for "no pattern" / "no prefix"
pub const EMPTY_MARKER: &str = "\"\"";

/// Direction of a bridge topic rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Forward local publishes to the remote broker
    #[default]
    Out,
    /// Forward remote publishes to the local broker
    In,
    /// Bidirectional forwarding
    Both,
    /// Mirror matching local subscriptions upstream
    Sub,
}

impl Direction {
    /// Check if this rule applies to messages received from the remote broker
    pub fn is_inbound(&self) -> bool {
        matches!(self, Direction::In | Direction::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Out => "out",
            Direction::In => "in",
            Direction::Both => "both",
            Direction::Sub => "sub",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "out" => Ok(Direction::Out),
            "in" => Ok(Direction::In),
            "both" => Ok(Direction::Both),
            "sub" => Ok(Direction::Sub),
            _ => Err(BridgeError::InvalidArgument("invalid direction")),
        }
    }
}

/// One topic rule of a bridge
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "TopicEntry")]
pub struct BridgeTopicConfig {
    /// Topic pattern; `None` for a pure prefix-to-prefix remap
    pub pattern: Option<String>,
    /// Direction of the rule
    pub direction: Direction,
    /// QoS level (validated at registration)
    pub qos: u8,
    /// Prefix applied on the local broker
    pub local_prefix: Option<String>,
    /// Prefix applied on the remote broker
    pub remote_prefix: Option<String>,
}

/// Raw form of a topic rule as found in the configuration file
#[derive(Deserialize)]
#[serde(untagged)]
enum TopicEntry {
    Line(String),
    Table {
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        direction: Direction,
        #[serde(default)]
        qos: u8,
        #[serde(default)]
        local_prefix: Option<String>,
        #[serde(default)]
        remote_prefix: Option<String>,
    },
}

impl TryFrom<TopicEntry> for BridgeTopicConfig {
    type Error = BridgeError;

    fn try_from(entry: TopicEntry) -> Result<Self, Self::Error> {
        match entry {
            TopicEntry::Line(line) => line.parse(),
            TopicEntry::Table {
                pattern,
                direction,
                qos,
                local_prefix,
                remote_prefix,
            } => Ok(Self {
                pattern,
                direction,
                qos,
                local_prefix,
                remote_prefix,
            }),
        }
    }
}

fn optional(token: Option<&str>) -> Option<String> {
    token
        .filter(|t| !t.is_empty() && *t != EMPTY_MARKER)
        .map(str::to_string)
}

impl FromStr for BridgeTopicConfig {
    type Err = BridgeError;

    /// Parse the line form `<pattern> [[[dir] qos] local-prefix remote-prefix]`
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();

        let pattern = match tokens.next() {
            Some(p) => optional(Some(p)),
            None => return Err(BridgeError::InvalidArgument("empty topic line")),
        };

        let direction = match tokens.next() {
            Some(d) => d.parse()?,
            None => Direction::default(),
        };

        let qos = match tokens.next() {
            Some(q) => q
                .parse::<u8>()
                .map_err(|_| BridgeError::InvalidArgument("invalid qos"))?,
            None => 0,
        };

        let local_prefix = optional(tokens.next());
        let remote_prefix = optional(tokens.next());

        if tokens.next().is_some() {
            return Err(BridgeError::InvalidArgument("trailing data in topic line"));
        }

        Ok(Self {
            pattern,
            direction,
            qos,
            local_prefix,
            remote_prefix,
        })
    }
}

/// Configuration for a single bridge
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Unique name for this bridge
    pub name: String,

    /// Remote broker address (host:port or just host)
    #[serde(default = "default_address")]
    pub address: String,

    /// Whether this bridge is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Topic rules, in registration order
    #[serde(default, alias = "topic")]
    pub topics: Vec<BridgeTopicConfig>,
}

fn default_address() -> String {
    "localhost:1883".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            address: default_address(),
            enabled: true,
            topics: Vec::new(),
        }
    }
}
