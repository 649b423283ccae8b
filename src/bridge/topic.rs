//! Bridge topic rules
//!
//! A [`Bridge`] owns two ordered rule lists: forwarding rules (`out`, `in`,
//! `both`) and mirroring rules (`sub`). Rules are validated and appended by
//! [`Bridge::add_topic`] while the bridge is still exclusively owned, and are
//! read-only afterwards apart from the mirrored subscriptions of `sub` rules.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::{BridgeConfig, Direction, EMPTY_MARKER};
use crate::protocol::QoS;
use crate::topic::{validate_publish_topic, validate_subscribe_pattern, TopicTokens};

use super::error::{BridgeError, Result};
use super::mirror::{MirroredGuard, MirroredSubscriptions, UpstreamRequest};
use super::remap::{build_prefix, concat_topic, try_to_owned, PrefixSide};

/// One forwarding or mirroring rule of a bridge
#[derive(Debug)]
pub struct BridgeTopic {
    direction: Direction,
    qos: QoS,
    /// `None` for a pure prefix-to-prefix remap
    pattern: Option<String>,
    local_prefix: Option<String>,
    remote_prefix: Option<String>,
    /// local_prefix + pattern
    local_topic: String,
    /// remote_prefix + pattern
    remote_topic: String,
    // Both views are currently tokenized from the raw pattern.
    local_tokens: Option<TopicTokens>,
    remote_tokens: Option<TopicTokens>,
    /// Only present on `sub` rules
    mirrored: Option<Mutex<MirroredSubscriptions>>,
}

impl BridgeTopic {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn qos(&self) -> QoS {
        self.qos
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn local_prefix(&self) -> Option<&str> {
        self.local_prefix.as_deref()
    }

    pub fn remote_prefix(&self) -> Option<&str> {
        self.remote_prefix.as_deref()
    }

    pub fn local_topic(&self) -> &str {
        &self.local_topic
    }

    pub fn remote_topic(&self) -> &str {
        &self.remote_topic
    }

    pub fn local_tokens(&self) -> Option<&TopicTokens> {
        self.local_tokens.as_ref()
    }

    pub fn remote_tokens(&self) -> Option<&TopicTokens> {
        self.remote_tokens.as_ref()
    }

    /// Check if the rule carries at least one prefix
    pub fn has_prefix(&self) -> bool {
        self.local_prefix.is_some() || self.remote_prefix.is_some()
    }

    /// Lock the mirrored subscriptions of a `sub` rule for reading
    pub fn mirrored(&self) -> Option<MirroredGuard<'_>> {
        self.mirrored_mut().map(MirroredGuard::new)
    }

    pub(crate) fn mirrored_mut(&self) -> Option<MutexGuard<'_, MirroredSubscriptions>> {
        self.mirrored.as_ref().map(|m| m.lock())
    }

    /// Check whether this rule's pattern covers a local subscription
    pub(crate) fn subsumes(&self, tokens: &TopicTokens) -> bool {
        self.local_tokens
            .as_ref()
            .is_some_and(|pattern| pattern.subsumes(tokens))
    }
}

/// A configured link to a remote broker
#[derive(Debug)]
pub struct Bridge {
    name: Arc<str>,
    /// Forwarding rules, in registration order
    topics: Vec<BridgeTopic>,
    /// Mirroring rules, in registration order
    sub_topics: Vec<BridgeTopic>,
    /// True iff some forwarding rule carries a prefix
    topic_remapping: bool,
    /// Where mirrored SUBSCRIBE/UNSUBSCRIBE requests go
    upstream: Option<mpsc::UnboundedSender<UpstreamRequest>>,
}

impl Bridge {
    /// Create a bridge with no rules
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            topics: Vec::new(),
            sub_topics: Vec::new(),
            topic_remapping: false,
            upstream: None,
        }
    }

    /// Build a bridge and register every configured topic rule in order.
    ///
    /// Stops at the first invalid rule so no bridge starts with a partial rule set.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let mut bridge = Self::new(config.name.as_str());

        for topic in &config.topics {
            bridge.add_topic(
                topic.pattern.as_deref(),
                topic.direction,
                topic.qos,
                topic.local_prefix.as_deref(),
                topic.remote_prefix.as_deref(),
            )?;
        }

        info!(
            "Bridge '{}' ({}): registered {} forwarding and {} mirroring rules",
            bridge.name,
            config.address,
            bridge.topics.len(),
            bridge.sub_topics.len()
        );

        Ok(bridge)
    }

    /// Attach the channel the connection layer reads upstream requests from
    pub fn with_upstream(mut self, upstream: mpsc::UnboundedSender<UpstreamRequest>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn topics(&self) -> &[BridgeTopic] {
        &self.topics
    }

    pub fn sub_topics(&self) -> &[BridgeTopic] {
        &self.sub_topics
    }

    pub fn topic_remapping(&self) -> bool {
        self.topic_remapping
    }

    pub(crate) fn upstream(&self) -> Option<&mpsc::UnboundedSender<UpstreamRequest>> {
        self.upstream.as_ref()
    }

    /// Validate a topic rule and append it to the bridge.
    ///
    /// A pattern of `None`, `""` or the literal `""` marker means the rule is a
    /// pure prefix remap, which needs both prefixes. `sub` rules take no
    /// prefixes. On error the bridge is left unchanged.
    pub fn add_topic(
        &mut self,
        pattern: Option<&str>,
        direction: Direction,
        qos: u8,
        local_prefix: Option<&str>,
        remote_prefix: Option<&str>,
    ) -> Result<()> {
        let qos = QoS::from_u8(qos).ok_or(BridgeError::InvalidArgument("invalid qos"))?;

        for (prefix, side) in [
            (local_prefix, PrefixSide::Local),
            (remote_prefix, PrefixSide::Remote),
        ] {
            if let Some(prefix) = prefix {
                if let Err(reason) = validate_publish_topic(prefix) {
                    error!(
                        "Bridge '{}': invalid bridge topic {} prefix '{}': {}",
                        self.name, side, prefix, reason
                    );
                    return Err(BridgeError::InvalidArgument("bad prefix"));
                }
            }
        }

        let pattern = pattern.filter(|p| !p.is_empty() && *p != EMPTY_MARKER);

        if pattern.is_none() && (local_prefix.is_none() || remote_prefix.is_none()) {
            error!("Bridge '{}': invalid bridge remapping", self.name);
            return Err(BridgeError::InvalidArgument("invalid remap"));
        }

        let has_prefix = local_prefix.is_some() || remote_prefix.is_some();
        if direction == Direction::Sub && has_prefix {
            error!(
                "Bridge '{}': sub topics must not define a local or remote prefix",
                self.name
            );
            return Err(BridgeError::InvalidArgument("sub topic with prefix"));
        }

        let (stored_pattern, tokens) = match pattern {
            Some(pattern) => {
                let tokens = validate_subscribe_pattern(pattern)
                    .ok()
                    .and_then(|_| TopicTokens::parse(pattern).ok());
                let Some(tokens) = tokens else {
                    error!(
                        "Bridge '{}': invalid bridge topic pattern '{}'",
                        self.name, pattern
                    );
                    return Err(BridgeError::InvalidArgument("bad pattern"));
                };
                (Some(try_to_owned(pattern)?), Some(tokens))
            }
            None => (None, None),
        };

        let local_prefix = local_prefix
            .map(|p| build_prefix(p, pattern, PrefixSide::Local))
            .transpose()?;
        let remote_prefix = remote_prefix
            .map(|p| build_prefix(p, pattern, PrefixSide::Remote))
            .transpose()?;

        let topic = BridgeTopic {
            direction,
            qos,
            local_topic: concat_topic(local_prefix.as_deref(), pattern)?,
            remote_topic: concat_topic(remote_prefix.as_deref(), pattern)?,
            pattern: stored_pattern,
            local_prefix,
            remote_prefix,
            remote_tokens: tokens.clone(),
            local_tokens: tokens,
            mirrored: (direction == Direction::Sub)
                .then(|| Mutex::new(MirroredSubscriptions::new())),
        };

        let list = if direction == Direction::Sub {
            &mut self.sub_topics
        } else {
            &mut self.topics
        };
        list.try_reserve(1)?;

        debug!(
            "Bridge '{}': added {} topic local='{}' remote='{}' qos={}",
            self.name, direction, topic.local_topic, topic.remote_topic, qos
        );

        list.push(topic);
        if has_prefix {
            self.topic_remapping = true;
        }

        Ok(())
    }
}
