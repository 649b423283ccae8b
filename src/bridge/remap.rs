//! Prefix remapping
//!
//! Builds the prefixed topic strings stored on each rule and rewrites topics
//! received from the remote broker before local delivery.
//!
//! Prefixes are concatenated literally: `"local/"` + `"x/y"` gives
//! `"local/x/y"`, while `"local"` + `"x/y"` gives `"localx/y"`. Configured
//! prefixes are expected to carry their own trailing separator.

use std::borrow::Cow;
use std::fmt;

use tracing::{error, trace};

use crate::topic::{topic_matches_pattern, validate_publish_topic, validate_subscribe_pattern};

use super::error::{BridgeError, Result};
use super::topic::Bridge;

/// Which side of the bridge a prefix belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixSide {
    Local,
    Remote,
}

impl fmt::Display for PrefixSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixSide::Local => write!(f, "local"),
            PrefixSide::Remote => write!(f, "remote"),
        }
    }
}

/// Copy a string, reporting allocation failure instead of aborting
pub(crate) fn try_to_owned(s: &str) -> Result<String> {
    let mut owned = String::new();
    owned.try_reserve_exact(s.len())?;
    owned.push_str(s);
    Ok(owned)
}

/// Concatenate an optional prefix and an optional topic, with no separator.
///
/// Returns an empty string when both are absent.
pub fn concat_topic(prefix: Option<&str>, topic: Option<&str>) -> Result<String> {
    let prefix = prefix.unwrap_or_default();
    let topic = topic.unwrap_or_default();

    let mut remapped = String::new();
    remapped.try_reserve_exact(prefix.len() + topic.len())?;
    remapped.push_str(prefix);
    remapped.push_str(topic);
    Ok(remapped)
}

/// Validate a prefix against the rule's pattern and return the prefix to store.
///
/// The prefix alone must be a publish topic, and prefix + pattern must form a
/// subscribe pattern. The combined string is only used for the check.
pub fn build_prefix(prefix: &str, topic: Option<&str>, side: PrefixSide) -> Result<String> {
    if let Err(reason) = validate_publish_topic(prefix) {
        error!(
            "Invalid bridge topic {} prefix '{}': {}",
            side, prefix, reason
        );
        return Err(BridgeError::InvalidArgument("bad prefix"));
    }

    let combined = concat_topic(Some(prefix), topic)?;
    if let Err(reason) = validate_subscribe_pattern(&combined) {
        error!(
            "Invalid bridge topic {} prefix and pattern combination '{}': {}",
            side, combined, reason
        );
        return Err(BridgeError::InvalidArgument(
            "bad prefix+pattern combination",
        ));
    }

    try_to_owned(prefix)
}

impl Bridge {
    /// Rewrite a topic received from the remote broker.
    ///
    /// The first `in`/`both` rule carrying a prefix whose remote topic matches
    /// wins: its remote prefix is stripped (when the topic starts with it) and
    /// its local prefix is prepended. Topics matching no rule come back
    /// borrowed and unchanged.
    pub fn remap_inbound<'a>(&self, topic: &'a str) -> Result<Cow<'a, str>> {
        if !self.topic_remapping() || self.topics().is_empty() {
            return Ok(Cow::Borrowed(topic));
        }

        let rule = self.topics().iter().find(|rule| {
            rule.direction().is_inbound()
                && rule.has_prefix()
                && topic_matches_pattern(rule.remote_topic(), topic)
        });

        let Some(rule) = rule else {
            return Ok(Cow::Borrowed(topic));
        };

        let stripped = match rule.remote_prefix() {
            Some(prefix) => topic.strip_prefix(prefix).unwrap_or(topic),
            None => topic,
        };

        let remapped = match rule.local_prefix() {
            Some(prefix) => Cow::Owned(concat_topic(Some(prefix), Some(stripped))?),
            None => Cow::Borrowed(stripped),
        };

        trace!(
            "Bridge '{}': remapped inbound topic '{}' -> '{}'",
            self.name(),
            topic,
            remapped
        );

        Ok(remapped)
    }
}
