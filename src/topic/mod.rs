//! Topic primitives
//!
//! Validation of publish topics and subscribe patterns, wildcard matching,
//! and tokenized topics with pattern subsumption.

mod tokens;
pub mod validation;

pub use tokens::{TopicError, TopicTokens};
pub use validation::{
    is_valid_publish_topic, is_valid_subscribe_pattern, topic_matches_pattern,
    validate_publish_topic, validate_subscribe_pattern,
};
