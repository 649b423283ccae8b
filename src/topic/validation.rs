//! Topic name and pattern validation
//!
//! Key rules:
//! - Publish topics MUST NOT contain wildcards (+ or #)
//! - Subscribe patterns MAY contain wildcards
//! - Multi-level wildcard (#) must occupy the whole last level
//! - Single-level wildcard (+) must occupy a whole level
//! - Topics starting with $ are not matched by a leading wildcard

/// Maximum length of a topic in bytes (MQTT UTF-8 string limit)
pub const MAX_TOPIC_LEN: usize = 65535;

/// Check the constraints shared by publish topics and subscribe patterns
fn check_common(topic: &str) -> Result<(), &'static str> {
    if topic.is_empty() {
        return Err("topic cannot be empty");
    }

    if topic.len() > MAX_TOPIC_LEN {
        return Err("topic exceeds maximum length");
    }

    if topic.contains('\0') {
        return Err("topic cannot contain null character");
    }

    Ok(())
}

/// Validate a publish topic (also used for bridge prefixes)
pub fn validate_publish_topic(topic: &str) -> Result<(), &'static str> {
    check_common(topic)?;

    if topic.contains(['+', '#']) {
        return Err("publish topic cannot contain wildcards");
    }

    Ok(())
}

/// Validate a subscribe pattern
pub fn validate_subscribe_pattern(pattern: &str) -> Result<(), &'static str> {
    check_common(pattern)?;

    let mut levels = pattern.split('/').peekable();
    while let Some(level) = levels.next() {
        if level.contains('#') {
            if level != "#" {
                return Err("multi-level wildcard must occupy entire level");
            }
            if levels.peek().is_some() {
                return Err("multi-level wildcard must be last level");
            }
        }

        if level.contains('+') && level != "+" {
            return Err("single-level wildcard must occupy entire level");
        }
    }

    Ok(())
}

pub fn is_valid_publish_topic(topic: &str) -> bool {
    validate_publish_topic(topic).is_ok()
}

pub fn is_valid_subscribe_pattern(pattern: &str) -> bool {
    validate_subscribe_pattern(pattern).is_ok()
}

/// Check if a subscribe pattern matches a concrete topic
///
/// Matching rules:
/// - / is the level separator
/// - + matches exactly one level
/// - # matches zero or more levels (must be last)
/// - $-topics don't match patterns starting with + or #
pub fn topic_matches_pattern(pattern: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (pattern.starts_with('+') || pattern.starts_with('#')) {
        return false;
    }

    let mut topic_levels = topic.split('/');

    for pattern_level in pattern.split('/') {
        if pattern_level == "#" {
            return true;
        }

        match topic_levels.next() {
            Some(level) if pattern_level == "+" || pattern_level == level => {}
            _ => return false,
        }
    }

    topic_levels.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_publish_topic() {
        assert!(is_valid_publish_topic("test"));
        assert!(is_valid_publish_topic("test/topic"));
        assert!(is_valid_publish_topic("/test/topic"));
        assert!(is_valid_publish_topic("local/"));

        assert!(!is_valid_publish_topic(""));
        assert!(!is_valid_publish_topic("test+topic"));
        assert!(!is_valid_publish_topic("test/+/topic"));
        assert!(!is_valid_publish_topic("test/#"));
        assert!(!is_valid_publish_topic("nul\0byte"));
        assert!(!is_valid_publish_topic(&"a".repeat(MAX_TOPIC_LEN + 1)));
    }

    #[test]
    fn test_validate_subscribe_pattern() {
        assert!(is_valid_subscribe_pattern("test"));
        assert!(is_valid_subscribe_pattern("+"));
        assert!(is_valid_subscribe_pattern("#"));
        assert!(is_valid_subscribe_pattern("test/+/topic"));
        assert!(is_valid_subscribe_pattern("local/sensors/#"));
        assert!(is_valid_subscribe_pattern("local/"));

        assert!(!is_valid_subscribe_pattern(""));
        assert!(!is_valid_subscribe_pattern("local#"));
        assert!(!is_valid_subscribe_pattern("pfx+/a"));
        assert!(!is_valid_subscribe_pattern("test/#/more"));
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            validate_publish_topic("a/#"),
            Err("publish topic cannot contain wildcards")
        );
        assert_eq!(
            validate_subscribe_pattern("a/#/b"),
            Err("multi-level wildcard must be last level")
        );
    }

    #[test]
    fn test_topic_matches_pattern() {
        assert!(topic_matches_pattern("remote/x/y", "remote/x/y"));
        assert!(!topic_matches_pattern("remote/x/y", "other/x/y"));
        assert!(!topic_matches_pattern("a/b", "a"));
        assert!(!topic_matches_pattern("a", "a/b"));

        assert!(topic_matches_pattern("a/+", "a/b"));
        assert!(!topic_matches_pattern("a/+", "a/b/c"));
        assert!(!topic_matches_pattern("+/+", "a"));

        assert!(topic_matches_pattern("a/#", "a"));
        assert!(topic_matches_pattern("a/#", "a/b/c"));
        assert!(topic_matches_pattern("#", "anything/at/all"));
        assert!(!topic_matches_pattern("a/#", "b/c"));

        assert!(!topic_matches_pattern("#", "$SYS/uptime"));
        assert!(!topic_matches_pattern("+/uptime", "$SYS/uptime"));
        assert!(topic_matches_pattern("$SYS/#", "$SYS/uptime"));
    }
}
