//! Tokenized topics
//!
//! A topic split on `/` into its levels. Levels are stored as `CompactString`
//! so the short levels typical of MQTT topics stay inline.

use std::fmt;
use std::ops::Deref;

use compact_str::CompactString;
use smallvec::SmallVec;

use super::validation::MAX_TOPIC_LEN;

/// Error returned when a topic cannot be tokenized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicError {
    /// Topic is the empty string
    Empty,
    /// Topic exceeds 65535 bytes
    TooLong,
    /// Topic contains a NUL character
    NullCharacter,
}

impl fmt::Display for TopicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "topic cannot be empty"),
            Self::TooLong => write!(f, "topic exceeds maximum length"),
            Self::NullCharacter => write!(f, "topic cannot contain null character"),
        }
    }
}

impl std::error::Error for TopicError {}

/// Ordered topic levels
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TopicTokens {
    levels: SmallVec<[CompactString; 8]>,
}

impl TopicTokens {
    /// Split a topic string into levels
    pub fn parse(topic: &str) -> Result<Self, TopicError> {
        if topic.is_empty() {
            return Err(TopicError::Empty);
        }
        if topic.len() > MAX_TOPIC_LEN {
            return Err(TopicError::TooLong);
        }
        if topic.contains('\0') {
            return Err(TopicError::NullCharacter);
        }

        Ok(Self {
            levels: topic.split('/').map(CompactString::new).collect(),
        })
    }

    /// Build tokens from already-split levels
    pub fn from_levels<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            levels: levels
                .into_iter()
                .map(|l| CompactString::new(l.as_ref()))
                .collect(),
        }
    }

    /// Reassemble the topic, with exactly one `/` between adjacent levels
    pub fn join(&self) -> String {
        let len = self.levels.iter().map(|l| l.len()).sum::<usize>()
            + self.levels.len().saturating_sub(1);
        let mut topic = String::with_capacity(len);
        for (i, level) in self.levels.iter().enumerate() {
            if i > 0 {
                topic.push('/');
            }
            topic.push_str(level);
        }
        topic
    }

    /// Levels as string slices
    pub fn levels(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(|l| l.as_str())
    }

    /// Check whether this pattern covers every topic matched by `concrete`.
    ///
    /// `concrete` is usually a plain topic, but a local client may subscribe
    /// with a filter, so its own wildcards are compared literally except that
    /// `+` never covers a `#`.
    ///
    /// Unlike [`topic_matches_pattern`](super::topic_matches_pattern), a
    /// leading wildcard here does cover `$`-topics, so a `#` rule mirrors
    /// `$SYS` subscriptions too.
    pub fn subsumes(&self, concrete: &TopicTokens) -> bool {
        let mut rest = concrete.levels();

        for level in self.levels() {
            if level == "#" {
                return true;
            }

            match rest.next() {
                Some(c) if level == "+" && c != "#" => {}
                Some(c) if level == c => {}
                _ => return false,
            }
        }

        rest.next().is_none()
    }
}

impl Deref for TopicTokens {
    type Target = [CompactString];

    fn deref(&self) -> &Self::Target {
        &self.levels
    }
}

impl fmt::Display for TopicTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::topic_matches_pattern;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    fn tokens(topic: &str) -> TopicTokens {
        TopicTokens::parse(topic).unwrap()
    }

    #[test]
    fn test_parse_and_join() {
        let t = tokens("a/b/c");
        assert_eq!(t.levels().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(TopicTokens::from_levels(["a", "b", "c"]).join(), "a/b/c");
    }

    #[test]
    fn test_empty_levels_are_kept() {
        let t = tokens("/a//b/");
        assert_eq!(t.levels().collect::<Vec<_>>(), vec!["", "a", "", "b", ""]);
        assert_eq!(t.join(), "/a//b/");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(TopicTokens::parse(""), Err(TopicError::Empty));
        assert_eq!(TopicTokens::parse("a\0b"), Err(TopicError::NullCharacter));
        assert_eq!(
            TopicTokens::parse(&"x".repeat(MAX_TOPIC_LEN + 1)),
            Err(TopicError::TooLong)
        );
    }

    #[test_case("a/+/c", "a/b/c", true; "plus matches one level")]
    #[test_case("a/+/c", "a/b/c/d", false; "plus does not absorb extra levels")]
    #[test_case("a/+/c", "a/x/c/d", false; "trailing level rejected")]
    #[test_case("a/+/c", "a/c", false; "plus never matches zero levels")]
    #[test_case("a/#", "a", true; "hash matches empty remainder")]
    #[test_case("a/#", "a/b", true; "hash matches one level")]
    #[test_case("a/#", "a/b/c", true; "hash matches many levels")]
    #[test_case("a/#", "x", false; "hash needs its prefix")]
    #[test_case("#", "x/y", true; "bare hash")]
    #[test_case("a/b", "a/b", true; "exact")]
    #[test_case("a/b", "a/+", false; "literal does not cover a wildcard")]
    #[test_case("a/+", "a/+", true; "plus covers plus")]
    #[test_case("a/+", "a/#", false; "plus does not cover hash")]
    #[test_case("a/#", "a/+/c", true; "hash covers nested filter")]
    #[test_case("#", "$SYS/broker/load", true; "hash covers dollar topic")]
    #[test_case("+/uptime", "$SYS/uptime", true; "plus covers dollar level")]
    fn test_subsumes(pattern: &str, concrete: &str, expected: bool) {
        assert_eq!(tokens(pattern).subsumes(&tokens(concrete)), expected);
    }

    proptest! {
        #[test]
        fn prop_parse_join_roundtrip(topic in "[a-z0-9/]{1,64}") {
            prop_assert_eq!(tokens(&topic).join(), topic);
        }

        // On wildcard-free topics subsumption agrees with the match predicate.
        // `$`-topics are left out: only the match predicate shields them.
        #[test]
        fn prop_subsumes_agrees_with_match(
            pattern in "(a|b|\\+)(/(a|b|\\+)){0,3}(/#)?",
            topic in "(a|b)(/(a|b)){0,4}",
        ) {
            prop_assert_eq!(
                tokens(&pattern).subsumes(&tokens(&topic)),
                topic_matches_pattern(&pattern, &topic)
            );
        }
    }
}
