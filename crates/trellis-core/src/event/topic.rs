use std::fmt;

use crate::event::error::EventSystemError;

/// Matches exactly one topic segment
pub const SINGLE_WILDCARD: &str = "*";
/// Matches zero or more topic segments
pub const MULTI_WILDCARD: &str = "**";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Single,
    Multi,
}

/// A parsed subscription pattern such as `application:*` or `orders:**`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
    wildcard: bool,
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TopicPattern {
    /// Parse `pattern` split on `delimiter`. With `wildcard` off the pattern
    /// is matched literally.
    pub fn parse(pattern: &str, delimiter: &str, wildcard: bool) -> Result<Self, EventSystemError> {
        if pattern.is_empty() {
            return Err(EventSystemError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }
        let segments = if wildcard {
            pattern
                .split(delimiter)
                .map(|segment| match segment {
                    SINGLE_WILDCARD => Segment::Single,
                    MULTI_WILDCARD => Segment::Multi,
                    literal => Segment::Literal(literal.to_string()),
                })
                .collect()
        } else {
            vec![Segment::Literal(pattern.to_string())]
        };
        Ok(Self {
            raw: pattern.to_string(),
            segments,
            wildcard,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern contains any wildcard segment
    pub fn is_wildcard(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| !matches!(segment, Segment::Literal(_)))
    }

    /// Check `topic` (already a concrete topic, not a pattern) against this pattern
    pub fn matches(&self, topic: &str, delimiter: &str) -> bool {
        if !self.wildcard || !self.is_wildcard() {
            return self.raw == topic;
        }
        let parts: Vec<&str> = topic.split(delimiter).collect();
        match_segments(&self.segments, &parts)
    }
}

fn match_segments(pattern: &[Segment], topic: &[&str]) -> bool {
    match pattern.split_first() {
        None => topic.is_empty(),
        Some((Segment::Multi, rest)) => {
            (0..=topic.len()).any(|skip| match_segments(rest, &topic[skip..]))
        }
        Some((Segment::Single, rest)) => match topic.split_first() {
            Some((_, remaining)) => match_segments(rest, remaining),
            None => false,
        },
        Some((Segment::Literal(literal), rest)) => match topic.split_first() {
            Some((part, remaining)) => literal == part && match_segments(rest, remaining),
            None => false,
        },
    }
}

/// Reject topics that cannot be emitted: empty, or containing wildcard segments
pub fn validate_topic(topic: &str, delimiter: &str, wildcard: bool) -> Result<(), EventSystemError> {
    if topic.is_empty() {
        return Err(EventSystemError::InvalidTopic {
            topic: topic.to_string(),
            reason: "topic is empty".to_string(),
        });
    }
    if wildcard
        && topic
            .split(delimiter)
            .any(|segment| segment == SINGLE_WILDCARD || segment == MULTI_WILDCARD)
    {
        return Err(EventSystemError::InvalidTopic {
            topic: topic.to_string(),
            reason: "wildcards are only allowed in subscriptions".to_string(),
        });
    }
    Ok(())
}
