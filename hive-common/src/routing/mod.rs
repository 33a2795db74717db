// Event routing
//
// Event names are dot-separated segments (`request.rest.posts`). A subscription
// pattern uses the same syntax plus two wildcard tokens:
// - `*`  matches exactly one arbitrary segment, at any position
// - `**` matches the remaining segments (zero or more) and must be last
//
// Matching is a single left-to-right walk over the segments; no regular
// expressions are compiled.

use std::fmt;
use thiserror::Error;

/// Token for a single-segment wildcard
pub const SINGLE_WILDCARD: &str = "*";
/// Token for a multi-segment (tail) wildcard
pub const MULTI_WILDCARD: &str = "**";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("event pattern can't be empty")]
    Empty,
    #[error("event pattern '{0}' contains an empty segment")]
    EmptySegment(String),
    #[error("multi-segment wildcard must be the last segment of '{0}'")]
    MisplacedMultiWildcard(String),
}

/// One segment of a parsed pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSegment {
    Literal(String),
    SingleWildcard,
    MultiWildcard,
}

impl PatternSegment {
    fn parse(segment: &str) -> Self {
        match segment {
            SINGLE_WILDCARD => PatternSegment::SingleWildcard,
            MULTI_WILDCARD => PatternSegment::MultiWildcard,
            literal => PatternSegment::Literal(literal.to_string()),
        }
    }
}

/// A parsed event subscription pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventPattern {
    raw: String,
    segments: Vec<PatternSegment>,
}

impl EventPattern {
    /// Parse and validate a pattern
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        let segments: Vec<PatternSegment> = pattern.split('.').map(PatternSegment::parse).collect();

        if pattern.split('.').any(str::is_empty) {
            return Err(PatternError::EmptySegment(pattern.to_string()));
        }

        let last = segments.len() - 1;
        if segments[..last].contains(&PatternSegment::MultiWildcard) {
            return Err(PatternError::MisplacedMultiWildcard(pattern.to_string()));
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// True when the pattern contains any wildcard token
    pub fn is_pattern(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, PatternSegment::Literal(_)))
    }

    pub fn has_multi_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(PatternSegment::MultiWildcard))
    }

    /// Check an event name against this pattern
    ///
    /// Without a trailing `**` the segment counts must be equal. With it, the
    /// event must start with the remaining pattern segments and may carry any
    /// number of extra segments, including none.
    pub fn matches(&self, event_name: &str) -> bool {
        let mut event_segments = event_name.split('.');

        for segment in &self.segments {
            match segment {
                PatternSegment::MultiWildcard => return true,
                PatternSegment::SingleWildcard => {
                    if event_segments.next().is_none() {
                        return false;
                    }
                }
                PatternSegment::Literal(literal) => match event_segments.next() {
                    Some(candidate) if candidate == literal => {}
                    _ => return false,
                },
            }
        }

        event_segments.next().is_none()
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<&str> for EventPattern {
    type Error = PatternError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        EventPattern::new(value)
    }
}
