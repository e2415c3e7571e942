//! Path patterns for recognizing domain shapes in a [`ChangePath`].
//!
//! Patterns are plain data so they can be tested without game saves and
//! re-targeted from configuration. The textual form separates segments
//! with `/`:
//!
//! | Token   | Matches                                        | Captures     |
//! |---------|------------------------------------------------|--------------|
//! | `name`  | the mapping key `name`                         | --           |
//! | `*`     | any mapping key                                | the key      |
//! | `[*]`   | any sequence element                           | its identity |
//! | `**`    | zero or more segments of any kind              | --           |
//!
//! A pattern must consume the whole path, so `civilizations/[*]/cities/[*]`
//! matches a city element but not a field inside one; append `/**` to
//! accept anything below.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::path::{ChangePath, PathSegment};

/// Errors from parsing the textual pattern form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// The pattern string has no segments.
    #[error("pattern is empty")]
    Empty,

    /// A segment between two `/` separators is blank.
    #[error("pattern `{0}` contains an empty segment")]
    EmptySegment(String),
}

/// One token of a [`PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    /// Exactly this mapping key.
    Key(String),
    /// Any mapping key, captured.
    AnyKey,
    /// Any sequence element, its identity captured.
    AnyElement,
    /// Zero or more segments, not captured.
    Skip,
}

impl fmt::Display for PatternSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(name) => f.write_str(name),
            Self::AnyKey => f.write_str("*"),
            Self::AnyElement => f.write_str("[*]"),
            Self::Skip => f.write_str("**"),
        }
    }
}

/// A whole-path matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    segments: Vec<PatternSegment>,
}

impl PathPattern {
    /// Build a pattern from tokens.
    pub const fn new(segments: Vec<PatternSegment>) -> Self {
        Self { segments }
    }

    /// Match `path` against this pattern.
    ///
    /// Returns the captured identities in pattern order, or `None` if the
    /// path does not match.
    pub fn captures(&self, path: &ChangePath) -> Option<Vec<String>> {
        let mut captured = Vec::new();
        match_segments(&self.segments, path.segments(), &mut captured).then_some(captured)
    }

    /// Number of leading tokens before the first `**`. A matching path's
    /// first segments line up one-to-one with them.
    pub fn fixed_prefix_len(&self) -> usize {
        self.segments
            .iter()
            .take_while(|segment| **segment != PatternSegment::Skip)
            .count()
    }

    /// Whether `path` matches this pattern.
    pub fn matches(&self, path: &ChangePath) -> bool {
        self.captures(path).is_some()
    }
}

impl FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }
        let segments = trimmed
            .split('/')
            .map(|token| match token.trim() {
                "" => Err(PatternError::EmptySegment(s.to_owned())),
                "*" => Ok(PatternSegment::AnyKey),
                "[*]" => Ok(PatternSegment::AnyElement),
                "**" => Ok(PatternSegment::Skip),
                name => Ok(PatternSegment::Key(name.to_owned())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }
}

impl TryFrom<String> for PathPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PathPattern> for String {
    fn from(pattern: PathPattern) -> Self {
        pattern.to_string()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str("/")?;
            }
            first = false;
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

fn match_segments(
    pattern: &[PatternSegment],
    path: &[PathSegment],
    captured: &mut Vec<String>,
) -> bool {
    let Some((head, pattern_rest)) = pattern.split_first() else {
        return path.is_empty();
    };

    if *head == PatternSegment::Skip {
        let mark = captured.len();
        for skipped in 0..=path.len() {
            if let Some(tail) = path.get(skipped..)
                && match_segments(pattern_rest, tail, captured)
            {
                return true;
            }
            captured.truncate(mark);
        }
        return false;
    }

    let Some((segment, path_rest)) = path.split_first() else {
        return false;
    };

    let capture = match (head, segment) {
        (PatternSegment::Key(expected), PathSegment::Key { name }) if expected == name => None,
        (PatternSegment::AnyKey, PathSegment::Key { name }) => Some(name.clone()),
        (PatternSegment::AnyElement, PathSegment::Element { key }) => {
            Some(key.identity().to_owned())
        }
        _ => return false,
    };

    let mark = captured.len();
    if let Some(value) = capture {
        captured.push(value);
    }
    if match_segments(pattern_rest, path_rest, captured) {
        true
    } else {
        captured.truncate(mark);
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn path(segments: Vec<PathSegment>) -> ChangePath {
        ChangePath::from(segments)
    }

    fn unit_health_path() -> ChangePath {
        path(vec![
            PathSegment::key("civilizations"),
            PathSegment::field("civName", "Nok"),
            PathSegment::key("units"),
            PathSegment::field("id", "12"),
            PathSegment::key("health"),
        ])
    }

    #[test]
    fn parses_and_displays() {
        let pattern: PathPattern = "civilizations/[*]/diplomacy/*/diplomaticStatus".parse().unwrap();
        assert_eq!(
            pattern.to_string(),
            "civilizations/[*]/diplomacy/*/diplomaticStatus"
        );
    }

    #[test]
    fn rejects_blank_patterns() {
        assert_eq!("".parse::<PathPattern>(), Err(PatternError::Empty));
        assert!(matches!(
            "a//b".parse::<PathPattern>(),
            Err(PatternError::EmptySegment(_))
        ));
    }

    #[test]
    fn captures_element_identities() {
        let pattern: PathPattern = "civilizations/[*]/units/[*]/**".parse().unwrap();
        assert_eq!(
            pattern.captures(&unit_health_path()),
            Some(vec!["Nok".to_owned(), "12".to_owned()])
        );
    }

    #[test]
    fn whole_path_must_match() {
        let pattern: PathPattern = "civilizations/[*]/units/[*]".parse().unwrap();
        assert!(!pattern.matches(&unit_health_path()));
    }

    #[test]
    fn skip_matches_zero_segments() {
        let pattern: PathPattern = "civilizations/[*]/**/techsResearched/**".parse().unwrap();
        let direct = path(vec![
            PathSegment::key("civilizations"),
            PathSegment::field("civName", "Egypt"),
            PathSegment::key("techsResearched"),
        ]);
        let nested = path(vec![
            PathSegment::key("civilizations"),
            PathSegment::field("civName", "Egypt"),
            PathSegment::key("tech"),
            PathSegment::key("techsResearched"),
            PathSegment::Element {
                key: crate::path::ElementKey::Value {
                    rendered: "Pottery".to_owned(),
                },
            },
        ]);
        assert_eq!(pattern.captures(&direct), Some(vec!["Egypt".to_owned()]));
        assert_eq!(pattern.captures(&nested), Some(vec!["Egypt".to_owned()]));
    }

    #[test]
    fn fixed_prefix_stops_at_first_skip() {
        let unit: PathPattern = "tileMap/tileList/[*]/militaryUnit/**".parse().unwrap();
        let status: PathPattern = "civilizations/[*]/diplomacy/*/diplomaticStatus".parse().unwrap();
        assert_eq!(unit.fixed_prefix_len(), 4);
        assert_eq!(status.fixed_prefix_len(), 5);
    }

    #[test]
    fn any_key_does_not_match_elements() {
        let pattern: PathPattern = "civilizations/*".parse().unwrap();
        let p = path(vec![
            PathSegment::key("civilizations"),
            PathSegment::field("civName", "Egypt"),
        ]);
        assert!(!pattern.matches(&p));
    }

    #[test]
    fn serde_uses_textual_form() {
        let pattern: PathPattern = serde_json::from_str("\"a/*/[*]\"").unwrap();
        assert_eq!(
            pattern,
            PathPattern::new(vec![
                PatternSegment::Key("a".to_owned()),
                PatternSegment::AnyKey,
                PatternSegment::AnyElement,
            ])
        );
        assert_eq!(serde_json::to_string(&pattern).unwrap(), "\"a/*/[*]\"");
    }
}
