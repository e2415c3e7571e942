//! Structural paths into a snapshot document.
//!
//! Sequence elements are never addressed by position: upstream list order
//! is not stable between saves, so an element is named by its identity
//! field (`civName=Iroquois`) or, lacking one, by its own rendered value.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a sequence element is named inside a [`ChangePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum ElementKey {
    /// The element is a mapping carrying an identity field.
    Field {
        /// Name of the identity field.
        field: String,
        /// Identity value: plain text for strings, compact JSON otherwise.
        value: String,
    },
    /// The element has no identity; named by its own rendered content.
    Value {
        /// Scalar text or compact JSON of the element.
        rendered: String,
    },
}

impl ElementKey {
    /// The identifying text: the identity field's value, or the rendered
    /// element itself.
    pub fn identity(&self) -> &str {
        match self {
            Self::Field { value, .. } => value,
            Self::Value { rendered } => rendered,
        }
    }

    /// Whether `element` is the one this key names.
    pub fn names(&self, element: &Value) -> bool {
        match self {
            Self::Field { field, value } => element
                .get(field.as_str())
                .is_some_and(|v| render_value(v) == *value),
            Self::Value { rendered } => render_value(element) == *rendered,
        }
    }
}

/// One step in a [`ChangePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PathSegment {
    /// A mapping key.
    Key {
        /// The key.
        name: String,
    },
    /// A sequence element.
    Element {
        /// How the element is identified.
        key: ElementKey,
    },
}

impl PathSegment {
    /// Segment for a mapping key.
    pub fn key(name: impl Into<String>) -> Self {
        Self::Key { name: name.into() }
    }

    /// Segment for a sequence element identified by a field.
    pub fn field(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Element {
            key: ElementKey::Field {
                field: field.into(),
                value: value.into(),
            },
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key { name } => write!(f, "[{name}]"),
            Self::Element {
                key: ElementKey::Field { field, value },
            } => write!(f, "[{field}={value}]"),
            Self::Element {
                key: ElementKey::Value { rendered },
            } => write!(f, "[{rendered}]"),
        }
    }
}

/// Ordered location of a change inside a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangePath(Vec<PathSegment>);

impl ChangePath {
    /// The empty path (document root).
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// A new path extended by one segment.
    #[must_use]
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// The segments, root first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<PathSegment>> for ChangePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for ChangePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("root")?;
        for segment in &self.0 {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Plain text for strings, compact JSON for anything else.
pub fn render_value(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), ToOwned::to_owned)
}

/// Follow `segments` down from `document`. `None` when a step is missing.
pub fn resolve<'a>(document: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    segments.iter().try_fold(document, |node, segment| match segment {
        PathSegment::Key { name } => node.get(name.as_str()),
        PathSegment::Element { key } => node.as_array()?.iter().find(|item| key.names(item)),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn display_reads_like_a_lookup_chain() {
        let path = ChangePath::root()
            .child(PathSegment::key("civilizations"))
            .child(PathSegment::field("civName", "Spain"))
            .child(PathSegment::key("gold"));
        assert_eq!(path.to_string(), "root[civilizations][civName=Spain][gold]");
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn element_identity_prefers_field_value() {
        let by_field = ElementKey::Field {
            field: "name".to_owned(),
            value: "Madrid".to_owned(),
        };
        let by_value = ElementKey::Value {
            rendered: "Pottery".to_owned(),
        };
        assert_eq!(by_field.identity(), "Madrid");
        assert_eq!(by_value.identity(), "Pottery");
    }

    #[test]
    fn resolve_follows_keys_and_identities() {
        let doc = json!({
            "tileMap": {"tileList": [
                {"position": {"x": 0, "y": 1}},
                {"position": {"x": 4, "y": 1}, "militaryUnit": {"owner": "Nok", "name": "Archer"}}
            ]},
            "tags": ["early", "coastal"]
        });
        let unit = [
            PathSegment::key("tileMap"),
            PathSegment::key("tileList"),
            PathSegment::field("position", r#"{"x":4,"y":1}"#),
            PathSegment::key("militaryUnit"),
        ];
        assert_eq!(
            resolve(&doc, &unit).and_then(|u| u.get("owner")),
            Some(&json!("Nok"))
        );

        let tag = [
            PathSegment::key("tags"),
            PathSegment::Element {
                key: ElementKey::Value {
                    rendered: "coastal".to_owned(),
                },
            },
        ];
        assert_eq!(resolve(&doc, &tag), Some(&json!("coastal")));
        assert_eq!(resolve(&doc, &[PathSegment::key("missing")]), None);
        assert_eq!(resolve(&doc, &[]), Some(&doc));
    }
}
