//! Decoded game-state documents.
//!
//! A [`Snapshot`] wraps one poll's worth of game state as a generic JSON
//! tree. Only two top-level keys are required: the turn counter and the
//! identifier of the player whose turn it is. Everything else is accessed
//! opportunistically by the differ and classifier.

use std::sync::Arc;

use serde_json::Value;

/// Top-level key holding the turn counter.
pub const TURN_KEY: &str = "turns";

/// Top-level key holding the active player identifier.
pub const CURRENT_PLAYER_KEY: &str = "currentPlayer";

/// Errors raised when a decoded document lacks the required top-level keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// The document root is not a mapping.
    #[error("snapshot root is not an object")]
    NotAnObject,

    /// A required key is missing or has the wrong type.
    #[error("snapshot field `{field}` is missing or not a {expected}")]
    InvalidField {
        /// The top-level key that was looked up.
        field: &'static str,
        /// The expected JSON type.
        expected: &'static str,
    },
}

/// One poll's decoded game state.
///
/// Cloning is cheap: the document is shared behind an [`Arc`] so the
/// tracker can retain a baseline without copying the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    turn: u64,
    current_player: String,
    document: Arc<Value>,
}

impl Snapshot {
    /// Build a snapshot from a decoded document.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the root is not an object or the turn
    /// counter / current player keys are absent or mistyped.
    pub fn from_value(document: Value) -> Result<Self, SnapshotError> {
        let root = document.as_object().ok_or(SnapshotError::NotAnObject)?;

        let turn = root
            .get(TURN_KEY)
            .and_then(Value::as_u64)
            .ok_or(SnapshotError::InvalidField {
                field: TURN_KEY,
                expected: "non-negative integer",
            })?;

        let current_player = root
            .get(CURRENT_PLAYER_KEY)
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or(SnapshotError::InvalidField {
                field: CURRENT_PLAYER_KEY,
                expected: "string",
            })?;

        Ok(Self {
            turn,
            current_player,
            document: Arc::new(document),
        })
    }

    /// The turn counter.
    pub const fn turn(&self) -> u64 {
        self.turn
    }

    /// Identifier of the player whose turn it is.
    pub fn current_player(&self) -> &str {
        &self.current_player
    }

    /// The full decoded document.
    pub fn document(&self) -> &Value {
        &self.document
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_turn_and_player() {
        let snapshot = Snapshot::from_value(json!({
            "turns": 12,
            "currentPlayer": "Nok",
            "civilizations": []
        }));
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.turn(), 12);
        assert_eq!(snapshot.current_player(), "Nok");
        assert!(snapshot.document().get("civilizations").is_some());
    }

    #[test]
    fn rejects_missing_turn() {
        let err = Snapshot::from_value(json!({"currentPlayer": "Nok"}));
        assert_eq!(
            err,
            Err(SnapshotError::InvalidField {
                field: TURN_KEY,
                expected: "non-negative integer",
            })
        );
    }

    #[test]
    fn rejects_non_string_player() {
        let err = Snapshot::from_value(json!({"turns": 1, "currentPlayer": 7}));
        assert!(matches!(
            err,
            Err(SnapshotError::InvalidField {
                field: CURRENT_PLAYER_KEY,
                ..
            })
        ));
    }

    #[test]
    fn rejects_array_root() {
        assert_eq!(
            Snapshot::from_value(json!([1, 2, 3])),
            Err(SnapshotError::NotAnObject)
        );
    }
}
