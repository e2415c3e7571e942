//! Structural diff between two snapshot documents.
//!
//! The differ walks both trees in lockstep and emits one [`ChangeEntry`] per
//! difference. Mappings are compared key by key. Sequences are treated as
//! unordered collections:
//!
//! 1. Elements equal by deep value cancel out pairwise (multiset semantics),
//!    so reordering alone produces no entries. Equality here treats nested
//!    sequences as multisets too, at any depth.
//! 2. Leftover elements carrying an identity field (see
//!    [`DiffOptions::identity_fields`]) are paired old-to-new by identity and
//!    recursed into, so a unit that lost health shows up as a nested
//!    `Changed` rather than a remove/add pair.
//! 3. Whatever is left is `Added` (new side) or `Removed` (old side).
//!
//! An element that moved without changing is indistinguishable from one
//! that stayed put.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::path::{ChangePath, ElementKey, PathSegment, render_value};
use crate::snapshot::Snapshot;

/// Default nesting limit. Game saves are a few dozen levels deep at most.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Kind of structural difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present only in the new document.
    Added,
    /// Present only in the old document.
    Removed,
    /// Present in both with different values.
    Changed,
}

/// One structural difference between two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// What happened at this location.
    pub kind: ChangeKind,
    /// Where it happened.
    pub path: ChangePath,
    /// Value on the old side (`Removed` and `Changed`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// Value on the new side (`Added` and `Changed`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl ChangeEntry {
    /// An entry for a value present only on the new side.
    pub const fn added(path: ChangePath, new_value: Value) -> Self {
        Self {
            kind: ChangeKind::Added,
            path,
            old_value: None,
            new_value: Some(new_value),
        }
    }

    /// An entry for a value present only on the old side.
    pub const fn removed(path: ChangePath, old_value: Value) -> Self {
        Self {
            kind: ChangeKind::Removed,
            path,
            old_value: Some(old_value),
            new_value: None,
        }
    }

    /// An entry for a value that differs between sides.
    pub const fn changed(path: ChangePath, old_value: Value, new_value: Value) -> Self {
        Self {
            kind: ChangeKind::Changed,
            path,
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }
}

/// Errors from the differ. Rare in practice: a decoded JSON tree is finite
/// and acyclic, so the only failure is a document nested past the guard.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// The documents nest deeper than [`DiffOptions::max_depth`].
    #[error("document nesting exceeds {limit} levels at {path}")]
    DepthLimitExceeded {
        /// The configured limit.
        limit: usize,
        /// Rendered path where the limit was hit.
        path: String,
    },
}

/// Tuning for the differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffOptions {
    /// Field names that identify a sequence element, in priority order.
    /// The first one present with a non-null value wins; containers such as
    /// a tile's `position` are rendered as compact JSON.
    pub identity_fields: Vec<String>,
    /// Maximum nesting depth before the diff is abandoned.
    pub max_depth: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            identity_fields: ["id", "civName", "name", "position"]
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Diff two snapshots with the default options.
///
/// # Errors
///
/// Returns [`DiffError::DepthLimitExceeded`] for pathologically deep input.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Result<Vec<ChangeEntry>, DiffError> {
    diff_values(old.document(), new.document(), &DiffOptions::default())
}

/// Diff two arbitrary JSON trees.
///
/// # Errors
///
/// Returns [`DiffError::DepthLimitExceeded`] if either tree nests deeper
/// than `options.max_depth` along a path where they differ.
pub fn diff_values(
    old: &Value,
    new: &Value,
    options: &DiffOptions,
) -> Result<Vec<ChangeEntry>, DiffError> {
    let mut differ = Differ {
        options,
        entries: Vec::new(),
    };
    differ.walk(old, new, &ChangePath::root(), 0)?;
    Ok(differ.entries)
}

struct Differ<'a> {
    options: &'a DiffOptions,
    entries: Vec<ChangeEntry>,
}

impl Differ<'_> {
    fn walk(
        &mut self,
        old: &Value,
        new: &Value,
        path: &ChangePath,
        depth: usize,
    ) -> Result<(), DiffError> {
        if equivalent(old, new) {
            return Ok(());
        }
        if depth >= self.options.max_depth {
            return Err(DiffError::DepthLimitExceeded {
                limit: self.options.max_depth,
                path: path.to_string(),
            });
        }

        match (old, new) {
            (Value::Object(old_map), Value::Object(new_map)) => {
                self.walk_mapping(old_map, new_map, path, depth)
            }
            (Value::Array(old_items), Value::Array(new_items)) => {
                self.walk_sequence(old_items, new_items, path, depth)
            }
            _ => {
                self.entries
                    .push(ChangeEntry::changed(path.clone(), old.clone(), new.clone()));
                Ok(())
            }
        }
    }

    fn walk_mapping(
        &mut self,
        old: &Map<String, Value>,
        new: &Map<String, Value>,
        path: &ChangePath,
        depth: usize,
    ) -> Result<(), DiffError> {
        for (key, old_value) in old {
            let child = path.child(PathSegment::key(key.as_str()));
            match new.get(key) {
                Some(new_value) => {
                    self.walk(old_value, new_value, &child, depth.saturating_add(1))?;
                }
                None => self.entries.push(ChangeEntry::removed(child, old_value.clone())),
            }
        }
        for (key, new_value) in new {
            if !old.contains_key(key) {
                let child = path.child(PathSegment::key(key.as_str()));
                self.entries.push(ChangeEntry::added(child, new_value.clone()));
            }
        }
        Ok(())
    }

    fn walk_sequence(
        &mut self,
        old: &[Value],
        new: &[Value],
        path: &ChangePath,
        depth: usize,
    ) -> Result<(), DiffError> {
        let options = self.options;

        // Pass 1: cancel out equivalent elements.
        let mut old_matched = vec![false; old.len()];
        let mut new_unmatched: Vec<&Value> = Vec::new();
        for (index, new_value) in new.iter().enumerate() {
            if !claim(old, &mut old_matched, new_value, index) {
                new_unmatched.push(new_value);
            }
        }
        let old_unmatched: Vec<&Value> = old
            .iter()
            .zip(&old_matched)
            .filter(|(_, matched)| !**matched)
            .map(|(value, _)| value)
            .collect();

        // Pass 2: pair leftovers by identity, recurse into pairs.
        let mut old_paired = vec![false; old_unmatched.len()];
        for new_value in new_unmatched {
            let key = element_key(new_value, &options.identity_fields);
            let partner = if matches!(key, ElementKey::Field { .. }) {
                old_unmatched
                    .iter()
                    .zip(old_paired.iter_mut())
                    .find(|(old_value, paired)| {
                        !**paired && element_key(old_value, &options.identity_fields) == key
                    })
                    .map(|(old_value, paired)| {
                        *paired = true;
                        *old_value
                    })
            } else {
                None
            };

            let child = path.child(PathSegment::Element { key });
            match partner {
                Some(old_value) => {
                    self.walk(old_value, new_value, &child, depth.saturating_add(1))?;
                }
                None => self.entries.push(ChangeEntry::added(child, new_value.clone())),
            }
        }

        // Pass 3: anything still unpaired on the old side is gone.
        for (old_value, paired) in old_unmatched.iter().zip(&old_paired) {
            if !*paired {
                let key = element_key(old_value, &options.identity_fields);
                let child = path.child(PathSegment::Element { key });
                self.entries
                    .push(ChangeEntry::removed(child, (*old_value).clone()));
            }
        }
        Ok(())
    }
}

/// Deep equality that compares every sequence, at any depth, as a multiset.
fn equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a_map), Value::Object(b_map)) => {
            a_map.len() == b_map.len()
                && a_map.iter().all(|(key, a_value)| {
                    b_map
                        .get(key)
                        .is_some_and(|b_value| equivalent(a_value, b_value))
                })
        }
        (Value::Array(a_items), Value::Array(b_items)) => {
            let mut claimed = vec![false; b_items.len()];
            a_items.len() == b_items.len()
                && a_items
                    .iter()
                    .enumerate()
                    .all(|(index, item)| claim(b_items, &mut claimed, item, index))
        }
        _ => a == b,
    }
}

/// Mark the first unclaimed element of `pool` equivalent to `value` as
/// claimed. The element at `hint` is tried first: saves mostly keep their
/// order, so this usually avoids a scan.
fn claim(pool: &[Value], claimed: &mut [bool], value: &Value, hint: usize) -> bool {
    let hinted = claimed.get(hint) == Some(&false)
        && pool.get(hint).is_some_and(|candidate| equivalent(candidate, value));
    let found = if hinted {
        Some(hint)
    } else {
        pool.iter()
            .zip(claimed.iter())
            .position(|(candidate, taken)| !*taken && equivalent(candidate, value))
    };
    match found.and_then(|index| claimed.get_mut(index)) {
        Some(slot) => {
            *slot = true;
            true
        }
        None => false,
    }
}

/// Name a sequence element for use in a path.
fn element_key(value: &Value, identity_fields: &[String]) -> ElementKey {
    if let Value::Object(map) = value {
        let identity = identity_fields.iter().find_map(|field| {
            map.get(field)
                .filter(|v| !v.is_null())
                .map(|v| (field, render_value(v)))
        });
        if let Some((field, rendered)) = identity {
            return ElementKey::Field {
                field: field.clone(),
                value: rendered,
            };
        }
    }
    ElementKey::Value {
        rendered: render_value(value),
    }
}
