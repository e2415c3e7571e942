//! Capability interfaces for the collaborators a poll cycle talks to.
//!
//! Each collaborator is a small trait with a `Result`-shaped contract so
//! the cycle decides, at the call site, whether a failure aborts the cycle
//! (fetch), degrades it (summarizer), or is only logged (delivery). Async
//! methods are declared as `impl Future + Send` so implementors can write
//! plain `async fn`.

use std::collections::BTreeMap;
use std::future::Future;

use crate::report::StructuredChangeReport;
use crate::snapshot::{Snapshot, SnapshotError};

/// Failure to obtain a snapshot. The cycle aborts with state unchanged.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("snapshot request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("snapshot server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The body could not be decoded into a JSON document.
    #[error("snapshot decode failed: {0}")]
    Decode(String),

    /// The decoded document lacks the turn counter or current player.
    #[error("snapshot is incomplete: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The fetch did not finish in time.
    #[error("snapshot fetch timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that was exceeded.
        timeout_ms: u128,
    },
}

/// Failure to produce a narrative. The cycle degrades to fallback text.
#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    /// The backend was unreachable or answered with an error.
    #[error("summarizer backend error: {0}")]
    Backend(String),

    /// The prompt could not be rendered.
    #[error("summarizer template error: {0}")]
    Template(String),

    /// The backend answered with blank text.
    #[error("summarizer returned an empty narrative")]
    Empty,

    /// The summarizer did not finish in time.
    #[error("summarizer timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that was exceeded.
        timeout_ms: u128,
    },
}

/// Failure to deliver a message. Logged, never retried.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The request could not be sent.
    #[error("delivery request failed: {0}")]
    Http(String),

    /// The messaging service refused the message.
    #[error("delivery rejected: {0}")]
    Rejected(String),

    /// The send did not finish in time.
    #[error("delivery timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that was exceeded.
        timeout_ms: u128,
    },
}

/// Where snapshots come from.
///
/// Servers may keep a cheap preview next to the full save. `fetch` is
/// called every poll and only needs the turn counter and current player;
/// `fetch_full` is called once per turn boundary and returns the document
/// that gets diffed.
pub trait SnapshotSource {
    /// Fetch and decode the current game state.
    fn fetch(&self) -> impl Future<Output = Result<Snapshot, FetchError>> + Send;

    /// Fetch the complete game state matching `preview`. Sources without a
    /// separate preview return it unchanged.
    fn fetch_full(
        &self,
        preview: Snapshot,
    ) -> impl Future<Output = Result<Snapshot, FetchError>> + Send {
        std::future::ready(Ok(preview))
    }
}

/// Turns a change report into prose.
pub trait Summarizer {
    /// Summarize `report`. Must cope with a report whose lists are all empty.
    fn summarize(
        &self,
        report: &StructuredChangeReport,
    ) -> impl Future<Output = Result<String, SummarizerError>> + Send;
}

/// Where notifications go.
pub trait NotificationSink {
    /// Deliver one message.
    fn send(&self, text: &str) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Maps player identifiers to the names used in messages.
pub trait DisplayNames {
    /// Display name for `player`.
    fn display_name(&self, player: &str) -> String;
}

/// Errors from parsing a [`NameTable`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameTableError {
    /// An entry is not of the form `player=name`.
    #[error("invalid name table entry `{0}`, expected `player=name`")]
    InvalidEntry(String),
}

/// Static player-to-display-name lookup. Unknown players are shown by
/// their raw identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    names: BTreeMap<String, String>,
}

impl NameTable {
    /// An empty table.
    pub const fn new() -> Self {
        Self {
            names: BTreeMap::new(),
        }
    }

    /// Add or replace one mapping.
    #[must_use]
    pub fn with(mut self, player: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(player.into(), name.into());
        self
    }

    /// Parse `Player=name` pairs separated by commas, e.g.
    /// `Spain=@sanechka,Nok=@unleex`. Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`NameTableError::InvalidEntry`] for an entry without `=` or
    /// with a blank side.
    pub fn parse(text: &str) -> Result<Self, NameTableError> {
        let mut table = Self::new();
        for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (player, name) = entry
                .split_once('=')
                .map(|(p, n)| (p.trim(), n.trim()))
                .filter(|(p, n)| !p.is_empty() && !n.is_empty())
                .ok_or_else(|| NameTableError::InvalidEntry(entry.to_owned()))?;
            table.names.insert(player.to_owned(), name.to_owned());
        }
        Ok(table)
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table has no mappings.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl DisplayNames for NameTable {
    fn display_name(&self, player: &str) -> String {
        self.names
            .get(player)
            .cloned()
            .unwrap_or_else(|| player.to_owned())
    }
}
