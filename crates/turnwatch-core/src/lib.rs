//! Snapshot diffing, change classification, and turn tracking for Turnwatch.
//!
//! Turnwatch polls a hosted multiplayer game save and announces whose turn
//! it is. On a turn boundary it also diffs the new save against the last
//! one, sorts the differences into domain categories, and asks a
//! summarizer to turn them into a short narrative.
//!
//! # Modules
//!
//! - [`snapshot`] -- One decoded save with its turn counter and active player.
//! - [`path`] -- Structural paths that name sequence elements by identity.
//! - [`diff`] -- Order-insensitive tree diff producing [`ChangeEntry`] values.
//! - [`pattern`] -- Whole-path matchers with captures, as data.
//! - [`classify`] -- Pattern-driven sorting into a [`StructuredChangeReport`].
//! - [`report`] -- The classified record types.
//! - [`tracker`] -- [`TrackerState`]: baseline, transition detection, commit.
//! - [`capability`] -- Traits for the snapshot source, summarizer, sink and
//!   display-name lookup.
//! - [`message`] -- Base message text, fallback narrative, plain digest.
//! - [`watcher`] -- [`TurnWatcher`]: the poll cycle and the poll loop.
//!
//! [`ChangeEntry`]: diff::ChangeEntry
//! [`StructuredChangeReport`]: report::StructuredChangeReport
//! [`TrackerState`]: tracker::TrackerState
//! [`TurnWatcher`]: watcher::TurnWatcher

pub mod capability;
pub mod classify;
pub mod diff;
pub mod message;
pub mod path;
pub mod pattern;
pub mod report;
pub mod snapshot;
pub mod tracker;
pub mod watcher;

pub use capability::{
    DeliveryError, DisplayNames, FetchError, NameTable, NotificationSink, SnapshotSource,
    Summarizer, SummarizerError,
};
pub use classify::{ClassifierRules, classify};
pub use diff::{ChangeEntry, ChangeKind, DiffError, DiffOptions, diff, diff_values};
pub use report::{
    CityAction, CityChange, DiplomacyChange, MilitaryChange, StructuredChangeReport,
    TechnologyChange,
};
pub use snapshot::{Snapshot, SnapshotError};
pub use tracker::{TrackerPhase, TrackerState, Transition};
pub use watcher::{
    CallTimeouts, CycleOutcome, CycleReport, CycleStage, NarrativeSource, TurnWatcher, WatchSummary,
};
