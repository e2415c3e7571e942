//! Turn state tracking.
//!
//! [`TrackerState`] remembers the last committed turn, active player and
//! baseline snapshot. It is owned by the caller and lent to each poll
//! cycle, which asks it whether a transition happened and commits only once
//! the notification cycle has finished. The baseline is the full save from
//! the last turn boundary; a player change within a turn moves the turn and
//! player marks but keeps the baseline.
//!
//! ```text
//!                 commit                      detect != Unchanged
//! Uninitialized ---------> Tracking  ------------------------------> Transitioning
//!                             ^                                           |
//!                             +------------ commit / abandon -------------+
//! ```

use chrono::{DateTime, Utc};

use crate::snapshot::Snapshot;

/// Externally meaningful tracker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// No baseline yet.
    Uninitialized,
    /// A baseline is held.
    Tracking,
    /// A cycle is between detecting a transition and committing it.
    Transitioning,
}

/// What a freshly fetched snapshot means relative to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same turn, same player.
    Unchanged,
    /// First snapshot ever seen; nothing to diff against.
    Initial,
    /// Same turn, different active player.
    PlayerChanged,
    /// The turn counter differs from the baseline.
    TurnChanged,
}

impl Transition {
    /// Whether this transition warrants a diff against the baseline.
    pub const fn needs_diff(self) -> bool {
        matches!(self, Self::TurnChanged)
    }

    /// Whether this transition replaces the baseline document.
    pub const fn refreshes_baseline(self) -> bool {
        matches!(self, Self::Initial | Self::TurnChanged)
    }

    /// Whether this transition sends any notification.
    pub const fn notifies(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Last committed view of the game.
#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    last_turn: Option<u64>,
    last_active_player: Option<String>,
    last_snapshot: Option<Snapshot>,
    committed_at: Option<DateTime<Utc>>,
    in_flight: bool,
}

impl TrackerState {
    /// A tracker with no baseline.
    pub const fn new() -> Self {
        Self {
            last_turn: None,
            last_active_player: None,
            last_snapshot: None,
            committed_at: None,
            in_flight: false,
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> TrackerPhase {
        if self.in_flight {
            TrackerPhase::Transitioning
        } else if self.last_snapshot.is_some() {
            TrackerPhase::Tracking
        } else {
            TrackerPhase::Uninitialized
        }
    }

    /// Last committed turn.
    pub const fn last_turn(&self) -> Option<u64> {
        self.last_turn
    }

    /// Last committed active player.
    pub fn last_active_player(&self) -> Option<&str> {
        self.last_active_player.as_deref()
    }

    /// The baseline snapshot, if any.
    pub const fn baseline(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    /// When the baseline was committed.
    pub const fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.committed_at
    }

    /// Classify `snapshot` against the baseline. Does not mutate state.
    pub fn detect(&self, snapshot: &Snapshot) -> Transition {
        let Some(last_turn) = self.last_turn else {
            return Transition::Initial;
        };
        if snapshot.turn() != last_turn {
            Transition::TurnChanged
        } else if self.last_active_player.as_deref() != Some(snapshot.current_player()) {
            Transition::PlayerChanged
        } else {
            Transition::Unchanged
        }
    }

    /// Mark the start of a notification cycle.
    pub const fn begin_transition(&mut self) {
        self.in_flight = true;
    }

    /// Leave the baseline untouched and end the cycle.
    pub const fn abandon_transition(&mut self) {
        self.in_flight = false;
    }

    /// Adopt `snapshot` as the new baseline and end the cycle.
    pub fn commit(&mut self, snapshot: Snapshot) {
        self.last_turn = Some(snapshot.turn());
        self.last_active_player = Some(snapshot.current_player().to_owned());
        self.last_snapshot = Some(snapshot);
        self.committed_at = Some(Utc::now());
        self.in_flight = false;
    }

    /// Record the turn and active player of `snapshot`, keep the baseline
    /// document, and end the cycle.
    pub fn commit_player(&mut self, snapshot: &Snapshot) {
        self.last_turn = Some(snapshot.turn());
        self.last_active_player = Some(snapshot.current_player().to_owned());
        self.committed_at = Some(Utc::now());
        self.in_flight = false;
    }
}
