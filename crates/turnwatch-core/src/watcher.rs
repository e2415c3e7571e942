//! Poll cycle orchestration.
//!
//! One cycle runs strictly in sequence:
//!
//! ```text
//! fetch --> detect --> fetch full --> diff --> classify --> summarize --> send base --> send narrative --> commit
//! ```
//!
//! The full save is fetched only when the transition replaces the baseline
//! (first snapshot or new turn). Every external call runs under its own
//! deadline. A failed or slow fetch, or a diff that trips the depth guard,
//! aborts the cycle with the tracker untouched. A failed summarizer degrades to [`FALLBACK_NARRATIVE`]. A
//! failed delivery is logged and skipped. In the last two cases the
//! baseline still commits, so turn tracking never falls behind because of
//! a flaky downstream service.
//!
//! [`FALLBACK_NARRATIVE`]: crate::message::FALLBACK_NARRATIVE

use std::future::Future;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, error, info, warn};

use crate::capability::{
    DeliveryError, DisplayNames, FetchError, NotificationSink, SnapshotSource, Summarizer,
    SummarizerError,
};
use crate::classify::ClassifierRules;
use crate::diff::{DiffError, DiffOptions, diff_values};
use crate::message::{FALLBACK_NARRATIVE, base_message};
use crate::report::StructuredChangeReport;
use crate::snapshot::Snapshot;
use crate::tracker::{TrackerState, Transition};

/// Shortest interval [`TurnWatcher::run_until`] polls at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Deadlines for each external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeouts {
    /// Snapshot fetch, preview and full save alike.
    pub fetch: Duration,
    /// Narrative generation.
    pub summarize: Duration,
    /// One message delivery.
    pub send: Duration,
}

impl CallTimeouts {
    /// The same deadline for every call.
    pub const fn uniform(deadline: Duration) -> Self {
        Self {
            fetch: deadline,
            summarize: deadline,
            send: deadline,
        }
    }
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(15))
    }
}

/// Which stage ended a cycle early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    /// Preview or full snapshot fetch or decode.
    Fetch,
    /// Tree diff.
    Diff,
}

/// Where the narrative message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeSource {
    /// The configured summarizer.
    Summarizer,
    /// The fixed fallback text.
    Fallback,
}

/// What a completed notification cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// The transition that triggered the cycle.
    pub transition: Transition,
    /// Turn now committed.
    pub turn: u64,
    /// Active player now committed.
    pub player: String,
    /// Classified changes, present only for turn changes.
    pub report: Option<StructuredChangeReport>,
    /// Origin of the narrative, present only for turn changes.
    pub narrative: Option<NarrativeSource>,
    /// Messages the sink accepted.
    pub delivered: usize,
    /// Messages the sink rejected or timed out on.
    pub failed_deliveries: usize,
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Same turn and player as the baseline; nothing done.
    Unchanged {
        /// The unchanged turn.
        turn: u64,
    },
    /// The cycle stopped early; the tracker was not modified.
    Aborted {
        /// The stage that failed.
        stage: CycleStage,
        /// Rendered error.
        reason: String,
    },
    /// A transition was announced and committed.
    Notified(CycleReport),
}

/// Counters over a [`TurnWatcher::run_until`] session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Polls performed.
    pub cycles: u64,
    /// Polls that announced a transition.
    pub notified: u64,
    /// Polls that aborted.
    pub aborted: u64,
}

impl WatchSummary {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles = self.cycles.saturating_add(1);
        match outcome {
            CycleOutcome::Unchanged { .. } => {}
            CycleOutcome::Aborted { .. } => self.aborted = self.aborted.saturating_add(1),
            CycleOutcome::Notified(_) => self.notified = self.notified.saturating_add(1),
        }
    }
}

/// Drives poll cycles against a set of collaborators.
///
/// The watcher holds no game state of its own: the caller owns the
/// [`TrackerState`] and lends it to each [`poll`](Self::poll).
pub struct TurnWatcher<S, N, D, R> {
    source: S,
    summarizer: N,
    sink: D,
    names: R,
    rules: ClassifierRules,
    diff_options: DiffOptions,
    timeouts: CallTimeouts,
}

impl<S, N, D, R> TurnWatcher<S, N, D, R>
where
    S: SnapshotSource,
    N: Summarizer,
    D: NotificationSink,
    R: DisplayNames,
{
    /// Create a watcher with default classifier rules and diff options.
    pub fn new(source: S, summarizer: N, sink: D, names: R, timeouts: CallTimeouts) -> Self {
        Self {
            source,
            summarizer,
            sink,
            names,
            rules: ClassifierRules::default(),
            diff_options: DiffOptions::default(),
            timeouts,
        }
    }

    /// Replace the classifier rules.
    #[must_use]
    pub fn with_rules(mut self, rules: ClassifierRules) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the diff options.
    #[must_use]
    pub fn with_diff_options(mut self, options: DiffOptions) -> Self {
        self.diff_options = options;
        self
    }

    /// Run one poll cycle against `state`.
    pub async fn poll(&self, state: &mut TrackerState) -> CycleOutcome {
        let preview = match self.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "snapshot fetch failed, skipping cycle");
                return CycleOutcome::Aborted {
                    stage: CycleStage::Fetch,
                    reason: e.to_string(),
                };
            }
        };

        let transition = state.detect(&preview);
        if !transition.notifies() {
            debug!(
                turn = preview.turn(),
                player = preview.current_player(),
                "no transition"
            );
            return CycleOutcome::Unchanged {
                turn: preview.turn(),
            };
        }

        info!(
            ?transition,
            previous_turn = state.last_turn(),
            previous_player = state.last_active_player(),
            turn = preview.turn(),
            player = preview.current_player(),
            "transition detected"
        );
        state.begin_transition();

        let snapshot = if transition.refreshes_baseline() {
            match self.fetch_full(preview).await {
                Ok(full) => full,
                Err(e) => {
                    warn!(error = %e, "full snapshot fetch failed, skipping cycle");
                    state.abandon_transition();
                    return CycleOutcome::Aborted {
                        stage: CycleStage::Fetch,
                        reason: e.to_string(),
                    };
                }
            }
        } else {
            preview
        };

        let report = if transition.needs_diff() {
            match self.changes_since_baseline(state.baseline(), &snapshot) {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, turn = snapshot.turn(), "diff failed, skipping cycle");
                    state.abandon_transition();
                    return CycleOutcome::Aborted {
                        stage: CycleStage::Diff,
                        reason: e.to_string(),
                    };
                }
            }
        } else {
            None
        };

        let mut messages = vec![base_message(transition, &snapshot, &self.names)];
        let mut narrative = None;
        if let Some(report) = &report {
            let (text, source) = self.narrate(report).await;
            messages.push(text);
            narrative = Some(source);
        }

        let mut delivered: usize = 0;
        let mut failed_deliveries: usize = 0;
        for text in &messages {
            match self.send(text).await {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(e) => {
                    warn!(error = %e, "notification delivery failed");
                    failed_deliveries = failed_deliveries.saturating_add(1);
                }
            }
        }

        let turn = snapshot.turn();
        let player = snapshot.current_player().to_owned();
        if transition.refreshes_baseline() {
            state.commit(snapshot);
        } else {
            state.commit_player(&snapshot);
        }
        info!(
            turn = turn,
            player = player,
            delivered = delivered,
            failed_deliveries = failed_deliveries,
            "baseline committed"
        );

        CycleOutcome::Notified(CycleReport {
            transition,
            turn,
            player,
            report,
            narrative,
            delivered,
            failed_deliveries,
        })
    }

    /// Poll on a fixed interval until `shutdown` resolves.
    ///
    /// The first poll happens immediately. `shutdown` is only observed
    /// between cycles: a cycle that has started always runs to completion.
    /// An interval below one millisecond is raised to one millisecond.
    pub async fn run_until<F>(
        &self,
        state: &mut TrackerState,
        interval: Duration,
        shutdown: F,
    ) -> WatchSummary
    where
        F: Future<Output = ()>,
    {
        let mut summary = WatchSummary::default();
        if interval < MIN_INTERVAL {
            warn!(?interval, "poll interval too short, using 1ms");
        }
        let interval = interval.max(MIN_INTERVAL);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_ms = interval.as_millis(), "watch loop starting");
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            let outcome = self.poll(state).await;
            summary.record(&outcome);
        }
        info!(
            cycles = summary.cycles,
            notified = summary.notified,
            aborted = summary.aborted,
            "watch loop stopped"
        );
        summary
    }

    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        timeout(self.timeouts.fetch, self.source.fetch())
            .await
            .map_err(|_elapsed| FetchError::Timeout {
                timeout_ms: self.timeouts.fetch.as_millis(),
            })?
    }

    async fn fetch_full(&self, preview: Snapshot) -> Result<Snapshot, FetchError> {
        timeout(self.timeouts.fetch, self.source.fetch_full(preview))
            .await
            .map_err(|_elapsed| FetchError::Timeout {
                timeout_ms: self.timeouts.fetch.as_millis(),
            })?
    }

    fn changes_since_baseline(
        &self,
        baseline: Option<&Snapshot>,
        snapshot: &Snapshot,
    ) -> Result<Option<StructuredChangeReport>, DiffError> {
        let Some(baseline) = baseline else {
            return Ok(None);
        };
        let entries = diff_values(baseline.document(), snapshot.document(), &self.diff_options)?;
        debug!(
            entries = entries.len(),
            from_turn = baseline.turn(),
            to_turn = snapshot.turn(),
            "snapshots diffed"
        );
        Ok(Some(self.rules.classify(&entries, snapshot.document())))
    }

    async fn narrate(&self, report: &StructuredChangeReport) -> (String, NarrativeSource) {
        let result = timeout(self.timeouts.summarize, self.summarizer.summarize(report))
            .await
            .map_err(|_elapsed| SummarizerError::Timeout {
                timeout_ms: self.timeouts.summarize.as_millis(),
            })
            .and_then(|inner| inner)
            .and_then(|text| {
                if text.trim().is_empty() {
                    Err(SummarizerError::Empty)
                } else {
                    Ok(text)
                }
            });

        match result {
            Ok(text) => (text, NarrativeSource::Summarizer),
            Err(e) => {
                warn!(error = %e, "narrative generation failed, using fallback text");
                (FALLBACK_NARRATIVE.to_owned(), NarrativeSource::Fallback)
            }
        }
    }

    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        timeout(self.timeouts.send, self.sink.send(text))
            .await
            .map_err(|_elapsed| DeliveryError::Timeout {
                timeout_ms: self.timeouts.send.as_millis(),
            })?
    }
}
