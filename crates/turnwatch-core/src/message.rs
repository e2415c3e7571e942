//! Notification text.
//!
//! The base message announces whose turn it is. The narrative message comes
//! from a [`Summarizer`]; [`ReportDigest`] is the deterministic one used
//! when no language model is configured.

use std::collections::BTreeMap;
use std::future::Future;

use crate::capability::{DisplayNames, Summarizer, SummarizerError};
use crate::report::{CityAction, StructuredChangeReport};
use crate::snapshot::Snapshot;
use crate::tracker::Transition;

/// Sent in place of the narrative when the summarizer fails.
pub const FALLBACK_NARRATIVE: &str =
    "The turn summary is unavailable this time; check the game for details.";

/// Narrative for a turn whose report has no recognized changes.
pub const QUIET_TURN_NARRATIVE: &str = "A quiet turn: nothing notable changed on the map.";

/// Announce the active player for `snapshot`.
pub fn base_message(
    transition: Transition,
    snapshot: &Snapshot,
    names: &impl DisplayNames,
) -> String {
    let player = names.display_name(snapshot.current_player());
    match transition {
        Transition::PlayerChanged => format!(
            "Turn #{}: player changed, now playing: {player}",
            snapshot.turn()
        ),
        Transition::Initial | Transition::TurnChanged | Transition::Unchanged => {
            format!("Turn #{}, now playing: {player}", snapshot.turn())
        }
    }
}

/// Plain-text summarizer that lists each classified change.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportDigest;

impl ReportDigest {
    /// Render `report` as one line per change.
    pub fn render(report: &StructuredChangeReport) -> String {
        if report.is_empty() {
            return QUIET_TURN_NARRATIVE.to_owned();
        }

        let cities = report.cities.iter().map(|city| {
            let verb = match city.action {
                CityAction::Founded => "founded",
                CityAction::Captured => "captured",
            };
            format!("{} {verb} {}.", city.civilization, city.city_name)
        });
        let technologies = report
            .technologies
            .iter()
            .map(|tech| format!("{} researched {}.", tech.civilization, tech.technology));
        let diplomacy = report.diplomacy.iter().map(|change| {
            let [civ_a, civ_b] = &change.civilizations;
            format!(
                "{civ_a} and {civ_b}: {} -> {}.",
                change.old_status, change.new_status
            )
        });

        let mut per_civ: BTreeMap<&str, usize> = BTreeMap::new();
        for unit in &report.military {
            let count = per_civ.entry(unit.civilization.as_str()).or_insert(0);
            *count = count.saturating_add(1);
        }
        let military = per_civ.into_iter().map(|(civ, count)| {
            let noun = if count == 1 { "change" } else { "changes" };
            format!("{civ}: {count} unit {noun}.")
        });

        cities
            .chain(technologies)
            .chain(diplomacy)
            .chain(military)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Summarizer for ReportDigest {
    fn summarize(
        &self,
        report: &StructuredChangeReport,
    ) -> impl Future<Output = Result<String, SummarizerError>> + Send {
        std::future::ready(Ok(Self::render(report)))
    }
}
