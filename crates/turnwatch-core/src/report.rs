//! Domain-classified change records handed to the narrative layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A military unit of one civilization changed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilitaryChange {
    /// Owning civilization.
    pub civilization: String,
    /// The unit's name, or its location when the unit has no name.
    pub unit: String,
    /// Identity of the tile holding the unit.
    pub location: String,
    /// Rendered path of the changed value.
    pub path: String,
    /// Value before the turn.
    pub old_value: Option<Value>,
    /// Value after the turn.
    pub new_value: Option<Value>,
}

/// How a city entered a civilization's city list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CityAction {
    /// The city carries a founding-civilization field.
    Founded,
    /// The city carries no founding-civilization field.
    Captured,
}

impl fmt::Display for CityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Founded => f.write_str("Founded"),
            Self::Captured => f.write_str("Captured"),
        }
    }
}

/// A city appeared under a civilization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityChange {
    /// Civilization that now holds the city.
    pub civilization: String,
    /// City name.
    pub city_name: String,
    /// Founded or captured.
    pub action: CityAction,
}

/// A civilization's researched technologies changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologyChange {
    /// Researching civilization.
    pub civilization: String,
    /// The new value under the researched-technologies field.
    pub technology: String,
}

/// The diplomatic status between two civilizations changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiplomacyChange {
    /// The civilization whose record changed, then its counterpart.
    pub civilizations: [String; 2],
    /// Status before the turn.
    pub old_status: String,
    /// Status after the turn.
    pub new_status: String,
}

/// Changes between two snapshots sorted into domain categories.
///
/// Each list keeps the order in which the differ emitted the matching
/// entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredChangeReport {
    /// Unit changes.
    pub military: Vec<MilitaryChange>,
    /// New cities.
    pub cities: Vec<CityChange>,
    /// Technology progress.
    pub technologies: Vec<TechnologyChange>,
    /// Diplomatic status changes.
    pub diplomacy: Vec<DiplomacyChange>,
}

impl StructuredChangeReport {
    /// Whether no category has any record.
    pub fn is_empty(&self) -> bool {
        self.military.is_empty()
            && self.cities.is_empty()
            && self.technologies.is_empty()
            && self.diplomacy.is_empty()
    }

    /// Total records across all categories.
    pub fn len(&self) -> usize {
        self.military
            .len()
            .saturating_add(self.cities.len())
            .saturating_add(self.technologies.len())
            .saturating_add(self.diplomacy.len())
    }
}
