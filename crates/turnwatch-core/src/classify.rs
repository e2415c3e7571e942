//! Change classifier: recovers domain meaning from diff paths.
//!
//! The game document has no published schema, so the classifier works from
//! the shape of each [`ChangeEntry`]'s path. Each category is one
//! [`PathPattern`] plus a required [`ChangeKind`]; rules are tried in a
//! fixed order (military, city, technology, diplomacy) and the first match
//! wins, so an entry lands in at most one category. Entries matching no
//! rule are dropped.
//!
//! Units live on map tiles rather than under their civilization, so the
//! military rule looks the unit up in the new document to learn its owner.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::diff::{ChangeEntry, ChangeKind};
use crate::path::{render_value, resolve};
use crate::pattern::{PathPattern, PatternSegment};
use crate::report::{
    CityAction, CityChange, DiplomacyChange, MilitaryChange, StructuredChangeReport,
    TechnologyChange,
};

/// Path patterns and payload field names the classifier relies on.
///
/// Defaults follow the Unciv save layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierRules {
    /// `Changed` entries inside a unit: captures the tile. The segments
    /// before the first `**` address the unit itself.
    pub military: PathPattern,
    /// `Added` city elements: captures civilization, city.
    pub city: PathPattern,
    /// Researched technologies: captures civilization first.
    pub technology: PathPattern,
    /// Diplomatic status: captures civilization, counterpart.
    pub diplomacy: PathPattern,
    /// Field on a unit naming the civilization that owns it.
    pub unit_owner_field: String,
    /// Field on a unit holding its name.
    pub unit_name_field: String,
    /// Field on a city payload holding its name.
    pub city_name_field: String,
    /// Field on a city payload naming the civilization that founded it.
    pub founding_field: String,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        use PatternSegment::{AnyElement, AnyKey, Key, Skip};

        let key = |name: &str| Key(name.to_owned());
        Self {
            military: PathPattern::new(vec![
                key("tileMap"),
                key("tileList"),
                AnyElement,
                key("militaryUnit"),
                Skip,
            ]),
            city: PathPattern::new(vec![
                key("civilizations"),
                AnyElement,
                key("cities"),
                AnyElement,
            ]),
            technology: PathPattern::new(vec![
                key("civilizations"),
                AnyElement,
                Skip,
                key("techsResearched"),
                Skip,
            ]),
            diplomacy: PathPattern::new(vec![
                key("civilizations"),
                AnyElement,
                key("diplomacy"),
                AnyKey,
                key("diplomaticStatus"),
            ]),
            unit_owner_field: "owner".to_owned(),
            unit_name_field: "name".to_owned(),
            city_name_field: "name".to_owned(),
            founding_field: "foundingCiv".to_owned(),
        }
    }
}

/// One entry's classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Matched the military rule.
    Military(MilitaryChange),
    /// Matched the city rule.
    City(CityChange),
    /// Matched the technology rule.
    Technology(TechnologyChange),
    /// Matched the diplomacy rule.
    Diplomacy(DiplomacyChange),
}

/// Classify entries with the default rules. `document` is the newer of the
/// two diffed documents.
pub fn classify(entries: &[ChangeEntry], document: &Value) -> StructuredChangeReport {
    ClassifierRules::default().classify(entries, document)
}

impl ClassifierRules {
    /// Sort `entries` into a [`StructuredChangeReport`]. `document` is the
    /// newer of the two diffed documents.
    pub fn classify(&self, entries: &[ChangeEntry], document: &Value) -> StructuredChangeReport {
        let mut report = StructuredChangeReport::default();
        let mut dropped: usize = 0;

        for entry in entries {
            match self.classify_entry(entry, document) {
                Some(Classified::Military(change)) => report.military.push(change),
                Some(Classified::City(change)) => report.cities.push(change),
                Some(Classified::Technology(change)) => report.technologies.push(change),
                Some(Classified::Diplomacy(change)) => report.diplomacy.push(change),
                None => dropped = dropped.saturating_add(1),
            }
        }

        debug!(
            entries = entries.len(),
            military = report.military.len(),
            cities = report.cities.len(),
            technologies = report.technologies.len(),
            diplomacy = report.diplomacy.len(),
            dropped = dropped,
            "change set classified"
        );
        report
    }

    /// Classify a single entry, or `None` if no rule recognizes it.
    pub fn classify_entry(&self, entry: &ChangeEntry, document: &Value) -> Option<Classified> {
        self.military_change(entry, document)
            .map(Classified::Military)
            .or_else(|| self.city_change(entry).map(Classified::City))
            .or_else(|| self.technology_change(entry).map(Classified::Technology))
            .or_else(|| self.diplomacy_change(entry).map(Classified::Diplomacy))
    }

    fn military_change(&self, entry: &ChangeEntry, document: &Value) -> Option<MilitaryChange> {
        if entry.kind != ChangeKind::Changed {
            return None;
        }
        let location = self.military.captures(&entry.path)?.into_iter().next()?;
        let unit_path = entry
            .path
            .segments()
            .get(..self.military.fixed_prefix_len())?;
        let unit = resolve(document, unit_path)?;

        // A unit without an owner cannot be attributed to anyone.
        let civilization = unit
            .get(&self.unit_owner_field)
            .filter(|owner| !owner.is_null())
            .map(render_value)?;
        let name = unit
            .get(&self.unit_name_field)
            .and_then(Value::as_str)
            .map_or_else(|| location.clone(), ToOwned::to_owned);

        Some(MilitaryChange {
            civilization,
            unit: name,
            location,
            path: entry.path.to_string(),
            old_value: entry.old_value.clone(),
            new_value: entry.new_value.clone(),
        })
    }

    fn city_change(&self, entry: &ChangeEntry) -> Option<CityChange> {
        if entry.kind != ChangeKind::Added {
            return None;
        }
        let mut captured = self.city.captures(&entry.path)?.into_iter();
        let civilization = captured.next()?;
        let identity = captured.next()?;
        let payload = entry.new_value.as_ref()?;

        let city_name = payload
            .get(&self.city_name_field)
            .and_then(Value::as_str)
            .map_or(identity, ToOwned::to_owned);

        // Heuristic kept as-is: a founding-civilization field on the new
        // payload means the city was founded, otherwise it was captured.
        let founded = payload
            .get(&self.founding_field)
            .is_some_and(|v| !v.is_null() && v.as_str() != Some(""));

        Some(CityChange {
            civilization,
            city_name,
            action: if founded {
                CityAction::Founded
            } else {
                CityAction::Captured
            },
        })
    }

    fn technology_change(&self, entry: &ChangeEntry) -> Option<TechnologyChange> {
        if !matches!(entry.kind, ChangeKind::Changed | ChangeKind::Added) {
            return None;
        }
        let civilization = self.technology.captures(&entry.path)?.into_iter().next()?;
        let technology = entry.new_value.as_ref().map(render_value)?;
        Some(TechnologyChange {
            civilization,
            technology,
        })
    }

    fn diplomacy_change(&self, entry: &ChangeEntry) -> Option<DiplomacyChange> {
        if entry.kind != ChangeKind::Changed {
            return None;
        }
        let mut captured = self.diplomacy.captures(&entry.path)?.into_iter();
        let civ_a = captured.next()?;
        let civ_b = captured.next()?;
        Some(DiplomacyChange {
            civilizations: [civ_a, civ_b],
            old_status: entry.old_value.as_ref().map(render_value)?,
            new_status: entry.new_value.as_ref().map(render_value)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::path::{ChangePath, ElementKey, PathSegment};

    fn civ(name: &str) -> Vec<PathSegment> {
        vec![
            PathSegment::key("civilizations"),
            PathSegment::field("civName", name),
        ]
    }

    fn at(mut base: Vec<PathSegment>, rest: Vec<PathSegment>) -> ChangePath {
        base.extend(rest);
        ChangePath::from(base)
    }

    fn tile_unit(x: u32, rest: Vec<PathSegment>) -> ChangePath {
        let mut segments = vec![
            PathSegment::key("tileMap"),
            PathSegment::key("tileList"),
            PathSegment::field("position", format!(r#"{{"x":{x},"y":0}}"#)),
            PathSegment::key("militaryUnit"),
        ];
        segments.extend(rest);
        ChangePath::from(segments)
    }

    fn map_with(units: Value) -> Value {
        json!({ "tileMap": { "tileList": units } })
    }

    #[test]
    fn unit_change_is_military() {
        let document = map_with(json!([
            {"position": {"x": 3, "y": 0}, "militaryUnit": {"owner": "Nok", "name": "Warrior", "health": 35}},
        ]));
        let entry = ChangeEntry::changed(
            tile_unit(3, vec![PathSegment::key("health")]),
            json!(100),
            json!(35),
        );
        let report = classify(&[entry], &document);
        assert_eq!(report.military.len(), 1);
        assert_eq!(report.military[0].civilization, "Nok");
        assert_eq!(report.military[0].unit, "Warrior");
        assert_eq!(report.military[0].location, r#"{"x":3,"y":0}"#);
        assert_eq!(report.military[0].new_value, Some(json!(35)));
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn unit_without_owner_is_dropped() {
        let document = map_with(json!([
            {"position": {"x": 5, "y": 0}, "militaryUnit": {"name": "Scout", "health": 80}},
        ]));
        let entry = ChangeEntry::changed(
            tile_unit(5, vec![PathSegment::key("health")]),
            json!(100),
            json!(80),
        );
        assert!(classify(&[entry], &document).is_empty());
    }

    #[test]
    fn units_under_civilizations_are_not_military() {
        let entry = ChangeEntry::changed(
            at(
                civ("Nok"),
                vec![
                    PathSegment::key("units"),
                    PathSegment::field("id", "4"),
                    PathSegment::key("health"),
                ],
            ),
            json!(100),
            json!(35),
        );
        assert!(classify(&[entry], &Value::Null).is_empty());
    }

    #[test]
    fn added_unit_is_not_military() {
        let document = map_with(json!([
            {"position": {"x": 1, "y": 0}, "militaryUnit": {"owner": "Nok", "name": "Archer"}},
        ]));
        let entry = ChangeEntry::added(
            tile_unit(1, vec![]),
            json!({"owner": "Nok", "name": "Archer"}),
        );
        assert!(classify(&[entry], &document).is_empty());
    }

    #[test]
    fn founded_and_captured_cities() {
        let founded = ChangeEntry::added(
            at(
                civ("Iroquois"),
                vec![PathSegment::key("cities"), PathSegment::field("name", "Onondaga")],
            ),
            json!({"name": "Onondaga", "foundingCiv": "Iroquois"}),
        );
        let captured = ChangeEntry::added(
            at(
                civ("Spain"),
                vec![PathSegment::key("cities"), PathSegment::field("id", "c-17")],
            ),
            json!({"id": "c-17", "name": "Thebes", "foundingCiv": ""}),
        );
        let report = classify(&[founded, captured], &Value::Null);
        assert_eq!(
            report.cities,
            vec![
                CityChange {
                    civilization: "Iroquois".to_owned(),
                    city_name: "Onondaga".to_owned(),
                    action: CityAction::Founded,
                },
                CityChange {
                    civilization: "Spain".to_owned(),
                    city_name: "Thebes".to_owned(),
                    action: CityAction::Captured,
                },
            ]
        );
    }

    #[test]
    fn city_name_falls_back_to_identity() {
        let entry = ChangeEntry::added(
            at(
                civ("Egypt"),
                vec![PathSegment::key("cities"), PathSegment::field("id", "Memphis")],
            ),
            json!({"id": "Memphis"}),
        );
        let report = classify(&[entry], &Value::Null);
        assert_eq!(report.cities[0].city_name, "Memphis");
        assert_eq!(report.cities[0].action, CityAction::Captured);
    }

    #[test]
    fn researched_technology_changed_or_added() {
        let changed = ChangeEntry::changed(
            at(
                civ("Egypt"),
                vec![PathSegment::key("tech"), PathSegment::key("techsResearched")],
            ),
            json!("Pottery"),
            json!("Bronze Working"),
        );
        let added = ChangeEntry::added(
            at(
                civ("Israel"),
                vec![
                    PathSegment::key("tech"),
                    PathSegment::key("techsResearched"),
                    PathSegment::Element {
                        key: ElementKey::Value {
                            rendered: "Writing".to_owned(),
                        },
                    },
                ],
            ),
            json!("Writing"),
        );
        let report = classify(&[changed, added], &Value::Null);
        assert_eq!(
            report.technologies,
            vec![
                TechnologyChange {
                    civilization: "Egypt".to_owned(),
                    technology: "Bronze Working".to_owned(),
                },
                TechnologyChange {
                    civilization: "Israel".to_owned(),
                    technology: "Writing".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn diplomatic_status_change() {
        let entry = ChangeEntry::changed(
            at(
                civ("Spain"),
                vec![
                    PathSegment::key("diplomacy"),
                    PathSegment::key("Egypt"),
                    PathSegment::key("diplomaticStatus"),
                ],
            ),
            json!("Peace"),
            json!("War"),
        );
        let report = classify(&[entry], &Value::Null);
        assert_eq!(
            report.diplomacy,
            vec![DiplomacyChange {
                civilizations: ["Spain".to_owned(), "Egypt".to_owned()],
                old_status: "Peace".to_owned(),
                new_status: "War".to_owned(),
            }]
        );
    }

    #[test]
    fn unrecognized_entries_are_dropped() {
        let entries = vec![
            ChangeEntry::changed(
                ChangePath::from(vec![PathSegment::key("turns")]),
                json!(1),
                json!(2),
            ),
            ChangeEntry::removed(
                at(
                    civ("Nok"),
                    vec![PathSegment::key("cities"), PathSegment::field("name", "Ife")],
                ),
                json!({"name": "Ife"}),
            ),
        ];
        assert!(classify(&entries, &Value::Null).is_empty());
    }

    #[test]
    fn rules_deserialize_from_partial_config() {
        let rules: ClassifierRules =
            serde_json::from_value(json!({"founding_field": "founder"})).unwrap();
        assert_eq!(rules.founding_field, "founder");
        assert_eq!(rules.city, ClassifierRules::default().city);
    }
}
