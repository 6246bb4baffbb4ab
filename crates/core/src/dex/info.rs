//! Info view for a single entry: tags, effectiveness, collection state.

use serde::Serialize;

use crate::catalog::{CatalogEntry, Effectiveness, EffectivenessClass, TypeName};
use crate::events::{CardField, CardTag, Control, InfoCard, Response};
use crate::session::collection_controls;
use crate::state::CatchRecord;

const CAUGHT_COLOR: &str = "#00ff00";
const UNCAUGHT_COLOR: &str = "#ff0000";

/// Everything shown for one looked-up entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoView {
    pub entry: CatalogEntry,
    #[serde(skip)]
    pub effectiveness: Effectiveness,
    pub record: Option<CatchRecord>,
}

impl InfoView {
    pub fn new(entry: CatalogEntry, record: Option<CatchRecord>) -> Self {
        let effectiveness = Effectiveness::against(&entry.types);
        Self {
            entry,
            effectiveness,
            record,
        }
    }

    pub fn is_caught(&self) -> bool {
        self.record.is_some()
    }

    pub fn card(&self) -> InfoCard {
        let types: Vec<&str> = self.entry.types.iter().map(TypeName::as_str).collect();
        let bucket = |class| self.effectiveness.bucket(class);

        let mut fields = Vec::new();
        let rows = [
            (
                "Weak to",
                bucket(EffectivenessClass::QuadWeak),
                bucket(EffectivenessClass::DoubleWeak),
            ),
            (
                "Resists",
                bucket(EffectivenessClass::QuarterResist),
                bucket(EffectivenessClass::HalfResist),
            ),
            ("Immune to", Vec::new(), bucket(EffectivenessClass::Immune)),
        ];
        for (name, strong, regular) in rows {
            if let Some(value) = format_type_list(&strong, &regular) {
                fields.push(CardField {
                    name: name.to_string(),
                    value,
                });
            }
        }

        InfoCard {
            title: format!("{} ({})", self.entry.name, types.join("/")),
            color: if self.is_caught() {
                CAUGHT_COLOR
            } else {
                UNCAUGHT_COLOR
            }
            .to_string(),
            tags: self
                .entry
                .types
                .iter()
                .map(|t| CardTag {
                    label: t.as_str().to_string(),
                    color: t.color().to_string(),
                })
                .collect(),
            fields,
            thumbnail: self.entry.thumbnail.clone(),
            footer: match &self.record {
                Some(record) => format!(
                    "Caught on {}",
                    record.caught_at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                None => "Uncaught".to_string(),
            },
        }
    }

    pub fn controls(&self) -> Vec<Control> {
        collection_controls(&self.entry.name, self.is_caught())
    }

    pub fn response(&self) -> Response {
        Response::default()
            .with_card(self.card())
            .with_controls(self.controls())
    }
}

/// `(strong...) regular...`; `None` when both lists are empty
fn format_type_list(strong: &[TypeName], regular: &[TypeName]) -> Option<String> {
    let mut parts = Vec::new();
    if !strong.is_empty() {
        let inner: Vec<&str> = strong.iter().map(TypeName::as_str).collect();
        parts.push(format!("({})", inner.join(" ")));
    }
    parts.extend(regular.iter().map(|t| t.as_str().to_string()));

    (!parts.is_empty()).then(|| parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_card_for_uncaught_dual_type() {
        let entry = testing::sample_catalog().get("Bulbasaur").cloned().unwrap();
        let view = InfoView::new(entry, None);
        let card = view.card();

        assert_eq!(card.title, "Bulbasaur (Grass/Poison)");
        assert_eq!(card.color, "#ff0000");
        assert_eq!(card.footer, "Uncaught");
        assert_eq!(card.thumbnail.as_deref(), Some("hires/1.png"));

        let tags: Vec<(&str, &str)> = card
            .tags
            .iter()
            .map(|t| (t.label.as_str(), t.color.as_str()))
            .collect();
        assert_eq!(tags, vec![("Grass", "#7AC74C"), ("Poison", "#A33EA1")]);

        let weak = card.fields.iter().find(|f| f.name == "Weak to").unwrap();
        assert_eq!(weak.value, "Fire Ice Flying Psychic");

        let resists = card.fields.iter().find(|f| f.name == "Resists").unwrap();
        assert_eq!(resists.value, "(Grass) Water Electric Fighting Fairy");

        assert!(card.fields.iter().all(|f| f.name != "Immune to"));

        let controls = view.controls();
        assert!(controls[0].enabled && !controls[1].enabled);
    }

    #[test]
    fn test_card_for_caught_entry() {
        let entry = testing::sample_catalog().get("Swampert").cloned().unwrap();
        let record = CatchRecord {
            name: "Swampert".to_string(),
            caught_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        };
        let view = InfoView::new(entry, Some(record));
        let card = view.card();

        assert_eq!(card.color, "#00ff00");
        assert_eq!(card.footer, "Caught on 2024-01-02 03:04:05 UTC");

        let weak = card.fields.iter().find(|f| f.name == "Weak to").unwrap();
        assert_eq!(weak.value, "(Grass)");
        let immune = card.fields.iter().find(|f| f.name == "Immune to").unwrap();
        assert_eq!(immune.value, "Electric");

        let response = view.response();
        assert!(response.card.is_some());
        assert!(!response.control_list()[0].enabled);
        assert!(response.control_list()[1].enabled);
    }

    #[test]
    fn test_format_type_list() {
        assert_eq!(format_type_list(&[], &[]), None);
        assert_eq!(
            format_type_list(&[TypeName::Grass], &[]).as_deref(),
            Some("(Grass)")
        );
        assert_eq!(
            format_type_list(&[TypeName::Fire, TypeName::Ice], &[TypeName::Rock]).as_deref(),
            Some("(Fire Ice) Rock")
        );
    }
}
