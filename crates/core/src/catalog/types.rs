//! # Category Tags and Type Effectiveness
//!
//! The closed set of 18 category tags and the static attack chart.
//! Effectiveness against an entry is the product of the chart lookups for
//! each of its defending tags, so two doubled weaknesses stack to ×4.

use serde::{Deserialize, Serialize};

/// A category tag from the fixed closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeName {
    Normal,
    Fire,
    Water,
    Electric,
    Grass,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

impl TypeName {
    /// All tags in canonical order
    pub const ALL: [TypeName; 18] = [
        TypeName::Normal,
        TypeName::Fire,
        TypeName::Water,
        TypeName::Electric,
        TypeName::Grass,
        TypeName::Ice,
        TypeName::Fighting,
        TypeName::Poison,
        TypeName::Ground,
        TypeName::Flying,
        TypeName::Psychic,
        TypeName::Bug,
        TypeName::Rock,
        TypeName::Ghost,
        TypeName::Dragon,
        TypeName::Dark,
        TypeName::Steel,
        TypeName::Fairy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Fire => "Fire",
            Self::Water => "Water",
            Self::Electric => "Electric",
            Self::Grass => "Grass",
            Self::Ice => "Ice",
            Self::Fighting => "Fighting",
            Self::Poison => "Poison",
            Self::Ground => "Ground",
            Self::Flying => "Flying",
            Self::Psychic => "Psychic",
            Self::Bug => "Bug",
            Self::Rock => "Rock",
            Self::Ghost => "Ghost",
            Self::Dragon => "Dragon",
            Self::Dark => "Dark",
            Self::Steel => "Steel",
            Self::Fairy => "Fairy",
        }
    }

    /// Parse a tag name, ignoring case
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Display color used for info cards
    pub fn color(&self) -> &'static str {
        match self {
            Self::Normal => "#A8A77A",
            Self::Fire => "#EE8130",
            Self::Water => "#6390F0",
            Self::Electric => "#F7D02C",
            Self::Grass => "#7AC74C",
            Self::Ice => "#96D9D6",
            Self::Fighting => "#C22E28",
            Self::Poison => "#A33EA1",
            Self::Ground => "#E2BF65",
            Self::Flying => "#A98FF3",
            Self::Psychic => "#F95587",
            Self::Bug => "#A6B91A",
            Self::Rock => "#B6A136",
            Self::Ghost => "#735797",
            Self::Dragon => "#6F35FC",
            Self::Dark => "#705746",
            Self::Steel => "#B7B7CE",
            Self::Fairy => "#D685AD",
        }
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sparse attack chart: attacking tag → (defending tag, multiplier).
/// Pairs not listed are neutral.
mod chart {
    use super::TypeName::{self, *};

    pub(super) const TABLE: [(TypeName, &[(TypeName, f64)]); 18] = [
        (Normal, &[(Rock, 0.5), (Ghost, 0.0), (Steel, 0.5)]),
        (
            Fire,
            &[
                (Fire, 0.5),
                (Water, 0.5),
                (Grass, 2.0),
                (Ice, 2.0),
                (Bug, 2.0),
                (Rock, 0.5),
                (Dragon, 0.5),
                (Steel, 2.0),
            ],
        ),
        (
            Water,
            &[
                (Fire, 2.0),
                (Water, 0.5),
                (Grass, 0.5),
                (Ground, 2.0),
                (Rock, 2.0),
                (Dragon, 0.5),
            ],
        ),
        (
            Electric,
            &[
                (Water, 2.0),
                (Electric, 0.5),
                (Grass, 0.5),
                (Ground, 0.0),
                (Flying, 2.0),
                (Dragon, 0.5),
            ],
        ),
        (
            Grass,
            &[
                (Fire, 0.5),
                (Water, 2.0),
                (Grass, 0.5),
                (Poison, 0.5),
                (Ground, 2.0),
                (Flying, 0.5),
                (Bug, 0.5),
                (Rock, 2.0),
                (Dragon, 0.5),
                (Steel, 0.5),
            ],
        ),
        (
            Ice,
            &[
                (Fire, 0.5),
                (Water, 0.5),
                (Grass, 2.0),
                (Ice, 0.5),
                (Ground, 2.0),
                (Flying, 2.0),
                (Dragon, 2.0),
                (Steel, 0.5),
            ],
        ),
        (
            Fighting,
            &[
                (Normal, 2.0),
                (Ice, 2.0),
                (Rock, 2.0),
                (Dark, 2.0),
                (Steel, 2.0),
                (Poison, 0.5),
                (Flying, 0.5),
                (Psychic, 0.5),
                (Bug, 0.5),
                (Ghost, 0.0),
                (Fairy, 0.5),
            ],
        ),
        (
            Poison,
            &[
                (Grass, 2.0),
                (Poison, 0.5),
                (Ground, 0.5),
                (Rock, 0.5),
                (Ghost, 0.5),
                (Steel, 0.0),
                (Fairy, 2.0),
            ],
        ),
        (
            Ground,
            &[
                (Fire, 2.0),
                (Electric, 2.0),
                (Grass, 0.5),
                (Poison, 2.0),
                (Flying, 0.0),
                (Bug, 0.5),
                (Rock, 2.0),
                (Steel, 2.0),
            ],
        ),
        (
            Flying,
            &[
                (Electric, 0.5),
                (Grass, 2.0),
                (Fighting, 2.0),
                (Bug, 2.0),
                (Rock, 0.5),
                (Steel, 0.5),
            ],
        ),
        (
            Psychic,
            &[
                (Fighting, 2.0),
                (Poison, 2.0),
                (Psychic, 0.5),
                (Dark, 0.0),
                (Steel, 0.5),
            ],
        ),
        (
            Bug,
            &[
                (Fire, 0.5),
                (Grass, 2.0),
                (Fighting, 0.5),
                (Poison, 0.5),
                (Flying, 0.5),
                (Psychic, 2.0),
                (Ghost, 0.5),
                (Dark, 2.0),
                (Steel, 0.5),
                (Fairy, 0.5),
            ],
        ),
        (
            Rock,
            &[
                (Fire, 2.0),
                (Ice, 2.0),
                (Fighting, 0.5),
                (Ground, 0.5),
                (Flying, 2.0),
                (Bug, 2.0),
                (Steel, 0.5),
            ],
        ),
        (
            Ghost,
            &[(Normal, 0.0), (Psychic, 2.0), (Ghost, 2.0), (Dark, 0.5)],
        ),
        (Dragon, &[(Dragon, 2.0), (Steel, 0.5), (Fairy, 0.0)]),
        (
            Dark,
            &[
                (Fighting, 0.5),
                (Psychic, 2.0),
                (Ghost, 2.0),
                (Dark, 0.5),
                (Fairy, 0.5),
            ],
        ),
        (
            Steel,
            &[
                (Fire, 0.5),
                (Water, 0.5),
                (Electric, 0.5),
                (Ice, 2.0),
                (Rock, 2.0),
                (Fairy, 2.0),
                (Steel, 0.5),
            ],
        ),
        (
            Fairy,
            &[
                (Fire, 0.5),
                (Fighting, 2.0),
                (Poison, 0.5),
                (Dragon, 2.0),
                (Dark, 2.0),
                (Steel, 0.5),
            ],
        ),
    ];
}

/// Chart lookup for one attacking tag against one defending tag
pub fn chart_multiplier(attack: TypeName, defend: TypeName) -> f64 {
    chart::TABLE
        .iter()
        .find(|(attacker, _)| *attacker == attack)
        .and_then(|(_, row)| row.iter().find(|(defender, _)| *defender == defend))
        .map(|(_, mult)| *mult)
        .unwrap_or(1.0)
}

/// Presentation bucket for a non-neutral multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectivenessClass {
    Immune,
    QuarterResist,
    HalfResist,
    DoubleWeak,
    QuadWeak,
}

impl EffectivenessClass {
    pub const ALL: [EffectivenessClass; 5] = [
        EffectivenessClass::Immune,
        EffectivenessClass::QuarterResist,
        EffectivenessClass::HalfResist,
        EffectivenessClass::DoubleWeak,
        EffectivenessClass::QuadWeak,
    ];

    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Immune => 0.0,
            Self::QuarterResist => 0.25,
            Self::HalfResist => 0.5,
            Self::DoubleWeak => 2.0,
            Self::QuadWeak => 4.0,
        }
    }

    /// Bucket for an exact multiplier; neutral (and anything else) has none
    pub fn from_multiplier(multiplier: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|class| class.multiplier() == multiplier)
    }
}

/// Non-neutral multipliers of every attacking tag against one entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effectiveness {
    entries: Vec<(TypeName, f64)>,
}

impl Effectiveness {
    /// Compute effectiveness against an entry's defending tags
    pub fn against(defending: &[TypeName]) -> Self {
        let entries = TypeName::ALL
            .into_iter()
            .filter_map(|attack| {
                let mult = defending
                    .iter()
                    .fold(1.0, |acc, defend| acc * chart_multiplier(attack, *defend));
                (mult != 1.0).then_some((attack, mult))
            })
            .collect();

        Self { entries }
    }

    /// Multiplier for an attacking tag (neutral tags report 1)
    pub fn multiplier(&self, attack: TypeName) -> f64 {
        self.entries
            .iter()
            .find(|(t, _)| *t == attack)
            .map(|(_, m)| *m)
            .unwrap_or(1.0)
    }

    /// Non-neutral entries in canonical tag order
    pub fn entries(&self) -> &[(TypeName, f64)] {
        &self.entries
    }

    /// Attacking tags that fall into the given bucket
    pub fn bucket(&self, class: EffectivenessClass) -> Vec<TypeName> {
        self.entries
            .iter()
            .filter(|(_, m)| *m == class.multiplier())
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TypeName::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(TypeName::parse("water"), Some(Water));
        assert_eq!(TypeName::parse(" FAIRY "), Some(Fairy));
        assert_eq!(TypeName::parse("Shadow"), None);
    }

    #[test]
    fn test_chart_defaults_to_neutral() {
        assert_eq!(chart_multiplier(Electric, Water), 2.0);
        assert_eq!(chart_multiplier(Electric, Ground), 0.0);
        assert_eq!(chart_multiplier(Normal, Fire), 1.0);
    }

    #[test]
    fn test_immunity_wins_over_weakness() {
        let eff = Effectiveness::against(&[Water, Ground]);
        assert_eq!(eff.multiplier(Electric), 0.0);
        assert_eq!(eff.bucket(EffectivenessClass::Immune), vec![Electric]);
    }

    #[test]
    fn test_cancelling_multipliers_are_omitted() {
        // Ice: 0.5 against Water, 2 against Dragon
        let eff = Effectiveness::against(&[Water, Dragon]);
        assert_eq!(eff.multiplier(Ice), 1.0);
        assert!(eff.entries().iter().all(|(t, _)| *t != Ice));
        for class in EffectivenessClass::ALL {
            assert!(!eff.bucket(class).contains(&Ice));
        }
    }

    #[test]
    fn test_weaknesses_stack() {
        let eff = Effectiveness::against(&[Water, Ground]);
        assert_eq!(eff.multiplier(Grass), 4.0);
        assert_eq!(eff.bucket(EffectivenessClass::QuadWeak), vec![Grass]);
        assert!(eff.bucket(EffectivenessClass::DoubleWeak).is_empty());

        let eff = Effectiveness::against(&[Grass, Poison]);
        assert_eq!(eff.multiplier(Grass), 0.25);
        assert_eq!(
            eff.bucket(EffectivenessClass::DoubleWeak),
            vec![Fire, Ice, Flying, Psychic]
        );
    }

    #[test]
    fn test_single_tag() {
        let eff = Effectiveness::against(&[Normal]);
        assert_eq!(eff.bucket(EffectivenessClass::Immune), vec![Ghost]);
        assert_eq!(eff.bucket(EffectivenessClass::DoubleWeak), vec![Fighting]);
        assert_eq!(eff.entries().len(), 2);
    }

    #[test]
    fn test_multipliers_stay_in_known_set() {
        for a in TypeName::ALL {
            for b in TypeName::ALL {
                let eff = Effectiveness::against(&[a, b]);
                for (_, m) in eff.entries() {
                    assert!(EffectivenessClass::from_multiplier(*m).is_some(), "{a}/{b}: {m}");
                }
            }
        }
    }
}
