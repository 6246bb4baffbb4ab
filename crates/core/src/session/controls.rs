//! Control ids and the buttons built from them.
//!
//! Ids are `dex:<action>:<argument>`, where the argument is the page a
//! navigation control was generated for, or the canonical entry name.

use regex::Regex;
use std::sync::LazyLock;

use crate::events::{Control, ControlStyle};

static CONTROL_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^dex:(prev|next|catch|release):(.+)$").ok());

/// What a control does when activated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    /// Go back one page from the captured page
    Previous { page: u32 },
    /// Go forward one page from the captured page
    Next { page: u32 },
    Catch { name: String },
    Release { name: String },
}

impl ControlAction {
    pub fn encode(&self) -> String {
        match self {
            Self::Previous { page } => format!("dex:prev:{}", page),
            Self::Next { page } => format!("dex:next:{}", page),
            Self::Catch { name } => format!("dex:catch:{}", name),
            Self::Release { name } => format!("dex:release:{}", name),
        }
    }

    /// Parse a control id; anything unrecognised is `None`
    pub fn parse(id: &str) -> Option<Self> {
        let captures = CONTROL_ID.as_ref()?.captures(id)?;
        let argument = captures.get(2)?.as_str();

        match captures.get(1)?.as_str() {
            "prev" => argument.parse().ok().map(|page| Self::Previous { page }),
            "next" => argument.parse().ok().map(|page| Self::Next { page }),
            "catch" => Some(Self::Catch {
                name: argument.to_string(),
            }),
            "release" => Some(Self::Release {
                name: argument.to_string(),
            }),
            _ => None,
        }
    }

    pub fn is_navigation(&self) -> bool {
        matches!(self, Self::Previous { .. } | Self::Next { .. })
    }
}

/// Previous/next buttons for a rendered page
pub fn pagination_controls(page: u32, total_pages: u32) -> Vec<Control> {
    vec![
        Control::new(
            ControlAction::Previous { page }.encode(),
            "Previous",
            ControlStyle::Primary,
        )
        .enabled(page > 1),
        Control::new(
            ControlAction::Next { page }.encode(),
            "Next",
            ControlStyle::Primary,
        )
        .enabled(page < total_pages),
    ]
}

/// The same buttons, all disabled
pub fn disabled_pagination_controls(page: u32, total_pages: u32) -> Vec<Control> {
    pagination_controls(page, total_pages)
        .into_iter()
        .map(|c| c.enabled(false))
        .collect()
}

/// Catch/release buttons for the info view; the current state's action is disabled
pub fn collection_controls(name: &str, caught: bool) -> Vec<Control> {
    vec![
        Control::new(
            ControlAction::Catch {
                name: name.to_string(),
            }
            .encode(),
            "Catch",
            ControlStyle::Success,
        )
        .enabled(!caught),
        Control::new(
            ControlAction::Release {
                name: name.to_string(),
            }
            .encode(),
            "Release",
            ControlStyle::Danger,
        )
        .enabled(caught),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_ids() {
        assert_eq!(
            ControlAction::parse("dex:prev:3"),
            Some(ControlAction::Previous { page: 3 })
        );
        assert_eq!(
            ControlAction::parse("dex:next:12"),
            Some(ControlAction::Next { page: 12 })
        );
        assert_eq!(
            ControlAction::parse("dex:catch:Mr. Mime"),
            Some(ControlAction::Catch {
                name: "Mr. Mime".to_string()
            })
        );
        assert_eq!(
            ControlAction::parse("dex:release:Type: Null"),
            Some(ControlAction::Release {
                name: "Type: Null".to_string()
            })
        );

        assert_eq!(ControlAction::parse("dex:next:abc"), None);
        assert_eq!(ControlAction::parse("dex:jump:3"), None);
        assert_eq!(ControlAction::parse("dexpage_next_3"), None);
        assert_eq!(ControlAction::parse(""), None);
    }

    #[test]
    fn test_encode_is_parseable() {
        let action = ControlAction::Next { page: 5 };
        assert_eq!(action.encode(), "dex:next:5");
        assert_eq!(ControlAction::parse(&action.encode()), Some(action));
    }

    #[test]
    fn test_pagination_controls_at_edges() {
        let first = pagination_controls(1, 10);
        assert!(!first[0].enabled);
        assert!(first[1].enabled);

        let last = pagination_controls(10, 10);
        assert!(last[0].enabled);
        assert!(!last[1].enabled);

        let only = pagination_controls(1, 1);
        assert!(only.iter().all(|c| !c.enabled));

        assert!(disabled_pagination_controls(5, 10)
            .iter()
            .all(|c| !c.enabled));
    }

    #[test]
    fn test_collection_controls() {
        let uncaught = collection_controls("Mew", false);
        assert_eq!(uncaught[0].id, "dex:catch:Mew");
        assert!(uncaught[0].enabled);
        assert!(!uncaught[1].enabled);

        let caught = collection_controls("Mew", true);
        assert!(!caught[0].enabled);
        assert!(caught[1].enabled);
    }
}
