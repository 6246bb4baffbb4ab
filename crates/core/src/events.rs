//! # Transport Events
//!
//! What the core consumes from a chat-like transport: inbound commands and
//! control activations, and a sink that can send or update a response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Visual style of a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

/// A button attached to a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    /// Opaque id echoed back verbatim on activation
    pub id: String,
    pub label: String,
    pub style: ControlStyle,
    pub enabled: bool,
}

impl Control {
    pub fn new(id: impl Into<String>, label: impl Into<String>, style: ControlStyle) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            style,
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Binary attachment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub file_name: String,
    #[serde(skip_serializing)]
    pub bytes: Arc<[u8]>,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, bytes: Arc<[u8]>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// One titled field of an info card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardField {
    pub name: String,
    pub value: String,
}

/// A colored label, e.g. one type tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardTag {
    pub label: String,
    pub color: String,
}

/// Rich info view for a single entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoCard {
    pub title: String,
    /// Accent color as `#rrggbb`
    pub color: String,
    /// Type tags in their display colors
    #[serde(default)]
    pub tags: Vec<CardTag>,
    pub fields: Vec<CardField>,
    pub thumbnail: Option<String>,
    pub footer: String,
}

/// A response payload, used both for sending and for updating.
///
/// On update, `None` fields are left as they were. `controls: Some(vec![])`
/// removes all controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Response {
    pub content: Option<String>,
    pub image: Option<Artifact>,
    pub card: Option<InfoCard>,
    pub controls: Option<Vec<Control>>,
    /// Only visible to the invoking user
    pub ephemeral: bool,
}

impl Response {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Update that only replaces the controls
    pub fn controls_only(controls: Vec<Control>) -> Self {
        Self {
            controls: Some(controls),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image: Artifact) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_card(mut self, card: InfoCard) -> Self {
        self.card = Some(card);
        self
    }

    pub fn with_controls(mut self, controls: Vec<Control>) -> Self {
        self.controls = Some(controls);
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    /// Merge an update into this response
    pub fn apply_update(&mut self, update: Response) {
        if update.content.is_some() {
            self.content = update.content;
        }
        if update.image.is_some() {
            self.image = update.image;
        }
        if update.card.is_some() {
            self.card = update.card;
        }
        if update.controls.is_some() {
            self.controls = update.controls;
        }
    }

    /// Controls currently attached, empty when there are none
    pub fn control_list(&self) -> &[Control] {
        self.controls.as_deref().unwrap_or(&[])
    }
}

/// Where responses for one conversation go
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Send a new response
    async fn send(&self, response: Response) -> anyhow::Result<()>;

    /// Update the most recently sent response
    async fn update(&self, response: Response) -> anyhow::Result<()>;
}

/// Identity of one interaction/conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Command arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum DexCommand {
    /// Open the grid at a page number or an entry name
    View {
        #[serde(default)]
        page: Option<String>,
    },
    /// Show the info view for one entry
    Find { query: String },
}

/// Something the transport received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Command {
        key: SessionKey,
        command: DexCommand,
    },
    Control {
        key: SessionKey,
        control_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_update_keeps_unset_fields() {
        let bytes: Arc<[u8]> = Arc::from(vec![1u8, 2, 3]);
        let mut response = Response::text("Page 1/3")
            .with_image(Artifact::new("dexgrid.png", bytes))
            .with_controls(vec![Control::new("dex:next:1", "Next", ControlStyle::Primary)]);

        response.apply_update(Response::controls_only(vec![Control::new(
            "dex:next:1",
            "Next",
            ControlStyle::Primary,
        )
        .enabled(false)]));
        assert_eq!(response.content.as_deref(), Some("Page 1/3"));
        assert!(response.image.is_some());
        assert!(!response.control_list()[0].enabled);

        response.apply_update(Response::controls_only(Vec::new()));
        assert!(response.control_list().is_empty());
        assert_eq!(response.controls, Some(Vec::new()));
    }

    #[test]
    fn test_inbound_event_serialization() {
        let event = InboundEvent::Command {
            key: SessionKey::from("chan-1"),
            command: DexCommand::View {
                page: Some("pikachu".to_string()),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"command\""));
        assert!(json.contains("\"name\":\"view\""));
        assert!(json.contains("\"key\":\"chan-1\""));

        let parsed: InboundEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_artifact_bytes_are_not_serialized() {
        let response = Response::default().with_image(Artifact::new(
            "dexgrid.png",
            Arc::from(vec![0u8; 16]),
        ));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["image"]["file_name"], "dexgrid.png");
        assert!(json["image"].get("bytes").is_none());
    }
}
