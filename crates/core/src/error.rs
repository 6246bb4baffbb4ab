//! # Dex Errors
//!
//! Domain error taxonomy shared by the collection store, renderer and sessions.
//! Startup plumbing (config, catalog and database loading) uses `anyhow` instead.

use thiserror::Error;

use crate::state::CatchRecord;

/// Result alias for Dex operations
pub type DexResult<T> = Result<T, DexError>;

/// Errors surfaced by Dex operations
#[derive(Debug, Error)]
pub enum DexError {
    /// Fuzzy resolution found nothing above the confidence threshold
    #[error("no entry matches '{query}'")]
    NotFound {
        query: String,
        /// Near misses for a "did you mean" hint, best first
        suggestions: Vec<String>,
    },

    /// The resolved entry already has a catch record; the existing record is kept
    #[error("{} is already caught", .0.name)]
    AlreadyCaught(CatchRecord),

    /// The durable store rejected an operation for a reason other than uniqueness
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The storage handle could not be reached (poisoned lock, cancelled task)
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The grid could not be encoded
    #[error("render failed: {0}")]
    Render(String),

    /// An event arrived for a session that has already closed
    #[error("session expired")]
    SessionExpired,

    /// The response sink refused a payload
    #[error("transport failure: {0}")]
    Transport(String),
}

impl DexError {
    /// Whether this error is a storage failure that operators need to see
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::StorageUnavailable(_))
    }

    /// Text shown to the user for this error.
    ///
    /// `SessionExpired` yields `None`: expired sessions only lose their controls.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::NotFound { suggestions, .. } if !suggestions.is_empty() => Some(format!(
                "Couldn't find that Pokemon. Did you mean {}?",
                suggestions.join(", ")
            )),
            Self::NotFound { .. } => Some("Couldn't find that Pokemon.".to_string()),
            Self::AlreadyCaught(record) => Some(format!(
                "{} was already caught on {}.",
                record.name,
                record.caught_at.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            Self::SessionExpired => None,
            Self::Storage(_)
            | Self::StorageUnavailable(_)
            | Self::Render(_)
            | Self::Transport(_) => Some("An error occurred.".to_string()),
        }
    }
}
