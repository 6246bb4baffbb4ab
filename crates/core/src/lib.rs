//! # Dexkeeper Core
//!
//! Catalog-backed collection tracking and paginated grid navigation.
//!
//! ## Architecture
//!
//! - `catalog/` - immutable catalog, display subset and type effectiveness
//! - `search` - fuzzy name resolution over the display subset
//! - `state/` - SQLite database and the collection store
//! - `render/` - grid rendering and image assets
//! - `session/` - navigation state machine and session registry
//! - `dex/` - service facade tying the request paths together
//! - `events` - transport-facing payloads and the response sink
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dexkeeper_core::config::DexConfig;
//! use dexkeeper_core::dex::Dex;
//!
//! let config = DexConfig::load().await?;
//! let dex = Dex::bootstrap(&config).await?;
//! let view = dex.find("pikachu").await?;
//! ```

pub mod catalog;
pub mod config;
pub mod dex;
pub mod error;
pub mod events;
pub mod render;
pub mod search;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{DexError, DexResult};
