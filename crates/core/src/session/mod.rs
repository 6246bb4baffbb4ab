//! # Navigation Sessions
//!
//! Per-conversation paging through the grid. `machine` holds the pure state
//! transitions, `controls` the control-id wire format and `registry` the
//! actor that drives one session until it closes.

pub mod controls;
pub mod machine;
pub mod registry;

pub use controls::{collection_controls, pagination_controls, ControlAction};
pub use machine::{resolve_entry, NavigationSession, NavigationState, PageTarget, SessionPhase};
pub use registry::{DispatchOutcome, SessionRegistry, DEFAULT_INACTIVITY};
