//! Navigation state machine: `Idle → Rendered → … → Closed`.

use std::sync::Arc;

use super::controls::{pagination_controls, ControlAction};
use crate::events::Control;
use crate::render::RenderedPage;
use crate::search::FuzzyResolver;

/// Where a session should start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTarget {
    pub page: u32,
    pub highlight: Option<usize>,
}

impl PageTarget {
    pub fn first() -> Self {
        Self {
            page: 1,
            highlight: None,
        }
    }

    /// Page and cell holding a display index
    pub fn for_display_index(display_index: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            page: (display_index / capacity) as u32 + 1,
            highlight: Some(display_index % capacity),
        }
    }
}

/// Resolve a command argument: an in-range page number is used as is,
/// anything else is fuzzy-matched. Unresolved input starts at page 1.
pub fn resolve_entry(
    argument: Option<&str>,
    total_pages: u32,
    capacity: usize,
    resolver: &FuzzyResolver,
) -> PageTarget {
    let Some(argument) = argument.map(str::trim).filter(|a| !a.is_empty()) else {
        return PageTarget::first();
    };

    if let Ok(page) = argument.parse::<u32>() {
        if (1..=total_pages).contains(&page) {
            return PageTarget {
                page,
                highlight: None,
            };
        }
    }

    match resolver.resolve(argument) {
        Some(found) => PageTarget::for_display_index(found.display_index, capacity),
        None => {
            tracing::debug!(argument, "No entry matched, starting at page 1");
            PageTarget::first()
        }
    }
}

/// Per-session navigation state while rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationState {
    pub page: u32,
    pub total_pages: u32,
    pub highlight: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Rendered(NavigationState),
    Closed,
}

/// One session's state machine
#[derive(Debug, Clone)]
pub struct NavigationSession {
    phase: SessionPhase,
    last_artifact: Option<Arc<[u8]>>,
}

impl Default for NavigationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationSession {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            last_artifact: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> Option<NavigationState> {
        match self.phase {
            SessionPhase::Rendered(state) => Some(state),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// PNG bytes of the latest render
    pub fn last_artifact(&self) -> Option<&Arc<[u8]>> {
        self.last_artifact.as_ref()
    }

    /// Move to `Rendered` for a freshly produced page. Ignored once closed.
    pub fn record_render(&mut self, rendered: &RenderedPage) {
        if self.is_closed() {
            return;
        }
        self.phase = SessionPhase::Rendered(NavigationState {
            page: rendered.page,
            total_pages: rendered.total_pages,
            highlight: rendered.highlight,
        });
        self.last_artifact = Some(Arc::clone(&rendered.png));
    }

    /// Controls for the current render; none unless rendered
    pub fn controls(&self) -> Vec<Control> {
        match self.state() {
            Some(state) => pagination_controls(state.page, state.total_pages),
            None => Vec::new(),
        }
    }

    /// Target page for a navigation action, or `None` when the action does
    /// not apply: not rendered, not navigation, or captured for another page.
    pub fn next_page(&self, action: &ControlAction) -> Option<u32> {
        let state = self.state()?;
        let (captured, forward) = match action {
            ControlAction::Previous { page } => (*page, false),
            ControlAction::Next { page } => (*page, true),
            _ => return None,
        };

        if captured != state.page {
            tracing::debug!(captured, current = state.page, "Stale control ignored");
            return None;
        }

        let target = if forward {
            captured.saturating_add(1)
        } else {
            captured.saturating_sub(1)
        };
        Some(target.clamp(1, state.total_pages.max(1)))
    }

    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
        self.last_artifact = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn rendered(page: u32, total_pages: u32, highlight: Option<usize>) -> RenderedPage {
        RenderedPage {
            png: Arc::from(vec![0u8; 4]),
            page,
            total_pages,
            highlight,
            cells: Vec::new(),
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn test_target_for_display_index() {
        assert_eq!(
            PageTarget::for_display_index(37, 25),
            PageTarget {
                page: 2,
                highlight: Some(12)
            }
        );
        assert_eq!(
            PageTarget::for_display_index(0, 25),
            PageTarget {
                page: 1,
                highlight: Some(0)
            }
        );
        assert_eq!(
            PageTarget::for_display_index(25, 25),
            PageTarget {
                page: 2,
                highlight: Some(0)
            }
        );
    }

    #[test]
    fn test_resolve_entry() {
        let resolver = testing::sample_resolver();

        // Literal in-range page
        assert_eq!(
            resolve_entry(Some("2"), 3, 4, &resolver),
            PageTarget {
                page: 2,
                highlight: None
            }
        );
        // Name lookup
        assert_eq!(
            resolve_entry(Some("pikachu"), 3, 4, &resolver),
            PageTarget {
                page: 2,
                highlight: Some(0)
            }
        );
        // Out-of-range number falls through to fuzzy text and misses
        assert_eq!(resolve_entry(Some("7"), 3, 4, &resolver), PageTarget::first());
        assert_eq!(resolve_entry(Some("   "), 3, 4, &resolver), PageTarget::first());
        assert_eq!(resolve_entry(None, 3, 4, &resolver), PageTarget::first());
        assert_eq!(resolve_entry(Some("xqzvwk"), 3, 4, &resolver), PageTarget::first());
    }

    #[test]
    fn test_lifecycle() {
        let mut session = NavigationSession::new();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.controls().is_empty());
        assert_eq!(session.next_page(&ControlAction::Next { page: 1 }), None);

        session.record_render(&rendered(1, 10, Some(3)));
        let controls = session.controls();
        assert!(!controls[0].enabled);
        assert!(controls[1].enabled);
        assert!(session.last_artifact().is_some());

        session.close();
        assert!(session.is_closed());
        assert!(session.controls().is_empty());
        assert!(session.last_artifact().is_none());

        // No resurrection after close
        session.record_render(&rendered(2, 10, None));
        assert!(session.is_closed());
    }

    #[test]
    fn test_next_page_transitions() {
        let mut session = NavigationSession::new();
        session.record_render(&rendered(5, 10, None));

        assert_eq!(session.next_page(&ControlAction::Next { page: 5 }), Some(6));
        assert_eq!(session.next_page(&ControlAction::Previous { page: 5 }), Some(4));
        // Captured for another page
        assert_eq!(session.next_page(&ControlAction::Next { page: 4 }), None);
        assert_eq!(
            session.next_page(&ControlAction::Catch {
                name: "Mew".to_string()
            }),
            None
        );

        session.record_render(&rendered(6, 10, None));
        let controls = session.controls();
        assert!(controls.iter().all(|c| c.enabled));

        session.record_render(&rendered(10, 10, None));
        assert_eq!(session.next_page(&ControlAction::Next { page: 10 }), Some(10));
        session.record_render(&rendered(1, 10, None));
        assert_eq!(session.next_page(&ControlAction::Previous { page: 1 }), Some(1));
    }
}
