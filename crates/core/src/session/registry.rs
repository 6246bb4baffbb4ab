//! # Session Registry
//!
//! Explicit map of session key → actor handle. Each open session is one
//! tokio task that owns its [`NavigationSession`] and loops on
//! its mailbox against a deadline until it is closed or times out. Only a
//! successful navigation pushes the deadline back.
//!
//! ```text
//! dispatch(key, id) ──▶ registry map ──▶ actor mailbox
//!                                            │ disable old controls
//!                                            │ render next page
//!                                            │ update response
//!      ◀──────────── ack (oneshot) ──────────┘
//! ```
//!
//! On close the actor removes its own entry (only if the entry is still its
//! own), strips the controls from the response and answers any queued events
//! as ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use super::controls::{disabled_pagination_controls, ControlAction};
use super::machine::{resolve_entry, NavigationSession, NavigationState};
use crate::error::{DexError, DexResult};
use crate::events::{Artifact, Response, ResponseSink, SessionKey};
use crate::render::{GridRenderer, RenderedPage, GRID_FILE_NAME};
use crate::search::FuzzyResolver;
use crate::state::CollectionStore;

/// Default inactivity timeout
pub const DEFAULT_INACTIVITY: Duration = Duration::from_secs(60);

const MAILBOX_SIZE: usize = 16;

/// Result of dispatching a control activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The session moved to a new page
    Rendered { page: u32 },
    /// Unknown, expired or stale; nothing changed
    Ignored,
}

enum SessionMessage {
    Control {
        action: ControlAction,
        ack: oneshot::Sender<DexResult<DispatchOutcome>>,
    },
    Close {
        ack: oneshot::Sender<()>,
    },
}

struct SessionHandle {
    id: u64,
    tx: mpsc::Sender<SessionMessage>,
    state: watch::Receiver<NavigationState>,
}

type SessionMap = Arc<Mutex<HashMap<SessionKey, SessionHandle>>>;

fn lock(sessions: &SessionMap) -> MutexGuard<'_, HashMap<SessionKey, SessionHandle>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of open navigation sessions
pub struct SessionRegistry {
    sessions: SessionMap,
    renderer: Arc<GridRenderer>,
    collection: CollectionStore,
    resolver: Arc<FuzzyResolver>,
    inactivity: Duration,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new(
        renderer: Arc<GridRenderer>,
        collection: CollectionStore,
        resolver: Arc<FuzzyResolver>,
        inactivity: Duration,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            renderer,
            collection,
            resolver,
            inactivity,
            next_id: AtomicU64::new(1),
        }
    }

    /// Open a session for `key`, rendering the page named by `argument`
    /// (page number or entry name). An existing session for the key is
    /// closed first.
    pub async fn open(
        &self,
        key: SessionKey,
        argument: Option<&str>,
        sink: Arc<dyn ResponseSink>,
    ) -> DexResult<NavigationState> {
        self.close(&key).await;

        let target = resolve_entry(
            argument,
            self.renderer.total_pages(),
            self.renderer.capacity(),
            &self.resolver,
        );

        let caught = self.collection.caught_names().await?;
        let rendered = self
            .renderer
            .render(target.page, &caught, target.highlight)
            .await?;

        let mut session = NavigationSession::new();
        session.record_render(&rendered);
        let state = session.state().ok_or(DexError::SessionExpired)?;

        sink.send(page_response(&rendered).with_controls(session.controls()))
            .await
            .map_err(|e| DexError::Transport(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(MAILBOX_SIZE);
        let (state_tx, state_rx) = watch::channel(state);

        lock(&self.sessions).insert(
            key.clone(),
            SessionHandle {
                id,
                tx,
                state: state_rx,
            },
        );

        let actor = SessionActor {
            key: key.clone(),
            id,
            session,
            sink,
            state: state_tx,
            sessions: Arc::clone(&self.sessions),
            renderer: Arc::clone(&self.renderer),
            collection: self.collection.clone(),
            inactivity: self.inactivity,
        };
        tokio::spawn(actor.run(rx));

        tracing::info!(key = %key, page = state.page, total_pages = state.total_pages, "Session opened");
        Ok(state)
    }

    /// Deliver a control activation and wait for the re-render
    pub async fn dispatch(&self, key: &SessionKey, control_id: &str) -> DexResult<DispatchOutcome> {
        let Some(action) = ControlAction::parse(control_id).filter(ControlAction::is_navigation)
        else {
            tracing::debug!(key = %key, control_id, "Unrecognised control ignored");
            return Ok(DispatchOutcome::Ignored);
        };

        let Some(tx) = self.sender(key) else {
            tracing::debug!(key = %key, "Event for closed session ignored");
            return Ok(DispatchOutcome::Ignored);
        };

        let (ack, ack_rx) = oneshot::channel();
        if tx.send(SessionMessage::Control { action, ack }).await.is_err() {
            return Ok(DispatchOutcome::Ignored);
        }

        ack_rx.await.unwrap_or(Ok(DispatchOutcome::Ignored))
    }

    /// Close a session explicitly; `false` when none was open
    pub async fn close(&self, key: &SessionKey) -> bool {
        let Some(tx) = self.sender(key) else {
            return false;
        };

        let (ack, ack_rx) = oneshot::channel();
        if tx.send(SessionMessage::Close { ack }).await.is_err() {
            return false;
        }
        ack_rx.await.is_ok()
    }

    fn sender(&self, key: &SessionKey) -> Option<mpsc::Sender<SessionMessage>> {
        let sessions = lock(&self.sessions);
        sessions.get(key).map(|h| h.tx.clone())
    }

    /// Latest navigation state of an open session
    pub fn state(&self, key: &SessionKey) -> DexResult<NavigationState> {
        lock(&self.sessions)
            .get(key)
            .map(|h| *h.state.borrow())
            .ok_or(DexError::SessionExpired)
    }

    pub fn is_open(&self, key: &SessionKey) -> bool {
        lock(&self.sessions).contains_key(key)
    }

    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn inactivity(&self) -> Duration {
        self.inactivity
    }
}

/// Caption and image for a rendered page
fn page_response(rendered: &RenderedPage) -> Response {
    Response::text(rendered.caption()).with_image(Artifact::new(
        GRID_FILE_NAME,
        Arc::clone(&rendered.png),
    ))
}

struct SessionActor {
    key: SessionKey,
    id: u64,
    session: NavigationSession,
    sink: Arc<dyn ResponseSink>,
    state: watch::Sender<NavigationState>,
    sessions: SessionMap,
    renderer: Arc<GridRenderer>,
    collection: CollectionStore,
    inactivity: Duration,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::Receiver<SessionMessage>) {
        let mut close_ack = None;
        // Only a successful navigation moves the deadline
        let mut deadline = Instant::now() + self.inactivity;

        loop {
            let message = tokio::select! {
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::info!(key = %self.key, "Session timed out");
                    break;
                }
            };

            match message {
                SessionMessage::Control { action, ack } => {
                    let result = self.handle(action).await;
                    match &result {
                        Ok(DispatchOutcome::Rendered { .. }) => {
                            deadline = Instant::now() + self.inactivity;
                        }
                        Ok(DispatchOutcome::Ignored) => {}
                        Err(e) => {
                            tracing::error!(key = %self.key, error = %e, "Navigation failed");
                        }
                    }
                    let _ = ack.send(result);
                }
                SessionMessage::Close { ack } => {
                    close_ack = Some(ack);
                    break;
                }
            }
        }

        self.shutdown(rx).await;
        if let Some(ack) = close_ack {
            let _ = ack.send(());
        }
    }

    async fn handle(&mut self, action: ControlAction) -> DexResult<DispatchOutcome> {
        let (Some(state), Some(page)) = (self.session.state(), self.session.next_page(&action))
        else {
            return Ok(DispatchOutcome::Ignored);
        };

        // Old controls go dark before anything else happens
        self.update(Response::controls_only(disabled_pagination_controls(
            state.page,
            state.total_pages,
        )))
        .await?;

        let rendered = match self.render(page).await {
            Ok(rendered) => rendered,
            Err(e) => {
                if let Err(restore) = self
                    .update(Response::controls_only(self.session.controls()))
                    .await
                {
                    tracing::warn!(key = %self.key, error = %restore, "Failed to restore controls");
                }
                return Err(e);
            }
        };

        self.session.record_render(&rendered);
        self.update(page_response(&rendered).with_controls(self.session.controls()))
            .await?;

        if let Some(state) = self.session.state() {
            let _ = self.state.send(state);
        }

        tracing::debug!(key = %self.key, page = rendered.page, "Session navigated");
        Ok(DispatchOutcome::Rendered {
            page: rendered.page,
        })
    }

    async fn render(&self, page: u32) -> DexResult<RenderedPage> {
        let caught = self.collection.caught_names().await?;
        self.renderer.render(page, &caught, None).await
    }

    async fn update(&self, response: Response) -> DexResult<()> {
        self.sink
            .update(response)
            .await
            .map_err(|e| DexError::Transport(e.to_string()))
    }

    /// Leave the registry, strip controls and refuse whatever is queued
    async fn shutdown(&mut self, mut rx: mpsc::Receiver<SessionMessage>) {
        {
            let mut sessions = lock(&self.sessions);
            if sessions.get(&self.key).map(|h| h.id) == Some(self.id) {
                sessions.remove(&self.key);
            }
        }
        rx.close();

        self.session.close();
        if let Err(e) = self.update(Response::controls_only(Vec::new())).await {
            tracing::warn!(key = %self.key, error = %e, "Failed to remove controls");
        }

        while let Ok(message) = rx.try_recv() {
            match message {
                SessionMessage::Control { ack, .. } => {
                    let _ = ack.send(Ok(DispatchOutcome::Ignored));
                }
                SessionMessage::Close { ack } => {
                    let _ = ack.send(());
                }
            }
        }

        tracing::info!(key = %self.key, "Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Control;
    use crate::testing::{self, SinkCall};

    fn registry(entries: usize, inactivity: Duration) -> (tempfile::TempDir, SessionRegistry) {
        let (dir, db) = testing::temp_db();
        let (renderer, resolver) = testing::padded_renderer(entries);
        let collection = CollectionStore::new(&db, Arc::clone(&resolver));
        (
            dir,
            SessionRegistry::new(renderer, collection, resolver, inactivity),
        )
    }

    fn enabled(controls: &[Control]) -> Vec<bool> {
        controls.iter().map(|c| c.enabled).collect()
    }

    #[tokio::test]
    async fn test_next_disables_then_renders() {
        let (_dir, registry) = registry(250, DEFAULT_INACTIVITY);
        let sink = Arc::new(testing::RecordingSink::default());
        let key = SessionKey::from("chan-1");

        let state = registry.open(key.clone(), Some("5"), sink.clone()).await.unwrap();
        assert_eq!((state.page, state.total_pages), (5, 10));

        let outcome = registry.dispatch(&key, "dex:next:5").await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Rendered { page: 6 });
        assert_eq!(registry.state(&key).unwrap().page, 6);

        let calls = sink.calls();
        assert_eq!(calls.len(), 3);
        match &calls[0] {
            SinkCall::Send(first) => {
                assert_eq!(first.content.as_deref(), Some("Page 5/10"));
                assert_eq!(enabled(first.control_list()), vec![true, true]);
            }
            other => panic!("expected send, got {:?}", other),
        }
        match &calls[1] {
            SinkCall::Update(disable) => {
                assert!(disable.image.is_none());
                assert_eq!(enabled(disable.control_list()), vec![false, false]);
            }
            other => panic!("expected update, got {:?}", other),
        }
        match &calls[2] {
            SinkCall::Update(next) => {
                assert_eq!(next.content.as_deref(), Some("Page 6/10"));
                assert!(next.image.is_some());
                assert_eq!(enabled(next.control_list()), vec![true, true]);
                assert_eq!(next.control_list()[1].id, "dex:next:6");
            }
            other => panic!("expected update, got {:?}", other),
        }

        // A duplicate click on the old response does nothing
        let stale = registry.dispatch(&key, "dex:next:5").await.unwrap();
        assert_eq!(stale, DispatchOutcome::Ignored);
        assert_eq!(sink.calls().len(), 3);
        assert_eq!(registry.state(&key).unwrap().page, 6);
    }

    #[tokio::test]
    async fn test_open_jumps_to_entry() {
        let (_dir, registry) = registry(250, DEFAULT_INACTIVITY);
        let sink = Arc::new(testing::RecordingSink::default());

        let state = registry
            .open(SessionKey::from("chan-1"), Some("Entry 37"), sink.clone())
            .await
            .unwrap();
        assert_eq!(state.page, 2);
        assert_eq!(state.highlight, Some(12));

        // Navigation drops the highlight
        registry
            .dispatch(&SessionKey::from("chan-1"), "dex:prev:2")
            .await
            .unwrap();
        let state = registry.state(&SessionKey::from("chan-1")).unwrap();
        assert_eq!(state.page, 1);
        assert_eq!(state.highlight, None);
    }

    #[tokio::test]
    async fn test_first_page_controls() {
        let (_dir, registry) = registry(250, DEFAULT_INACTIVITY);
        let sink = Arc::new(testing::RecordingSink::default());

        registry
            .open(SessionKey::from("chan-1"), None, sink.clone())
            .await
            .unwrap();
        let last = sink.last_response().unwrap();
        assert_eq!(enabled(last.control_list()), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_closes_session() {
        let (_dir, registry) = registry(250, DEFAULT_INACTIVITY);
        let sink = Arc::new(testing::RecordingSink::default());
        let key = SessionKey::from("chan-1");

        registry.open(key.clone(), Some("5"), sink.clone()).await.unwrap();
        assert!(registry.is_open(&key));

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(!registry.is_open(&key));
        assert_eq!(registry.active_sessions(), 0);
        assert!(matches!(registry.state(&key), Err(DexError::SessionExpired)));

        // Controls were removed
        let calls = sink.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[1], SinkCall::Update(r) if r.controls == Some(Vec::new())));

        // Later events are inert
        let outcome = registry.dispatch(&key, "dex:next:5").await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(sink.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_timeout() {
        let (_dir, registry) = registry(250, DEFAULT_INACTIVITY);
        let sink = Arc::new(testing::RecordingSink::default());
        let key = SessionKey::from("chan-1");

        registry.open(key.clone(), Some("1"), sink.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(45)).await;
        registry.dispatch(&key, "dex:next:1").await.unwrap();
        tokio::time::sleep(Duration::from_secs(45)).await;

        assert!(registry.is_open(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_clicks_do_not_extend_session() {
        let (_dir, registry) = registry(250, DEFAULT_INACTIVITY);
        let sink = Arc::new(testing::RecordingSink::default());
        let key = SessionKey::from("chan-1");

        registry.open(key.clone(), Some("5"), sink.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(45)).await;

        let stale = registry.dispatch(&key, "dex:next:4").await.unwrap();
        assert_eq!(stale, DispatchOutcome::Ignored);
        let unknown = registry.dispatch(&key, "dex:next:x").await.unwrap();
        assert_eq!(unknown, DispatchOutcome::Ignored);

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert!(!registry.is_open(&key));
        assert_eq!(sink.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_explicit_close_and_reopen() {
        let (_dir, registry) = registry(250, DEFAULT_INACTIVITY);
        let sink = Arc::new(testing::RecordingSink::default());
        let key = SessionKey::from("chan-1");

        assert!(!registry.close(&key).await);

        registry.open(key.clone(), None, sink.clone()).await.unwrap();
        registry.open(key.clone(), Some("3"), sink.clone()).await.unwrap();
        assert_eq!(registry.active_sessions(), 1);
        assert_eq!(registry.state(&key).unwrap().page, 3);

        assert!(registry.close(&key).await);
        assert!(!registry.is_open(&key));
        assert_eq!(
            registry.dispatch(&key, "dex:next:3").await.unwrap(),
            DispatchOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn test_independent_sessions() {
        let (_dir, registry) = registry(250, DEFAULT_INACTIVITY);
        let a = Arc::new(testing::RecordingSink::default());
        let b = Arc::new(testing::RecordingSink::default());

        registry.open(SessionKey::from("a"), Some("2"), a.clone()).await.unwrap();
        registry.open(SessionKey::from("b"), Some("7"), b.clone()).await.unwrap();

        let (key_a, key_b) = (SessionKey::from("a"), SessionKey::from("b"));
        let (ra, rb) = tokio::join!(
            registry.dispatch(&key_a, "dex:next:2"),
            registry.dispatch(&key_b, "dex:prev:7"),
        );
        assert_eq!(ra.unwrap(), DispatchOutcome::Rendered { page: 3 });
        assert_eq!(rb.unwrap(), DispatchOutcome::Rendered { page: 6 });
        assert_eq!(registry.active_sessions(), 2);
    }

    #[tokio::test]
    async fn test_unknown_controls_are_ignored() {
        let (_dir, registry) = registry(250, DEFAULT_INACTIVITY);
        let sink = Arc::new(testing::RecordingSink::default());
        let key = SessionKey::from("chan-1");
        registry.open(key.clone(), None, sink.clone()).await.unwrap();

        for id in ["garbage", "dex:catch:Entry 1", "dex:next:x"] {
            assert_eq!(
                registry.dispatch(&key, id).await.unwrap(),
                DispatchOutcome::Ignored
            );
        }
        assert_eq!(sink.calls().len(), 1);
    }
}
