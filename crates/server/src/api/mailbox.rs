//! # Session Mailboxes
//!
//! HTTP stand-in for a chat message: a mailbox keeps the latest response sent
//! for one session (with updates merged in) and broadcasts every change to
//! SSE subscribers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, RwLock};

use dexkeeper_core::events::{Response, ResponseSink};

const UPDATE_BUFFER: usize = 32;
const MAX_MAILBOXES: usize = 256;

/// Latest response for one session plus its change feed
pub struct Mailbox {
    latest: RwLock<Option<Response>>,
    updates: broadcast::Sender<Response>,
}

impl Mailbox {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        Self {
            latest: RwLock::new(None),
            updates,
        }
    }

    pub async fn latest(&self) -> Option<Response> {
        self.latest.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Response> {
        self.updates.subscribe()
    }
}

#[async_trait]
impl ResponseSink for Mailbox {
    async fn send(&self, response: Response) -> anyhow::Result<()> {
        *self.latest.write().await = Some(response.clone());
        // No subscribers is fine
        let _ = self.updates.send(response);
        Ok(())
    }

    async fn update(&self, response: Response) -> anyhow::Result<()> {
        let merged = {
            let mut latest = self.latest.write().await;
            let current = latest.get_or_insert_with(Response::default);
            current.apply_update(response);
            current.clone()
        };
        let _ = self.updates.send(merged);
        Ok(())
    }
}

/// Mailboxes keyed by session id
#[derive(Default)]
pub struct Mailboxes {
    boxes: Mutex<HashMap<String, Arc<Mailbox>>>,
    next_id: AtomicU64,
}

impl Mailboxes {
    /// Allocate a fresh session id and its mailbox
    pub fn create(&self, is_open: impl Fn(&str) -> bool) -> (String, Arc<Mailbox>) {
        let id = format!("session-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mailbox = Arc::new(Mailbox::new());

        let mut boxes = self.boxes.lock().unwrap_or_else(PoisonError::into_inner);
        if boxes.len() >= MAX_MAILBOXES {
            boxes.retain(|key, _| is_open(key));
        }
        boxes.insert(id.clone(), Arc::clone(&mailbox));

        (id, mailbox)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Mailbox>> {
        self.boxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.boxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexkeeper_core::events::{Control, ControlStyle};

    #[tokio::test]
    async fn test_mailbox_merges_updates() {
        let mailbox = Mailbox::new();
        let mut rx = mailbox.subscribe();

        mailbox
            .send(Response::text("Page 1/2").with_controls(vec![Control::new(
                "dex:next:1",
                "Next",
                ControlStyle::Primary,
            )]))
            .await
            .unwrap();
        mailbox
            .update(Response::controls_only(Vec::new()))
            .await
            .unwrap();

        let latest = mailbox.latest().await.unwrap();
        assert_eq!(latest.content.as_deref(), Some("Page 1/2"));
        assert!(latest.control_list().is_empty());

        assert_eq!(rx.recv().await.unwrap().control_list().len(), 1);
        let merged = rx.recv().await.unwrap();
        assert_eq!(merged.content.as_deref(), Some("Page 1/2"));
        assert_eq!(merged.controls, Some(Vec::new()));
    }

    #[test]
    fn test_ids_are_unique_and_pruned() {
        let mailboxes = Mailboxes::default();
        let (a, _) = mailboxes.create(|_| true);
        let (b, _) = mailboxes.create(|_| true);
        assert_ne!(a, b);
        assert!(mailboxes.get(&a).is_some());
        assert!(mailboxes.get("session-999").is_none());

        for _ in 0..MAX_MAILBOXES {
            mailboxes.create(|_| false);
        }
        assert!(mailboxes.len() < MAX_MAILBOXES);
    }
}
