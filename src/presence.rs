//! Typing presence
//!
//! Each participant owns one outgoing status record keyed by
//! `(typist, audience)` and reads the counterparty's record keyed the other
//! way round. Status is last-write-wins and carries no delivery guarantee; a
//! lost write simply resolves on the next keystroke or idle timeout.

use crate::{protocol::TypingState, Result};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

/// Store for ephemeral typing status records
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Overwrite the status `typist` shows to `audience`
    async fn set_typing(&self, typist: &str, audience: &str, state: TypingState) -> Result<()>;

    /// Read the status `typist` shows to `audience`
    async fn typing(&self, typist: &str, audience: &str) -> Result<TypingState>;

    /// Subscribe to the status `typist` shows to `audience`
    fn subscribe_typing(&self, typist: &str, audience: &str) -> watch::Receiver<TypingState>;
}

/// Debounced outgoing typing signal
///
/// Every keystroke writes `typing` and restarts the idle timer; when the timer
/// elapses without another keystroke the status is cleared once.
pub struct TypingNotifier {
    store: Arc<dyn PresenceStore>,
    typist: String,
    audience: String,
    idle_after: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    generation: Arc<AtomicU64>,
}

impl TypingNotifier {
    /// Create a notifier for `typist` composing to `audience`
    pub fn new(store: Arc<dyn PresenceStore>, typist: &str, audience: &str, idle_after: Duration) -> Self {
        Self {
            store,
            typist: typist.to_string(),
            audience: audience.to_string(),
            idle_after,
            timer: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a keystroke
    pub async fn keystroke(&self) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let deadline = tokio::time::Instant::now() + self.idle_after;

        let store = self.store.clone();
        let typist = self.typist.clone();
        let audience = self.audience.clone();
        let current = self.generation.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            debug!("{} stopped typing to {}", typist, audience);
            if let Err(e) = store.set_typing(&typist, &audience, TypingState::Idle).await {
                warn!("Failed to clear typing status for {}: {}", typist, e);
            }
        });
        self.replace_timer(Some(handle));

        self.store
            .set_typing(&self.typist, &self.audience, TypingState::Typing)
            .await
    }

    /// Clear the status immediately and cancel any pending timer
    pub async fn clear(&self) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.replace_timer(None);
        self.store
            .set_typing(&self.typist, &self.audience, TypingState::Idle)
            .await
    }

    fn replace_timer(&self, next: Option<JoinHandle<()>>) {
        let mut timer = match self.timer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        *timer = next;
    }
}

impl Drop for TypingNotifier {
    fn drop(&mut self) {
        self.replace_timer(None);
    }
}

/// Incoming typing signal from the counterparty
pub struct TypingWatcher {
    rx: watch::Receiver<TypingState>,
}

impl TypingWatcher {
    /// Watch what `counterparty` shows to `current_user`
    pub fn new(store: &dyn PresenceStore, current_user: &str, counterparty: &str) -> Self {
        Self {
            rx: store.subscribe_typing(counterparty, current_user),
        }
    }

    /// Latest observed state
    pub fn state(&self) -> TypingState {
        *self.rx.borrow()
    }

    /// Wait for the next change; `None` once the store is gone
    pub async fn changed(&mut self) -> Option<TypingState> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
