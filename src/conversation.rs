//! Two-party conversation sync
//!
//! `ConversationSync` keeps a `ConversationView` for one counterparty current
//! with the message feed:
//! - a standing subscription that rebuilds the view from every feed snapshot
//! - backward pagination ("load more") guarded against overlapping requests
//! - send, in-place edit and confirmed delete against the store of record
//! - debounced outgoing typing status and the counterparty's incoming status
//!
//! Writes go to the store first; the view changes only when the subscription
//! reflects them.

use crate::{
    feed::{filter_conversation, FeedQuery, FeedStore},
    i18n::Locale,
    presence::{PresenceStore, TypingNotifier, TypingWatcher},
    protocol::{MessagePatch, MessageRecord, TypingState},
    push::Notifier,
    storage::{ConversationPair, Cursor, Message, Settings},
    Error, Result,
};
use std::collections::HashSet;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};

/// Messages requested per page unless configured otherwise
pub const PAGE_SIZE: usize = 20;

/// Quiet period before typing status clears unless configured otherwise
pub const TYPING_IDLE: Duration = Duration::from_millis(2000);

/// Explicit configuration for one conversation screen
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Logged-in user id
    pub current_user: String,
    /// The other participant's user id
    pub counterparty: String,
    /// Language for indicator strings
    pub locale: Locale,
    /// Messages requested per page
    pub page_size: usize,
    /// Fraction of one viewport from the oldest message that triggers "load more"
    pub load_more_threshold: f64,
    /// Quiet period before typing status clears
    pub typing_idle: Duration,
}

impl ConversationConfig {
    /// Configuration with default paging and typing parameters
    pub fn new(current_user: &str, counterparty: &str) -> Self {
        Self {
            current_user: current_user.to_string(),
            counterparty: counterparty.to_string(),
            locale: Locale::En,
            page_size: PAGE_SIZE,
            load_more_threshold: 0.5,
            typing_idle: TYPING_IDLE,
        }
    }

    /// Configuration taking paging, typing and locale from settings
    pub fn from_settings(settings: &Settings, current_user: &str, counterparty: &str) -> Self {
        Self {
            current_user: current_user.to_string(),
            counterparty: counterparty.to_string(),
            locale: settings.locale,
            page_size: settings.page_size.max(1),
            load_more_threshold: settings.load_more_threshold,
            typing_idle: settings.typing_idle(),
        }
    }

    /// The conversation this configuration selects
    pub fn pair(&self) -> ConversationPair {
        ConversationPair::new(&self.current_user, &self.counterparty)
    }
}

/// Observable state of one conversation screen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationView {
    /// Loaded messages, oldest first
    pub messages: Vec<Message>,
    /// Oldest loaded message, if any page has been loaded
    pub last_loaded_cursor: Option<Cursor>,
    /// Message being composed as an edit
    pub pending_edit_id: Option<String>,
    /// Input buffer
    pub input: String,
    /// Whether the counterparty is typing to us
    pub counterparty_typing: bool,
    /// Localized indicator text, empty while the counterparty is idle
    pub typing_indicator: String,
    /// Initial page in flight
    pub loading: bool,
    /// Older page in flight
    pub loading_more: bool,
    /// Whether older messages may still exist
    pub has_more: bool,
}

impl ConversationView {
    /// Messages newest first, as displayed
    pub fn newest_first(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().rev()
    }

    /// Find a loaded message
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Loaded message ids, oldest first
    pub fn ids(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.id.as_str()).collect()
    }
}

/// Scroll position reported by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Distance from the visible edge to the end of the oldest loaded message
    pub distance_to_oldest: f64,
    /// Length of one screen of content
    pub viewport_length: f64,
}

/// Result of a page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Page fetched and merged
    Loaded {
        /// Records returned by the store
        received: usize,
        /// Records not already in the view
        added: usize,
    },
    /// Nothing requested: a page is already in flight, nothing is loaded
    /// yet, or the screen has closed
    Skipped,
}

/// Result of a send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// New message appended
    Sent {
        /// Id assigned by the store
        id: String,
    },
    /// Pending edit applied
    Edited {
        /// Id of the edited message
        id: String,
    },
}

/// Actions offered on a long-press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAction {
    /// Load the message into the input for editing
    Edit,
    /// Delete after confirmation
    Delete,
}

/// Merge a fetched page into loaded messages
///
/// Each id is kept once (first occurrence wins) and the result is ordered by
/// arrival.
pub fn merge_messages(existing: &[Message], incoming: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Message> = existing
        .iter()
        .cloned()
        .chain(incoming)
        .filter(|m| seen.insert(m.id.clone()))
        .collect();
    merged.sort_by_key(|m| m.seq);
    merged
}

/// Membership of the latest live snapshot
struct LiveSnapshot {
    ids: HashSet<String>,
    /// Highest arrival position any snapshot has shown
    last_seq: Option<i64>,
}

struct Shared {
    view: Mutex<ConversationView>,
    view_tx: watch::Sender<ConversationView>,
    mounted: AtomicBool,
    fetching_more: AtomicBool,
    removed: Mutex<HashSet<String>>,
    live: Mutex<Option<LiveSnapshot>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Shared {
    fn snapshot(&self) -> ConversationView {
        lock(&self.view).clone()
    }

    /// Apply a change and publish; no-op once unmounted
    fn update<R>(&self, f: impl FnOnce(&mut ConversationView) -> R) -> Option<R> {
        if !self.mounted.load(Ordering::SeqCst) {
            return None;
        }
        let mut view = lock(&self.view);
        let result = f(&mut view);
        self.view_tx.send_replace(view.clone());
        Some(result)
    }

    /// Drop page records the feed no longer holds
    ///
    /// A record at or below the newest live position that is missing from the
    /// live snapshot was deleted after the page was read.
    fn drop_stale(&self, page: &mut Vec<Message>) {
        let removed = lock(&self.removed);
        let live = lock(&self.live);
        page.retain(|m| {
            if removed.contains(&m.id) {
                return false;
            }
            match live.as_ref() {
                Some(live) => live.ids.contains(&m.id) || live.last_seq.is_some_and(|last| m.seq > last),
                None => true,
            }
        });
    }

    fn apply_snapshot(&self, snapshot: &[Message], pair: &ConversationPair) {
        let messages = filter_conversation(snapshot, pair);
        debug!("Feed snapshot: {} of {} records in conversation", messages.len(), snapshot.len());
        let ids: HashSet<String> = messages.iter().map(|m| m.id.clone()).collect();
        let newest = snapshot.iter().map(|m| m.seq).max();
        self.update(|view| {
            // Positions are never reused, so the high-water mark survives deletes
            let mut live = lock(&self.live);
            let last_seq = live.as_ref().and_then(|l| l.last_seq).max(newest);
            *live = Some(LiveSnapshot { ids, last_seq });
            drop(live);
            view.last_loaded_cursor = messages.first().map(Message::cursor);
            view.messages = messages;
            view.has_more = false;
            let stale_edit = view
                .pending_edit_id
                .as_deref()
                .is_some_and(|id| view.message(id).is_none());
            if stale_edit {
                view.pending_edit_id = None;
            }
        });
    }

    fn apply_typing(&self, state: TypingState, locale: Locale) {
        self.update(|view| {
            view.counterparty_typing = state == TypingState::Typing;
            view.typing_indicator = if view.counterparty_typing {
                locale.strings().typing.to_string()
            } else {
                String::new()
            };
        });
    }
}

/// Resets the in-flight flag when a page request ends, however it ends
struct FetchGuard<'a>(&'a AtomicBool);

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sync engine for one conversation screen
pub struct ConversationSync {
    config: ConversationConfig,
    pair: ConversationPair,
    feed: Arc<dyn FeedStore>,
    presence: Arc<dyn PresenceStore>,
    notifier: Option<Notifier>,
    typing: TypingNotifier,
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConversationSync {
    /// Create a sync engine; nothing is fetched until `activate` or `load_initial`
    pub fn new(config: ConversationConfig, feed: Arc<dyn FeedStore>, presence: Arc<dyn PresenceStore>) -> Self {
        let view = ConversationView {
            has_more: true,
            ..ConversationView::default()
        };
        let (view_tx, _) = watch::channel(view.clone());
        let typing = TypingNotifier::new(
            presence.clone(),
            &config.current_user,
            &config.counterparty,
            config.typing_idle,
        );

        Self {
            pair: config.pair(),
            config,
            feed,
            presence,
            notifier: None,
            typing,
            shared: Arc::new(Shared {
                view: Mutex::new(view),
                view_tx,
                mounted: AtomicBool::new(true),
                fetching_more: AtomicBool::new(false),
                removed: Mutex::new(HashSet::new()),
                live: Mutex::new(None),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Send push notifications to the counterparty after each send
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Current view
    pub fn view(&self) -> ConversationView {
        self.shared.snapshot()
    }

    /// Subscribe to view changes
    pub fn watch(&self) -> watch::Receiver<ConversationView> {
        self.shared.view_tx.subscribe()
    }

    /// Whether the screen is still open
    pub fn is_active(&self) -> bool {
        self.shared.mounted.load(Ordering::SeqCst)
    }

    /// Start the live feed and typing subscriptions
    pub fn activate(&self) {
        if !self.is_active() {
            warn!("Ignoring activate on a closed conversation with {}", self.config.counterparty);
            return;
        }
        let mut tasks = self.lock_tasks();
        if !tasks.is_empty() {
            debug!("Conversation with {} already active", self.config.counterparty);
            return;
        }
        info!(
            "Opening conversation {} <-> {}",
            self.config.current_user, self.config.counterparty
        );

        let mut feed_rx = self.feed.subscribe();
        let shared = self.shared.clone();
        let pair = self.pair.clone();
        let feed_task = tokio::spawn(async move {
            loop {
                let snapshot = feed_rx.borrow_and_update().clone();
                shared.apply_snapshot(&snapshot, &pair);
                if feed_rx.changed().await.is_err() {
                    debug!("Feed subscription closed");
                    break;
                }
            }
        });

        let mut watcher = TypingWatcher::new(
            self.presence.as_ref(),
            &self.config.current_user,
            &self.config.counterparty,
        );
        let shared = self.shared.clone();
        let locale = self.config.locale;
        let typing_task = tokio::spawn(async move {
            shared.apply_typing(watcher.state(), locale);
            while let Some(state) = watcher.changed().await {
                shared.apply_typing(state, locale);
            }
        });

        tasks.push(feed_task);
        tasks.push(typing_task);
    }

    /// Close the screen: stop subscriptions and discard late responses
    pub fn deactivate(&self) {
        if self.shared.mounted.swap(false, Ordering::SeqCst) {
            debug!("Closing conversation with {}", self.config.counterparty);
        }
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }

    /// Fetch the most recent page
    pub async fn load_initial(&self) -> Result<LoadOutcome> {
        if self.shared.update(|view| view.loading = true).is_none() {
            return Ok(LoadOutcome::Skipped);
        }

        let query = FeedQuery::latest(self.pair.clone(), self.config.page_size);
        let result = self.feed.query(&query).await;
        self.finish_page(result, false)
    }

    /// Fetch the page before the oldest loaded message
    ///
    /// A call made while another is in flight, or before anything is loaded,
    /// returns `Skipped` without touching the store.
    pub async fn load_more(&self) -> Result<LoadOutcome> {
        let cursor = match self.shared.snapshot().last_loaded_cursor {
            Some(cursor) => cursor,
            None => return Ok(LoadOutcome::Skipped),
        };

        if self
            .shared
            .fetching_more
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Load more already in flight");
            return Ok(LoadOutcome::Skipped);
        }
        let _guard = FetchGuard(&self.shared.fetching_more);

        if self.shared.update(|view| view.loading_more = true).is_none() {
            return Ok(LoadOutcome::Skipped);
        }

        let query = FeedQuery::older_than(self.pair.clone(), cursor.seq, self.config.page_size);
        let result = self.feed.query(&query).await;
        self.finish_page(result, true)
    }

    fn finish_page(&self, result: Result<Vec<Message>>, more: bool) -> Result<LoadOutcome> {
        let mut page = match result {
            Ok(page) => page,
            Err(e) => {
                error!("Error fetching messages with {}: {}", self.config.counterparty, e);
                self.shared.update(|view| {
                    view.loading = false;
                    view.loading_more = false;
                });
                return Err(e);
            }
        };

        let received = page.len();
        let page_size = self.config.page_size;

        let added = self.shared.update(|view| {
            self.shared.drop_stale(&mut page);
            let before = view.messages.len();
            view.messages = merge_messages(&view.messages, page);
            view.last_loaded_cursor = view.messages.first().map(Message::cursor);
            view.has_more = received >= page_size;
            if more {
                view.loading_more = false;
            } else {
                view.loading = false;
            }
            view.messages.len() - before
        });

        match added {
            Some(added) => {
                debug!("Loaded {} messages ({} new)", received, added);
                Ok(LoadOutcome::Loaded { received, added })
            }
            None => {
                debug!("Discarding page for closed conversation");
                Ok(LoadOutcome::Skipped)
            }
        }
    }

    /// Whether the scroll position is close enough to the oldest message to load more
    pub fn should_load_more(&self, metrics: ScrollMetrics) -> bool {
        let view = self.shared.snapshot();
        view.has_more
            && !view.loading_more
            && view.last_loaded_cursor.is_some()
            && metrics.distance_to_oldest <= self.config.load_more_threshold * metrics.viewport_length
    }

    /// Load more if the scroll position calls for it
    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> Result<LoadOutcome> {
        if self.should_load_more(metrics) {
            self.load_more().await
        } else {
            Ok(LoadOutcome::Skipped)
        }
    }

    /// Replace the input buffer after a keystroke and signal typing
    pub async fn set_input(&self, text: &str) {
        self.shared.update(|view| view.input = text.to_string());
        if let Err(e) = self.typing.keystroke().await {
            warn!("Failed to update typing status: {}", e);
        }
    }

    /// Send the input buffer as a new message, or apply it as the pending edit
    pub async fn send(&self) -> Result<SendOutcome> {
        let view = self.shared.snapshot();
        let content = view.input.trim().to_string();
        if content.is_empty() {
            return Err(Error::EmptyMessage);
        }

        let outcome = match view.pending_edit_id {
            Some(id) => {
                self.feed
                    .update(&id, MessagePatch::edit(&content))
                    .await
                    .inspect_err(|e| error!("Failed to edit message {}: {}", id, e))?;
                info!("Edited message {}", id);
                SendOutcome::Edited { id }
            }
            None => {
                let record = MessageRecord::new(&self.config.current_user, &self.config.counterparty, &content);
                let id = self
                    .feed
                    .push(record)
                    .await
                    .inspect_err(|e| error!("Failed to send message to {}: {}", self.config.counterparty, e))?;
                info!("Sent message {} to {}", id, self.config.counterparty);
                SendOutcome::Sent { id }
            }
        };

        self.shared.update(|view| {
            view.input.clear();
            view.pending_edit_id = None;
        });
        if let Err(e) = self.typing.clear().await {
            warn!("Failed to clear typing status: {}", e);
        }
        self.notify(&content);

        Ok(outcome)
    }

    fn notify(&self, content: &str) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        let record = MessageRecord::new(&self.config.current_user, &self.config.counterparty, content);
        tokio::spawn(async move {
            let outcome = notifier.notify(&record).await;
            debug!("Push outcome for {}: {:?}", record.receiver, outcome);
        });
    }

    /// Actions offered on a long-press of a loaded message
    pub fn message_actions(&self, id: &str) -> Vec<MessageAction> {
        match self.shared.snapshot().message(id) {
            Some(message) if message.is_authored_by(&self.config.current_user) => {
                vec![MessageAction::Edit, MessageAction::Delete]
            }
            _ => Vec::new(),
        }
    }

    /// Load one of our own messages into the input for editing
    pub fn begin_edit(&self, id: &str) -> Result<()> {
        let message = self.own_message(id)?;
        self.shared.update(|view| {
            view.input = message.content.clone();
            view.pending_edit_id = Some(message.id.clone());
        });
        Ok(())
    }

    /// Abandon the pending edit and clear the input
    pub fn cancel_edit(&self) {
        self.shared.update(|view| {
            view.pending_edit_id = None;
            view.input.clear();
        });
    }

    /// First step of a delete: returns a handle that must be confirmed
    pub fn request_delete(&self, id: &str) -> Result<PendingDelete> {
        let message = self.own_message(id)?;
        Ok(PendingDelete {
            feed: self.feed.clone(),
            shared: self.shared.clone(),
            id: message.id,
        })
    }

    fn own_message(&self, id: &str) -> Result<Message> {
        let message = self
            .shared
            .snapshot()
            .message(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("message {}", id)))?;
        if !message.is_authored_by(&self.config.current_user) {
            return Err(Error::NotAuthor {
                user: self.config.current_user.clone(),
                message_id: id.to_string(),
            });
        }
        Ok(message)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        lock(&self.tasks)
    }
}

impl Drop for ConversationSync {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// A delete awaiting explicit confirmation
#[must_use = "the message is only deleted when the request is confirmed"]
pub struct PendingDelete {
    feed: Arc<dyn FeedStore>,
    shared: Arc<Shared>,
    id: String,
}

impl PendingDelete {
    /// Message that will be deleted
    pub fn message_id(&self) -> &str {
        &self.id
    }

    /// Delete the message from the store; irreversible
    pub async fn confirm(self) -> Result<()> {
        self.feed
            .remove(&self.id)
            .await
            .inspect_err(|e| error!("Failed to delete message {}: {}", self.id, e))?;
        info!("Deleted message {}", self.id);

        lock(&self.shared.removed).insert(self.id.clone());
        self.shared.update(|view| {
            if view.pending_edit_id.as_deref() == Some(self.id.as_str()) {
                view.pending_edit_id = None;
                view.input.clear();
            }
        });
        Ok(())
    }

    /// Abandon the delete
    pub fn cancel(self) {
        debug!("Delete of {} cancelled", self.id);
    }
}
