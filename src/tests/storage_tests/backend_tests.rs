// Backend Tests - Testing the SQLite feed and presence store

use crate::feed::{FeedQuery, FeedStore};
use crate::presence::PresenceStore;
use crate::protocol::{MessagePatch, MessageRecord, TypingState};
use crate::storage::{Backend, ConversationPair};
use crate::Error;
use tempfile::TempDir;

fn record(sender: &str, receiver: &str, content: &str, timestamp: i64) -> MessageRecord {
    MessageRecord {
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        content: content.to_string(),
        timestamp,
        edited: false,
    }
}

#[tokio::test]
async fn test_push_assigns_ids_in_arrival_order() {
    let backend = Backend::new_in_memory().expect("Failed to create backend");

    let first = backend.push(record("alice", "bob", "one", 1)).await.expect("push");
    let second = backend.push(record("bob", "alice", "two", 2)).await.expect("push");
    assert_ne!(first, second);

    let a = backend.get(&first).await.expect("get").expect("missing first");
    let b = backend.get(&second).await.expect("get").expect("missing second");
    assert!(a.seq < b.seq);
    assert_eq!(a.content, "one");
    assert!(!a.edited);
}

#[tokio::test]
async fn test_update_marks_edited_and_keeps_id() {
    let backend = Backend::new_in_memory().expect("Failed to create backend");
    let id = backend.push(record("alice", "bob", "draft", 1)).await.expect("push");
    let other = backend.push(record("bob", "alice", "reply", 2)).await.expect("push");

    let patch = MessagePatch {
        content: "final".to_string(),
        timestamp: 99,
        edited: true,
    };
    backend.update(&id, patch).await.expect("update");

    let edited = backend.get(&id).await.expect("get").expect("missing");
    assert_eq!(edited.id, id);
    assert_eq!(edited.content, "final");
    assert_eq!(edited.timestamp, 99);
    assert!(edited.edited);

    let untouched = backend.get(&other).await.expect("get").expect("missing");
    assert_eq!(untouched.content, "reply");
    assert!(!untouched.edited);
}

#[tokio::test]
async fn test_update_missing_message() {
    let backend = Backend::new_in_memory().expect("Failed to create backend");
    let result = backend.update("nope", MessagePatch::edit("x")).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_remove_is_physical() {
    let backend = Backend::new_in_memory().expect("Failed to create backend");
    let id = backend.push(record("alice", "bob", "bye", 1)).await.expect("push");

    backend.remove(&id).await.expect("remove");
    assert!(backend.get(&id).await.expect("get").is_none());
    assert!(matches!(backend.remove(&id).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_query_latest_filters_pair() {
    let backend = Backend::new_in_memory().expect("Failed to create backend");
    for i in 0..5 {
        backend.push(record("alice", "bob", &format!("ab{}", i), i)).await.expect("push");
        backend.push(record("alice", "carol", &format!("ac{}", i), i)).await.expect("push");
    }

    let pair = ConversationPair::new("bob", "alice");
    let page = backend.query(&FeedQuery::latest(pair, 3)).await.expect("query");
    let contents: Vec<&str> = page.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["ab2", "ab3", "ab4"]);
}

#[tokio::test]
async fn test_query_older_than_cursor() {
    let backend = Backend::new_in_memory().expect("Failed to create backend");
    for i in 0..6 {
        backend.push(record("alice", "bob", &format!("m{}", i), i)).await.expect("push");
    }
    let pair = ConversationPair::new("alice", "bob");
    let latest = backend.query(&FeedQuery::latest(pair.clone(), 2)).await.expect("query");
    assert_eq!(latest[0].content, "m4");

    let older = backend
        .query(&FeedQuery::older_than(pair, latest[0].seq, 10))
        .await
        .expect("query");
    let contents: Vec<&str> = older.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["m0", "m1", "m2", "m3"]);
}

#[tokio::test]
async fn test_query_whole_feed() {
    let backend = Backend::new_in_memory().expect("Failed to create backend");
    backend.push(record("alice", "bob", "1", 1)).await.expect("push");
    backend.push(record("carol", "dave", "2", 2)).await.expect("push");

    let query = FeedQuery {
        pair: None,
        before: None,
        limit: 10,
    };
    assert_eq!(backend.query(&query).await.expect("query").len(), 2);
}

#[tokio::test]
async fn test_subscribe_sees_every_mutation() {
    let backend = Backend::new_in_memory().expect("Failed to create backend");
    let mut rx = backend.subscribe();
    assert!(rx.borrow_and_update().is_empty());

    let id = backend.push(record("alice", "bob", "hi", 1)).await.expect("push");
    assert!(rx.has_changed().expect("channel closed"));
    assert_eq!(rx.borrow_and_update().len(), 1);

    backend.update(&id, MessagePatch::edit("hey")).await.expect("update");
    assert!(rx.has_changed().expect("channel closed"));
    assert_eq!(rx.borrow_and_update()[0].content, "hey");

    backend.remove(&id).await.expect("remove");
    assert!(rx.borrow_and_update().is_empty());
}

#[tokio::test]
async fn test_typing_status_is_directional() {
    let backend = Backend::new_in_memory().expect("Failed to create backend");
    assert_eq!(backend.typing("alice", "bob").await.expect("typing"), TypingState::Idle);

    let mut bob_view = backend.subscribe_typing("alice", "bob");
    backend
        .set_typing("alice", "bob", TypingState::Typing)
        .await
        .expect("set_typing");

    assert_eq!(backend.typing("alice", "bob").await.expect("typing"), TypingState::Typing);
    assert_eq!(backend.typing("bob", "alice").await.expect("typing"), TypingState::Idle);
    assert!(bob_view.has_changed().expect("channel closed"));
    assert_eq!(*bob_view.borrow_and_update(), TypingState::Typing);

    let late_view = backend.subscribe_typing("alice", "bob");
    assert_eq!(*late_view.borrow(), TypingState::Typing);
}

#[tokio::test]
async fn test_file_backend_persists() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("data").join("chat.db");

    let id = {
        let backend = Backend::new(&path).expect("Failed to open backend");
        backend.push(record("alice", "bob", "kept", 1)).await.expect("push")
    };

    let reopened = Backend::new(&path).expect("Failed to reopen backend");
    assert_eq!(reopened.subscribe().borrow().len(), 1);
    let message = reopened.get(&id).await.expect("get").expect("missing");
    assert_eq!(message.content, "kept");
}
