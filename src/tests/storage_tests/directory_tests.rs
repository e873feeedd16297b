// Directory Tests - Testing users and push tokens in the backend

use crate::directory::{PushTokenStore, User, UserDirectory};
use crate::storage::Backend;
use crate::Error;

async fn seeded_backend() -> Backend {
    let backend = Backend::new_in_memory().expect("Failed to create backend");
    backend
        .register_user(User::new("u1", "Alice", "alice@example.com"))
        .await
        .expect("register");
    backend
        .register_user(User::new("u2", "Bob", "bob@example.com"))
        .await
        .expect("register");
    backend
        .register_user(User::new("u3", "Carol", "carol@example.com"))
        .await
        .expect("register");
    backend
}

#[tokio::test]
async fn test_counterparts_exclude_current_user() {
    let backend = seeded_backend().await;

    let users = backend.counterparts("bob@example.com").await.expect("counterparts");
    let names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Carol"]);
}

#[tokio::test]
async fn test_register_user_updates_existing() {
    let backend = seeded_backend().await;
    backend
        .register_user(User::new("u1", "Alicia", "alice@example.com"))
        .await
        .expect("register");

    assert_eq!(backend.list_users().await.expect("list").len(), 3);
    assert_eq!(backend.display_name("u1").await.expect("name"), "Alicia");
}

#[tokio::test]
async fn test_display_name_falls_back_to_id() {
    let backend = seeded_backend().await;
    assert_eq!(backend.display_name("ghost").await.expect("name"), "ghost");
}

#[tokio::test]
async fn test_push_token_registry() {
    let backend = seeded_backend().await;
    assert_eq!(backend.push_token("u2").await.expect("token"), None);

    backend
        .register_push_token("u2", "ExponentPushToken[bob]")
        .await
        .expect("register token");
    assert_eq!(
        backend.push_token("u2").await.expect("token").as_deref(),
        Some("ExponentPushToken[bob]")
    );
    assert_eq!(backend.push_token("missing").await.expect("token"), None);
}

#[tokio::test]
async fn test_push_token_for_unknown_user() {
    let backend = seeded_backend().await;
    let result = backend.register_push_token("missing", "token").await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}
