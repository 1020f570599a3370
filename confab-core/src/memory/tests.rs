use std::sync::Arc;
use confab_llm::{Message, ToolCallRequest};

use super::*;

fn user(n: usize) -> Message {
    Message::user(format!("message {}", n))
}

#[test]
fn test_window_keeps_most_recent() {
    let mut window = MemoryWindow::new("w", 3);
    for i in 0..5 {
        window.append(user(i));
    }
    assert_eq!(window.len(), 3);
    let texts: Vec<String> = window.messages().iter().map(Message::text).collect();
    assert_eq!(texts, vec!["message 2", "message 3", "message 4"]);
}

#[test]
fn test_system_message_is_pinned() {
    let mut window = MemoryWindow::new("w", 3);
    window.append(Message::system("you are terse"));
    for i in 0..10 {
        window.append(user(i));
        assert!(window.len() <= 3);
    }
    let messages = window.messages();
    assert_eq!(messages[0], Message::system("you are terse"));
    assert_eq!(messages[1].text(), "message 8");
    assert_eq!(messages[2].text(), "message 9");
}

#[test]
fn test_new_system_message_replaces_old() {
    let mut window = MemoryWindow::new("w", 5);
    window.append(Message::system("first"));
    window.append(user(0));
    window.append(Message::system("second"));
    assert_eq!(window.len(), 2);
    assert_eq!(window.messages()[0], Message::system("second"));
}

#[test]
fn test_orphaned_tool_results_leave_with_their_request() {
    let mut window = MemoryWindow::new("w", 4);
    window.append(user(0));
    window.append(Message::assistant_tool_calls(
        None,
        vec![ToolCallRequest::new("c1", "add", "{}"), ToolCallRequest::new("c2", "add", "{}")],
    ));
    window.append(Message::tool_result("c1", "1"));
    window.append(Message::tool_result("c2", "2"));
    assert_eq!(window.len(), 4);

    // evicting the user message is enough, evicting the request drags both results along
    window.append(Message::assistant("3"));
    assert_eq!(window.len(), 4);
    assert!(window.messages()[0].has_tool_calls());

    window.append(user(1));
    let messages = window.messages();
    assert_eq!(messages, vec![Message::assistant("3"), user(1)]);
    assert!(messages.iter().all(|m| m.tool_call_id().is_none()));
}

#[test]
fn test_restore_applies_bound() {
    let persisted: Vec<Message> = (0..10).map(user).collect();
    let window = MemoryWindow::restore("w", 4, persisted);
    assert_eq!(window.len(), 4);
    assert_eq!(window.messages()[0].text(), "message 6");
}

macro_rules! window_bound_tests {
    ($($name:ident: $max:expr, $appended:expr);*) => {
        paste::paste! {
            $(
                #[test]
                fn [<test_window_bound_ $name>]() {
                    let mut window = MemoryWindow::new("w", $max);
                    window.append(Message::system("sys"));
                    for i in 0..$appended {
                        window.append(user(i));
                        assert!(window.len() <= $max);
                        assert!(window.messages()[0].is_system());
                    }
                }
            )*
        }
    };
}

window_bound_tests! {
    tiny: 2, 5;
    small: 3, 20;
    medium: 10, 50;
    exact: 6, 5
}

#[tokio::test]
async fn test_store_isolates_ids() {
    let store = MemoryStore::new(10);
    store.append("alice", Message::user("I am Alice")).await.unwrap();
    store.append("bob", Message::user("I am Bob")).await.unwrap();
    store.append("alice", Message::assistant("Hello Alice")).await.unwrap();

    let alice = store.history("alice").await.unwrap();
    let bob = store.history("bob").await.unwrap();
    assert_eq!(alice.len(), 2);
    assert_eq!(bob, vec![Message::user("I am Bob")]);
    assert_eq!(store.ids().await, vec!["alice".to_string(), "bob".to_string()]);
}

#[tokio::test]
async fn test_unknown_id_is_empty_conversation() {
    let store = MemoryStore::new(10);
    assert_eq!(store.len("nobody").await, 0);
    assert!(store.ids().await.is_empty());
    assert!(store.history("nobody").await.unwrap().is_empty());
    assert_eq!(store.ids().await, vec!["nobody".to_string()]);
}

#[tokio::test]
async fn test_clear_drops_window_and_persisted_messages() {
    let backing = Arc::new(InMemoryChatMemoryStore::new());
    let store = MemoryStore::with_store(10, backing.clone());
    store.append("a", Message::user("hi")).await.unwrap();
    assert_eq!(backing.load("a").await.unwrap().len(), 1);

    store.clear("a").await.unwrap();
    assert_eq!(store.len("a").await, 0);
    assert!(store.ids().await.is_empty());
    assert!(backing.load("a").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_releases_turn_lock() {
    let store = MemoryStore::new(10);
    for i in 0..20 {
        let id = format!("session-{}", i);
        drop(store.lock_turn(&id).await);
        store.clear(&id).await.unwrap();
    }
    assert_eq!(store.turn_lock_count().await, 0);
}

#[tokio::test]
async fn test_held_turn_lock_survives_clear() {
    let store = MemoryStore::new(10);
    let guard = store.lock_turn("a").await;
    store.clear("a").await.unwrap();
    assert_eq!(store.turn_lock_count().await, 1);

    drop(guard);
    store.clear("a").await.unwrap();
    assert_eq!(store.turn_lock_count().await, 0);
}

#[tokio::test]
async fn test_turn_lock_is_exclusive_per_id() {
    let store = MemoryStore::new(10);
    let guard = store.lock_turn("a").await;

    let same = tokio::time::timeout(std::time::Duration::from_millis(20), store.lock_turn("a")).await;
    assert!(same.is_err());
    let other = tokio::time::timeout(std::time::Duration::from_millis(20), store.lock_turn("b")).await;
    assert!(other.is_ok());

    drop(guard);
    assert!(tokio::time::timeout(std::time::Duration::from_millis(20), store.lock_turn("a")).await.is_ok());
}

#[tokio::test]
async fn test_windows_write_through_and_reload() {
    let backing = Arc::new(InMemoryChatMemoryStore::new());
    {
        let store = MemoryStore::with_store(3, backing.clone());
        store.set_system("a", "be nice").await.unwrap();
        store.append_all("a", vec![user(0), user(1), user(2)]).await.unwrap();
    }

    let persisted = backing.load("a").await.unwrap();
    assert_eq!(persisted.len(), 3);

    let reopened = MemoryStore::with_store(3, backing);
    let history = reopened.history("a").await.unwrap();
    assert_eq!(history[0], Message::system("be nice"));
    assert_eq!(history[2].text(), "message 2");
}

#[tokio::test]
async fn test_concurrent_appends_on_distinct_ids() {
    let store = Arc::new(MemoryStore::new(100));
    let mut handles = Vec::new();
    for id in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..20 {
                store.append(&format!("id-{}", id), user(i)).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for id in 0..8 {
        let history = store.history(&format!("id-{}", id)).await.unwrap();
        assert_eq!(history.len(), 20);
        assert_eq!(history[19].text(), "message 19");
    }
}
