//! Integration tests for conversation persistence
//!
//! Covers snapshot round trips, clear-all and the file-backed key-value store

mod common;

use common::{Harness, USER};
use lumen::dispatcher::Submission;
use lumen::storage::{FileStore, KeyValueStore, MemoryStore};
use lumen::store::{ConversationStore, NEW_CONVERSATION_TITLE, SEED_GREETING, lock, storage_key};
use lumen::types::{Message, Mode, Part, Source};
use std::sync::Arc;
use std::time::Duration;

mod persistence_tests {
    use super::*;

    #[test]
    fn test_persist_then_load_round_trips() {
        let kv = Arc::new(MemoryStore::new());
        let mut store = ConversationStore::open(kv.clone(), USER);
        let first = store.create_conversation();
        let second = store.create_conversation();
        store.append_messages(
            &first,
            vec![
                Message::user(vec![Part::image("data:image/png;base64,AA"), Part::text("what?")]),
                Message::model_text("a cat").with_sources(vec![Source {
                    uri: "https://cats.example".into(),
                    title: "Cats".into(),
                }]),
            ],
        );
        store.append_messages(&second, vec![Message::model(vec![Part::code("fn x() {}")])]);
        store.set_title(&first, "Cat Photo Question");

        let loaded = ConversationStore::load(kv.as_ref(), USER);
        assert_eq!(&loaded, store.conversations());

        ConversationStore::persist(kv.as_ref(), "copy", &loaded).expect("persist failed");
        assert_eq!(ConversationStore::load(kv.as_ref(), "copy"), loaded);
    }

    #[test]
    fn test_load_missing_user_is_empty() {
        let kv = MemoryStore::new();
        assert!(ConversationStore::load(&kv, "nobody").is_empty());
    }

    #[test]
    fn test_clear_all_then_load_is_empty() {
        let kv = Arc::new(MemoryStore::new());
        let mut store = ConversationStore::open(kv.clone(), USER);
        store.create_conversation();
        store.create_conversation();

        store.clear_all();

        assert!(store.is_empty());
        assert!(kv.get(&storage_key(USER)).is_none());
        assert!(ConversationStore::load(kv.as_ref(), USER).is_empty());
    }

    #[test]
    fn test_reopen_restores_most_recent() {
        let kv = Arc::new(MemoryStore::new());
        let mut store = ConversationStore::open(kv.clone(), USER);
        let older = store.create_conversation();
        let newer = store.create_conversation();
        std::thread::sleep(Duration::from_millis(5));
        store.append_messages(&older, vec![Message::model_text("bump")]);

        let mut reopened = ConversationStore::open(kv, USER);
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains(&newer));
        assert_eq!(reopened.open_or_create(), older);
        assert_eq!(reopened.len(), 2);
    }
}

mod history_tests {
    use super::*;

    #[tokio::test]
    async fn test_clear_history_reseeds_one_conversation() {
        let h = Harness::new();
        h.dispatcher
            .submit(&h.conversation, Submission::new("Hello", Mode::Chat))
            .await
            .expect("submission failed");

        let fresh = h.dispatcher.clear_history();

        let store = lock(h.store());
        assert_eq!(store.len(), 1);
        assert!(!store.contains(&h.conversation));
        let conv = store.get(&fresh).expect("seeded conversation missing");
        assert_eq!(conv.title, NEW_CONVERSATION_TITLE);
        assert_eq!(conv.messages, vec![Message::model_text(SEED_GREETING)]);
    }

    #[tokio::test]
    async fn test_submissions_are_persisted() {
        let h = Harness::new();
        h.backend.push_chunks(&["Hi", " there"]);
        h.dispatcher
            .submit(&h.conversation, Submission::new("Hello", Mode::Chat))
            .await
            .expect("submission failed");

        let loaded = ConversationStore::load(h.kv.as_ref(), USER);
        let conv = &loaded[&h.conversation];
        assert_eq!(conv.messages.last(), Some(&Message::model_text("Hi there")));
    }
}

mod file_store_tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let kv = FileStore::new(dir.path().join("store"));

        assert!(kv.get("conversations_a").is_none());
        kv.set("conversations_a", "{}").expect("Failed to set");
        assert_eq!(kv.get("conversations_a").as_deref(), Some("{}"));

        kv.remove("conversations_a").expect("Failed to remove");
        assert!(kv.get("conversations_a").is_none());
        kv.remove("conversations_a").expect("Removing twice should succeed");
    }

    #[test]
    fn test_file_store_overwrite_leaves_no_staging_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path().join("store");
        let kv = FileStore::new(&root);

        kv.set("conversations_a", r#"{"v":1}"#).expect("Failed to set");
        kv.set("conversations_a", r#"{"v":2}"#).expect("Failed to overwrite");
        assert_eq!(kv.get("conversations_a").as_deref(), Some(r#"{"v":2}"#));

        let names: Vec<String> = std::fs::read_dir(&root)
            .expect("Failed to list store dir")
            .map(|entry| entry.expect("Bad dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["conversations_a.json".to_string()]);
    }

    #[test]
    fn test_interrupted_write_keeps_previous_value() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path().join("store");
        let kv = FileStore::new(&root);
        kv.set("conversations_a", r#"{"v":1}"#).expect("Failed to set");

        // A write that died before its rename leaves only a truncated staging file.
        std::fs::write(root.join("conversations_a.json.tmp"), r#"{"v":"#)
            .expect("Failed to write staging file");
        assert_eq!(kv.get("conversations_a").as_deref(), Some(r#"{"v":1}"#));

        kv.set("conversations_a", r#"{"v":3}"#).expect("Failed to set after crash");
        assert_eq!(kv.get("conversations_a").as_deref(), Some(r#"{"v":3}"#));
        assert!(!root.join("conversations_a.json.tmp").exists());
    }

    #[test]
    fn test_conversations_survive_restart_on_disk() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let id = {
            let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));
            let mut store = ConversationStore::open(kv, USER);
            store.create_conversation()
        };

        let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));
        let store = ConversationStore::open(kv, USER);
        assert!(store.contains(&id));
    }
}
