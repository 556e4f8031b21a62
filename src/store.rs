//! Per-user conversation store.
//!
//! Owns every `Conversation` for the signed-in user and writes the whole
//! collection back to its key-value slot after each mutation. Views read
//! through `get`/`sorted` and re-render when the published revision moves.

use crate::storage::{KeyValueStore, StorageResult};
use crate::types::{Conversation, Conversations, Message};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const NEW_CONVERSATION_TITLE: &str = "New Session";
pub const SEED_GREETING: &str = "Lumen online. Ready for instructions.";

/// Slot holding one user's serialized conversations.
pub fn storage_key(user_id: &str) -> String {
    format!("conversations_{user_id}")
}

/// Store handle shared between the dispatcher, stream drivers and views.
pub type SharedStore = Arc<Mutex<ConversationStore>>;

/// Lock the shared store; every mutation is atomic, so a poisoned lock is still consistent.
pub fn lock(store: &SharedStore) -> MutexGuard<'_, ConversationStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub struct ConversationStore {
    kv: Arc<dyn KeyValueStore>,
    user_id: String,
    conversations: Conversations,
    last_id_stamp: i64,
    id_collisions: u32,
    revision: watch::Sender<u64>,
}

impl ConversationStore {
    /// Open the store for `user_id`, restoring whatever was persisted.
    pub fn open(kv: Arc<dyn KeyValueStore>, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let conversations = Self::load(kv.as_ref(), &user_id);
        debug!(user = %user_id, count = conversations.len(), "conversation store opened");
        let (revision, _) = watch::channel(0);
        Self {
            kv,
            user_id,
            conversations,
            last_id_stamp: 0,
            id_collisions: 0,
            revision,
        }
    }

    /// Read the persisted snapshot; absent or unreadable data yields an empty collection.
    pub fn load(kv: &dyn KeyValueStore, user_id: &str) -> Conversations {
        let Some(raw) = kv.get(&storage_key(user_id)) else {
            return Conversations::new();
        };
        match serde_json::from_str::<Conversations>(&raw) {
            Ok(conversations) => conversations,
            Err(err) => {
                warn!(user = %user_id, error = %err, "discarding unreadable conversation snapshot");
                Conversations::new()
            }
        }
    }

    /// Serialize and store the full snapshot.
    pub fn persist(
        kv: &dyn KeyValueStore,
        user_id: &str,
        snapshot: &Conversations,
    ) -> StorageResult<()> {
        let raw = serde_json::to_string(snapshot)?;
        kv.set(&storage_key(user_id), &raw)
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.conversations.contains_key(id)
    }

    pub fn conversations(&self) -> &Conversations {
        &self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Display order: most recently updated first.
    pub fn sorted(&self) -> Vec<&Conversation> {
        let mut convs: Vec<&Conversation> = self.conversations.values().collect();
        convs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        convs
    }

    pub fn most_recent_id(&self) -> Option<String> {
        self.sorted().first().map(|conv| conv.id.clone())
    }

    /// Most recent conversation, seeding a fresh one when the store is empty.
    pub fn open_or_create(&mut self) -> String {
        match self.most_recent_id() {
            Some(id) => id,
            None => self.create_conversation(),
        }
    }

    pub fn create_conversation(&mut self) -> String {
        let now = now_millis();
        let id = self.next_id(now);
        self.conversations.insert(
            id.clone(),
            Conversation {
                id: id.clone(),
                title: NEW_CONVERSATION_TITLE.to_string(),
                messages: vec![Message::model_text(SEED_GREETING)],
                timestamp: now,
            },
        );
        info!(conversation = %id, "conversation created");
        self.save();
        id
    }

    pub fn append_messages(&mut self, id: &str, messages: Vec<Message>) {
        let Some(conv) = self.conversations.get_mut(id) else {
            debug!(conversation = %id, "append to unknown conversation ignored");
            return;
        };
        conv.messages.extend(messages);
        conv.timestamp = now_millis();
        self.save();
    }

    pub fn replace_last_message(&mut self, id: &str, message: Message) {
        let Some(conv) = self.conversations.get_mut(id) else {
            return;
        };
        let Some(last) = conv.messages.last_mut() else {
            return;
        };
        *last = message;
        conv.timestamp = now_millis();
        self.save();
    }

    pub fn set_title(&mut self, id: &str, title: impl Into<String>) {
        let Some(conv) = self.conversations.get_mut(id) else {
            return;
        };
        conv.title = title.into();
        conv.timestamp = now_millis();
        self.save();
    }

    pub fn clear_all(&mut self) {
        self.conversations.clear();
        if let Err(err) = self.kv.remove(&storage_key(&self.user_id)) {
            warn!(user = %self.user_id, error = %err, "failed to erase persisted conversations");
        }
        info!(user = %self.user_id, "conversation history cleared");
        self.bump_revision();
    }

    /// Pretty JSON of the whole collection, newest first.
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.sorted())
    }

    /// Receiver that ticks after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn next_id(&mut self, now: i64) -> String {
        if now == self.last_id_stamp {
            self.id_collisions += 1;
        } else {
            self.last_id_stamp = now;
            self.id_collisions = 0;
        }

        let mut id = if self.id_collisions == 0 {
            format!("chat_{now}")
        } else {
            format!("chat_{now}_{}", self.id_collisions)
        };
        // Ids restored from disk may still collide with a fresh stamp.
        while self.conversations.contains_key(&id) {
            self.id_collisions += 1;
            id = format!("chat_{now}_{}", self.id_collisions);
        }
        id
    }

    fn save(&mut self) {
        if let Err(err) = Self::persist(self.kv.as_ref(), &self.user_id, &self.conversations) {
            warn!(user = %self.user_id, error = %err, "failed to persist conversations");
        }
        self.bump_revision();
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::{Part, Role};
    use std::collections::HashSet;

    fn store() -> (Arc<MemoryStore>, ConversationStore) {
        let kv = Arc::new(MemoryStore::new());
        let store = ConversationStore::open(kv.clone(), "user-1");
        (kv, store)
    }

    #[test]
    fn create_seeds_greeting_and_persists() {
        let (kv, mut store) = store();
        let id = store.create_conversation();

        let conv = store.get(&id).unwrap();
        assert_eq!(conv.title, NEW_CONVERSATION_TITLE);
        assert_eq!(conv.messages, vec![Message::model_text(SEED_GREETING)]);
        assert!(kv.get(&storage_key("user-1")).is_some());
    }

    #[test]
    fn ids_stay_unique_within_one_millisecond() {
        let (_, mut store) = store();
        let ids: HashSet<String> = (0..200).map(|_| store.create_conversation()).collect();
        assert_eq!(ids.len(), 200);
        assert_eq!(store.len(), 200);
    }

    #[test]
    fn append_to_unknown_conversation_is_a_no_op() {
        let (kv, mut store) = store();
        store.append_messages("missing", vec![Message::model_text("x")]);
        assert!(store.is_empty());
        assert!(kv.get(&storage_key("user-1")).is_none());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn replace_last_keeps_prior_messages() {
        let (_, mut store) = store();
        let id = store.create_conversation();
        store.append_messages(
            &id,
            vec![Message::user(vec![Part::text("hi")]), Message::model_text("")],
        );

        store.replace_last_message(&id, Message::model_text("hello"));

        let msgs = &store.get(&id).unwrap().messages;
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].role, Role::User);
        assert_eq!(msgs[2], Message::model_text("hello"));
    }

    #[test]
    fn unreadable_snapshot_loads_empty() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(&storage_key("user-1"), "{not json").unwrap();
        let store = ConversationStore::open(kv, "user-1");
        assert!(store.is_empty());
    }

    #[test]
    fn sorted_is_newest_first() {
        let (_, mut store) = store();
        let older = store.create_conversation();
        let newer = store.create_conversation();
        store.conversations.get_mut(&older).unwrap().timestamp = 10;
        store.conversations.get_mut(&newer).unwrap().timestamp = 20;

        let order: Vec<&str> = store.sorted().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec![newer.as_str(), older.as_str()]);
        assert_eq!(store.most_recent_id(), Some(newer));
    }

    #[test]
    fn open_or_create_reuses_existing() {
        let (_, mut store) = store();
        let first = store.open_or_create();
        assert_eq!(store.open_or_create(), first);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn users_are_isolated() {
        let kv = Arc::new(MemoryStore::new());
        let mut alice = ConversationStore::open(kv.clone(), "alice");
        alice.create_conversation();

        let bob = ConversationStore::open(kv, "bob");
        assert!(bob.is_empty());
    }

    #[test]
    fn subscribers_see_each_mutation() {
        let (_, mut store) = store();
        let rx = store.subscribe();
        let id = store.create_conversation();
        store.set_title(&id, "Renamed");
        assert_eq!(*rx.borrow(), 2);
    }

    #[test]
    fn export_lists_conversations() {
        let (_, mut store) = store();
        let id = store.create_conversation();
        let json = store.export_json().unwrap();
        assert!(json.contains(&id));
        assert!(json.contains(SEED_GREETING));
    }
}
