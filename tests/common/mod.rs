//! Scripted generation backend and fixtures shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use lumen::ai::{
    GenerationBackend, GenerationError, GenerationResult, ReplyChunk, ReplyRequest, ReplyStream,
    VideoJob, VideoStatus,
};
use lumen::config::Settings;
use lumen::dispatcher::Dispatcher;
use lumen::storage::{KeyValueStore, MemoryStore, StorageResult};
use lumen::store::{ConversationStore, SharedStore, storage_key};
use lumen::types::{AspectRatio, Conversations, ImageStyle, Message};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const USER: &str = "tester";

/// How the next conversational reply behaves.
pub enum Reply {
    Chunks(Vec<ReplyChunk>),
    FailToOpen(String),
    FailAfter(Vec<ReplyChunk>, String),
}

#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    pub requests: Mutex<Vec<ReplyRequest>>,
    pub image: Mutex<Option<Result<String, String>>>,
    pub image_calls: Mutex<Vec<(String, ImageStyle, AspectRatio)>>,
    pub video_aspects: Mutex<Vec<AspectRatio>>,
    pub downloads: Mutex<Vec<String>>,
    pub pending_polls: AtomicUsize,
    pub polls: AtomicUsize,
    pub code: Mutex<Option<Result<String, String>>>,
    pub title: Mutex<Option<Result<String, String>>>,
    pub summaries: AtomicUsize,
    /// When set, `stream_reply` waits for a notification before answering.
    pub hold: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_chunks(&self, texts: &[&str]) {
        self.push_reply(Reply::Chunks(
            texts.iter().map(|text| ReplyChunk::text(*text)).collect(),
        ));
    }

    pub fn summaries(&self) -> usize {
        self.summaries.load(Ordering::SeqCst)
    }

    pub fn hold_replies(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(notify.clone());
        notify
    }
}

fn scripted<T>(slot: &Mutex<Option<Result<T, String>>>, default: T) -> GenerationResult<T> {
    match slot.lock().unwrap().take() {
        Some(Ok(value)) => Ok(value),
        Some(Err(message)) => Err(GenerationError::Backend(message)),
        None => Ok(default),
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn stream_reply(&self, request: ReplyRequest) -> GenerationResult<ReplyStream> {
        self.requests.lock().unwrap().push(request);
        let hold = self.hold.lock().unwrap().clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::Chunks(vec![ReplyChunk::text("ok")]));

        match reply {
            Reply::Chunks(chunks) => {
                Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
            }
            Reply::FailToOpen(message) => Err(GenerationError::Backend(message)),
            Reply::FailAfter(chunks, message) => {
                let items: Vec<GenerationResult<ReplyChunk>> = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(GenerationError::Backend(message))))
                    .collect();
                Ok(futures::stream::iter(items).boxed())
            }
        }
    }

    async fn generate_image(
        &self,
        prompt: &str,
        style: ImageStyle,
        aspect_ratio: AspectRatio,
    ) -> GenerationResult<String> {
        self.image_calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), style, aspect_ratio));
        scripted(&self.image, "data:image/png;base64,SU1H".to_string())
    }

    async fn start_video(
        &self,
        _prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> GenerationResult<VideoJob> {
        self.video_aspects.lock().unwrap().push(aspect_ratio);
        Ok(VideoJob {
            name: "operations/video-1".to_string(),
        })
    }

    async fn poll_video(&self, _job: &VideoJob) -> GenerationResult<VideoStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.pending_polls.load(Ordering::SeqCst);
        if remaining > 0 {
            self.pending_polls.store(remaining - 1, Ordering::SeqCst);
            return Ok(VideoStatus::Pending);
        }
        Ok(VideoStatus::Done {
            uri: "https://videos.example/1.mp4".to_string(),
        })
    }

    async fn download_video(&self, uri: &str) -> GenerationResult<String> {
        self.downloads.lock().unwrap().push(uri.to_string());
        Ok("data:video/mp4;base64,VklE".to_string())
    }

    async fn generate_code(&self, _prompt: &str) -> GenerationResult<String> {
        scripted(&self.code, "fn main() {}".to_string())
    }

    async fn summarize(&self, _prompt: &str) -> GenerationResult<String> {
        self.summaries.fetch_add(1, Ordering::SeqCst);
        scripted(&self.title, "\"Friendly Greeting Chat\"".to_string())
    }
}

/// Memory-backed store that keeps every value written to it.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    writes: Mutex<Vec<(String, String)>>,
}

impl RecordingStore {
    /// Every persisted snapshot of `user`'s conversations, oldest first.
    pub fn snapshots(&self, user: &str) -> Vec<Conversations> {
        let key = storage_key(user);
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(written, _)| *written == key)
            .map(|(_, raw)| serde_json::from_str(raw).expect("snapshot is not valid JSON"))
            .collect()
    }

    /// Last message of `conversation` in each persisted snapshot.
    pub fn last_messages(&self, user: &str, conversation: &str) -> Vec<Message> {
        self.snapshots(user)
            .into_iter()
            .filter_map(|mut snapshot| snapshot.remove(conversation))
            .filter_map(|conv| conv.messages.last().cloned())
            .collect()
    }
}

impl KeyValueStore for RecordingStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.inner.remove(key)
    }
}

pub fn test_settings() -> Settings {
    Settings {
        api_key: Some("test-key".to_string()),
        video_poll_interval: Duration::from_millis(1),
        ..Settings::default()
    }
}

pub struct Harness {
    pub kv: Arc<MemoryStore>,
    pub backend: Arc<ScriptedBackend>,
    pub dispatcher: Dispatcher,
    pub conversation: String,
}

impl Harness {
    pub fn new() -> Self {
        let kv = Arc::new(MemoryStore::new());
        let backend = ScriptedBackend::new();
        let mut store = ConversationStore::open(kv.clone(), USER);
        let conversation = store.create_conversation();
        let dispatcher = Dispatcher::new(store.into_shared(), backend.clone(), test_settings());
        Self {
            kv,
            backend,
            dispatcher,
            conversation,
        }
    }

    pub fn store(&self) -> &SharedStore {
        self.dispatcher.store()
    }

    pub fn messages(&self) -> Vec<lumen::types::Message> {
        lumen::store::lock(self.store())
            .get(&self.conversation)
            .map(|conv| conv.messages.clone())
            .unwrap_or_default()
    }

    pub fn title(&self) -> String {
        lumen::store::lock(self.store())
            .get(&self.conversation)
            .map(|conv| conv.title.clone())
            .unwrap_or_default()
    }
}
