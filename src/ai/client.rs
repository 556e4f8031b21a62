use super::payload::Content;
use crate::types::{AspectRatio, ImageStyle, Source};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;
use tracing::debug;

// ============================================
// Error Types
// ============================================

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    EmptyResponse(&'static str),

    #[error("video operation failed: {0}")]
    Operation(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("{0}")]
    Backend(String),
}

pub type GenerationResult<T> = Result<T, GenerationError>;

// ============================================
// Request / Response Shapes
// ============================================

/// One increment of a streamed conversational reply.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplyChunk {
    pub text: String,
    pub citations: Vec<Source>,
}

impl ReplyChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }

    pub fn with_citation(mut self, uri: impl Into<String>, title: impl Into<String>) -> Self {
        self.citations.push(Source {
            uri: uri.into(),
            title: title.into(),
        });
        self
    }
}

/// Finite, pull-based sequence of reply increments.
pub type ReplyStream = BoxStream<'static, GenerationResult<ReplyChunk>>;

#[derive(Clone, Debug, PartialEq)]
pub struct ReplyRequest {
    pub contents: Vec<Content>,
    pub system_instruction: String,
    /// Route to the extended-reasoning model variant.
    pub reasoning: bool,
    /// Ask for live web-grounded generation.
    pub grounded: bool,
}

/// Handle of a long-running video synthesis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoJob {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VideoStatus {
    Pending,
    Done { uri: String },
}

// ============================================
// Backend Contract
// ============================================

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn stream_reply(&self, request: ReplyRequest) -> GenerationResult<ReplyStream>;

    /// Returns an image reference (data URL).
    async fn generate_image(
        &self,
        prompt: &str,
        style: ImageStyle,
        aspect_ratio: AspectRatio,
    ) -> GenerationResult<String>;

    async fn start_video(&self, prompt: &str, aspect_ratio: AspectRatio)
    -> GenerationResult<VideoJob>;

    async fn poll_video(&self, job: &VideoJob) -> GenerationResult<VideoStatus>;

    /// Turn a finished video's URI into a reference a player can load without credentials.
    async fn download_video(&self, uri: &str) -> GenerationResult<String>;

    /// Source text only, no commentary.
    async fn generate_code(&self, prompt: &str) -> GenerationResult<String>;

    /// Short (about three words) title for a first prompt.
    async fn summarize(&self, prompt: &str) -> GenerationResult<String>;
}

/// Start a video synthesis, poll it at `poll_interval` until it resolves, then download it.
///
/// There is no timeout: the loop ends when the operation reports a video or a call fails.
pub async fn generate_video(
    backend: &dyn GenerationBackend,
    prompt: &str,
    aspect_ratio: AspectRatio,
    poll_interval: Duration,
) -> GenerationResult<String> {
    let job = backend.start_video(prompt, aspect_ratio.for_video()).await?;
    debug!(operation = %job.name, "video operation started");

    let mut polls = 0u32;
    loop {
        match backend.poll_video(&job).await? {
            VideoStatus::Done { uri } => {
                debug!(operation = %job.name, polls, "video operation finished");
                return backend.download_video(&uri).await;
            }
            VideoStatus::Pending => {
                polls += 1;
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
