/// AI module for Lumen
///
/// Everything the conversation core needs from a generative backend sits behind
/// `GenerationBackend`: streamed replies, image synthesis, long-running video
/// synthesis, code generation and title summaries.
///
/// # Architecture
///
/// - `client` - Backend contract, reply stream types and the video polling loop
/// - `payload` - Conversion of stored history into the backend's request turns
/// - `providers` - Concrete backends (Gemini REST + Rig agents)
///
/// # Usage
///
/// ```rust,no_run
/// use lumen::ai::backend_from_env;
///
/// # async fn example() -> anyhow::Result<()> {
/// let backend = backend_from_env()?;
/// let title = backend.summarize("How do tides work?").await?;
/// # Ok(())
/// # }
/// ```
mod client;
mod payload;
pub mod providers;

pub use client::{
    GenerationBackend, GenerationError, GenerationResult, ReplyChunk, ReplyRequest, ReplyStream,
    VideoJob, VideoStatus, generate_video,
};
pub use payload::{
    Content, ContentPart, InlineData, build_contents, encode_data_url, image_mime_for, parse_data_url,
};
pub use providers::backend_from_env;
