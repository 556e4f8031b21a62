//! Folds a streamed reply into the last message of a conversation.

use crate::ai::{GenerationResult, ReplyChunk, ReplyStream};
use crate::store::{self, SharedStore};
use crate::types::{Message, Part, Source};
use futures::StreamExt;
use tracing::debug;

/// Trailing marker shown while a reply is still streaming.
pub const STREAMING_MARKER: &str = "▌";

#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    citations: Vec<Source>,
    thinking: bool,
}

impl StreamAccumulator {
    /// `thinking` marks interim snapshots as reasoning-in-progress.
    pub fn new(thinking: bool) -> Self {
        Self {
            thinking,
            ..Self::default()
        }
    }

    /// Fold one chunk in and return the in-progress snapshot.
    pub fn push(&mut self, chunk: &ReplyChunk) -> Message {
        self.text.push_str(&chunk.text);
        for citation in &chunk.citations {
            match self.citations.iter_mut().find(|s| s.uri == citation.uri) {
                Some(existing) => existing.title = citation.title.clone(),
                None => self.citations.push(citation.clone()),
            }
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> Message {
        let text = format!("{}{}", self.text, STREAMING_MARKER);
        let part = if self.thinking {
            Part::Thinking { text }
        } else {
            Part::text(text)
        };
        Message::model(vec![part])
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn citations(&self) -> &[Source] {
        &self.citations
    }

    /// Final message: marker stripped, citations attached.
    pub fn finish(self) -> Message {
        Message::model_text(self.text).with_sources(self.citations)
    }
}

/// Drive `stream` to completion, replacing the conversation's last message after
/// every chunk and once more with the finalized reply.
///
/// On error nothing further is written; the caller records the failure.
pub async fn accumulate(
    store: &SharedStore,
    conversation_id: &str,
    mut stream: ReplyStream,
    thinking: bool,
) -> GenerationResult<Message> {
    let mut acc = StreamAccumulator::new(thinking);
    let mut chunks = 0usize;

    while let Some(chunk) = stream.next().await {
        let snapshot = acc.push(&chunk?);
        chunks += 1;
        store::lock(store).replace_last_message(conversation_id, snapshot);
    }

    let message = acc.finish();
    debug!(
        conversation = %conversation_id,
        chunks,
        sources = message.sources.len(),
        "reply stream finished"
    );
    store::lock(store).replace_last_message(conversation_id, message.clone());
    Ok(message)
}
