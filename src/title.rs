use crate::ai::GenerationBackend;
use crate::store::{self, SharedStore};
use tracing::debug;

/// Title used when summarization fails or returns nothing usable.
pub const FALLBACK_TITLE: &str = "Lumen Session";

const MAX_TITLE_CHARS: usize = 100;

/// Clean and validate a generated title
pub fn clean_title(raw_title: &str) -> Option<String> {
    let first_line = raw_title.trim().lines().next().unwrap_or_default();
    let cleaned = first_line
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '*')
        .trim();

    if cleaned.is_empty() {
        return None;
    }
    if cleaned.chars().count() > MAX_TITLE_CHARS {
        let head: String = cleaned.chars().take(MAX_TITLE_CHARS - 3).collect();
        return Some(format!("{head}..."));
    }
    Some(cleaned.to_string())
}

/// Summarize the first prompt of a conversation; never fails.
pub async fn generate_title(backend: &dyn GenerationBackend, first_prompt: &str) -> String {
    let prompt = match first_prompt.trim() {
        "" => "Session",
        trimmed => trimmed,
    };

    match backend.summarize(prompt).await {
        Ok(raw) => clean_title(&raw).unwrap_or_else(|| FALLBACK_TITLE.to_string()),
        Err(err) => {
            debug!(error = %err, "title summarization failed, using fallback");
            FALLBACK_TITLE.to_string()
        }
    }
}

/// Generate and store the title of `conversation_id`.
pub async fn retitle(
    store: &SharedStore,
    backend: &dyn GenerationBackend,
    conversation_id: &str,
    first_prompt: &str,
) -> String {
    let title = generate_title(backend, first_prompt).await;
    debug!(conversation = %conversation_id, title = %title, "conversation titled");
    store::lock(store).set_title(conversation_id, title.clone());
    title
}
