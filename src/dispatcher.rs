//! Routes a submission to the generation operation of its mode.
//!
//! A submission appends the user turn, runs exactly one backend operation
//! and records its outcome in the conversation and in the per-mode outputs
//! the generator views read. Only one submission per conversation may be in
//! flight; the guard is released on every exit path.

use crate::accumulator;
use crate::ai::{GenerationBackend, GenerationError, ReplyRequest, build_contents, generate_video};
use crate::config::{Preferences, Settings};
use crate::store::{self, SharedStore};
use crate::title;
use crate::types::{AspectRatio, ImageStyle, Language, Message, Mode, Part, Persona};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Terminal model message recorded when a conversational reply fails.
pub const SYNC_ERROR_MESSAGE: &str = "Error syncing with the model.";
/// Mode error shown when the backend gave no error text.
pub const DEFAULT_ERROR: &str = "Generation failed. Retry later.";

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("nothing to submit")]
    EmptySubmission,

    #[error("a reply is already generating for this conversation")]
    Busy,

    #[error("unknown conversation: {0}")]
    UnknownConversation(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Submission {
    pub prompt: String,
    pub mode: Mode,
    /// Attached image as a data URL.
    pub image: Option<String>,
    pub image_style: ImageStyle,
    pub aspect_ratio: AspectRatio,
    pub reasoning: bool,
}

impl Submission {
    pub fn new(prompt: impl Into<String>, mode: Mode) -> Self {
        Self {
            prompt: prompt.into(),
            mode,
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_style(mut self, style: ImageStyle) -> Self {
        self.image_style = style;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Blank prompt and no attachment.
    pub fn is_empty(&self) -> bool {
        self.prompt.trim().is_empty() && self.image.is_none()
    }

    /// The user turn: attachment first, then the prompt if it has content.
    pub fn user_message(&self) -> Message {
        let mut parts = Vec::with_capacity(2);
        if let Some(image) = &self.image {
            parts.push(Part::image(image.clone()));
        }
        if !self.prompt.trim().is_empty() {
            parts.push(Part::text(self.prompt.clone()));
        }
        Message::user(parts)
    }
}

/// Latest result and error of one generation mode.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModeOutputs {
    pub error: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
    pub code: Option<String>,
    pub last_prompt: Option<String>,
}

/// Marks a conversation busy until dropped.
struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl InFlight {
    fn acquire(ids: &Arc<Mutex<HashSet<String>>>, id: &str) -> Option<Self> {
        let inserted = ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
        inserted.then(|| Self {
            ids: Arc::clone(ids),
            id: id.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    store: SharedStore,
    backend: Arc<dyn GenerationBackend>,
    settings: Settings,
    preferences: Arc<Mutex<Preferences>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    outputs: Arc<Mutex<HashMap<Mode, ModeOutputs>>>,
}

impl Dispatcher {
    pub fn new(store: SharedStore, backend: Arc<dyn GenerationBackend>, settings: Settings) -> Self {
        let preferences = Arc::new(Mutex::new(settings.preferences()));
        Self {
            store,
            backend,
            settings,
            preferences,
            in_flight: Arc::default(),
            outputs: Arc::default(),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn preferences(&self) -> Preferences {
        *self.preferences.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_persona(&self, persona: Persona) {
        self.preferences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .persona = persona;
        info!(persona = persona.as_str(), "persona changed");
    }

    pub fn set_language(&self, language: Language) {
        self.preferences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .language = language;
        info!(language = language.code(), "language changed");
    }

    pub fn is_generating(&self, conversation_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(conversation_id)
    }

    pub fn outputs(&self, mode: Mode) -> ModeOutputs {
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&mode)
            .cloned()
            .unwrap_or_default()
    }

    pub fn new_conversation(&self) -> String {
        store::lock(&self.store).create_conversation()
    }

    /// Erase every conversation and seed a fresh one.
    pub fn clear_history(&self) -> String {
        let mut store = store::lock(&self.store);
        store.clear_all();
        store.create_conversation()
    }

    /// Run `submit` on the runtime, detached from the caller.
    ///
    /// The submission finishes, including its store writes and title, even if
    /// the caller stops waiting on the handle.
    pub fn spawn_submit(
        &self,
        conversation_id: String,
        submission: Submission,
    ) -> JoinHandle<Result<Message, SubmitError>> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.submit(&conversation_id, submission).await })
    }

    /// Run one submission against `conversation_id`.
    ///
    /// Returns the model message recorded for it. Rejected submissions leave
    /// the store untouched.
    pub async fn submit(
        &self,
        conversation_id: &str,
        submission: Submission,
    ) -> Result<Message, SubmitError> {
        if submission.is_empty() {
            return Err(SubmitError::EmptySubmission);
        }
        let _guard =
            InFlight::acquire(&self.in_flight, conversation_id).ok_or(SubmitError::Busy)?;

        let (history, prior_count) = {
            let mut store = store::lock(&self.store);
            let Some(conv) = store.get(conversation_id) else {
                return Err(SubmitError::UnknownConversation(conversation_id.to_string()));
            };
            let prior_count = conv.messages.len();
            let mut history = conv.messages.clone();
            let user_turn = submission.user_message();
            history.push(user_turn.clone());
            store.append_messages(conversation_id, vec![user_turn]);
            (history, prior_count)
        };

        let mode = submission.mode;
        self.reset_outputs(mode, &submission.prompt);
        debug!(conversation = %conversation_id, mode = mode.label(), prior_count, "dispatching submission");

        let result = match mode {
            Mode::Chat | Mode::Vision => {
                self.converse(conversation_id, &history, submission.reasoning)
                    .await
            }
            Mode::Image => self.synthesize_image(conversation_id, &submission).await,
            Mode::Video => self.synthesize_video(conversation_id, &submission).await,
            Mode::Code => self.synthesize_code(conversation_id, &submission).await,
        };

        if let Err(err) = &result {
            error!(conversation = %conversation_id, mode = mode.label(), error = %err, "generation failed");
            let text = err.to_string();
            self.update_outputs(mode, |out| {
                out.error = Some(if text.trim().is_empty() {
                    DEFAULT_ERROR.to_string()
                } else {
                    text
                });
            });
        }

        if prior_count <= 1 {
            title::retitle(
                &self.store,
                self.backend.as_ref(),
                conversation_id,
                &submission.prompt,
            )
            .await;
        }

        result.map_err(SubmitError::from)
    }

    async fn converse(
        &self,
        conversation_id: &str,
        history: &[Message],
        reasoning: bool,
    ) -> Result<Message, GenerationError> {
        let request = ReplyRequest {
            contents: build_contents(history),
            system_instruction: self.preferences().system_instruction(),
            reasoning,
            grounded: true,
        };

        let stream = match self.backend.stream_reply(request).await {
            Ok(stream) => stream,
            Err(err) => {
                self.record_sync_error(conversation_id, false);
                return Err(err);
            }
        };

        store::lock(&self.store).append_messages(conversation_id, vec![Message::model_text("")]);

        match accumulator::accumulate(&self.store, conversation_id, stream, reasoning).await {
            Ok(message) => Ok(message),
            Err(err) => {
                self.record_sync_error(conversation_id, true);
                Err(err)
            }
        }
    }

    async fn synthesize_image(
        &self,
        conversation_id: &str,
        submission: &Submission,
    ) -> Result<Message, GenerationError> {
        let url = self
            .backend
            .generate_image(&submission.prompt, submission.image_style, submission.aspect_ratio)
            .await?;
        self.update_outputs(Mode::Image, |out| out.image = Some(url.clone()));
        Ok(self.append_reply(conversation_id, Part::image(url)))
    }

    async fn synthesize_video(
        &self,
        conversation_id: &str,
        submission: &Submission,
    ) -> Result<Message, GenerationError> {
        let uri = generate_video(
            self.backend.as_ref(),
            &submission.prompt,
            submission.aspect_ratio,
            self.settings.video_poll_interval,
        )
        .await?;
        info!(conversation = %conversation_id, "video ready");
        self.update_outputs(Mode::Video, |out| out.video = Some(uri.clone()));
        Ok(self.append_reply(conversation_id, Part::video(uri)))
    }

    async fn synthesize_code(
        &self,
        conversation_id: &str,
        submission: &Submission,
    ) -> Result<Message, GenerationError> {
        let code = self.backend.generate_code(&submission.prompt).await?;
        self.update_outputs(Mode::Code, |out| out.code = Some(code.clone()));
        Ok(self.append_reply(conversation_id, Part::code(code)))
    }

    fn append_reply(&self, conversation_id: &str, part: Part) -> Message {
        let message = Message::model(vec![part]);
        store::lock(&self.store).append_messages(conversation_id, vec![message.clone()]);
        message
    }

    /// Replace the streaming placeholder with the error turn, or append it if none was added.
    fn record_sync_error(&self, conversation_id: &str, has_placeholder: bool) {
        let message = Message::model_text(SYNC_ERROR_MESSAGE);
        let mut store = store::lock(&self.store);
        if has_placeholder {
            store.replace_last_message(conversation_id, message);
        } else {
            store.append_messages(conversation_id, vec![message]);
        }
    }

    fn reset_outputs(&self, mode: Mode, prompt: &str) {
        self.update_outputs(mode, |out| {
            *out = ModeOutputs {
                last_prompt: Some(prompt.to_string()),
                ..ModeOutputs::default()
            };
        });
    }

    fn update_outputs(&self, mode: Mode, apply: impl FnOnce(&mut ModeOutputs)) {
        let mut outputs = self.outputs.lock().unwrap_or_else(PoisonError::into_inner);
        apply(outputs.entry(mode).or_default());
    }
}
