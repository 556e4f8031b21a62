use crate::ai::client::{
    GenerationBackend, GenerationError, GenerationResult, ReplyChunk, ReplyRequest, ReplyStream,
    VideoJob, VideoStatus,
};
use crate::ai::payload::{Content, encode_data_url};
use crate::config::Settings;
use crate::types::{AspectRatio, ImageStyle, Source};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::gemini;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;
use tracing::debug;

const THINKING_BUDGET: u32 = 16000;
const CODE_THINKING_BUDGET: u32 = 8000;
const VIDEO_MIME: &str = "video/mp4";
const IMAGE_SIZE: &str = "1K";
const VIDEO_RESOLUTION: &str = "720p";
const CODE_INSTRUCTION: &str = "You are an expert software engineer. Output ONLY code.";

/// Gemini REST endpoints for streaming, image, video and code; a Rig agent
/// for title summaries.
pub struct GeminiBackend {
    http: Client,
    agents: gemini::Client,
    api_key: String,
    settings: Settings,
}

impl GeminiBackend {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No Gemini API key configured. Set GEMINI_API_KEY."))?;

        Ok(Self {
            http: Client::new(),
            agents: gemini::Client::new(&api_key),
            api_key,
            settings: settings.clone(),
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.settings.base_url, model, method)
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> GenerationResult<String> {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn prompt_agent(&self, model: &str, prompt: &str) -> GenerationResult<String> {
        let agent = self.agents.agent(model).build();
        agent
            .prompt(prompt)
            .await
            .map_err(|err| GenerationError::Agent(err.to_string()))
    }
}

// ============================================
// Wire shapes
// ============================================

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<Value>,
}

fn reply_body(request: &ReplyRequest) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: &request.contents,
        system_instruction: (!request.system_instruction.is_empty()).then(|| SystemInstruction {
            parts: [TextPart {
                text: &request.system_instruction,
            }],
        }),
        tools: if request.grounded {
            vec![json!({ "googleSearch": {} })]
        } else {
            Vec::new()
        },
        generation_config: request
            .reasoning
            .then(|| json!({ "thinkingConfig": { "thinkingBudget": THINKING_BUDGET } })),
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    #[serde(default)]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct VideoOperation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    response: Option<VideoResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    #[serde(default)]
    generate_video_response: Option<GeneratedVideos>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedVideos {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<VideoFile>,
}

#[derive(Deserialize)]
struct VideoFile {
    #[serde(default)]
    uri: Option<String>,
}

// ============================================
// SSE parsing helpers (exported for tests)
// ============================================

/// Incremental `text/event-stream` reader yielding each event's joined `data:` payload.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Option<String>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            self.take_line(line.strip_suffix('\r').unwrap_or(&line), &mut events);
        }
        events
    }

    /// Flush whatever the body left unterminated.
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw).into_owned();
            self.take_line(line.strip_suffix('\r').unwrap_or(&line), &mut events);
        }
        if let Some(data) = self.data.take() {
            events.push(data);
        }
        events
    }

    fn take_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            if let Some(data) = self.data.take() {
                events.push(data);
            }
            return;
        }

        if let Some(rest) = line.strip_prefix("data:") {
            let fragment = rest.trim_start();
            match &mut self.data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(fragment);
                }
                None => self.data = Some(fragment.to_string()),
            }
        }
    }
}

/// Parse one SSE data payload of a streamed reply.
pub fn parse_stream_data(data: &str) -> GenerationResult<Option<ReplyChunk>> {
    let trimmed = data.trim();
    if trimmed.is_empty() || trimmed == "[DONE]" {
        return Ok(None);
    }

    let parsed: GenerateResponse = serde_json::from_str(trimmed)?;
    if let Some(err) = parsed.error {
        return Err(GenerationError::Backend(err.message));
    }

    let mut chunk = ReplyChunk::default();
    if let Some(candidate) = parsed.candidates.into_iter().next() {
        if let Some(content) = candidate.content {
            for part in content.parts {
                if part.thought {
                    continue;
                }
                if let Some(text) = part.text {
                    chunk.text.push_str(&text);
                }
            }
        }
        if let Some(grounding) = candidate.grounding_metadata {
            chunk.citations = grounding
                .grounding_chunks
                .into_iter()
                .filter_map(|gc| gc.web)
                .filter_map(|web| {
                    let uri = web.uri.filter(|uri| !uri.is_empty())?;
                    let title = web.title.unwrap_or_else(|| uri.clone());
                    Some(Source { uri, title })
                })
                .collect();
        }
    }
    Ok(Some(chunk))
}

struct SseState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<GenerationResult<ReplyChunk>>,
    finished: bool,
}

impl<S> SseState<S> {
    fn queue(&mut self, events: Vec<String>) {
        for data in events {
            match parse_stream_data(&data) {
                Ok(Some(chunk)) => self.pending.push_back(Ok(chunk)),
                Ok(None) => {}
                Err(err) => {
                    self.pending.push_back(Err(err));
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Turn a byte stream into reply chunks, pulling bytes only when a chunk is requested.
pub fn reply_stream<S, B>(body: S) -> ReplyStream
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        body: body.boxed(),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.push(bytes.as_ref());
                    state.queue(events);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(GenerationError::from(err)), state));
                }
                None => {
                    let events = state.decoder.finish();
                    state.queue(events);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

fn code_body(prompt: &str) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "systemInstruction": { "parts": [{ "text": CODE_INSTRUCTION }] },
        "generationConfig": { "thinkingConfig": { "thinkingBudget": CODE_THINKING_BUDGET } }
    })
}

/// Concatenated answer text of a single-shot response, thoughts excluded.
fn response_text(body: &str) -> GenerationResult<String> {
    let parsed: GenerateResponse = serde_json::from_str(body)?;
    if let Some(err) = parsed.error {
        return Err(GenerationError::Backend(err.message));
    }
    let text: String = parsed
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter(|part| !part.thought)
        .filter_map(|part| part.text)
        .collect();
    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse("code generation returned no text"));
    }
    Ok(text)
}

fn image_prompt(prompt: &str, style: ImageStyle) -> String {
    format!(
        "A {} style image of {}, ultra-high quality, masterpiece.",
        style.as_str(),
        prompt
    )
}

fn first_image(body: &str) -> GenerationResult<String> {
    let parsed: GenerateResponse = serde_json::from_str(body)?;
    parsed
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .find_map(|part| part.inline_data)
        .map(|inline| {
            let mime = inline.mime_type.unwrap_or_else(|| "image/png".to_string());
            format!("data:{};base64,{}", mime, inline.data)
        })
        .ok_or(GenerationError::EmptyResponse("image synthesis returned no image"))
}

fn video_status(body: &str) -> GenerationResult<VideoStatus> {
    let operation: VideoOperation = serde_json::from_str(body)?;
    if let Some(err) = operation.error {
        return Err(GenerationError::Operation(err.message));
    }
    if !operation.done {
        return Ok(VideoStatus::Pending);
    }
    operation
        .response
        .and_then(|response| response.generate_video_response)
        .and_then(|videos| videos.generated_samples.into_iter().next())
        .and_then(|sample| sample.video)
        .and_then(|video| video.uri)
        .map(|uri| VideoStatus::Done { uri })
        .ok_or(GenerationError::EmptyResponse("video synthesis returned no video"))
}

/// Playable data URL for downloaded video bytes.
fn video_data_url(content_type: Option<&str>, bytes: &[u8]) -> String {
    let mime = content_type
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|mime| mime.starts_with("video/"))
        .unwrap_or(VIDEO_MIME);
    encode_data_url(mime, bytes)
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn stream_reply(&self, request: ReplyRequest) -> GenerationResult<ReplyStream> {
        let model = if request.reasoning {
            &self.settings.reasoning_model
        } else {
            &self.settings.chat_model
        };
        let url = format!("{}?alt=sse", self.model_url(model, "streamGenerateContent"));
        debug!(model = %model, turns = request.contents.len(), "opening reply stream");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("accept", "text/event-stream")
            .json(&reply_body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(reply_stream(response.bytes_stream()))
    }

    async fn generate_image(
        &self,
        prompt: &str,
        style: ImageStyle,
        aspect_ratio: AspectRatio,
    ) -> GenerationResult<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": image_prompt(prompt, style) }] }],
            "generationConfig": {
                "imageConfig": { "aspectRatio": aspect_ratio.as_str(), "imageSize": IMAGE_SIZE }
            }
        });
        let url = self.model_url(&self.settings.image_model, "generateContent");
        let response = self.post_json(&url, &body).await?;
        first_image(&response)
    }

    async fn start_video(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> GenerationResult<VideoJob> {
        let body = json!({
            "instances": [{ "prompt": format!("{prompt}, cinematic 4k") }],
            "parameters": {
                "aspectRatio": aspect_ratio.as_str(),
                "resolution": VIDEO_RESOLUTION,
                "sampleCount": 1
            }
        });
        let url = self.model_url(&self.settings.video_model, "predictLongRunning");
        let response = self.post_json(&url, &body).await?;
        let operation: VideoOperation = serde_json::from_str(&response)?;
        if operation.name.is_empty() {
            return Err(GenerationError::EmptyResponse(
                "video synthesis returned no operation",
            ));
        }
        Ok(VideoJob {
            name: operation.name,
        })
    }

    async fn poll_video(&self, job: &VideoJob) -> GenerationResult<VideoStatus> {
        let url = format!("{}/{}", self.settings.base_url, job.name);
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }
        video_status(&body)
    }

    async fn download_video(&self, uri: &str) -> GenerationResult<String> {
        let response = self
            .http
            .get(uri)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "video downloaded");
        Ok(video_data_url(content_type.as_deref(), &bytes))
    }

    async fn generate_code(&self, prompt: &str) -> GenerationResult<String> {
        let url = self.model_url(&self.settings.code_model, "generateContent");
        let response = self.post_json(&url, &code_body(prompt)).await?;
        response_text(&response)
    }

    async fn summarize(&self, prompt: &str) -> GenerationResult<String> {
        let request = format!("Summarize as a 3-word title: \"{prompt}\"");
        self.prompt_agent(&self.settings.title_model, &request).await
    }
}
