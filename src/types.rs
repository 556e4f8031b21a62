use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One semantic payload within a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    /// Data URL or opaque reference to an image.
    Image { url: String },
    Video { url: String },
    Code { code: String },
    /// Interim reasoning-stream text shown while extended reasoning runs.
    Thinking { text: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Part::Image { url: url.into() }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Part::Video { url: url.into() }
    }

    pub fn code(code: impl Into<String>) -> Self {
        Part::Code { code: code.into() }
    }

    /// Text carried by the part, if it carries any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } | Part::Thinking { text } => Some(text),
            Part::Code { code } => Some(code),
            Part::Image { .. } | Part::Video { .. } => None,
        }
    }
}

/// Web reference surfaced by grounded generation; identity is the URI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

impl Message {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            parts,
            sources: Vec::new(),
        }
    }

    pub fn user(parts: Vec<Part>) -> Self {
        Self::new(Role::User, parts)
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self::new(Role::Model, parts)
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self::model(vec![Part::text(text)])
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    /// Concatenated text of every text-bearing part.
    pub fn plain_text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    /// Last update, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

pub type Conversations = HashMap<String, Conversation>;

/// Generation capability selected for a submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Chat,
    Vision,
    Image,
    Video,
    Code,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Chat, Mode::Vision, Mode::Image, Mode::Video, Mode::Code];

    /// Modes answered through a streamed, web-grounded reply.
    pub fn is_conversational(self) -> bool {
        matches!(self, Mode::Chat | Mode::Vision)
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Chat => "Chat",
            Mode::Vision => "Vision",
            Mode::Image => "Image",
            Mode::Video => "Video",
            Mode::Code => "Code",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Photorealistic,
    Anime,
    Cartoon,
    Fantasy,
    Cyberpunk,
}

impl ImageStyle {
    pub const ALL: [ImageStyle; 5] = [
        ImageStyle::Photorealistic,
        ImageStyle::Anime,
        ImageStyle::Cartoon,
        ImageStyle::Fantasy,
        ImageStyle::Cyberpunk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageStyle::Photorealistic => "photorealistic",
            ImageStyle::Anime => "anime",
            ImageStyle::Cartoon => "cartoon",
            ImageStyle::Fantasy => "fantasy",
            ImageStyle::Cyberpunk => "cyberpunk",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Wide,
    #[serde(rename = "3:4")]
    Tall,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Wide,
        AspectRatio::Tall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Wide => "4:3",
            AspectRatio::Tall => "3:4",
        }
    }

    /// Video synthesis only renders landscape or portrait.
    pub fn for_video(self) -> AspectRatio {
        match self {
            AspectRatio::Portrait => AspectRatio::Portrait,
            _ => AspectRatio::Landscape,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Persona {
    Friendly,
    #[default]
    Helpful,
    VeryFriendly,
    VeryHelpful,
}

impl Persona {
    pub const ALL: [Persona; 4] = [
        Persona::Helpful,
        Persona::Friendly,
        Persona::VeryHelpful,
        Persona::VeryFriendly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Persona::Friendly => "friendly",
            Persona::Helpful => "helpful",
            Persona::VeryFriendly => "very-friendly",
            Persona::VeryHelpful => "very-helpful",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "friendly" => Some(Persona::Friendly),
            "helpful" => Some(Persona::Helpful),
            "very-friendly" => Some(Persona::VeryFriendly),
            "very-helpful" => Some(Persona::VeryHelpful),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en-US")]
    English,
    #[serde(rename = "si-LK")]
    Sinhala,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Sinhala];

    /// Locale tag, as accepted by `parse`.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en-US",
            Language::Sinhala => "si-LK",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Sinhala => "Sinhala",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "en-US" | "en" => Some(Language::English),
            "si-LK" | "si" => Some(Language::Sinhala),
            _ => None,
        }
    }
}
