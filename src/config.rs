use crate::types::{Language, Persona};
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_REASONING_MODEL: &str = "gemini-3-pro-preview";
const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";
const DEFAULT_CODE_MODEL: &str = "gemini-3-pro-preview";
const DEFAULT_TITLE_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_VIDEO_POLL_MS: u64 = 5000;

/// Runtime settings, read once at start-up.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub reasoning_model: String,
    pub image_model: String,
    pub video_model: String,
    pub code_model: String,
    pub title_model: String,
    pub persona: Persona,
    pub language: Language,
    pub video_poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            reasoning_model: DEFAULT_REASONING_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            code_model: DEFAULT_CODE_MODEL.to_string(),
            title_model: DEFAULT_TITLE_MODEL.to_string(),
            persona: Persona::default(),
            language: Language::default(),
            video_poll_interval: Duration::from_millis(DEFAULT_VIDEO_POLL_MS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let string = |key: &str, fallback: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
        };

        let api_key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("API_KEY"))
            .filter(|key| !key.trim().is_empty());
        let persona = lookup("LUMEN_PERSONA")
            .and_then(|raw| Persona::parse(&raw))
            .unwrap_or(defaults.persona);
        let language = lookup("LUMEN_LANGUAGE")
            .and_then(|raw| Language::parse(&raw))
            .unwrap_or(defaults.language);
        let video_poll_interval = lookup("LUMEN_VIDEO_POLL_MS")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.video_poll_interval);

        Self {
            api_key,
            base_url: string("GEMINI_BASE_URL", defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            chat_model: string("LUMEN_CHAT_MODEL", defaults.chat_model),
            reasoning_model: string("LUMEN_REASONING_MODEL", defaults.reasoning_model),
            image_model: string("LUMEN_IMAGE_MODEL", defaults.image_model),
            video_model: string("LUMEN_VIDEO_MODEL", defaults.video_model),
            code_model: string("LUMEN_CODE_MODEL", defaults.code_model),
            title_model: string("LUMEN_TITLE_MODEL", defaults.title_model),
            persona,
            language,
            video_poll_interval,
        }
    }

    /// Start-up persona and language; the UI may change them afterwards.
    pub fn preferences(&self) -> Preferences {
        Preferences {
            persona: self.persona,
            language: self.language,
        }
    }

    /// System instruction for conversational replies.
    pub fn system_instruction(&self) -> String {
        self.preferences().system_instruction()
    }
}

/// User-adjustable assistant voice, applied from the next submission on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Preferences {
    pub persona: Persona,
    pub language: Language,
}

impl Preferences {
    pub fn system_instruction(&self) -> String {
        format!(
            "You are Lumen, a multi-modal assistant. Persona: {}. Language: {}. Use search for the latest facts.",
            self.persona.as_str(),
            self.language.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert_eq!(settings, Settings::default());
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn env_overrides_are_read() {
        let settings = Settings::from_lookup(lookup(&[
            ("API_KEY", "k-1"),
            ("GEMINI_BASE_URL", "http://localhost:8080/v1/"),
            ("LUMEN_PERSONA", "very-friendly"),
            ("LUMEN_LANGUAGE", "si-LK"),
            ("LUMEN_VIDEO_POLL_MS", "250"),
            ("LUMEN_CHAT_MODEL", "  "),
        ]));
        assert_eq!(settings.api_key.as_deref(), Some("k-1"));
        assert_eq!(settings.base_url, "http://localhost:8080/v1");
        assert_eq!(settings.persona, Persona::VeryFriendly);
        assert_eq!(settings.language, Language::Sinhala);
        assert_eq!(settings.video_poll_interval, Duration::from_millis(250));
        assert_eq!(settings.chat_model, DEFAULT_CHAT_MODEL);
    }

    #[test]
    fn system_instruction_names_persona_and_language() {
        let settings = Settings {
            persona: Persona::Friendly,
            language: Language::Sinhala,
            ..Settings::default()
        };
        let instruction = settings.system_instruction();
        assert!(instruction.contains("Persona: friendly"));
        assert!(instruction.contains("Language: Sinhala"));
        assert_eq!(instruction, settings.preferences().system_instruction());
    }
}
