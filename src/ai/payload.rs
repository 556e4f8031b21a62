use crate::types::{Message, Part, Role};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

const INVALID_MEDIA: &str = "[Invalid Media Data]";

/// Role-tagged turn in the backend's request schema.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Split a `data:<mime>;base64,<payload>` URL.
pub fn parse_data_url(url: &str) -> Option<InlineData> {
    let rest = url.strip_prefix("data:")?;
    let (mime_type, data) = rest.split_once(";base64,")?;
    if mime_type.is_empty() || data.is_empty() {
        return None;
    }
    Some(InlineData {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

/// Encode raw bytes as a `data:` URL.
pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Image mime type guessed from a file name.
pub fn image_mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "image/png",
    }
}

fn convert_part(part: &Part) -> ContentPart {
    match part {
        Part::Image { url } => match parse_data_url(url) {
            Some(inline_data) => ContentPart::InlineData { inline_data },
            None => ContentPart::text(INVALID_MEDIA),
        },
        Part::Text { text } | Part::Thinking { text } => ContentPart::text(text.clone()),
        Part::Code { code } => ContentPart::text(code.clone()),
        Part::Video { .. } => ContentPart::text(""),
    }
}

/// Convert the full history into request turns, preserving order and roles.
pub fn build_contents(history: &[Message]) -> Vec<Content> {
    history
        .iter()
        .map(|msg| Content {
            role: msg.role,
            parts: msg.parts.iter().map(convert_part).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_urls_become_inline_data() {
        let parsed = parse_data_url("data:image/png;base64,AAAA").unwrap();
        assert_eq!(parsed.mime_type, "image/png");
        assert_eq!(parsed.data, "AAAA");

        assert!(parse_data_url("https://example.com/cat.png").is_none());
        assert!(parse_data_url("data:;base64,AAAA").is_none());
    }

    #[test]
    fn attachments_encode_to_parseable_data_urls() {
        let url = encode_data_url(image_mime_for("Cat.JPG"), b"abc");
        assert_eq!(url, "data:image/jpeg;base64,YWJj");
        assert_eq!(parse_data_url(&url).unwrap().data, "YWJj");
        assert_eq!(image_mime_for("noext"), "image/png");
    }

    #[test]
    fn history_is_converted_part_by_part() {
        let history = vec![
            Message::model_text("greeting"),
            Message::user(vec![
                Part::image("data:image/jpeg;base64,/9j/"),
                Part::text("what is this?"),
            ]),
            Message::model(vec![Part::code("let x = 1;"), Part::video("blob:v")]),
            Message::user(vec![Part::image("not-a-data-url")]),
        ];

        let contents = build_contents(&history);
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0].role, Role::Model);
        assert_eq!(
            contents[1].parts[0],
            ContentPart::InlineData {
                inline_data: InlineData {
                    mime_type: "image/jpeg".into(),
                    data: "/9j/".into()
                }
            }
        );
        assert_eq!(contents[2].parts, vec![ContentPart::text("let x = 1;"), ContentPart::text("")]);
        assert_eq!(contents[3].parts, vec![ContentPart::text(INVALID_MEDIA)]);
    }

    #[test]
    fn serializes_in_backend_schema() {
        let contents = build_contents(&[Message::user(vec![
            Part::image("data:image/png;base64,QQ=="),
            Part::text("hi"),
        ])]);
        let json = serde_json::to_value(&contents).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "role": "user",
                "parts": [
                    { "inlineData": { "mimeType": "image/png", "data": "QQ==" } },
                    { "text": "hi" }
                ]
            }])
        );
    }
}
