//! Display helpers shared by the views: markdown, timestamps, previews.

use crate::types::{Message, Part};
use comrak::plugins::syntect::SyntectAdapter;
use comrak::{ComrakOptions, ComrakPlugins, markdown_to_html_with_plugins};
use once_cell::sync::Lazy;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

static MARKDOWN_OPTIONS: Lazy<ComrakOptions> = Lazy::new(|| {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.tasklist = true;
    options.extension.autolink = true;
    options
});

const CONVERSATION_TIME_FORMAT: &[FormatItem<'static>] = format_description!(
    "[month repr:short] [day padding:none], [hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]"
);

const PREVIEW_CHARS: usize = 48;

pub fn markdown_to_html(md: &str) -> String {
    let adapter = SyntectAdapter::new(Some("base16-ocean.dark"));
    let mut plugins = ComrakPlugins::default();
    plugins.render.codefence_syntax_highlighter = Some(&adapter);
    markdown_to_html_with_plugins(md, &MARKDOWN_OPTIONS, &plugins)
}

/// Markdown for the text-bearing parts of a message; media parts are rendered separately.
pub fn message_markdown(message: &Message) -> String {
    let mut blocks = Vec::new();
    for part in &message.parts {
        match part {
            Part::Text { text } if !text.is_empty() => blocks.push(text.clone()),
            Part::Code { code } => blocks.push(format!("```\n{}\n```", code.trim_end())),
            Part::Thinking { text } => blocks.push(
                text.lines()
                    .map(|line| format!("> {line}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => {}
        }
    }
    blocks.join("\n\n")
}

/// Sidebar label for a conversation's last update.
pub fn format_conversation_time(timestamp_ms: i64) -> Option<String> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    format_time_at(timestamp_ms, offset)
}

fn format_time_at(timestamp_ms: i64, offset: UtcOffset) -> Option<String> {
    let nanos = i128::from(timestamp_ms) * 1_000_000;
    let datetime = OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()?;
    datetime.to_offset(offset).format(CONVERSATION_TIME_FORMAT).ok()
}

/// One-line preview of the latest message.
pub fn preview(message: &Message) -> String {
    let text = message.plain_text();
    let line = text.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        return match message.parts.first() {
            Some(Part::Image { .. }) => "[image]".to_string(),
            Some(Part::Video { .. }) => "[video]".to_string(),
            _ => String::new(),
        };
    }
    if line.chars().count() > PREVIEW_CHARS {
        let head: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{head}…")
    } else {
        line.to_string()
    }
}
