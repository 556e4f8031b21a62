use crate::render::{markdown_to_html, message_markdown};
use crate::types::{Message, Part, Role, Source};
use dioxus::prelude::*;

pub fn copy_to_clipboard(text: String) {
    spawn(async move {
        #[cfg(any(feature = "desktop", feature = "mobile"))]
        {
            if let Ok(mut cb) = arboard::Clipboard::new() {
                let _ = cb.set_text(text);
            }
        }
        #[cfg(not(any(feature = "desktop", feature = "mobile")))]
        let _ = text;
    });
}

#[component]
pub fn MarkdownBlock(content: String) -> Element {
    let html = markdown_to_html(&content);
    rsx! {
        div { class: "markdown", dangerous_inner_html: "{html}" }
    }
}

#[component]
pub fn MessageBubble(message: Message) -> Element {
    let role_class = match message.role {
        Role::User => "bubble user",
        Role::Model => "bubble model",
    };
    let markdown = message_markdown(&message);
    let thinking = message
        .parts
        .iter()
        .any(|part| matches!(part, Part::Thinking { .. }));
    let copy_payload = message.plain_text();
    let media: Vec<(String, bool)> = message
        .parts
        .iter()
        .filter_map(|part| match part {
            Part::Image { url } => Some((url.clone(), false)),
            Part::Video { url } => Some((url.clone(), true)),
            _ => None,
        })
        .collect();

    rsx! {
        div { class: "{role_class}",
            if thinking {
                div { class: "thinking-label", "Reasoning…" }
            }
            for (url, is_video) in media {
                if is_video {
                    video { class: "media", src: "{url}", controls: true }
                } else {
                    img { class: "media", src: "{url}" }
                }
            }
            if !markdown.is_empty() {
                MarkdownBlock { content: markdown }
            }
            if !message.sources.is_empty() {
                SourceList { sources: message.sources.clone() }
            }
            if message.role == Role::Model && !copy_payload.is_empty() {
                button {
                    class: "ghost small",
                    r#type: "button",
                    onclick: move |_| copy_to_clipboard(copy_payload.clone()),
                    "Copy"
                }
            }
        }
    }
}

#[component]
pub fn SourceList(sources: Vec<Source>) -> Element {
    rsx! {
        div { class: "sources",
            span { class: "text-muted", "Sources" }
            for source in sources {
                a { key: "{source.uri}", href: "{source.uri}", target: "_blank", "{source.title}" }
            }
        }
    }
}
