use crate::dispatcher::{Dispatcher, Submission};
use crate::types::{AspectRatio, ImageStyle, Mode};
use crate::ui::{Queued, WorkspaceState, dispatch};
use crate::views::shared::{MarkdownBlock, copy_to_clipboard};
use dioxus::prelude::*;

#[component]
pub fn GeneratorView(mode: Mode) -> Element {
    let dispatcher = use_context::<Dispatcher>();
    let state = use_context::<WorkspaceState>();
    let runner = use_coroutine_handle::<Queued>();
    let mut prompt = use_signal(String::new);
    let mut style = use_signal(ImageStyle::default);
    let mut aspect = use_signal(AspectRatio::default);

    let _ = (state.revision)();
    let busy = (state.busy)();
    let outputs = dispatcher.outputs(mode);

    let on_generate = move |_| {
        let submission = Submission::new(prompt(), mode)
            .with_style(style())
            .with_aspect_ratio(aspect());
        if submission.is_empty() || busy {
            return;
        }
        dispatch(runner, state, submission);
    };

    let ratios: Vec<AspectRatio> = match mode {
        Mode::Video => vec![AspectRatio::Landscape, AspectRatio::Portrait],
        _ => AspectRatio::ALL.to_vec(),
    };

    rsx! {
        div { class: "generator",
            h2 { "{mode.label()} studio" }
            textarea {
                rows: "3",
                placeholder: "Describe what to create",
                value: "{prompt}",
                disabled: busy,
                oninput: move |ev| prompt.set(ev.value()),
            }
            div { class: "options",
                if mode == Mode::Image {
                    select {
                        onchange: move |ev| {
                            if let Some(found) = ImageStyle::ALL.into_iter().find(|s| s.as_str() == ev.value()) {
                                style.set(found);
                            }
                        },
                        for s in ImageStyle::ALL {
                            option { key: "{s.as_str()}", value: s.as_str(), selected: style() == s, "{s.as_str()}" }
                        }
                    }
                }
                if mode != Mode::Code {
                    select {
                        onchange: move |ev| {
                            if let Some(found) = AspectRatio::ALL.into_iter().find(|r| r.as_str() == ev.value()) {
                                aspect.set(found);
                            }
                        },
                        for r in ratios {
                            option { key: "{r}", value: r.as_str(), selected: aspect() == r, "{r}" }
                        }
                    }
                }
                button {
                    class: "primary",
                    r#type: "button",
                    disabled: busy,
                    onclick: on_generate,
                    if busy { "Generating…" } else { "Generate" }
                }
            }
            if let Some(message) = outputs.error.clone() {
                div { class: "error", "{message}" }
            }
            if let Some(last) = outputs.last_prompt.clone() {
                p { class: "text-muted last-prompt", "{last}" }
            }
            if let Some(url) = outputs.image.clone() {
                img { class: "media", src: "{url}", alt: outputs.last_prompt.clone().unwrap_or_default() }
            }
            if let Some(url) = outputs.video.clone() {
                video { class: "media", src: "{url}", controls: true }
            }
            if let Some(code) = outputs.code.clone() {
                MarkdownBlock { content: format!("```\n{code}\n```") }
                button {
                    class: "ghost small",
                    r#type: "button",
                    onclick: move |_| copy_to_clipboard(code.clone()),
                    "Copy code"
                }
            }
        }
    }
}
