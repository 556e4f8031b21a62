use crate::auth::Identity;
use crate::dispatcher::Dispatcher;
use crate::render::{format_conversation_time, preview};
use crate::store;
use crate::types::{Language, Mode};
use crate::ui::{Panel, Services, WorkspaceState};
use dioxus::prelude::*;

#[derive(Clone, PartialEq)]
struct ConversationRow {
    id: String,
    title: String,
    updated: String,
    preview: String,
}

#[component]
pub fn Sidebar(user: Identity) -> Element {
    let services = use_context::<Services>();
    let dispatcher = use_context::<Dispatcher>();
    let state = use_context::<WorkspaceState>();
    let mut active = state.active;
    let mut mode = state.mode;
    let mut panel = state.panel;
    let mut language = use_signal(|| dispatcher.preferences().language);

    // Re-read the store whenever it publishes a new revision.
    let _ = (state.revision)();
    let rows: Vec<ConversationRow> = store::lock(dispatcher.store())
        .sorted()
        .into_iter()
        .map(|conv| ConversationRow {
            id: conv.id.clone(),
            title: conv.title.clone(),
            updated: format_conversation_time(conv.timestamp).unwrap_or_default(),
            preview: conv.messages.last().map(preview).unwrap_or_default(),
        })
        .collect();

    let new_dispatcher = dispatcher.clone();
    let on_new = move |_| {
        active.set(new_dispatcher.new_conversation());
        mode.set(Mode::Chat);
        panel.set(Panel::Workspace);
    };

    let language_dispatcher = dispatcher.clone();
    let on_language = move |ev: FormEvent| {
        if let Some(choice) = Language::parse(&ev.value()) {
            language_dispatcher.set_language(choice);
            language.set(choice);
        }
    };

    let auth = services.auth.clone();
    let on_sign_out = move |_| {
        let auth = auth.clone();
        spawn(async move { auth.sign_out().await });
    };

    rsx! {
        aside { class: "sidebar",
            div { class: "sidebar-header",
                span { class: "wordmark", "Lumen" }
                span { class: "text-muted", "{user.label()}" }
            }
            div { class: "mode-list",
                for m in Mode::ALL {
                    button {
                        key: "{m.label()}",
                        class: format_args!("mode {}", if mode() == m { "active" } else { "" }),
                        r#type: "button",
                        onclick: move |_| {
                            mode.set(m);
                            panel.set(Panel::Workspace);
                        },
                        "{m.label()}"
                    }
                }
            }
            button { class: "primary", r#type: "button", onclick: on_new, "New session" }
            ul { class: "conversation-list",
                for row in rows {
                    ConversationItem { key: "{row.id}", row }
                }
            }
            div { class: "sidebar-footer",
                label { class: "field",
                    "Chat language"
                    select { onchange: on_language,
                        for choice in Language::ALL {
                            option {
                                key: "{choice.code()}",
                                value: choice.code(),
                                selected: language() == choice,
                                "{choice.name()}"
                            }
                        }
                    }
                }
                button {
                    class: "ghost",
                    r#type: "button",
                    onclick: move |_| panel.set(Panel::Settings),
                    "Settings"
                }
                button { class: "ghost", r#type: "button", onclick: on_sign_out, "Sign out" }
            }
        }
    }
}

#[component]
fn ConversationItem(row: ConversationRow) -> Element {
    let state = use_context::<WorkspaceState>();
    let mut active = state.active;
    let mut panel = state.panel;
    let selected = active() == row.id;
    let id = row.id.clone();

    rsx! {
        li {
            class: format_args!("conversation {}", if selected { "active" } else { "" }),
            onclick: move |_| {
                active.set(id.clone());
                panel.set(Panel::Workspace);
            },
            div { class: "conversation-title", "{row.title}" }
            div { class: "conversation-meta", "{row.updated}" }
            div { class: "conversation-preview", "{row.preview}" }
        }
    }
}
