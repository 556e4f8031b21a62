use crate::dispatcher::Dispatcher;
use crate::store;
use crate::types::Persona;
use crate::ui::{Panel, WorkspaceState};
use crate::views::shared::copy_to_clipboard;
use dioxus::prelude::*;
use tracing::warn;

#[component]
pub fn SettingsView() -> Element {
    let dispatcher = use_context::<Dispatcher>();
    let state = use_context::<WorkspaceState>();
    let mut export = use_signal(|| None::<String>);
    let mut persona = use_signal(|| dispatcher.preferences().persona);
    let mut active = state.active;
    let mut panel = state.panel;

    let persona_dispatcher = dispatcher.clone();
    let choose_persona = use_callback(move |choice: Persona| {
        persona_dispatcher.set_persona(choice);
        persona.set(choice);
    });

    let export_dispatcher = dispatcher.clone();
    let on_export = move |_| match store::lock(export_dispatcher.store()).export_json() {
        Ok(json) => {
            copy_to_clipboard(json.clone());
            export.set(Some(json));
        }
        Err(err) => warn!(error = %err, "history export failed"),
    };

    let on_clear = move |_| {
        active.set(dispatcher.clear_history());
        export.set(None);
        panel.set(Panel::Workspace);
    };

    rsx! {
        div { class: "settings",
            div { class: "settings-section",
                h3 { class: "section-title", "Assistant personality" }
                div { class: "persona-list",
                    for choice in Persona::ALL {
                        button {
                            key: "{choice.as_str()}",
                            class: format_args!("persona {}", if persona() == choice { "active" } else { "" }),
                            r#type: "button",
                            onclick: move |_| choose_persona.call(choice),
                            "{choice.as_str()}"
                        }
                    }
                }
                p { class: "text-muted", "Applies from the next message." }
            }
            div { class: "settings-section",
                h3 { class: "section-title", "History" }
                button { class: "ghost", r#type: "button", onclick: on_export, "Export history" }
                button { class: "danger", r#type: "button", onclick: on_clear, "Clear all sessions" }
                if let Some(json) = export() {
                    pre { class: "export", "{json}" }
                }
            }
        }
    }
}
