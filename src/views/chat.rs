use crate::ai::{encode_data_url, image_mime_for};
use crate::dispatcher::{Dispatcher, Submission};
use crate::store;
use crate::ui::{Queued, WorkspaceState, dispatch};
use crate::views::shared::MessageBubble;
use dioxus::events::Key;
use dioxus::prelude::*;

#[component]
pub fn ChatView() -> Element {
    let dispatcher = use_context::<Dispatcher>();
    let state = use_context::<WorkspaceState>();
    let runner = use_coroutine_handle::<Queued>();
    let mut prompt = use_signal(String::new);
    let mut attachment = use_signal(|| None::<String>);
    let mut reasoning = use_signal(|| false);

    let _ = (state.revision)();
    let active = (state.active)();
    let mode = (state.mode)();
    let busy = (state.busy)();
    let (title, messages) = store::lock(dispatcher.store())
        .get(&active)
        .map(|conv| (conv.title.clone(), conv.messages.clone()))
        .unwrap_or_default();
    let error = dispatcher.outputs(mode).error;

    let mut send = move || {
        let mut submission = Submission::new(prompt(), mode).with_reasoning(reasoning());
        if let Some(image) = attachment() {
            submission = submission.with_image(image);
        }
        if submission.is_empty() || busy {
            return;
        }
        dispatch(runner, state, submission);
        prompt.set(String::new());
        attachment.set(None);
    };
    let mut send_on_enter = send.clone();

    rsx! {
        div { class: "chat",
            h2 { class: "chat-title", "{title}" }
            div { class: "messages",
                for (index, message) in messages.into_iter().enumerate() {
                    MessageBubble { key: "{index}", message }
                }
            }
            if let Some(message) = error {
                div { class: "error", "{message}" }
            }
            div { class: "input-bar",
                if let Some(image) = attachment() {
                    div { class: "attachment",
                        img { src: "{image}" }
                        button {
                            class: "ghost small",
                            r#type: "button",
                            onclick: move |_| attachment.set(None),
                            "Remove"
                        }
                    }
                }
                textarea {
                    rows: "1",
                    placeholder: "Ask Lumen anything",
                    value: "{prompt}",
                    disabled: busy,
                    oninput: move |ev| prompt.set(ev.value()),
                    onkeydown: move |ev| {
                        if ev.key() == Key::Enter && !ev.modifiers().shift() {
                            ev.prevent_default();
                            send_on_enter();
                        }
                    },
                }
                label { class: "ghost small",
                    "Attach"
                    input {
                        r#type: "file",
                        accept: "image/*",
                        hidden: true,
                        onchange: move |evt: FormEvent| async move {
                            let Some(engine) = evt.files() else {
                                return;
                            };
                            for name in engine.files() {
                                if let Some(bytes) = engine.read_file(&name).await {
                                    attachment.set(Some(encode_data_url(image_mime_for(&name), &bytes)));
                                }
                            }
                        },
                    }
                }
                label { class: "toggle",
                    input {
                        r#type: "checkbox",
                        checked: reasoning(),
                        onchange: move |ev| reasoning.set(ev.checked()),
                    }
                    "Deep reasoning"
                }
                button {
                    class: "primary",
                    r#type: "button",
                    disabled: busy,
                    onclick: move |_| send(),
                    if busy { "Generating…" } else { "Send" }
                }
            }
        }
    }
}
