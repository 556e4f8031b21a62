use crate::auth::Credentials;
use crate::ui::Services;
use dioxus::prelude::*;

#[component]
pub fn LoginView() -> Element {
    let services = use_context::<Services>();
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut error = use_signal(|| None::<String>);
    let mut pending = use_signal(|| false);

    let auth = services.auth.clone();
    let mut sign_in = move |credentials: Credentials| {
        let auth = auth.clone();
        pending.set(true);
        error.set(None);
        spawn(async move {
            if let Err(err) = auth.sign_in(credentials).await {
                error.set(Some(err.user_message()));
            }
            pending.set(false);
        });
    };

    let mut password_sign_in = sign_in.clone();
    let guest_auth = services.auth.clone();

    rsx! {
        div { class: "login",
            h1 { class: "wordmark", "Lumen" }
            p { class: "text-muted", "Chat, images, video and code in one place." }
            if let Some(message) = error() {
                div { class: "error", "{message}" }
            }
            button {
                class: "primary",
                r#type: "button",
                disabled: pending(),
                onclick: move |_| sign_in(Credentials::Federated),
                "Continue with Google"
            }
            form {
                class: "login-form",
                onsubmit: move |evt| {
                    evt.prevent_default();
                    password_sign_in(Credentials::Password {
                        email: email(),
                        password: password(),
                    });
                },
                input {
                    r#type: "email",
                    placeholder: "Email",
                    value: "{email}",
                    oninput: move |ev| email.set(ev.value()),
                }
                input {
                    r#type: "password",
                    placeholder: "Password",
                    value: "{password}",
                    oninput: move |ev| password.set(ev.value()),
                }
                button { r#type: "submit", disabled: pending(), "Sign in" }
            }
            button {
                class: "ghost",
                r#type: "button",
                onclick: move |_| {
                    guest_auth.login_as_guest();
                },
                "Continue as guest"
            }
        }
    }
}
