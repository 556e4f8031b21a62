use crate::ai::GenerationBackend;
use crate::ai::providers::backend_from_settings;
use crate::auth::{AuthService, AuthState, Identity, OfflineProvider};
use crate::config::Settings;
use crate::dispatcher::{Dispatcher, Submission};
use crate::storage::{KeyValueStore, default_store};
use crate::store::{self, ConversationStore};
use crate::types::Mode;
use crate::views::{ChatView, GeneratorView, LoginView, SettingsView, Sidebar};
use dioxus::prelude::*;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const LUMEN_CSS: Asset = asset!("/assets/lumen.css");
const AUTH_LOADING_TIMEOUT: Duration = Duration::from_secs(3);

/// Process-wide collaborators, built once and shared through context.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<AuthService>,
    pub kv: Arc<dyn KeyValueStore>,
    pub settings: Settings,
    pub backend: Option<Arc<dyn GenerationBackend>>,
}

impl Services {
    fn from_env() -> Self {
        let settings = Settings::from_env();
        let kv = default_store();
        let backend = match backend_from_settings(&settings) {
            Ok(backend) => Some(backend),
            Err(err) => {
                warn!(error = %err, "generation backend unavailable");
                None
            }
        };
        let auth = Arc::new(AuthService::new(Arc::new(OfflineProvider), kv.clone()));
        Self {
            auth,
            kv,
            settings,
            backend,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Panel {
    Workspace,
    Settings,
}

/// Reactive state of the signed-in workspace.
#[derive(Clone, Copy)]
pub struct WorkspaceState {
    pub active: Signal<String>,
    pub revision: Signal<u64>,
    pub mode: Signal<Mode>,
    pub busy: Signal<bool>,
    pub panel: Signal<Panel>,
}

/// A submission bound to the conversation that was active when it was sent.
#[derive(Clone, Debug)]
pub struct Queued {
    pub conversation: String,
    pub submission: Submission,
}

/// Mark the workspace busy and hand the submission to the workspace runner.
pub fn dispatch(runner: Coroutine<Queued>, state: WorkspaceState, submission: Submission) {
    let mut busy = state.busy;
    busy.set(true);
    runner.send(Queued {
        conversation: state.active.peek().clone(),
        submission,
    });
}

#[component]
pub fn App() -> Element {
    let services = use_context_provider(Services::from_env);
    let auth_state = use_signal(AuthState::default);

    use_auth_sync(services.auth.clone(), auth_state);

    let state = auth_state();
    let screen = match state.user {
        _ if state.loading => rsx! { div { class: "splash", "Lumen" } },
        Some(user) => rsx! { Workspace { key: "{user.id}", user } },
        None => rsx! { LoginView {} },
    };
    rsx! {
        document::Link { rel: "stylesheet", href: LUMEN_CSS }
        {screen}
    }
}

fn use_auth_sync(auth: Arc<AuthService>, state: Signal<AuthState>) {
    use_hook(move || {
        let mut state = state;
        let mut rx = auth.subscribe();
        spawn(async move {
            auth.init().await;
            loop {
                state.set(rx.borrow_and_update().clone());
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        // Leave the splash even if the provider never answers.
        spawn(async move {
            tokio::time::sleep(AUTH_LOADING_TIMEOUT).await;
            if state.peek().loading {
                state.set(AuthState {
                    user: None,
                    loading: false,
                });
            }
        });
    });
}

#[component]
fn Workspace(user: Identity) -> Element {
    let services = use_context::<Services>();
    let Some(backend) = services.backend.clone() else {
        return rsx! {
            div { class: "notice",
                "No AI provider configured. Set GEMINI_API_KEY and restart."
            }
        };
    };

    let (dispatcher, first_active) = use_hook(|| {
        let mut store = ConversationStore::open(services.kv.clone(), user.id.clone());
        let active = store.open_or_create();
        let dispatcher = Dispatcher::new(store.into_shared(), backend, services.settings.clone());
        (dispatcher, active)
    });
    use_context_provider(|| dispatcher.clone());

    let mut revision = use_signal(|| 0u64);
    let state = use_context_provider(|| WorkspaceState {
        active: Signal::new(first_active),
        revision,
        mode: Signal::new(Mode::default()),
        busy: Signal::new(false),
        panel: Signal::new(Panel::Workspace),
    });

    // Runs submissions for every view; outlives panel switches.
    let runner_dispatcher = dispatcher.clone();
    let busy = state.busy;
    use_coroutine(move |mut rx: UnboundedReceiver<Queued>| {
        let dispatcher = runner_dispatcher.clone();
        let mut busy = busy;
        async move {
            while let Some(Queued {
                conversation,
                submission,
            }) = rx.next().await
            {
                match dispatcher.spawn_submit(conversation.clone(), submission).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => {
                        debug!(conversation = %conversation, error = %err, "submission not completed")
                    }
                    Err(err) => warn!(conversation = %conversation, error = %err, "submission task aborted"),
                }
                busy.set(false);
            }
        }
    });

    use_hook(|| {
        let mut rx = store::lock(dispatcher.store()).subscribe();
        spawn(async move {
            while rx.changed().await.is_ok() {
                let rev = *rx.borrow_and_update();
                revision.set(rev);
            }
        });
    });

    let mode = (state.mode)();
    let content = match (state.panel)() {
        Panel::Settings => rsx! { SettingsView {} },
        Panel::Workspace if mode.is_conversational() => rsx! { ChatView {} },
        Panel::Workspace => rsx! { GeneratorView { mode } },
    };
    rsx! {
        div { class: "workspace",
            Sidebar { user: user.clone() }
            main { class: "panel", {content} }
        }
    }
}
