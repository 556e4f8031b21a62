//! Authentication state as an injected publish/subscribe service.
//!
//! The conversation core only reads the signed-in identity to pick its
//! storage slot. Providers are pluggable; guest mode needs none.

use crate::storage::KeyValueStore;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Persisted flag that restores guest mode across restarts.
pub const GUEST_FLAG_KEY: &str = "lumen_guest_active";
pub const GUEST_USER_ID: &str = "guest";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignInMethod {
    Guest,
    Federated,
    Password,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub verified: bool,
    pub method: SignInMethod,
}

impl Identity {
    pub fn guest() -> Self {
        Self {
            id: GUEST_USER_ID.to_string(),
            display_name: Some("Guest".to_string()),
            email: None,
            verified: true,
            method: SignInMethod::Guest,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.method == SignInMethod::Guest
    }

    /// Password accounts count as signed in only once their email is verified.
    pub fn is_accepted(&self) -> bool {
        self.method != SignInMethod::Password || self.verified
    }

    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<Identity>,
    /// True until the service has resolved the initial identity.
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Federated,
    Password { email: String, password: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("sign-in restricted: {0}")]
    Restricted(String),

    #[error("email address not verified")]
    Unverified,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("auth provider error: {0}")]
    Provider(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Actionable text for the login screen.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Restricted(reason) => {
                format!("{reason} Continue as guest or contact the administrator.")
            }
            AuthError::Unverified => {
                "Verify your email address, then sign in again.".to_string()
            }
            AuthError::InvalidCredentials => "Email or password is incorrect.".to_string(),
            AuthError::Provider(_) => "Sign-in failed. Retry later.".to_string(),
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Identity restored from a previous session, if any.
    async fn current_user(&self) -> AuthResult<Option<Identity>>;
    async fn sign_in(&self, credentials: Credentials) -> AuthResult<Identity>;
    async fn sign_out(&self) -> AuthResult<()>;
}

/// Provider for builds without an identity backend; only guest mode works.
#[derive(Default)]
pub struct OfflineProvider;

#[async_trait]
impl AuthProvider for OfflineProvider {
    async fn current_user(&self) -> AuthResult<Option<Identity>> {
        Ok(None)
    }

    async fn sign_in(&self, _credentials: Credentials) -> AuthResult<Identity> {
        Err(AuthError::Restricted(
            "Online sign-in is not configured for this build.".to_string(),
        ))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        Ok(())
    }
}

pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    kv: Arc<dyn KeyValueStore>,
    state: watch::Sender<AuthState>,
}

impl AuthService {
    pub fn new(provider: Arc<dyn AuthProvider>, kv: Arc<dyn KeyValueStore>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            provider,
            kv,
            state,
        }
    }

    /// Resolve the starting identity: guest flag first, then the provider's session.
    pub async fn init(&self) {
        let user = if self.guest_flag() {
            Some(Identity::guest())
        } else {
            match self.provider.current_user().await {
                Ok(user) => user.filter(Identity::is_accepted),
                Err(err) => {
                    warn!(error = %err, "could not restore auth session");
                    None
                }
            }
        };
        self.publish(user);
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.state.borrow().user.clone()
    }

    pub async fn sign_in(&self, credentials: Credentials) -> AuthResult<Identity> {
        let identity = self.provider.sign_in(credentials).await?;
        if !identity.is_accepted() {
            if let Err(err) = self.provider.sign_out().await {
                warn!(error = %err, "sign-out after unverified sign-in failed");
            }
            self.publish(None);
            return Err(AuthError::Unverified);
        }

        self.set_guest_flag(false);
        info!(user = %identity.id, "signed in");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    pub async fn sign_out(&self) {
        self.set_guest_flag(false);
        if let Err(err) = self.provider.sign_out().await {
            warn!(error = %err, "provider sign-out failed");
        }
        info!("signed out");
        self.publish(None);
    }

    pub fn login_as_guest(&self) -> Identity {
        self.set_guest_flag(true);
        let guest = Identity::guest();
        info!("guest session started");
        self.publish(Some(guest.clone()));
        guest
    }

    /// Leave guest mode; a provider session is unaffected.
    pub fn clear_guest_mode(&self) {
        self.set_guest_flag(false);
        if self.current_user().is_some_and(|user| user.is_guest()) {
            self.publish(None);
        }
    }

    fn guest_flag(&self) -> bool {
        self.kv.get(GUEST_FLAG_KEY).as_deref() == Some("true")
    }

    fn set_guest_flag(&self, active: bool) {
        let result = if active {
            self.kv.set(GUEST_FLAG_KEY, "true")
        } else {
            self.kv.remove(GUEST_FLAG_KEY)
        };
        if let Err(err) = result {
            warn!(error = %err, "failed to update guest flag");
        }
    }

    fn publish(&self, user: Option<Identity>) {
        self.state.send_replace(AuthState {
            user,
            loading: false,
        });
    }
}
