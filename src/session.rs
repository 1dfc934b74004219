//! Process-wide session state and the login/logout flow.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::{AuthService, LoginCredentials, Usuario};
use crate::authz::{Module, RoleGate};
use crate::error::ApiError;

pub const LOGIN_ROUTE: &str = "/login";
pub const HOME_ROUTE: &str = "/";
/// Where a signed-in user lands when a module is off limits.
pub const DEFAULT_FALLBACK_ROUTE: &str = "/perfil";

/// Route changes requested by the session layer.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Navigator for headless use: records the route in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: &str) {
        info!(route = %route, "Navigate");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<Usuario>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl SessionState {
    fn loading() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: true,
        }
    }

    fn signed_out() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: false,
        }
    }

    fn signed_in(user: Usuario) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
            is_loading: false,
        }
    }
}

/// Outcome of guarding a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    /// Hydration has not finished; show a placeholder.
    Pending,
    /// Redirected to the given route.
    Redirected(&'static str),
}

pub struct SessionController {
    auth: AuthService,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<SessionState>,
}

impl SessionController {
    /// A controller in the loading state. Call [`hydrate`](Self::hydrate) next.
    pub fn new(auth: AuthService, navigator: Arc<dyn Navigator>) -> Self {
        let (state, _) = watch::channel(SessionState::loading());
        Self {
            auth,
            navigator,
            state,
        }
    }

    /// Restore the session from storage. No network call.
    ///
    /// The session is restored only when the profile and both tokens are
    /// present; otherwise the controller starts signed out.
    pub fn hydrate(&self) {
        let store = self.auth.tokens();
        let restored = match (store.user(), store.tokens()) {
            (Some(user), Some(_)) => {
                info!(user_id = user.id_usuario, "Session restored from storage");
                SessionState::signed_in(user)
            }
            _ => SessionState::signed_out(),
        };
        self.state.send_replace(restored);
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<Usuario> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn roles(&self) -> Vec<String> {
        self.state
            .borrow()
            .user
            .as_ref()
            .map(|u| u.roles.clone())
            .unwrap_or_default()
    }

    pub fn gate(&self) -> RoleGate {
        RoleGate::new(self.roles())
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Log in. Storage and state change only when the backend accepts.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<Usuario, ApiError> {
        let response = match self.auth.login(credentials).await {
            Ok(response) => response,
            Err(e) => {
                warn!(email = %credentials.email, error = %e, "Login failed");
                return Err(e);
            }
        };

        let store = self.auth.tokens();
        store.set_tokens(&response.access_token, &response.refresh_token);
        store.set_user(&response.usuario);
        info!(user_id = response.usuario.id_usuario, "Logged in");

        self.state
            .send_replace(SessionState::signed_in(response.usuario.clone()));
        self.navigator.navigate(HOME_ROUTE);
        Ok(response.usuario)
    }

    /// Revoke the refresh token if possible, then always clear the local session.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.auth.tokens().refresh_token() {
            if let Err(e) = self.auth.logout(&refresh_token).await {
                warn!(error = %e, "Server-side logout failed, clearing local session anyway");
            }
        }
        self.clear_session();
        info!("Logged out");
        self.navigator.navigate(LOGIN_ROUTE);
    }

    /// React to an error from an authenticated call.
    ///
    /// Session errors end the session and redirect to the login screen
    /// (returns `true`). Anything else is left for the caller to display.
    pub fn handle_error(&self, error: &ApiError) -> bool {
        if !error.is_session_error() {
            return false;
        }
        info!(error = %error, "Session ended, redirecting to login");
        self.clear_session();
        self.navigator.navigate(LOGIN_ROUTE);
        true
    }

    /// Guard a screen behind authentication and the module's roles.
    pub fn require(&self, module: Module) -> Access {
        self.require_or(module, DEFAULT_FALLBACK_ROUTE)
    }

    pub fn require_or(&self, module: Module, fallback: &'static str) -> Access {
        let state = self.state();
        if state.is_loading {
            return Access::Pending;
        }
        let Some(user) = state.user.filter(|_| state.is_authenticated) else {
            self.navigator.navigate(LOGIN_ROUTE);
            return Access::Redirected(LOGIN_ROUTE);
        };
        if RoleGate::new(user.roles).can_access(module) {
            Access::Granted
        } else {
            info!(module = %module, fallback = %fallback, "Module not allowed for user roles");
            self.navigator.navigate(fallback);
            Access::Redirected(fallback)
        }
    }

    fn clear_session(&self) {
        self.auth.tokens().clear_all();
        self.state.send_replace(SessionState::signed_out());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TokenStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Navigator for Recorder {
        fn navigate(&self, route: &str) {
            self.0.lock().unwrap().push(route.to_string());
        }
    }

    fn ana(roles: &[&str]) -> Usuario {
        Usuario {
            id_usuario: 7,
            email: "ana@lasaves.mx".into(),
            nombre: "Ana".into(),
            apellido_paterno: "López".into(),
            apellido_materno: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn controller(store: TokenStore) -> (SessionController, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let auth = AuthService::new("http://127.0.0.1:9", store);
        (SessionController::new(auth, recorder.clone()), recorder)
    }

    #[test]
    fn test_starts_loading_then_hydrates_signed_out() {
        let (session, _) = controller(TokenStore::in_memory());
        assert!(session.state().is_loading);
        session.hydrate();
        assert_eq!(session.state(), SessionState::signed_out());
    }

    #[test]
    fn test_hydrate_requires_user_and_both_tokens() {
        let store = TokenStore::in_memory();
        store.set_user(&ana(&["socio"]));
        let (session, _) = controller(store.clone());
        session.hydrate();
        assert!(!session.is_authenticated());

        store.set_tokens("a", "r");
        session.hydrate();
        assert!(session.is_authenticated());
        assert_eq!(session.roles(), vec!["socio".to_string()]);
    }

    #[test]
    fn test_handle_error_only_for_session_errors() {
        let store = TokenStore::in_memory();
        store.set_tokens("a", "r");
        store.set_user(&ana(&["socio"]));
        let (session, recorder) = controller(store.clone());
        session.hydrate();

        let http = ApiError::http(reqwest::StatusCode::BAD_REQUEST, "Monto inválido");
        assert!(!session.handle_error(&http));
        assert!(session.is_authenticated());

        assert!(session.handle_error(&ApiError::SessionExpired));
        assert!(!session.is_authenticated());
        assert!(store.tokens().is_none());
        assert_eq!(*recorder.0.lock().unwrap(), vec![LOGIN_ROUTE.to_string()]);
    }

    #[test]
    fn test_require_redirects() {
        let store = TokenStore::in_memory();
        let (session, recorder) = controller(store.clone());
        assert_eq!(session.require(Module::Finanzas), Access::Pending);

        session.hydrate();
        assert_eq!(session.require(Module::Finanzas), Access::Redirected(LOGIN_ROUTE));

        store.set_tokens("a", "r");
        store.set_user(&ana(&["enfermero"]));
        session.hydrate();
        assert_eq!(session.require(Module::Perfil), Access::Granted);
        assert_eq!(
            session.require(Module::Finanzas),
            Access::Redirected(DEFAULT_FALLBACK_ROUTE)
        );
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![LOGIN_ROUTE.to_string(), DEFAULT_FALLBACK_ROUTE.to_string()]
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = TokenStore::in_memory();
        store.set_tokens("a", "r");
        store.set_user(&ana(&["admin"]));
        let (session, _) = controller(store);
        let mut rx = session.subscribe();
        session.hydrate();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_authenticated);
    }
}
