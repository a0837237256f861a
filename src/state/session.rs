use super::error::{AppError, AppResult};
use crate::api::{ApiErrorKind, DataService};
use crate::models::{Session, User};
use crate::observe::{Store, Subscription};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub loading: bool,
    /// Set once the first session check (or change notification) has landed.
    pub initialized: bool,
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
            initialized: false,
            error: None,
        }
    }
}

/// Read access to the signed-in identity.
///
/// Note and tag containers receive this instead of reaching into the
/// session container directly.
pub trait SessionAccessor {
    fn current_user(&self) -> Option<User>;

    fn current_user_id(&self) -> Option<String> {
        self.current_user().map(|u| u.id)
    }
}

#[derive(Clone)]
pub struct SessionStore {
    state: Store<SessionState>,
    service: Rc<dyn DataService>,
    // Mirrors service-side session changes for as long as the store lives.
    _service_subscription: Rc<Subscription>,
}

impl SessionStore {
    pub fn new(service: Rc<dyn DataService>) -> Self {
        let state = Store::new(SessionState::default());
        let mirror = state.clone();
        let subscription = service.on_session_change(Box::new(move |session: Option<Session>| {
            apply_session(&mirror, session);
        }));

        Self {
            state,
            service,
            _service_subscription: Rc::new(subscription),
        }
    }

    pub fn state(&self) -> &Store<SessionState> {
        &self.state
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.with(|s| s.user.is_some())
    }

    pub fn set_session(&self, session: Option<Session>) {
        apply_session(&self.state, session);
    }

    /// Load whatever session the service already holds (e.g. restored from storage).
    pub async fn refresh_session(&self) {
        match self.service.get_session().await {
            Ok(session) => self.set_session(session),
            Err(e) => {
                log::error!("Error refreshing session: {e}");
                self.set_session(None);
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<User> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });

        match self.service.authenticate(email, password).await {
            Ok(session) => {
                let user = session.user.clone();
                self.set_session(Some(session));
                log::info!("signed in as {}", user.email.as_deref().unwrap_or(&user.id));
                Ok(user)
            }
            Err(e) => {
                let err = if e.kind == ApiErrorKind::Unauthorized {
                    AppError::InvalidCredentials(e.message)
                } else {
                    AppError::from(e)
                };
                log::warn!("sign in failed: {err}");
                let message = err.to_string();
                self.state.update(|s| {
                    s.loading = false;
                    s.error = Some(message);
                });
                Err(err)
            }
        }
    }

    /// Local identity is always cleared; a remote failure is still reported.
    pub async fn sign_out(&self) -> AppResult<()> {
        self.state.update(|s| s.loading = true);
        let result = self.service.sign_out().await;
        self.set_session(None);
        result.map_err(|e| {
            log::error!("Error signing out: {e}");
            AppError::from(e)
        })
    }
}

fn apply_session(state: &Store<SessionState>, session: Option<Session>) {
    state.update(|s| {
        s.user = session.as_ref().map(|sess| sess.user.clone());
        s.session = session;
        s.loading = false;
        s.initialized = true;
        if s.user.is_some() {
            s.error = None;
        }
    });
}

impl SessionAccessor for SessionStore {
    fn current_user(&self) -> Option<User> {
        self.state.with(|s| s.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::MemoryService;
    use futures::executor::block_on;

    fn setup() -> (Rc<MemoryService>, SessionStore) {
        let service = Rc::new(MemoryService::new());
        service.add_account("ada@example.com", "hunter22");
        let store = SessionStore::new(service.clone());
        (service, store)
    }

    #[test]
    fn test_initial_state_is_loading_and_uninitialized() {
        let (_, store) = setup();
        let s = store.snapshot();
        assert!(s.loading);
        assert!(!s.initialized);
        assert!(s.user.is_none());
    }

    #[test]
    fn test_refresh_without_session_initializes_signed_out() {
        let (_, store) = setup();
        block_on(store.refresh_session());
        let s = store.snapshot();
        assert!(s.initialized);
        assert!(!s.loading);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_sign_in_success_sets_identity() {
        let (_, store) = setup();
        let user = block_on(store.sign_in("ada@example.com", "hunter22")).unwrap();
        assert_eq!(store.current_user_id(), Some(user.id));
        assert!(store.snapshot().initialized);
    }

    #[test]
    fn test_sign_in_rejected_credentials() {
        let (_, store) = setup();
        let err = block_on(store.sign_in("ada@example.com", "wrong")).unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials(_)));
        let s = store.snapshot();
        assert!(s.user.is_none());
        assert!(!s.loading);
        assert_eq!(s.error.as_deref(), Some("Invalid login credentials"));
    }

    #[test]
    fn test_sign_in_requires_fields() {
        let (_, store) = setup();
        let err = block_on(store.sign_in("  ", "x")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_sign_out_clears_identity() {
        let (_, store) = setup();
        block_on(store.sign_in("ada@example.com", "hunter22")).unwrap();
        block_on(store.sign_out()).unwrap();
        assert!(store.current_user().is_none());
        assert!(!store.snapshot().loading);
    }

    #[test]
    fn test_service_session_changes_are_mirrored() {
        let (service, store) = setup();
        // Sign in through the service directly, bypassing the store.
        block_on(service.authenticate("ada@example.com", "hunter22")).unwrap();
        assert!(store.is_authenticated());

        block_on(service.sign_out()).unwrap();
        assert!(!store.is_authenticated());
    }
}
