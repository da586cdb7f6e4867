use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::navigator::{Navigator, Route};
use super::role::Role;
use super::token::is_token_valid;
use crate::constants::{ROLE_KEY, SESSION_KEYS, TOKEN_KEY, USER_ID_KEY};
use crate::gateway::ApiGateway;
use crate::storage::Storage;
use crate::utils::Result;

/// Where the session stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Stored credentials have not been checked yet
    Loading,
    Unauthenticated,
    Authenticated { role: Role, user_id: String },
}

/// Flat view of the session for front-ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub is_authenticated: bool,
    pub role: Option<Role>,
    pub user_id: Option<String>,
    pub loading: bool,
}

impl From<&SessionState> for Session {
    fn from(state: &SessionState) -> Self {
        match state {
            SessionState::Loading => Session {
                loading: true,
                ..Session::default()
            },
            SessionState::Unauthenticated => Session::default(),
            SessionState::Authenticated { role, user_id } => Session {
                is_authenticated: true,
                role: Some(*role),
                user_id: Some(user_id.clone()),
                loading: false,
            },
        }
    }
}

/// Single source of truth for who is logged in
///
/// Owns the login/logout transitions, persists them to durable storage, and
/// is the gateway's unauthorized subscriber. Clones share state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    storage: Arc<dyn Storage>,
    gateway: ApiGateway,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<SessionState>,
    /// Serializes transitions so a check never sees half-written credentials
    transition: Mutex<()>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(task) = self.sync_task.get_mut().take() {
            task.abort();
        }
    }
}

impl SessionManager {
    /// Create a manager in the `Loading` state and register it for 401 notices
    pub fn new(gateway: ApiGateway, navigator: Arc<dyn Navigator>) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        let inner = Arc::new(SessionInner {
            storage: Arc::clone(gateway.storage()),
            gateway,
            navigator,
            state,
            transition: Mutex::new(()),
            sync_task: Mutex::new(None),
        });

        let weak: Weak<SessionInner> = Arc::downgrade(&inner);
        inner
            .gateway
            .set_on_unauthorized_callback(Some(Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    SessionManager { inner }.logout();
                }
            })));

        Self { inner }
    }

    /// `new`, then restore the stored session and follow storage changes
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(gateway: ApiGateway, navigator: Arc<dyn Navigator>) -> Self {
        let manager = Self::new(gateway, navigator);
        manager.check_auth_status();
        manager.spawn_storage_sync();
        manager
    }

    /// Persist credentials issued by a successful login call
    ///
    /// The token is trusted as-is. An unknown role is rejected and leaves the
    /// session untouched.
    pub fn login(&self, token: &str, role: &str, user_id: &str) -> Result<()> {
        let role: Role = role.parse()?;

        let _guard = self.inner.transition.lock();
        self.inner.storage.set_all(&[
            (TOKEN_KEY, token),
            (ROLE_KEY, role.as_str()),
            (USER_ID_KEY, user_id),
        ])?;

        // Cached reads belong to the previous identity
        self.inner.gateway.clear_cache(None);
        self.inner.state.send_replace(SessionState::Authenticated {
            role,
            user_id: user_id.to_string(),
        });
        info!("user {} logged in as {}", user_id, role);
        Ok(())
    }

    /// Tear the session down; safe to call repeatedly and from gateway callbacks
    pub fn logout(&self) {
        let _guard = self.inner.transition.lock();
        self.logout_locked("explicit logout");
    }

    fn logout_locked(&self, reason: &str) {
        if let Err(e) = self.inner.storage.remove_all(SESSION_KEYS) {
            warn!("failed to clear session from storage: {}", e);
        }
        self.inner.gateway.clear_cache(None);

        let previous = self.inner.state.send_replace(SessionState::Unauthenticated);
        if previous != SessionState::Unauthenticated {
            info!("session ended ({})", reason);
            self.inner.navigator.navigate(Route::Login);
        } else {
            debug!("logout while already unauthenticated ({})", reason);
        }
    }

    /// Re-derive the session from storage; anything doubtful ends in logout
    pub fn check_auth_status(&self) -> SessionState {
        let _guard = self.inner.transition.lock();

        match self.read_stored_credentials() {
            Ok(Some((token, role, user_id))) => match is_token_valid(&token, Utc::now()) {
                Ok(true) => {
                    let next = SessionState::Authenticated { role, user_id };
                    self.inner.state.send_if_modified(|current| {
                        if *current == next {
                            false
                        } else {
                            *current = next.clone();
                            true
                        }
                    });
                    debug!("stored session restored for role {}", role);
                },
                Ok(false) => self.logout_locked("token expired"),
                Err(e) => {
                    warn!("stored token rejected: {}", e);
                    self.logout_locked("malformed token");
                },
            },
            Ok(None) => self.logout_locked("no stored credentials"),
            Err(e) => {
                warn!("could not read stored session: {}", e);
                self.logout_locked("storage failure");
            },
        }

        self.state()
    }

    fn read_stored_credentials(&self) -> Result<Option<(String, Role, String)>> {
        let mut values = self
            .inner
            .storage
            .get_all(&[TOKEN_KEY, ROLE_KEY, USER_ID_KEY])?
            .into_iter()
            .map(|value| value.filter(|v| !v.is_empty()));

        match (values.next().flatten(), values.next().flatten(), values.next().flatten()) {
            (Some(token), Some(role), Some(user_id)) => {
                let role = role.parse::<Role>()?;
                Ok(Some((token, role, user_id)))
            },
            _ => Ok(None),
        }
    }

    /// Re-run [`check_auth_status`](Self::check_auth_status) whenever another
    /// instance touches one of the session keys
    pub fn spawn_storage_sync(&self) {
        let mut events = self.inner.storage.subscribe();
        let weak = Arc::downgrade(&self.inner);

        let task = tokio::spawn(async move {
            loop {
                let recheck = match events.recv().await {
                    Ok(event) => SESSION_KEYS.contains(&event.key.as_str()),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("missed {} storage events; rechecking session", skipped);
                        true
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if !recheck {
                    continue;
                }
                match weak.upgrade() {
                    Some(inner) => {
                        debug!("session keys changed externally; rechecking");
                        SessionManager { inner }.check_auth_status();
                    },
                    None => break,
                }
            }
        });

        if let Some(previous) = self.inner.sync_task.lock().replace(task) {
            previous.abort();
        }
    }

    /// Unregister from the gateway and stop following storage
    pub fn shutdown(&self) {
        self.inner.gateway.set_on_unauthorized_callback(None);
        if let Some(task) = self.inner.sync_task.lock().take() {
            task.abort();
        }
    }

    /// True when `roles` is empty or holds the current role; false with no role
    pub fn has_role(&self, roles: &[Role]) -> bool {
        match self.role() {
            Some(current) => roles.is_empty() || roles.contains(&current),
            None => false,
        }
    }

    /// [`has_role`](Self::has_role) over role names, compared case-insensitively
    pub fn has_role_names<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        match self.role() {
            Some(current) => {
                roles.is_empty()
                    || roles
                        .iter()
                        .any(|name| name.as_ref().trim().eq_ignore_ascii_case(current.as_str()))
            },
            None => false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn session(&self) -> Session {
        Session::from(&*self.inner.state.borrow())
    }

    pub fn role(&self) -> Option<Role> {
        match &*self.inner.state.borrow() {
            SessionState::Authenticated { role, .. } => Some(*role),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<String> {
        match &*self.inner.state.borrow() {
            SessionState::Authenticated { user_id, .. } => Some(user_id.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.inner.state.borrow(), SessionState::Authenticated { .. })
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.inner.state.borrow(), SessionState::Loading)
    }

    /// Watch session transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn gateway(&self) -> &ApiGateway {
        &self.inner.gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::navigator::MockNavigator;
    use crate::utils::ClinicError;
    use crate::auth::token::make_token;
    use crate::auth::LogNavigator;
    use crate::gateway::testing::ScriptedTransport;
    use crate::gateway::{Method, RequestConfig};
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn valid_token() -> String {
        make_token(Utc::now().timestamp() + 3600)
    }

    fn expired_token() -> String {
        make_token(Utc::now().timestamp() - 60)
    }

    fn setup_with(
        navigator: Arc<dyn Navigator>,
    ) -> (SessionManager, Arc<MemoryStorage>, Arc<ScriptedTransport>) {
        let storage = Arc::new(MemoryStorage::new());
        let transport = Arc::new(ScriptedTransport::new());
        let gateway = ApiGateway::new("http://clinic.test/api", storage.clone(), transport.clone());
        (SessionManager::new(gateway, navigator), storage, transport)
    }

    fn setup() -> (SessionManager, Arc<MemoryStorage>, Arc<ScriptedTransport>) {
        setup_with(Arc::new(LogNavigator))
    }

    #[test]
    fn test_starts_loading() {
        let (session, _, _) = setup();
        assert_eq!(session.state(), SessionState::Loading);
        assert!(session.session().loading);
        assert!(!session.has_role(&[]));
    }

    #[test]
    fn test_login_then_check_restores_same_identity() {
        let (session, storage, _) = setup();
        let token = valid_token();

        session.login(&token, "DOCTOR", "42").unwrap();
        assert_eq!(storage.get(ROLE_KEY).unwrap().as_deref(), Some("doctor"));

        let state = session.check_auth_status();
        assert_eq!(
            state,
            SessionState::Authenticated {
                role: Role::Doctor,
                user_id: "42".into()
            }
        );
        assert_eq!(
            session.session(),
            Session {
                is_authenticated: true,
                role: Some(Role::Doctor),
                user_id: Some("42".into()),
                loading: false,
            }
        );
    }

    #[test]
    fn test_login_rejects_unknown_role() {
        let (session, storage, _) = setup();
        assert!(matches!(
            session.login("t", "nurse", "1"),
            Err(ClinicError::InvalidRole(_))
        ));
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(session.state(), SessionState::Loading);
    }

    #[test]
    fn test_expired_token_logs_out_and_clears_storage() {
        let (session, storage, _) = setup();
        storage.set(TOKEN_KEY, &expired_token()).unwrap();
        storage.set(ROLE_KEY, "admin").unwrap();
        storage.set(USER_ID_KEY, "1").unwrap();

        assert_eq!(session.check_auth_status(), SessionState::Unauthenticated);
        for key in SESSION_KEYS {
            assert_eq!(storage.get(key).unwrap(), None, "{key} should be cleared");
        }
    }

    #[test]
    fn test_incomplete_or_malformed_storage_logs_out() {
        let (session, storage, _) = setup();
        storage.set(TOKEN_KEY, &valid_token()).unwrap();
        storage.set(ROLE_KEY, "admin").unwrap();
        assert_eq!(session.check_auth_status(), SessionState::Unauthenticated);

        storage.set(TOKEN_KEY, "garbage").unwrap();
        storage.set(ROLE_KEY, "admin").unwrap();
        storage.set(USER_ID_KEY, "1").unwrap();
        assert_eq!(session.check_auth_status(), SessionState::Unauthenticated);
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);

        storage.set(TOKEN_KEY, &valid_token()).unwrap();
        storage.set(ROLE_KEY, "superuser").unwrap();
        storage.set(USER_ID_KEY, "1").unwrap();
        assert_eq!(session.check_auth_status(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_logout_is_idempotent_and_navigates_once() {
        let mut navigator = MockNavigator::new();
        navigator
            .expect_navigate()
            .withf(|route| *route == Route::Login)
            .times(1)
            .return_const(());
        let (session, _, _) = setup_with(Arc::new(navigator));

        session.login(&valid_token(), "admin", "1").unwrap();
        session.logout();
        assert_eq!(session.state(), SessionState::Unauthenticated);
        session.logout();
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_has_role() {
        let (session, _, _) = setup();
        assert!(!session.has_role(&[Role::Admin]));
        assert!(!session.has_role_names::<&str>(&[]));

        session.login(&valid_token(), "Receptionist", "7").unwrap();
        assert!(session.has_role(&[]));
        assert!(session.has_role(&[Role::Admin, Role::Receptionist]));
        assert!(!session.has_role(&[Role::Doctor]));
        assert!(session.has_role_names(&["RECEPTIONIST"]));
        assert!(!session.has_role_names(&["admin", "nurse"]));
    }

    #[tokio::test]
    async fn test_unauthorized_response_ends_session() {
        let (session, storage, transport) = setup();
        transport.respond(Method::GET, "patients", 401, json!({"message": "expired"}));
        transport.respond(Method::GET, "clinics", 200, json!([]));
        session.login(&valid_token(), "admin", "1").unwrap();

        let err = session
            .gateway()
            .get("patients", RequestConfig::new())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);

        session.gateway().get("clinics", RequestConfig::new()).await.unwrap();
        assert_eq!(transport.last_request().header("authorization"), None);
    }

    #[tokio::test]
    async fn test_identity_change_clears_cached_reads() {
        let (session, _, transport) = setup();
        transport.respond(Method::GET, "appointments", 200, json!([{"id": 1}]));

        session.login(&valid_token(), "patient", "5").unwrap();
        session
            .gateway()
            .get("appointments", RequestConfig::new().cached())
            .await
            .unwrap();
        assert_eq!(session.gateway().cache_len(), 1);

        session.login(&valid_token(), "doctor", "9").unwrap();
        assert_eq!(session.gateway().cache_len(), 0);

        session
            .gateway()
            .get("appointments", RequestConfig::new().cached())
            .await
            .unwrap();
        session.logout();
        assert_eq!(session.gateway().cache_len(), 0);
    }

    #[tokio::test]
    async fn test_read_in_flight_across_identity_change_is_not_cached() {
        let (session, _, transport) = setup();
        transport.respond_after(
            Method::GET,
            "prontuarios",
            Duration::from_millis(100),
            200,
            json!([{"id": 1, "patient_id": 5}]),
        );
        session.login(&valid_token(), "patient", "5").unwrap();

        let gateway = session.gateway().clone();
        let patient_read = tokio::spawn(async move {
            gateway
                .get("prontuarios", RequestConfig::new().cached())
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        session.logout();
        session.login(&valid_token(), "doctor", "9").unwrap();
        patient_read.await.unwrap().unwrap();
        assert_eq!(session.gateway().cache_len(), 0);

        session
            .gateway()
            .get("prontuarios", RequestConfig::new().cached())
            .await
            .unwrap();
        assert_eq!(transport.calls_to(Method::GET, "prontuarios"), 2);
    }

    #[tokio::test]
    async fn test_shutdown_unregisters_callback() {
        let (session, _, _) = setup();
        assert!(session.gateway().has_unauthorized_callback());
        session.shutdown();
        assert!(!session.gateway().has_unauthorized_callback());
    }

    #[tokio::test]
    async fn test_other_instance_logout_propagates() {
        let storage = Arc::new(MemoryStorage::new());
        let transport = Arc::new(ScriptedTransport::new());
        let make = || {
            let gateway =
                ApiGateway::new("http://clinic.test/api", storage.clone(), transport.clone());
            SessionManager::start(gateway, Arc::new(LogNavigator))
        };

        let first = make();
        let second = make();
        assert_eq!(first.state(), SessionState::Unauthenticated);

        first.login(&valid_token(), "doctor", "42").unwrap();
        let mut watch = second.subscribe();
        tokio::time::timeout(
            Duration::from_secs(1),
            watch.wait_for(|s| matches!(s, SessionState::Authenticated { .. })),
        )
        .await
        .expect("second instance should pick up the login")
        .unwrap();
        assert!(second.has_role(&[Role::Doctor]));

        second.logout();
        let mut watch = first.subscribe();
        tokio::time::timeout(
            Duration::from_secs(1),
            watch.wait_for(|s| *s == SessionState::Unauthenticated),
        )
        .await
        .expect("first instance should follow the logout")
        .unwrap();
    }
}
