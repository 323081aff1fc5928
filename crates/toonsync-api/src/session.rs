// Session store
//
// Single source of truth for authentication state: the token pair, the
// validated profile, and an observable auth state. Network flows that
// mutate the session (login, refresh, restore) live on `ApiClient` in
// `auth.rs`; this module only owns state and persistence.

use std::sync::Arc;

use arc_swap::ArcSwap;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::models::Profile;
use crate::storage::{ACCESS_TOKEN_KEY, MemoryStorage, REFRESH_TOKEN_KEY, TokenStorage};

/// Authentication state machine.
///
/// `Anonymous -> Pending -> Authenticated`, and from `Authenticated` a 401
/// moves through `Refreshing` back to `Authenticated` or, if the refresh
/// fails, to `Anonymous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AuthState {
    Anonymous,
    /// Tokens are present but the profile has not been validated yet.
    Pending,
    Authenticated,
    Refreshing,
}

/// Access/refresh token pair returned by login and refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: SecretString,
    pub refresh: SecretString,
}

/// Point-in-time view of the session.
///
/// `user` is only set once the access token has been validated by a
/// successful profile fetch.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub user: Option<Profile>,
}

pub struct SessionStore {
    session: ArcSwap<Session>,
    storage: Arc<dyn TokenStorage>,
    state: watch::Sender<AuthState>,
    /// Serializes token refreshes so concurrent 401s share one refresh.
    refresh_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        let (state, _) = watch::channel(AuthState::Anonymous);
        Self {
            session: ArcSwap::from_pointee(Session::default()),
            storage,
            state,
            refresh_lock: Mutex::new(()),
        }
    }

    /// A store backed by [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<Session> {
        self.session.load_full()
    }

    pub fn access_token(&self) -> Option<SecretString> {
        self.session.load().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<SecretString> {
        self.session.load().refresh_token.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.session.load().user.clone()
    }

    /// Id of the authenticated user; the key for owner-scoped caches.
    pub fn owner_id(&self) -> Option<u64> {
        self.session.load().user.as_ref().map(|u| u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        let session = self.session.load();
        session.access_token.is_some() && session.user.is_some()
    }

    /// Superusers have every feature; anonymous sessions have none.
    pub fn has_feature(&self, code: &str) -> bool {
        self.session
            .load()
            .user
            .as_ref()
            .is_some_and(|u| u.has_feature(code))
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Drop all in-memory and persisted state. Idempotent.
    pub fn clear(&self) {
        self.session.store(Arc::new(Session::default()));
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(error = %e, key, "unable to remove persisted token");
            }
        }
        self.set_state(AuthState::Anonymous);
        debug!("session cleared");
    }

    /// Read tokens persisted by a previous run.
    pub(crate) fn persisted_tokens(&self) -> (Option<SecretString>, Option<SecretString>) {
        let read = |key: &str| match self.storage.read(key) {
            Ok(value) => value.filter(|v| !v.is_empty()).map(SecretString::from),
            Err(e) => {
                warn!(error = %e, key, "unable to read persisted token");
                None
            }
        };
        (read(ACCESS_TOKEN_KEY), read(REFRESH_TOKEN_KEY))
    }

    /// Adopt restored tokens without writing them back.
    pub(crate) fn adopt(&self, access: SecretString, refresh: Option<SecretString>) {
        self.session.store(Arc::new(Session {
            access_token: Some(access),
            refresh_token: refresh,
            user: None,
        }));
        self.set_state(AuthState::Pending);
    }

    /// Start a new session from a freshly issued token pair. Any previous
    /// profile is dropped until the new token is validated.
    pub(crate) fn begin(&self, pair: &TokenPair) {
        self.session.store(Arc::new(Session {
            access_token: Some(pair.access.clone()),
            refresh_token: Some(pair.refresh.clone()),
            user: None,
        }));
        self.persist(pair);
        self.set_state(AuthState::Pending);
    }

    /// Replace the token pair atomically and persist it. The profile is
    /// kept so a refresh does not de-authenticate the user.
    pub(crate) fn install_tokens(&self, pair: &TokenPair) {
        self.session.rcu(|current| Session {
            access_token: Some(pair.access.clone()),
            refresh_token: Some(pair.refresh.clone()),
            user: current.user.clone(),
        });
        self.persist(pair);
    }

    fn persist(&self, pair: &TokenPair) {
        for (key, value) in [
            (ACCESS_TOKEN_KEY, &pair.access),
            (REFRESH_TOKEN_KEY, &pair.refresh),
        ] {
            if let Err(e) = self.storage.write(key, value.expose_secret()) {
                warn!(error = %e, key, "unable to persist token");
            }
        }
    }

    /// Mark the current access token as validated by `profile`.
    pub(crate) fn set_profile(&self, profile: Profile) {
        info!(user = %profile.username, id = profile.id, "session authenticated");
        self.session.rcu(|current| Session {
            access_token: current.access_token.clone(),
            refresh_token: current.refresh_token.clone(),
            user: Some(profile.clone()),
        });
        self.set_state(AuthState::Authenticated);
    }

    /// Forget the in-memory session but keep persisted tokens, so a later
    /// restore can retry once the network is back.
    pub(crate) fn forget(&self) {
        self.session.store(Arc::new(Session::default()));
        self.set_state(AuthState::Anonymous);
    }

    pub(crate) fn set_state(&self, state: AuthState) {
        self.state.send_replace(state);
    }

    /// State to return to after a successful refresh.
    pub(crate) fn settled_state(&self) -> AuthState {
        if self.session.load().user.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Pending
        }
    }

    pub(crate) fn refresh_lock(&self) -> &Mutex<()> {
        &self.refresh_lock
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &self.session.load_full())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
