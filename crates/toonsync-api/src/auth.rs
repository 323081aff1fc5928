// Session flows: login, registration, token refresh and restore.
//
// Tokens come from `POST auth/login/` and `POST auth/refresh/` as
// `{access, refresh}`; the profile from `GET auth/me/` validates the access
// token. All of these endpoints except `auth/me/` are anonymous so they never
// recurse into the refresh flow.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, ApiRequest};
use crate::error::Error;
use crate::models::Profile;
use crate::session::{AuthState, TokenPair};

/// Username/password pair for `login`.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Account details for `register`.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: SecretString,
}

impl Registration {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

// Tokens arrive as plain strings and are wrapped immediately.
#[derive(Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    /// Absent when the server does not rotate refresh tokens.
    #[serde(default)]
    refresh: Option<String>,
}

impl ApiClient {
    /// Exchange credentials for a token pair and validate it by fetching
    /// the profile.
    ///
    /// Rejected credentials surface as [`Error::Authentication`] and are
    /// never retried. If the profile fetch fails the new session is
    /// discarded.
    pub async fn login(&self, credentials: &Credentials) -> Result<Profile, Error> {
        let req = ApiRequest::post("auth/login/")
            .json(&json!({
                "username": credentials.username,
                "password": credentials.password.expose_secret(),
            }))?
            .anonymous();

        debug!(user = %credentials.username, "logging in");
        let tokens: LoginResponse = self
            .execute(&req, &CancellationToken::new())
            .await
            .map_err(|e| match e {
                Error::Unauthorized { message } | Error::ValidationFailed { message, .. } => {
                    Error::Authentication { message }
                }
                other => other,
            })?;

        self.session().begin(&TokenPair {
            access: SecretString::from(tokens.access),
            refresh: SecretString::from(tokens.refresh),
        });

        match self.fetch_profile().await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                warn!(error = %e, "profile fetch after login failed");
                self.session().clear();
                Err(e)
            }
        }
    }

    /// Create an account, then sign in with the same credentials.
    ///
    /// A failure after the account exists is reported as
    /// [`Error::RegisteredButLoginFailed`] so callers can tell the user the
    /// account was created.
    pub async fn register(&self, registration: &Registration) -> Result<Profile, Error> {
        let req = ApiRequest::post("auth/register/")
            .json(&json!({
                "username": registration.username,
                "email": registration.email,
                "password": registration.password.expose_secret(),
            }))?
            .anonymous();

        self.execute_empty(&req, &CancellationToken::new()).await?;
        info!(user = %registration.username, "account created");

        self.login(&registration.credentials())
            .await
            .map_err(|e| Error::RegisteredButLoginFailed {
                source: Box::new(e),
            })
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Failure is terminal: the session is cleared and
    /// [`Error::SessionExpired`] returned.
    pub async fn refresh(&self) -> Result<(), Error> {
        let _guard = self.session().refresh_lock().lock().await;
        self.refresh_locked().await
    }

    /// Refresh body. Callers must hold the session's refresh lock.
    pub(crate) async fn refresh_locked(&self) -> Result<(), Error> {
        let session = self.session();
        let Some(refresh) = session.refresh_token() else {
            debug!("no refresh token, session cannot be renewed");
            session.clear();
            return Err(Error::SessionExpired);
        };

        let req = ApiRequest::post("auth/refresh/")
            .json(&json!({ "refresh": refresh.expose_secret() }))?
            .anonymous();

        session.set_state(AuthState::Refreshing);
        // Not tied to the caller's token: a refresh half-applied would strand
        // every request waiting on the lock.
        match self
            .execute_once::<RefreshResponse>(&req, &CancellationToken::new())
            .await
        {
            Ok(tokens) => {
                session.install_tokens(&TokenPair {
                    access: SecretString::from(tokens.access),
                    refresh: tokens.refresh.map_or(refresh, SecretString::from),
                });
                session.set_state(session.settled_state());
                info!("access token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, ending session");
                session.clear();
                Err(Error::SessionExpired)
            }
        }
    }

    /// Resume a session from persisted tokens.
    ///
    /// `Ok(None)` when nothing was stored or the server rejected the stored
    /// session (which is then cleared). A `NetworkUnreachable` failure keeps
    /// the stored tokens for a later retry and is returned as an error.
    pub async fn restore(&self) -> Result<Option<Profile>, Error> {
        let session = self.session();
        let (access, refresh) = session.persisted_tokens();
        let Some(access) = access else {
            debug!("no persisted session");
            return Ok(None);
        };

        session.adopt(access, refresh);
        match self.fetch_profile().await {
            Ok(profile) => Ok(Some(profile)),
            Err(e @ Error::NetworkUnreachable { .. }) => {
                warn!(error = %e, "server unreachable, keeping stored session for retry");
                session.forget();
                Err(e)
            }
            Err(e) => {
                info!(error = %e, "stored session rejected");
                session.clear();
                Ok(None)
            }
        }
    }

    /// `GET auth/me/` and mark the session authenticated.
    pub async fn fetch_profile(&self) -> Result<Profile, Error> {
        let profile: Profile = self
            .execute(&ApiRequest::get("auth/me/"), &CancellationToken::new())
            .await?;
        self.session().set_profile(profile.clone());
        Ok(profile)
    }

    /// Clear the session locally. Synchronous and idempotent; no server
    /// round-trip.
    pub fn logout(&self) {
        self.session().clear();
        info!("signed out");
    }
}
