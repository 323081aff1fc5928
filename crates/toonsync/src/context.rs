//! Per-invocation wiring: config file + profile + CLI overrides turned into
//! an `ApiClient` and a `SyncEngine`.

use std::sync::Arc;

use toonsync_config::{Config, ConfigError, Profile};
use toonsync_core::api::{ApiClient, Profile as UserProfile, SessionStore};
use toonsync_core::{NotificationBus, ResourceCache, SyncEngine};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub struct App {
    pub client: ApiClient,
    pub engine: SyncEngine,
    pub profile_name: String,
    pub profile: Profile,
}

impl App {
    /// Build from the config file, the selected profile, and CLI flags.
    pub fn build(global: &GlobalOpts) -> Result<Self, CliError> {
        let cfg = toonsync_config::load_config()?;
        let profile_name = cfg.profile_name(global.profile.as_deref());
        let mut profile = resolve_profile(&cfg, &profile_name)?;

        if let Some(ref url) = global.api_url {
            profile.api_url.clone_from(url);
        }
        if global.insecure {
            profile.insecure = Some(true);
        }
        if let Some(timeout) = global.timeout {
            profile.timeout = Some(timeout);
        }

        let client_config = toonsync_config::profile_to_client_config(&profile, &cfg.defaults)?;
        let store = global
            .token_store
            .unwrap_or_else(|| cfg.token_store(&profile));
        tracing::debug!(profile = %profile_name, %store, url = %client_config.base_url, "building client");

        let storage = toonsync_config::open_token_storage(store, &profile_name);
        let session = Arc::new(SessionStore::new(storage));
        let client = ApiClient::new(&client_config, session)?;

        let sync = cfg.sync_config();
        let cache = Arc::new(ResourceCache::new(sync.cache_ttl));
        let engine = SyncEngine::new(client.clone(), cache, NotificationBus::new(), sync);

        Ok(Self {
            client,
            engine,
            profile_name,
            profile,
        })
    }

    /// Resume the stored session; commands that need a user call this first.
    pub async fn require_session(&self) -> Result<UserProfile, CliError> {
        match self.client.restore().await? {
            Some(user) => Ok(user),
            None => Err(CliError::NotSignedIn {
                profile: self.profile_name.clone(),
            }),
        }
    }
}

fn resolve_profile(cfg: &Config, name: &str) -> Result<Profile, CliError> {
    cfg.profile(name).map_err(|e| match e {
        ConfigError::UnknownProfile { name } => {
            let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            names.sort_unstable();
            CliError::ProfileNotFound {
                name,
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            }
        }
        other => other.into(),
    })
}
