//! Shared configuration for the toonsync client.
//!
//! TOML profiles layered with `TOONSYNC_` environment overrides, password
//! resolution (env + keyring), durable token storage, and translation to
//! `toonsync_api::ClientConfig` and `toonsync_core::SyncConfig`.

mod storage;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use toonsync_api::{
    ClientConfig, DEFAULT_BASE_URL, MemoryStorage, TlsMode, TokenStorage, TransportConfig,
};
use toonsync_core::{MANAGEMENT_FEATURE, SyncConfig};

pub use storage::{FileStorage, KEYRING_SERVICE, KeyringStorage};

/// Profile used when neither the command line nor the config names one.
pub const DEFAULT_PROFILE: &str = "default";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Where session tokens are persisted between runs.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TokenStoreKind {
    /// OS keyring (Secret Service, Keychain, Credential Manager).
    #[default]
    Keyring,
    /// JSON file in the platform data directory.
    File,
    /// Not persisted; the session ends with the process.
    Memory,
}

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some(DEFAULT_PROFILE.into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Listing cache lifetime in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Search debounce in milliseconds.
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub token_store: TokenStoreKind,

    /// Server-side list ordering, e.g. "-updated_at".
    #[serde(default)]
    pub ordering: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            debounce_ms: default_debounce(),
            token_store: TokenStoreKind::default(),
            ordering: None,
        }
    }
}

fn default_timeout() -> u64 {
    10
}
fn default_cache_ttl() -> u64 {
    60
}
fn default_debounce() -> u64 {
    400
}

/// A named server profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// API base URL (e.g., "http://localhost:8000/api/").
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Username offered at the login prompt.
    pub username: Option<String>,

    /// Override the token store for this profile.
    pub token_store: Option<TokenStoreKind>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept invalid TLS certificates.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: None,
            token_store: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_BASE_URL.into()
}

impl Config {
    /// Name of the profile to use: `requested`, else the configured default.
    pub fn profile_name(&self, requested: Option<&str>) -> String {
        requested
            .or(self.default_profile.as_deref())
            .unwrap_or(DEFAULT_PROFILE)
            .to_owned()
    }

    /// Look up a profile by name. The default profile exists implicitly,
    /// pointing at the local development server.
    pub fn profile(&self, name: &str) -> Result<Profile, ConfigError> {
        match self.profiles.get(name) {
            Some(profile) => Ok(profile.clone()),
            None if name == DEFAULT_PROFILE => Ok(Profile::default()),
            None => Err(ConfigError::UnknownProfile { name: name.into() }),
        }
    }

    /// Token store for `profile`, falling back to the global default.
    pub fn token_store(&self, profile: &Profile) -> TokenStoreKind {
        profile.token_store.unwrap_or(self.defaults.token_store)
    }

    /// Engine settings from the global defaults.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            cache_ttl: Duration::from_secs(self.defaults.cache_ttl_secs),
            search_debounce: Duration::from_millis(self.defaults.debounce_ms),
            management_feature: MANAGEMENT_FEATURE.to_owned(),
            ordering: self.defaults.ordering.clone(),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "toonsync", "toonsync")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory for file-backed token storage.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(dirs_fallback, |dirs| dirs.data_dir().to_path_buf())
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("toonsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` layered as defaults → TOML file → `TOONSYNC_` env
/// (nested keys split on `__`, e.g. `TOONSYNC_DEFAULTS__TIMEOUT`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TOONSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ClientConfig` from a profile.
pub fn profile_to_client_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let base_url: url::Url = profile
        .api_url
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("invalid URL: {}", profile.api_url),
        })?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("expected http or https, got '{}'", base_url.scheme()),
        });
    }

    let tls = if profile.insecure.unwrap_or(false) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    Ok(ClientConfig {
        base_url,
        transport: TransportConfig { tls, timeout },
    })
}

/// Open the token storage backend for a profile.
pub fn open_token_storage(kind: TokenStoreKind, profile_name: &str) -> Arc<dyn TokenStorage> {
    match kind {
        TokenStoreKind::Keyring => Arc::new(KeyringStorage::new(profile_name)),
        TokenStoreKind::File => Arc::new(FileStorage::for_profile(profile_name)),
        TokenStoreKind::Memory => Arc::new(MemoryStorage::new()),
    }
}

// ── Password resolution (without CLI flags) ─────────────────────────

/// Password for non-interactive login: `TOONSYNC_PASSWORD`, then the
/// keyring entry `<profile>/password`.
pub fn resolve_password(profile_name: &str) -> Option<SecretString> {
    if let Ok(pw) = std::env::var("TOONSYNC_PASSWORD") {
        return Some(SecretString::from(pw));
    }

    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .and_then(|entry| entry.get_password())
        .ok()
        .map(SecretString::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_point_at_local_server() {
        let config = Config::default();
        let profile = config.profile(DEFAULT_PROFILE).unwrap();
        assert_eq!(profile.api_url, DEFAULT_BASE_URL);
        assert_eq!(config.token_store(&profile), TokenStoreKind::Keyring);

        let sync = config.sync_config();
        assert_eq!(sync.cache_ttl, Duration::from_secs(60));
        assert_eq!(sync.search_debounce, Duration::from_millis(400));
        assert_eq!(sync.management_feature, MANAGEMENT_FEATURE);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let config = Config::default();
        assert!(matches!(
            config.profile("staging"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn profile_name_prefers_request_then_default() {
        let config = Config {
            default_profile: Some("home".into()),
            ..Config::default()
        };
        assert_eq!(config.profile_name(Some("work")), "work");
        assert_eq!(config.profile_name(None), "home");
    }

    #[test]
    fn load_merges_toml_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "home"

[defaults]
debounce_ms = 250
token_store = "file"

[profiles.home]
api_url = "https://toons.example.com/api/"
username = "reader"
timeout = 5
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("home"));
        assert_eq!(config.defaults.debounce_ms, 250);
        assert_eq!(config.defaults.cache_ttl_secs, 60);

        let profile = config.profile("home").unwrap();
        assert_eq!(profile.username.as_deref(), Some("reader"));
        assert_eq!(config.token_store(&profile), TokenStoreKind::File);

        let client = profile_to_client_config(&profile, &config.defaults).unwrap();
        assert_eq!(client.base_url.as_str(), "https://toons.example.com/api/");
        assert_eq!(client.transport.timeout, Duration::from_secs(5));
        assert_eq!(client.transport.tls, TlsMode::System);
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert(
            "home".into(),
            Profile {
                api_url: "http://10.0.0.5:8000/api/".into(),
                token_store: Some(TokenStoreKind::Memory),
                ..Profile::default()
            },
        );
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let profile = loaded.profile("home").unwrap();
        assert_eq!(profile.api_url, "http://10.0.0.5:8000/api/");
        assert_eq!(profile.token_store, Some(TokenStoreKind::Memory));
    }

    #[test]
    fn insecure_and_ca_cert_select_tls_mode() {
        let defaults = Defaults::default();
        let insecure = Profile {
            insecure: Some(true),
            ca_cert: Some("/tmp/ca.pem".into()),
            ..Profile::default()
        };
        assert_eq!(
            profile_to_client_config(&insecure, &defaults).unwrap().transport.tls,
            TlsMode::DangerAcceptInvalid
        );

        let custom = Profile {
            ca_cert: Some("/tmp/ca.pem".into()),
            ..Profile::default()
        };
        assert_eq!(
            profile_to_client_config(&custom, &defaults).unwrap().transport.tls,
            TlsMode::CustomCa("/tmp/ca.pem".into())
        );
    }

    #[test]
    fn rejects_non_http_api_url() {
        let profile = Profile {
            api_url: "ftp://example.com/".into(),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_client_config(&profile, &Defaults::default()),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn token_store_kind_parses_lowercase() {
        assert_eq!("file".parse::<TokenStoreKind>().unwrap(), TokenStoreKind::File);
        assert_eq!(TokenStoreKind::Memory.to_string(), "memory");
    }
}
