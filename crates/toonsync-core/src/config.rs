// ── Sync engine configuration ──

use std::time::Duration;

/// Feature code that gates list access and mutations.
pub const MANAGEMENT_FEATURE: &str = "webtoon_management";

/// Runtime knobs for the [`SyncEngine`](crate::SyncEngine).
///
/// Built by `toonsync-config` from the active profile; the defaults match the
/// server's expectations for an interactive client.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long a cache entry is served without a background refresh.
    pub cache_ttl: Duration,
    /// Quiet period before a search term is sent to the server.
    pub search_debounce: Duration,
    /// Feature code required to list or modify webtoons.
    pub management_feature: String,
    /// Server-side ordering (e.g. `"-updated_at"`); server default when `None`.
    pub ordering: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            search_debounce: Duration::from_millis(400),
            management_feature: MANAGEMENT_FEATURE.to_owned(),
            ordering: None,
        }
    }
}
