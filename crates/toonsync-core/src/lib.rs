//! Client-side sync layer between `toonsync-api` and UI consumers (CLI).
//!
//! This crate owns the listing logic for the webtoon tracker:
//!
//! - **[`SyncEngine`]** : paginated loading, "load more", debounced search and
//!   confirmed mutations (create, update, chapter, delete). Superseded
//!   requests are cancelled and never applied. Consumers observe a
//!   [`ListingState`] snapshot through a `watch` channel.
//!
//! - **[`ResourceCache`]** : last-known listing per owner with a TTL. Stale
//!   entries are still shown while a background load refreshes them.
//!
//! - **[`NotificationBus`]** : broadcast of success/info/warning/error
//!   notices. Publishing with no subscriber is a no-op.
//!
//! - **[`Debouncer`]** : trailing-edge debounce used for search input.

pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{MANAGEMENT_FEATURE, SyncConfig};
pub use debounce::Debouncer;
pub use engine::{ListingState, LoadOutcome, LoadRequest, SyncEngine};
pub use error::CoreError;
pub use model::{Identifiable, OwnerId};
pub use notify::{Notification, NotificationBus, NotificationKind};
pub use store::{CacheEntry, CacheLookup, CachePatch, Freshness, ResourceCache, merge_lists};

pub use toonsync_api as api;
