// ── Cache-facing view of domain items ──
//
// The cache and merge code only need an id and a last-modified marker; the
// rest of an item is opaque to them.

use std::hash::Hash;

use chrono::{DateTime, Utc};
use toonsync_api::Webtoon;

/// Key of a per-user cache entry (the profile id).
pub type OwnerId = u64;

/// An item that can be deduplicated by id and ordered by recency.
pub trait Identifiable {
    type Id: Eq + Hash + Clone;

    fn id(&self) -> Self::Id;

    /// Last server-side modification, if the item carries one.
    fn modified_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

impl Identifiable for Webtoon {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }

    fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}
