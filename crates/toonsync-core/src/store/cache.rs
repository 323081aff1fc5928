// ── Per-owner list cache ──
//
// Last-known listing for each user, with a freshness timestamp. Stale
// entries are still served so the view never goes blank while a background
// refresh runs.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::model::OwnerId;

/// Cached listing for one owner.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub timestamp: Instant,
    pub items: Arc<Vec<T>>,
    pub total_count: u64,
    pub has_more: bool,
    pub current_page: u32,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            timestamp: self.timestamp,
            items: Arc::clone(&self.items),
            total_count: self.total_count,
            has_more: self.has_more,
            current_page: self.current_page,
        }
    }
}

impl<T> CacheEntry<T> {
    fn empty() -> Self {
        Self {
            timestamp: Instant::now(),
            items: Arc::new(Vec::new()),
            total_count: 0,
            has_more: false,
            current_page: 1,
        }
    }
}

/// Partial update for [`ResourceCache::put`]. Unset fields keep their
/// current value.
#[derive(Debug)]
pub struct CachePatch<T> {
    items: Option<Arc<Vec<T>>>,
    total_count: Option<u64>,
    has_more: Option<bool>,
    current_page: Option<u32>,
}

impl<T> Default for CachePatch<T> {
    fn default() -> Self {
        Self {
            items: None,
            total_count: None,
            has_more: None,
            current_page: None,
        }
    }
}

impl<T> CachePatch<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(mut self, items: Arc<Vec<T>>) -> Self {
        self.items = Some(items);
        self
    }

    pub fn total_count(mut self, total_count: u64) -> Self {
        self.total_count = Some(total_count);
        self
    }

    pub fn has_more(mut self, has_more: bool) -> Self {
        self.has_more = Some(has_more);
        self
    }

    pub fn current_page(mut self, page: u32) -> Self {
        self.current_page = Some(page);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// Result of [`ResourceCache::get`].
#[derive(Debug, Clone)]
pub struct CacheLookup<T> {
    pub entry: CacheEntry<T>,
    pub freshness: Freshness,
}

impl<T> CacheLookup<T> {
    pub fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }
}

/// Time-bounded listing cache keyed by owner.
pub struct ResourceCache<T> {
    ttl: Duration,
    entries: DashMap<OwnerId, CacheEntry<T>>,
}

impl<T> ResourceCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Entry for `owner`, stale or not.
    pub fn get(&self, owner: &OwnerId) -> Option<CacheLookup<T>> {
        let entry = self.entries.get(owner)?.value().clone();
        let freshness = if entry.timestamp.elapsed() < self.ttl {
            Freshness::Fresh
        } else {
            Freshness::Stale
        };
        Some(CacheLookup { entry, freshness })
    }

    /// Entry for `owner` only while it is within the TTL.
    pub fn get_fresh(&self, owner: &OwnerId) -> Option<CacheEntry<T>> {
        self.get(owner)
            .filter(CacheLookup::is_fresh)
            .map(|lookup| lookup.entry)
    }

    /// Apply `patch` to the owner's entry (created empty if missing) and
    /// re-stamp it.
    pub fn put(&self, owner: OwnerId, patch: CachePatch<T>) {
        let mut entry = self.entries.entry(owner).or_insert_with(CacheEntry::empty);
        if let Some(items) = patch.items {
            entry.items = items;
        }
        if let Some(total_count) = patch.total_count {
            entry.total_count = total_count;
        }
        if let Some(has_more) = patch.has_more {
            entry.has_more = has_more;
        }
        if let Some(page) = patch.current_page {
            entry.current_page = page;
        }
        entry.timestamp = Instant::now();
    }

    /// Drop one owner's entry, or every entry when `owner` is `None`.
    pub fn invalidate(&self, owner: Option<&OwnerId>) {
        match owner {
            Some(owner) => {
                if self.entries.remove(owner).is_some() {
                    debug!(owner, "cache entry invalidated");
                }
            }
            None => self.clear(),
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
        debug!("cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> std::fmt::Debug for ResourceCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}
