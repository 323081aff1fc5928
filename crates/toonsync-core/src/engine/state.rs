// ── Listing state and load descriptors ──

use std::sync::Arc;

use toonsync_api::Webtoon;

use crate::model::OwnerId;

/// Snapshot of the listing view, published on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingState {
    /// Owner the listing belongs to; `None` when signed out or not allowed.
    pub owner: Option<OwnerId>,
    pub items: Arc<Vec<Webtoon>>,
    pub total_count: u64,
    pub has_more: bool,
    pub current_page: u32,
    /// A foreground page load is in flight.
    pub loading: bool,
    /// A foreground "load more" is in flight.
    pub loading_more: bool,
    /// Last user-facing error; cleared when the next load starts.
    pub error: Option<String>,
    /// The user has to sign in again before the listing can load.
    pub auth_required: bool,
    /// Raw search box contents, updated on every keystroke.
    pub search_input: String,
    /// Debounced term the server listing is filtered by.
    pub search_term: String,
}

impl Default for ListingState {
    fn default() -> Self {
        Self {
            owner: None,
            items: Arc::new(Vec::new()),
            total_count: 0,
            has_more: false,
            current_page: 1,
            loading: false,
            loading_more: false,
            error: None,
            auth_required: false,
            search_input: String::new(),
            search_term: String::new(),
        }
    }
}

impl ListingState {
    /// Items filtered locally by the raw search input (title, type, status,
    /// language), so typing narrows the view before the debounced server
    /// query returns.
    pub fn visible_items(&self) -> Vec<Webtoon> {
        let needle = self.search_input.trim().to_lowercase();
        if needle.is_empty() {
            return self.items.to_vec();
        }
        self.items
            .iter()
            .filter(|w| w.matches(&needle))
            .cloned()
            .collect()
    }

    /// Reset the listing for `owner`, keeping search and error display.
    pub(crate) fn reset_for(&mut self, owner: Option<OwnerId>) {
        *self = Self {
            owner,
            error: self.error.take(),
            auth_required: self.auth_required,
            search_input: std::mem::take(&mut self.search_input),
            search_term: std::mem::take(&mut self.search_term),
            ..Self::default()
        };
    }
}

/// Parameters of one list fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadRequest {
    pub page: u32,
    /// Append to the current list ("load more").
    pub append: bool,
    /// Silent refresh: no loading indicator, current page left alone.
    pub background: bool,
    /// Merge into the current list instead of replacing it.
    pub merge: bool,
}

impl LoadRequest {
    /// Foreground load that replaces the list with `page`.
    pub fn page(page: u32) -> Self {
        Self {
            page,
            append: false,
            background: false,
            merge: false,
        }
    }

    /// Foreground "load more" of `page`.
    pub fn append(page: u32) -> Self {
        Self {
            page,
            append: true,
            background: false,
            merge: true,
        }
    }

    /// Silent re-sync of `page`, merged into the current list.
    pub fn background(page: u32) -> Self {
        Self {
            page,
            append: false,
            background: true,
            merge: true,
        }
    }

    /// Whether a successful result moves `current_page`.
    pub(crate) fn moves_page(self) -> bool {
        !self.background || self.append
    }
}

/// How a load ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LoadOutcome {
    /// Server data was applied to the listing.
    Applied,
    /// A fresh cache entry was shown; no request was needed.
    Cached,
    /// Superseded before it could be applied.
    Cancelled,
    /// Not attempted (no authorized owner, or nothing to do).
    Skipped,
}
