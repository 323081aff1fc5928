// ── Listing storage ──
//
// `ResourceCache` keeps the last-known listing per owner; `merge` holds the
// list reconciliation rules the engine applies before writing to it.

mod cache;
pub mod merge;

pub use cache::{CacheEntry, CacheLookup, CachePatch, Freshness, ResourceCache};
pub use merge::merge_lists;
