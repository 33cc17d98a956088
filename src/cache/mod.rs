//! In-memory caching
//!
//! - `LruCache`: bounded, thread-safe least-recently-used map
//! - `EntityCache`: users, bots and channels resolved through the Slack API

mod entity;
mod lru;

pub use entity::{CacheStats, CacheStatsSnapshot, EntityCache, PrefetchCounts};
pub use lru::LruCache;
