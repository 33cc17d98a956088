//! Entity cache for users, bots and channels
//!
//! Every lookup the record builder makes goes through here. The cache is
//! warmed once from `users.list` and `conversations.list` so most lookups
//! during a crawl never reach the network; misses fall back to the matching
//! `*.info` call.

use crate::api::{Bot, Channel, SlackApi, User};
use crate::cache::LruCache;
use crate::config::CacheConfig;
use crate::crawler::{PageOutcome, PageToken, Paginator};
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache statistics for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    api_calls: AtomicU64,
    api_errors: AtomicU64,
}

/// Point-in-time copy of `CacheStats`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub api_calls: u64,
    pub api_errors: u64,
}

impl CacheStats {
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            api_calls: self.api_calls.load(Ordering::Relaxed),
            api_errors: self.api_errors.load(Ordering::Relaxed),
        }
    }
}

/// What a prefetch loaded
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchCounts {
    pub users: usize,
    pub channels: usize,
}

/// Lazily loading, size-bounded cache over Slack entities
///
/// Users and channels are stored under both their id and their current name.
/// A renamed entity leaves its old name behind until it is evicted.
pub struct EntityCache {
    api: Arc<SlackApi>,
    users: LruCache<User>,
    bots: LruCache<Bot>,
    channels: LruCache<Channel>,
    stats: CacheStats,
}

impl EntityCache {
    pub fn new(api: Arc<SlackApi>, config: &CacheConfig) -> Self {
        tracing::debug!(
            users = config.users,
            bots = config.bots,
            channels = config.channels,
            "Creating entity cache"
        );

        Self {
            api,
            users: LruCache::new(config.users),
            bots: LruCache::new(config.bots),
            channels: LruCache::new(config.channels),
            stats: CacheStats::default(),
        }
    }

    /// Warms the cache by draining `users.list` and `conversations.list`
    ///
    /// `types` is the `conversations.list` type filter. An API error on
    /// either listing is logged by the paginator and leaves the cache
    /// partially warm; transport and decode errors are returned.
    pub async fn prefetch(&self, types: &str) -> Result<PrefetchCounts> {
        let api = &self.api;
        let mut counts = PrefetchCounts::default();

        let users = Paginator::new("users.list", |token: Option<PageToken>| async move {
            api.users_list(PageToken::cursor(token.as_ref())).await
        });
        let outcome = users
            .for_each(|user| {
                self.insert_user(user);
                counts.users += 1;
            })
            .await?;
        log_partial("users.list", &outcome);

        let channels = Paginator::new("conversations.list", |token: Option<PageToken>| async move {
            api.conversations_list(types, PageToken::cursor(token.as_ref()))
                .await
        });
        let outcome = channels
            .for_each(|channel| {
                self.insert_channel(channel);
                counts.channels += 1;
            })
            .await?;
        log_partial("conversations.list", &outcome);

        tracing::info!(
            users = counts.users,
            channels = counts.channels,
            "Prefetched entity cache"
        );
        Ok(counts)
    }

    /// Looks up a user by id or name, calling `users.info` on a miss
    pub async fn user(&self, key: &str) -> Result<User> {
        if let Some(user) = self.cached(&self.users, key) {
            return Ok(user);
        }
        let user = self.load("users.info", key, self.api.users_info(key)).await?;
        self.insert_user(user.clone());
        Ok(user)
    }

    /// Looks up a bot by id, calling `bots.info` on a miss
    pub async fn bot(&self, key: &str) -> Result<Bot> {
        if let Some(bot) = self.cached(&self.bots, key) {
            return Ok(bot);
        }
        let bot = self.load("bots.info", key, self.api.bots_info(key)).await?;
        self.bots.insert(key, bot.clone());
        Ok(bot)
    }

    /// Looks up a channel by id or name, calling `conversations.info` on a miss
    ///
    /// `conversations.info` only accepts ids, so a name that was not
    /// prefetched resolves to an API error.
    pub async fn channel(&self, key: &str) -> Result<Channel> {
        let key = key.trim_start_matches('#');
        if let Some(channel) = self.cached(&self.channels, key) {
            return Ok(channel);
        }
        let channel = self
            .load("conversations.info", key, self.api.conversations_info(key))
            .await?;
        self.insert_channel(channel.clone());
        Ok(channel)
    }

    /// Stores a user under its id and its name
    pub fn insert_user(&self, user: User) {
        if !user.name.is_empty() && user.name != user.id {
            self.users.insert(user.name.clone(), user.clone());
        }
        self.users.insert(user.id.clone(), user);
    }

    /// Stores a channel under its id and its name
    pub fn insert_channel(&self, channel: Channel) {
        if !channel.name.is_empty() && channel.name != channel.id {
            self.channels.insert(channel.name.clone(), channel.clone());
        }
        self.channels.insert(channel.id.clone(), channel);
    }

    pub fn insert_bot(&self, bot: Bot) {
        self.bots.insert(bot.id.clone(), bot);
    }

    /// Drops every cached entity
    pub fn invalidate_all(&self) {
        self.users.clear();
        self.bots.clear();
        self.channels.clear();
        tracing::debug!("Entity cache invalidated");
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        tracing::info!(
            hits = stats.hits,
            misses = stats.misses,
            api_calls = stats.api_calls,
            api_errors = stats.api_errors,
            users = self.users.len(),
            bots = self.bots.len(),
            channels = self.channels.len(),
            "Entity cache statistics"
        );
    }

    fn cached<V: Clone>(&self, cache: &LruCache<V>, key: &str) -> Option<V> {
        match cache.get(key) {
            Some(value) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %key, "Entity cache hit");
                Some(value)
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn load<V>(
        &self,
        method: &str,
        key: &str,
        fetch: impl std::future::Future<Output = Result<V>>,
    ) -> Result<V> {
        self.stats.api_calls.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(method = %method, key = %key, "Entity cache miss, fetching");

        fetch.await.map_err(|e| {
            self.stats.api_errors.fetch_add(1, Ordering::Relaxed);
            e
        })
    }
}

fn log_partial(method: &str, outcome: &PageOutcome) {
    if let PageOutcome::ApiError(code) = outcome {
        tracing::warn!(
            method = %method,
            error = %code,
            "Prefetch stopped early, cache is only partially warm"
        );
    }
}
