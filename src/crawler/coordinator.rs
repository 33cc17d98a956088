//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties everything together:
//! - Warming the entity cache and fetching team metadata
//! - Selecting channels (all, or an explicit list)
//! - Walking each channel's history, thread replies and files in sequence
//! - Handing every item to the worker pool and recording failures
//! - Draining the pool and clearing the cache at the end of the run

use crate::api::{Channel, File, Message, SlackApi};
use crate::cache::EntityCache;
use crate::config::Config;
use crate::crawler::paginator::{PageOutcome, PageToken, Paginator};
use crate::crawler::pool::WorkerPool;
use crate::crawler::record::{RecordBuilder, RecordKind};
use crate::extract::{BasicExtractor, ContentExtractor};
use crate::output::{CrawlStats, CrawlSummary};
use crate::state::ChannelProgress;
use crate::storage::{FailureStore, RecordSink};
use crate::{HarvestError, Result};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything a worker needs to turn one item into a record
struct ItemContext {
    builder: RecordBuilder,
    sink: Arc<dyn RecordSink>,
    failures: Arc<dyn FailureStore>,
    stats: CrawlStats,
}

impl ItemContext {
    async fn process_message(&self, channel: &Channel, message: &Message, kind: RecordKind) {
        let result = self
            .guarded(async {
                let record = self.builder.message_record(channel, message, kind).await?;
                self.sink.store(&record)?;
                Ok::<_, HarvestError>(())
            })
            .await;

        match result {
            Ok(()) => self.stats.record_indexed(),
            Err(e) => self.fail(&self.builder.message_failure_url(channel, message), e),
        }
    }

    async fn process_file(&self, channel: &Channel, file: &File) {
        let result = self
            .guarded(async {
                match self.builder.file_record(channel, file).await? {
                    Some(record) => {
                        self.sink.store(&record)?;
                        Ok::<_, HarvestError>(true)
                    }
                    None => Ok(false),
                }
            })
            .await;

        match result {
            Ok(true) => self.stats.record_indexed(),
            Ok(false) => self.stats.item_skipped(),
            Err(e) => self.fail(&self.builder.file_failure_url(channel, file), e),
        }
    }

    /// Runs one item's work, turning a panic into `HarvestError::Panicked`
    async fn guarded<T, Fut>(&self, work: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                self.stats.item_panicked();
                Err(HarvestError::Panicked(panic_message(payload.as_ref())))
            }
        }
    }

    fn fail(&self, url: &str, error: HarvestError) {
        self.stats.item_failed();
        let classification = error.classification();
        tracing::warn!(
            url = %url,
            classification = %classification,
            error = %error,
            "Failed to process item"
        );
        if let Err(e) = self.failures.record_failure(url, classification, &error) {
            tracing::error!(url = %url, error = %e, "Could not record failure");
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    api: Arc<SlackApi>,
    cache: Arc<EntityCache>,
    extractor: Arc<dyn ContentExtractor>,
    sink: Arc<dyn RecordSink>,
    failures: Arc<dyn FailureStore>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated crawler configuration
    /// * `sink` - Receives every record built
    /// * `failures` - Receives every item that could not be processed
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - The HTTP client or base URL could not be set up
    pub fn new(
        config: Config,
        sink: Arc<dyn RecordSink>,
        failures: Arc<dyn FailureStore>,
    ) -> Result<Self> {
        let api = Arc::new(SlackApi::new(&config.slack, config.page_size.clone())?);
        let cache = Arc::new(EntityCache::new(Arc::clone(&api), &config.cache));

        Ok(Self {
            config: Arc::new(config),
            api,
            cache,
            extractor: Arc::new(BasicExtractor),
            sink,
            failures,
        })
    }

    /// Replaces the built-in text/HTML extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Runs one complete crawl
    ///
    /// This method:
    /// 1. Prefetches users and channels into the entity cache
    /// 2. Fetches team metadata for permalink synthesis
    /// 3. Selects channels and walks each one
    /// 4. Waits for the worker pool to drain (bounded by the grace period)
    /// 5. Logs cache statistics and clears the cache
    ///
    /// Item failures never end the run. Only a fatal error (configuration or
    /// an undecodable response) escaping a pagination stream does, after the
    /// pool has been drained and the cache cleared.
    pub async fn run(&self) -> Result<CrawlSummary> {
        let started = Instant::now();
        tracing::info!(channels = %self.config.slack.channels, "Starting Slack crawl");

        if let Err(e) = self
            .cache
            .prefetch(self.config.slack.conversation_types())
            .await
        {
            if e.is_fatal() {
                self.cache.invalidate_all();
                return Err(e);
            }
            tracing::warn!(error = %e, "Entity cache prefetch failed, continuing with a cold cache");
        }

        let team = match self.api.team_info().await {
            Ok(team) => {
                tracing::info!(team = %team.name, domain = %team.domain, "Fetched team metadata");
                Some(team)
            }
            Err(e) => {
                tracing::warn!(error = %e, "No team metadata, permalinks will be looked up");
                None
            }
        };

        let builder = RecordBuilder::new(
            Arc::clone(&self.api),
            Arc::clone(&self.cache),
            team,
            Arc::clone(&self.extractor),
            &self.config,
        )?;
        let ctx = Arc::new(ItemContext {
            builder,
            sink: Arc::clone(&self.sink),
            failures: Arc::clone(&self.failures),
            stats: CrawlStats::default(),
        });

        let crawler = &self.config.crawler;
        let pool = WorkerPool::new(crawler.thread_count, crawler.queue_capacity);

        let result = self.crawl_channels(&ctx, &pool).await;

        let report = pool
            .shutdown(Duration::from_secs(crawler.shutdown_grace_secs))
            .await;
        self.cache.log_stats();
        let cache_stats = self.cache.stats();
        self.cache.invalidate_all();

        if let Err(e) = result {
            tracing::error!(error = %e, "Crawl aborted");
            return Err(e);
        }

        let summary = ctx.stats.summary(
            report.inline_runs,
            report.panicked,
            report.aborted,
            cache_stats,
            started.elapsed(),
        );
        tracing::info!(
            channels = summary.channels,
            discovered = summary.discovered(),
            indexed = summary.indexed,
            skipped = summary.skipped,
            failed = summary.failed,
            panicked = summary.panicked,
            "Crawl completed in {:?}",
            summary.elapsed
        );
        Ok(summary)
    }

    async fn crawl_channels(&self, ctx: &Arc<ItemContext>, pool: &WorkerPool) -> Result<()> {
        let channels = self.select_channels().await?;
        tracing::info!("Crawling {} channels", channels.len());

        for channel in channels {
            self.crawl_channel(ctx, pool, channel).await?;
        }
        Ok(())
    }

    /// Every channel visible to the token, or the configured names resolved one by one
    async fn select_channels(&self) -> Result<Vec<Channel>> {
        let Some(names) = self.config.slack.channel_names() else {
            let api = &self.api;
            let types = self.config.slack.conversation_types();
            let mut channels = Vec::new();
            let result = Paginator::new("conversations.list", |token: Option<PageToken>| async move {
                api.conversations_list(types, PageToken::cursor(token.as_ref()))
                    .await
            })
            .for_each(|channel| channels.push(channel))
            .await;
            settle_stream(result, "conversations.list", "workspace")?;
            return Ok(channels);
        };

        let mut channels = Vec::with_capacity(names.len());
        for name in names {
            match self.cache.channel(&name).await {
                Ok(channel) => channels.push(channel),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(channel = %name, error = %e, "Could not resolve channel, skipping");
                }
            }
        }
        Ok(channels)
    }

    async fn crawl_channel(
        &self,
        ctx: &Arc<ItemContext>,
        pool: &WorkerPool,
        channel: Channel,
    ) -> Result<()> {
        let channel = Arc::new(channel);
        let mut progress = ChannelProgress::new(channel.id.clone(), self.config.files.enabled);
        tracing::info!(channel = %channel.name, id = %channel.id, "Crawling channel");

        let result = self.walk_history(ctx, pool, &channel).await;
        settle_stream(result, "conversations.history", &channel.id)?;
        progress.advance();

        if self.config.files.enabled {
            let result = self.walk_files(ctx, pool, &channel).await;
            settle_stream(result, "files.list", &channel.id)?;
            progress.advance();
        }

        progress.advance();
        ctx.stats.channel_crawled();
        Ok(())
    }

    /// Dispatches every message and walks the replies of each thread parent
    async fn walk_history(
        &self,
        ctx: &Arc<ItemContext>,
        pool: &WorkerPool,
        channel: &Arc<Channel>,
    ) -> Result<PageOutcome> {
        let api = &self.api;
        let channel_id = channel.id.as_str();
        let mut history = Paginator::new("conversations.history", |token: Option<PageToken>| async move {
            api.conversations_history(channel_id, PageToken::cursor(token.as_ref()))
                .await
        });

        while let Some(messages) = history.next_page().await? {
            for message in messages {
                ctx.stats.message_discovered();
                let thread_ts = message
                    .thread_ts
                    .clone()
                    .filter(|_| message.starts_thread());

                dispatch_message(ctx, pool, channel, message, RecordKind::Message).await;

                if let Some(thread_ts) = thread_ts {
                    let result = self.walk_replies(ctx, pool, channel, &thread_ts).await;
                    settle_stream(result, "conversations.replies", &channel.id)?;
                }
            }
        }
        Ok(history.outcome().clone())
    }

    /// Dispatches a thread's replies, minus the parent echo and broadcasts
    async fn walk_replies(
        &self,
        ctx: &Arc<ItemContext>,
        pool: &WorkerPool,
        channel: &Arc<Channel>,
        thread_ts: &str,
    ) -> Result<PageOutcome> {
        let api = &self.api;
        let channel_id = channel.id.as_str();
        let mut replies = Paginator::new("conversations.replies", |token: Option<PageToken>| async move {
            api.conversations_replies(channel_id, thread_ts, PageToken::cursor(token.as_ref()))
                .await
        });

        while let Some(messages) = replies.next_page().await? {
            for message in messages {
                if message.ts == thread_ts || message.is_broadcast() {
                    continue;
                }
                ctx.stats.reply_discovered();
                dispatch_message(ctx, pool, channel, message, RecordKind::Reply).await;
            }
        }
        Ok(replies.outcome().clone())
    }

    async fn walk_files(
        &self,
        ctx: &Arc<ItemContext>,
        pool: &WorkerPool,
        channel: &Arc<Channel>,
    ) -> Result<PageOutcome> {
        let api = &self.api;
        let channel_id = channel.id.as_str();
        let mut files = Paginator::new("files.list", |token: Option<PageToken>| async move {
            api.files_list(channel_id, PageToken::page(token.as_ref()))
                .await
        });

        while let Some(batch) = files.next_page().await? {
            for file in batch {
                ctx.stats.file_discovered();
                let ctx = Arc::clone(ctx);
                let channel = Arc::clone(channel);
                pool.submit(async move { ctx.process_file(&channel, &file).await })
                    .await;
            }
        }
        Ok(files.outcome().clone())
    }
}

async fn dispatch_message(
    ctx: &Arc<ItemContext>,
    pool: &WorkerPool,
    channel: &Arc<Channel>,
    message: Message,
    kind: RecordKind,
) {
    let ctx = Arc::clone(ctx);
    let channel = Arc::clone(channel);
    pool.submit(async move { ctx.process_message(&channel, &message, kind).await })
        .await;
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Logs how a pagination stream ended; only fatal errors are passed on
fn settle_stream(result: Result<PageOutcome>, stream: &str, target: &str) -> Result<()> {
    match result {
        Ok(PageOutcome::ApiError(code)) => {
            tracing::warn!(
                stream = %stream,
                target = %target,
                error = %code,
                "Stream ended early on a Slack API error"
            );
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::error!(
                stream = %stream,
                target = %target,
                classification = %e.classification(),
                error = %e,
                "Stream failed, moving on"
            );
            Ok(())
        }
    }
}
