use serde::Deserialize;
use std::collections::BTreeMap;

/// Default Slack Web API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api/";

/// Channel selector meaning "every channel visible to the token"
pub const ALL_CHANNELS: &str = "*";

/// Main configuration structure for Slack-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub slack: SlackConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default, rename = "page-size")]
    pub page_size: PageSizeConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub files: FileConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    pub output: OutputConfig,
    /// Fields copied verbatim into every emitted record
    #[serde(default, rename = "default-fields")]
    pub default_fields: BTreeMap<String, String>,
}

/// Slack connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    /// Bearer token (bot or user token)
    pub token: String,

    /// Base URL of the Web API, normally `https://slack.com/api/`
    #[serde(rename = "api-base-url", default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(rename = "proxy-host", default)]
    pub proxy_host: Option<String>,

    #[serde(rename = "proxy-port", default)]
    pub proxy_port: Option<u16>,

    /// Whether private channels are listed and prefetched
    #[serde(rename = "include-private", default)]
    pub include_private: bool,

    /// `*` for every visible channel, otherwise comma-separated channel names
    #[serde(default = "default_channels")]
    pub channels: String,
}

impl SlackConfig {
    /// Returns `host:port` when a proxy is configured
    pub fn proxy_address(&self) -> Option<String> {
        match (&self.proxy_host, self.proxy_port) {
            (Some(host), Some(port)) => Some(format!("{}:{}", host, port)),
            _ => None,
        }
    }

    /// Explicit channel names, or `None` when every channel should be crawled
    pub fn channel_names(&self) -> Option<Vec<String>> {
        let trimmed = self.channels.trim();
        if trimmed.is_empty() || trimmed == ALL_CHANNELS {
            return None;
        }
        Some(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| name.trim_start_matches('#').to_string())
                .collect(),
        )
    }

    /// Value of the `types` parameter for `conversations.list`
    pub fn conversation_types(&self) -> &'static str {
        if self.include_private {
            "public_channel,private_channel"
        } else {
            "public_channel"
        }
    }
}

/// Worker pool behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of workers processing items concurrently
    #[serde(rename = "thread-count", default = "default_thread_count")]
    pub thread_count: usize,

    /// Bounded task queue size; a full queue runs the task on the producer
    #[serde(rename = "queue-capacity", default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Seconds to wait for in-flight tasks before aborting them
    #[serde(rename = "shutdown-grace-secs", default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            queue_capacity: default_queue_capacity(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

/// Per-collection `limit`/`count` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct PageSizeConfig {
    #[serde(default = "default_page_size")]
    pub channels: u32,
    #[serde(default = "default_page_size")]
    pub messages: u32,
    #[serde(default = "default_page_size")]
    pub replies: u32,
    #[serde(default = "default_page_size")]
    pub users: u32,
    #[serde(default = "default_page_size")]
    pub files: u32,
}

impl Default for PageSizeConfig {
    fn default() -> Self {
        Self {
            channels: default_page_size(),
            messages: default_page_size(),
            replies: default_page_size(),
            users: default_page_size(),
            files: default_page_size(),
        }
    }
}

/// Maximum number of entries held per entity cache
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_user_cache_size")]
    pub users: usize,
    #[serde(default = "default_bot_cache_size")]
    pub bots: usize,
    #[serde(default = "default_channel_cache_size")]
    pub channels: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            users: default_user_cache_size(),
            bots: default_bot_cache_size(),
            channels: default_channel_cache_size(),
        }
    }
}

/// File crawling settings
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Files larger than this many bytes are rejected
    #[serde(rename = "max-size", default = "default_max_file_size")]
    pub max_size: u64,

    /// Full-match regexes; files whose MIME type matches none are skipped
    #[serde(rename = "mime-types", default = "default_mime_types")]
    pub mime_types: Vec<String>,

    /// Swallow extraction failures and index the file with empty text
    #[serde(rename = "ignore-error", default = "default_true")]
    pub ignore_error: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: default_max_file_size(),
            mime_types: default_mime_types(),
            ignore_error: true,
        }
    }
}

/// Permalink include/exclude patterns
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    #[serde(rename = "include-urls", default)]
    pub include_urls: Vec<String>,

    #[serde(rename = "exclude-urls", default)]
    pub exclude_urls: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_channels() -> String {
    ALL_CHANNELS.to_string()
}

fn default_thread_count() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    16
}

fn default_shutdown_grace() -> u64 {
    60
}

fn default_page_size() -> u32 {
    100
}

fn default_user_cache_size() -> usize {
    10_000
}

fn default_bot_cache_size() -> usize {
    1_000
}

fn default_channel_cache_size() -> usize {
    10_000
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_mime_types() -> Vec<String> {
    vec![".*".to_string()]
}

fn default_true() -> bool {
    true
}
