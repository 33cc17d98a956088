//! Slack-Harvest: a rate-limit-aware Slack workspace crawler
//!
//! This crate walks a Slack workspace's channels, messages, thread replies
//! and files through the Web API and turns each item into a flat record for
//! an indexing pipeline, tolerating per-item failures along the way.

pub mod api;
pub mod cache;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod filter;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Slack-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error calling {method}: {source}")]
    Http {
        method: String,
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP status {status} from {method}")]
    Status { method: String, status: u16 },

    #[error("Slack API error from {method}: {error}")]
    Api { method: String, error: String },

    #[error("Failed to decode {method} response: {source}")]
    Decode {
        method: String,
        source: serde_json::Error,
    },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("URL excluded by crawl filter: {url}")]
    Excluded { url: String },

    #[error("File {name} is {size} bytes, exceeding the {max} byte limit")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("Content extraction failed for {mimetype}: {source}")]
    Extraction {
        mimetype: String,
        source: extract::ExtractError,
    },

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Worker task failed: {0}")]
    Task(String),

    #[error("Item processing panicked: {0}")]
    Panicked(String),
}

impl HarvestError {
    /// Stable label used when reporting a failed item to the failure store
    pub fn classification(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Http { source, .. } | Self::Client(source) => {
                if source.is_timeout() {
                    "HttpTimeout"
                } else if source.is_connect() {
                    "HttpConnect"
                } else {
                    "HttpError"
                }
            }
            Self::Status { status: 429, .. } => "RateLimited",
            Self::Status { .. } => "HttpStatus",
            Self::Api { .. } => "ApiError",
            Self::Decode { .. } => "DecodeError",
            Self::Excluded { .. } => "Excluded",
            Self::FileTooLarge { .. } => "FileTooLarge",
            Self::Extraction { source, .. } => source.classification(),
            Self::NotFound { .. } => "NotFound",
            Self::Storage(_) => "StorageError",
            Self::Task(_) => "TaskFailed",
            Self::Panicked(_) => "Panic",
        }
    }

    /// Errors that abort the whole run instead of a single stream or item
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Decode { .. })
    }

    /// Innermost error in the source chain, rendered for failure reports
    pub fn root_cause(&self) -> String {
        let mut current: &dyn std::error::Error = self;
        while let Some(source) = current.source() {
            current = source;
        }
        current.to_string()
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Slack-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Coordinator;
pub use output::CrawlSummary;
pub use state::ChannelPhase;
