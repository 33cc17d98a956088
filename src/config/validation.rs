use crate::config::types::{
    CacheConfig, Config, CrawlerConfig, FileConfig, FilterConfig, OutputConfig, PageSizeConfig,
    SlackConfig,
};
use crate::filter::compile_patterns;
use crate::ConfigError;
use url::Url;

/// Largest `limit` the Slack list methods accept
const MAX_PAGE_SIZE: u32 = 1000;

/// Upper bound on the worker pool size
const MAX_THREAD_COUNT: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_slack_config(&config.slack)?;
    validate_crawler_config(&config.crawler)?;
    validate_page_sizes(&config.page_size)?;
    validate_cache_config(&config.cache)?;
    validate_file_config(&config.files)?;
    validate_filter_config(&config.filter)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates token, endpoint and proxy settings
fn validate_slack_config(config: &SlackConfig) -> Result<(), ConfigError> {
    if config.token.trim().is_empty() {
        return Err(ConfigError::Validation("token cannot be empty".to_string()));
    }

    let url = Url::parse(&config.api_base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-base-url: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "api-base-url must use http or https, got '{}'",
            config.api_base_url
        )));
    }

    match (&config.proxy_host, config.proxy_port) {
        (Some(host), _) if host.trim().is_empty() => Err(ConfigError::Validation(
            "proxy-host cannot be empty".to_string(),
        )),
        (Some(host), None) => Err(ConfigError::Validation(format!(
            "proxy-port is required when proxy-host is set (host '{}')",
            host
        ))),
        (None, Some(port)) => Err(ConfigError::Validation(format!(
            "proxy-host is required when proxy-port is set (port {})",
            port
        ))),
        _ => Ok(()),
    }
}

/// Validates worker pool settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.thread_count < 1 || config.thread_count > MAX_THREAD_COUNT {
        return Err(ConfigError::Validation(format!(
            "thread-count must be between 1 and {}, got {}",
            MAX_THREAD_COUNT, config.thread_count
        )));
    }

    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "queue-capacity must be >= 1, got {}",
            config.queue_capacity
        )));
    }

    Ok(())
}

/// Validates per-collection page sizes
fn validate_page_sizes(config: &PageSizeConfig) -> Result<(), ConfigError> {
    for (name, size) in [
        ("channels", config.channels),
        ("messages", config.messages),
        ("replies", config.replies),
        ("users", config.users),
        ("files", config.files),
    ] {
        if size < 1 || size > MAX_PAGE_SIZE {
            return Err(ConfigError::Validation(format!(
                "page-size.{} must be between 1 and {}, got {}",
                name, MAX_PAGE_SIZE, size
            )));
        }
    }
    Ok(())
}

/// Validates entity cache sizes
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    for (name, size) in [
        ("users", config.users),
        ("bots", config.bots),
        ("channels", config.channels),
    ] {
        if size < 1 {
            return Err(ConfigError::Validation(format!(
                "cache.{} must be >= 1, got {}",
                name, size
            )));
        }
    }
    Ok(())
}

/// Validates file crawling settings
fn validate_file_config(config: &FileConfig) -> Result<(), ConfigError> {
    if config.max_size < 1 {
        return Err(ConfigError::Validation(
            "files.max-size must be >= 1".to_string(),
        ));
    }

    compile_patterns(&config.mime_types)?;
    Ok(())
}

/// Validates permalink filter patterns
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    compile_patterns(&config.include_urls)?;
    compile_patterns(&config.exclude_urls)?;
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slack_config() -> SlackConfig {
        SlackConfig {
            token: "xoxb-test".to_string(),
            api_base_url: "https://slack.com/api/".to_string(),
            proxy_host: None,
            proxy_port: None,
            include_private: false,
            channels: "*".to_string(),
        }
    }

    #[test]
    fn test_empty_token_rejected() {
        let mut config = slack_config();
        config.token = "  ".to_string();
        assert!(matches!(
            validate_slack_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_proxy_host_without_port_rejected() {
        let mut config = slack_config();
        config.proxy_host = Some("proxy.local".to_string());
        assert!(validate_slack_config(&config).is_err());

        config.proxy_port = Some(8080);
        assert!(validate_slack_config(&config).is_ok());
    }

    #[test]
    fn test_proxy_port_without_host_rejected() {
        let mut config = slack_config();
        config.proxy_port = Some(8080);
        assert!(validate_slack_config(&config).is_err());
    }

    #[test]
    fn test_bad_api_base_url_rejected() {
        let mut config = slack_config();
        config.api_base_url = "not a url".to_string();
        assert!(matches!(
            validate_slack_config(&config),
            Err(ConfigError::InvalidUrl(_))
        ));

        config.api_base_url = "ftp://slack.com/api/".to_string();
        assert!(validate_slack_config(&config).is_err());
    }

    #[test]
    fn test_thread_count_bounds() {
        let mut config = CrawlerConfig::default();
        assert!(validate_crawler_config(&config).is_ok());

        config.thread_count = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.thread_count = MAX_THREAD_COUNT + 1;
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        let mut config = PageSizeConfig::default();
        assert!(validate_page_sizes(&config).is_ok());

        config.files = 0;
        assert!(validate_page_sizes(&config).is_err());

        config.files = 100;
        config.messages = MAX_PAGE_SIZE + 1;
        assert!(validate_page_sizes(&config).is_err());
    }

    #[test]
    fn test_invalid_mime_pattern_rejected() {
        let config = FileConfig {
            mime_types: vec!["text/(".to_string()],
            ..FileConfig::default()
        };
        assert!(matches!(
            validate_file_config(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_zero_cache_size_rejected() {
        let config = CacheConfig {
            bots: 0,
            ..CacheConfig::default()
        };
        assert!(validate_cache_config(&config).is_err());
    }
}
