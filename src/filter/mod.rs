//! Pattern filters applied to crawled items
//!
//! Two filters are configured from full-match regular expressions:
//! - `UrlFilter` decides whether a record's permalink may be indexed
//! - `MimeTypeFilter` decides whether a file is downloaded at all

use crate::config::{FileConfig, FilterConfig};
use crate::ConfigError;
use regex::Regex;

/// Compiles patterns so that each must match the whole candidate string
///
/// # Example
///
/// ```
/// use slack_harvest::filter::compile_patterns;
///
/// let patterns = compile_patterns(&["text/.*".to_string()]).unwrap();
/// assert!(patterns[0].is_match("text/plain"));
/// assert!(!patterns[0].is_match("application/text/plain"));
/// ```
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                ConfigError::InvalidPattern(format!("'{}': {}", pattern, e))
            })
        })
        .collect()
}

/// Include/exclude filter over permalinks
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl UrlFilter {
    pub fn new(config: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile_patterns(&config.include_urls)?,
            exclude: compile_patterns(&config.exclude_urls)?,
        })
    }

    /// Returns true when the URL may be indexed
    ///
    /// An empty include list admits everything; any exclude match rejects.
    pub fn matches(&self, url: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(url)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(url))
    }
}

/// Allow-list of MIME types for file crawling
#[derive(Debug, Clone)]
pub struct MimeTypeFilter {
    allowed: Vec<Regex>,
}

impl MimeTypeFilter {
    pub fn new(config: &FileConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            allowed: compile_patterns(&config.mime_types)?,
        })
    }

    pub fn allows(&self, mimetype: &str) -> bool {
        self.allowed.iter().any(|re| re.is_match(mimetype))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url_filter(include: &[&str], exclude: &[&str]) -> UrlFilter {
        UrlFilter::new(&FilterConfig {
            include_urls: include.iter().map(|s| s.to_string()).collect(),
            exclude_urls: exclude.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_empty_filter_admits_everything() {
        let filter = UrlFilter::default();
        assert!(filter.matches("https://acme.slack.com/archives/C1/p1"));
    }

    #[test]
    fn test_include_list_is_required_match() {
        let filter = url_filter(&["https://acme\\.slack\\.com/.*"], &[]);
        assert!(filter.matches("https://acme.slack.com/archives/C1/p1"));
        assert!(!filter.matches("https://other.slack.com/archives/C1/p1"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter = url_filter(&[".*"], &[".*/archives/C2/.*"]);
        assert!(filter.matches("https://acme.slack.com/archives/C1/p1"));
        assert!(!filter.matches("https://acme.slack.com/archives/C2/p1"));
    }

    #[test]
    fn test_patterns_are_full_match() {
        let filter = url_filter(&["acme"], &[]);
        assert!(!filter.matches("https://acme.slack.com/"));
    }

    #[test]
    fn test_mime_allow_list() {
        let filter = MimeTypeFilter::new(&FileConfig {
            mime_types: vec!["text/.*".to_string(), "application/json".to_string()],
            ..FileConfig::default()
        })
        .unwrap();

        assert!(filter.allows("text/plain"));
        assert!(filter.allows("text/html"));
        assert!(filter.allows("application/json"));
        assert!(!filter.allows("image/png"));
        assert!(!filter.allows("application/jsonp"));
    }

    #[test]
    fn test_default_mime_list_allows_all() {
        let filter = MimeTypeFilter::new(&FileConfig::default()).unwrap();
        assert!(filter.allows("application/pdf"));
        assert!(filter.allows(""));
    }

    #[test]
    fn test_invalid_pattern_reported() {
        let result = compile_patterns(&["(unclosed".to_string()]);
        assert!(matches!(result, Err(ConfigError::InvalidPattern(_))));
    }
}
