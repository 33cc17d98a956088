//! Record building
//!
//! Turns a message, reply or file into the flat `IndexRecord` handed to the
//! indexing sink. This is where authors are resolved, permalinks are found
//! or synthesized, and file size, MIME type and extraction rules apply.

use crate::api::{Attachment, Channel, File, Message, MessageKind, SlackApi, Team};
use crate::cache::EntityCache;
use crate::config::Config;
use crate::extract::ContentExtractor;
use crate::filter::{MimeTypeFilter, UrlFilter};
use crate::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What an `IndexRecord` was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Message,
    Reply,
    File,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Message => "message",
            RecordKind::Reply => "reply",
            RecordKind::File => "file",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "message" => Some(RecordKind::Message),
            "reply" => Some(RecordKind::Reply),
            "file" => Some(RecordKind::File),
            _ => None,
        }
    }
}

/// One document for the indexing pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub kind: RecordKind,
    pub title: String,
    /// Message text, or extracted file content
    pub text: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub user: String,
    pub channel: String,
    pub permalink: String,
    /// Attachment fallbacks, one per line
    pub attachments: String,
    /// Configured default fields
    pub fields: BTreeMap<String, String>,
}

/// Builds `https://<domain>.slack.com/archives/<channel>/p<ts without dot>`
///
/// # Example
///
/// ```
/// use slack_harvest::crawler::synthesize_permalink;
///
/// assert_eq!(
///     synthesize_permalink("acme", "C1", "123.456"),
///     "https://acme.slack.com/archives/C1/p123456"
/// );
/// ```
pub fn synthesize_permalink(domain: &str, channel_id: &str, ts: &str) -> String {
    format!(
        "https://{}.slack.com/archives/{}/p{}",
        domain,
        channel_id,
        ts.replace('.', "")
    )
}

/// Converts a Slack `ts` ("seconds.micros") to milliseconds
///
/// Returns `None` when the seconds part is not a number.
pub fn ts_to_millis(ts: &str) -> Option<i64> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, ""));
    let secs: i64 = secs.trim().parse().ok()?;

    let millis: String = frac
        .chars()
        .take_while(char::is_ascii_digit)
        .chain(std::iter::repeat('0'))
        .take(3)
        .collect();
    let millis: i64 = millis.parse().ok()?;

    secs.checked_mul(1000)?.checked_add(millis)
}

/// Joins the non-empty attachment fallbacks with newlines
pub fn attachment_text(attachments: &[Attachment]) -> String {
    attachments
        .iter()
        .filter_map(|a| a.fallback.as_deref())
        .filter(|fallback| !fallback.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resolves authors and permalinks and applies file rules
pub struct RecordBuilder {
    api: Arc<SlackApi>,
    cache: Arc<EntityCache>,
    team: Option<Team>,
    extractor: Arc<dyn ContentExtractor>,
    url_filter: UrlFilter,
    mime_filter: MimeTypeFilter,
    max_file_size: u64,
    ignore_extract_errors: bool,
    default_fields: BTreeMap<String, String>,
}

impl RecordBuilder {
    /// Creates a builder
    ///
    /// # Arguments
    ///
    /// * `api` - Slack client used for permalink and `files.info` fallbacks
    /// * `cache` - Entity cache used to resolve authors
    /// * `team` - Workspace metadata; enables permalink synthesis when known
    /// * `extractor` - Turns downloaded file bytes into text
    /// * `config` - Filters, file limits and default fields
    pub fn new(
        api: Arc<SlackApi>,
        cache: Arc<EntityCache>,
        team: Option<Team>,
        extractor: Arc<dyn ContentExtractor>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            api,
            cache,
            team,
            extractor,
            url_filter: UrlFilter::new(&config.filter)?,
            mime_filter: MimeTypeFilter::new(&config.files)?,
            max_file_size: config.files.max_size,
            ignore_extract_errors: config.files.ignore_error,
            default_fields: config.default_fields.clone(),
        })
    }

    /// Team domain, when it is usable for permalink synthesis
    fn team_domain(&self) -> Option<&str> {
        self.team
            .as_ref()
            .map(|team| team.domain.as_str())
            .filter(|domain| !domain.is_empty())
    }

    /// Builds the record for a channel message or thread reply
    pub async fn message_record(
        &self,
        channel: &Channel,
        message: &Message,
        kind: RecordKind,
    ) -> Result<IndexRecord> {
        let user = self.author(message).await;
        let permalink = self.message_permalink(channel, message).await?;
        self.check_url(&permalink)?;

        let timestamp = ts_to_millis(&message.ts).unwrap_or_else(|| {
            tracing::debug!(ts = %message.ts, "Unparsable message timestamp");
            0
        });

        Ok(IndexRecord {
            kind,
            title: message.text.clone(),
            text: message.text.clone(),
            timestamp,
            user,
            channel: channel_label(channel),
            permalink,
            attachments: attachment_text(&message.attachments),
            fields: self.default_fields.clone(),
        })
    }

    /// Builds the record for a file, or `None` when its MIME type is not allowed
    ///
    /// Oversized files are rejected before anything is downloaded.
    pub async fn file_record(&self, channel: &Channel, file: &File) -> Result<Option<IndexRecord>> {
        self.check_size(file)?;
        if !self.mime_filter.allows(&file.mimetype) {
            tracing::debug!(
                file = %file.id,
                mimetype = %file.mimetype,
                "Skipping file with unlisted MIME type"
            );
            return Ok(None);
        }

        let refreshed;
        let file = if file.url_private_download.is_none() || file.permalink.is_none() {
            refreshed = self.api.files_info(&file.id).await?;
            self.check_size(&refreshed)?;
            &refreshed
        } else {
            file
        };

        let permalink = file
            .permalink
            .clone()
            .filter(|link| !link.is_empty())
            .ok_or_else(|| HarvestError::NotFound {
                kind: "permalink",
                key: file.id.clone(),
            })?;
        self.check_url(&permalink)?;

        let download_url = file
            .url_private_download
            .as_deref()
            .ok_or_else(|| HarvestError::NotFound {
                kind: "download URL",
                key: file.id.clone(),
            })?;
        let bytes = self.api.download(download_url).await?;
        let content = self.extract(&file.id, bytes, &file.mimetype).await?;

        Ok(Some(IndexRecord {
            kind: RecordKind::File,
            title: file.display_title(),
            text: content,
            timestamp: file.timestamp.saturating_mul(1000),
            user: self.user_name(file.user.as_deref()).await,
            channel: channel_label(channel),
            permalink,
            attachments: String::new(),
            fields: self.default_fields.clone(),
        }))
    }

    /// URL to report a failed message under, computed without network calls
    pub fn message_failure_url(&self, channel: &Channel, message: &Message) -> String {
        if let Some(link) = message.permalink.as_deref().filter(|l| !l.is_empty()) {
            return link.to_string();
        }
        match self.team_domain() {
            Some(domain) => synthesize_permalink(domain, &channel.id, &message.ts),
            None => format!("slack://{}/{}", channel.id, message.ts),
        }
    }

    /// URL to report a failed file under
    pub fn file_failure_url(&self, channel: &Channel, file: &File) -> String {
        file.permalink
            .clone()
            .filter(|link| !link.is_empty())
            .unwrap_or_else(|| format!("slack://{}/{}", channel.id, file.id))
    }

    async fn author(&self, message: &Message) -> String {
        match message.kind() {
            MessageKind::Bot { bot_id, username } => self.bot_name(bot_id, username).await,
            MessageKind::FileComment(comment) => {
                self.user_name(comment.and_then(|c| c.user.as_deref()))
                    .await
            }
            MessageKind::Standard(user) => self.user_name(user).await,
        }
    }

    /// Display name for a user id; the raw id if lookup fails, empty if absent
    async fn user_name(&self, user_id: Option<&str>) -> String {
        let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
            return String::new();
        };
        match self.cache.user(user_id).await {
            Ok(user) => user.display_name(),
            Err(e) => {
                tracing::debug!(user = %user_id, error = %e, "Could not resolve user, using id");
                user_id.to_string()
            }
        }
    }

    async fn bot_name(&self, bot_id: Option<&str>, username: Option<&str>) -> String {
        if let Some(bot_id) = bot_id {
            match self.cache.bot(bot_id).await {
                Ok(bot) if !bot.name.is_empty() => return bot.name,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(bot = %bot_id, error = %e, "Could not resolve bot");
                }
            }
        }
        username
            .filter(|name| !name.is_empty())
            .or(bot_id)
            .unwrap_or_default()
            .to_string()
    }

    async fn message_permalink(&self, channel: &Channel, message: &Message) -> Result<String> {
        if let Some(link) = message.permalink.as_deref().filter(|l| !l.is_empty()) {
            return Ok(link.to_string());
        }
        if let Some(domain) = self.team_domain() {
            return Ok(synthesize_permalink(domain, &channel.id, &message.ts));
        }
        self.api.get_permalink(&channel.id, &message.ts).await
    }

    fn check_url(&self, url: &str) -> Result<()> {
        if self.url_filter.matches(url) {
            Ok(())
        } else {
            Err(HarvestError::Excluded {
                url: url.to_string(),
            })
        }
    }

    fn check_size(&self, file: &File) -> Result<()> {
        if file.size > self.max_file_size {
            return Err(HarvestError::FileTooLarge {
                name: file.display_title(),
                size: file.size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    async fn extract(&self, file_id: &str, bytes: Vec<u8>, mimetype: &str) -> Result<String> {
        let extractor = Arc::clone(&self.extractor);
        let owned_mimetype = mimetype.to_string();
        let result = tokio::task::spawn_blocking(move || extractor.extract(&bytes, &owned_mimetype))
            .await
            .map_err(|e| HarvestError::Task(e.to_string()))?;

        match result {
            Ok(text) => Ok(text),
            Err(e) if self.ignore_extract_errors => {
                tracing::warn!(
                    file = %file_id,
                    mimetype = %mimetype,
                    error = %e,
                    "Extraction failed, indexing file without content"
                );
                Ok(String::new())
            }
            Err(source) => Err(HarvestError::Extraction {
                mimetype: mimetype.to_string(),
                source,
            }),
        }
    }
}

fn channel_label(channel: &Channel) -> String {
    if channel.name.is_empty() {
        channel.id.clone()
    } else {
        channel.name.clone()
    }
}
