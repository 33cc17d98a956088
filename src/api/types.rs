//! Wire types for the Slack Web API
//!
//! Field names follow Slack's snake_case JSON directly. Everything that may be
//! absent upstream is either optional or defaulted so a partially populated
//! object still decodes.

use crate::api::decode::{Envelope, HasEnvelope};
use serde::{Deserialize, Serialize};

/// A conversation (public or private channel)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_channel: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub members: Vec<String>,
}

/// A workspace member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

impl User {
    /// Best human-readable name: display name, then real name, then username, then id
    pub fn display_name(&self) -> String {
        let profile = self.profile.as_ref();
        [
            profile.and_then(|p| p.display_name.as_deref()),
            self.real_name.as_deref(),
            profile.and_then(|p| p.real_name.as_deref()),
            Some(self.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .unwrap_or(&self.id)
        .to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image_48: Option<String>,
    #[serde(default)]
    pub image_72: Option<String>,
    #[serde(default)]
    pub image_192: Option<String>,
    #[serde(default)]
    pub image_512: Option<String>,
}

/// A bot integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// The workspace itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
}

/// A channel message or thread reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type", default)]
    pub message_type: String,
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    /// Display name bots post under
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub files: Vec<File>,
    #[serde(default)]
    pub is_thread_broadcast: bool,
    #[serde(default)]
    pub comment: Option<Comment>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// How a message's author is resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageKind<'a> {
    Bot {
        bot_id: Option<&'a str>,
        username: Option<&'a str>,
    },
    FileComment(Option<&'a Comment>),
    Standard(Option<&'a str>),
}

impl Message {
    pub fn kind(&self) -> MessageKind<'_> {
        match self.subtype.as_deref() {
            Some("bot_message") => MessageKind::Bot {
                bot_id: self.bot_id.as_deref(),
                username: self.username.as_deref(),
            },
            Some("file_comment") => MessageKind::FileComment(self.comment.as_ref()),
            _ => MessageKind::Standard(self.user.as_deref()),
        }
    }

    /// Reply that Slack also copied into the channel timeline
    pub fn is_broadcast(&self) -> bool {
        self.is_thread_broadcast || self.subtype.as_deref() == Some("thread_broadcast")
    }

    /// Message whose replies should be walked
    pub fn starts_thread(&self) -> bool {
        self.thread_ts.is_some() && !self.is_broadcast()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub fallback: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// An uploaded file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub mimetype: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url_private_download: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
}

impl File {
    pub fn display_title(&self) -> String {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.id)
            .to_string()
    }
}

/// A file comment, only used to find the author of a `file_comment` message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, alias = "comment")]
    pub text: String,
}

/// Cursor pagination metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

/// Page-number pagination metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub count: u32,
    /// Number of items across all pages, not the page count
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub page: u32,
    /// Number of pages; pagination stops once `page` reaches it
    #[serde(default, alias = "total_pages")]
    pub pages: u32,
}

// ===== Responses =====

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationsListResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersListResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub members: Vec<User>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

/// Shared by `conversations.history` and `conversations.replies`
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilesListResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub files: Vec<File>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationInfoResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub channel: Option<Channel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfoResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotInfoResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub bot: Option<Bot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfoResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub file: Option<File>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamInfoResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub team: Option<Team>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermalinkResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub permalink: Option<String>,
}

macro_rules! impl_envelope {
    ($($response:ty),* $(,)?) => {
        $(
            impl HasEnvelope for $response {
                fn envelope(&self) -> &Envelope {
                    &self.envelope
                }
            }
        )*
    };
}

impl_envelope!(
    ConversationsListResponse,
    UsersListResponse,
    MessagesResponse,
    FilesListResponse,
    ConversationInfoResponse,
    UserInfoResponse,
    BotInfoResponse,
    FileInfoResponse,
    TeamInfoResponse,
    PermalinkResponse,
);
