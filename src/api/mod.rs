//! Slack Web API access
//!
//! This module contains the network-facing half of the crawler:
//! - `Transport`: authenticated HTTP calls and file downloads
//! - `decode`: typed decoding that keeps the raw body for diagnostics
//! - `SlackApi`: one method per Web API endpoint the crawler uses
//! - Wire types for channels, users, bots, messages and files

mod client;
mod decode;
mod transport;
mod types;

pub use client::SlackApi;
pub use decode::{decode, Decoded, Envelope, HasEnvelope};
pub use transport::{build_http_client, Transport};
pub use types::{
    Attachment, Bot, BotInfoResponse, Channel, Comment, ConversationInfoResponse,
    ConversationsListResponse, File, FileInfoResponse, FilesListResponse, Message, MessageKind,
    MessagesResponse, Paging, PermalinkResponse, ResponseMetadata, Team, TeamInfoResponse, User,
    UserInfoResponse, UserProfile, UsersListResponse,
};
