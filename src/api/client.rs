use crate::api::decode::{decode, Decoded, HasEnvelope};
use crate::api::transport::Transport;
use crate::api::types::{
    Bot, BotInfoResponse, Channel, ConversationInfoResponse, ConversationsListResponse, File,
    FileInfoResponse, FilesListResponse, MessagesResponse, PermalinkResponse, Team,
    TeamInfoResponse, User, UserInfoResponse, UsersListResponse,
};
use crate::config::{PageSizeConfig, SlackConfig};
use crate::{HarvestError, Result};
use serde::de::DeserializeOwned;

/// Typed wrapper over the Web API methods the crawler consumes
///
/// List methods return the decoded page as-is so the paginator can inspect
/// the envelope. Single-entity methods turn `ok: false` into an error.
#[derive(Debug, Clone)]
pub struct SlackApi {
    transport: Transport,
    page_size: PageSizeConfig,
}

impl SlackApi {
    pub fn new(config: &SlackConfig, page_size: PageSizeConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(config)?,
            page_size,
        })
    }

    /// Calls a method and decodes its body; non-2xx statuses are errors
    async fn get<T>(&self, method: &str, params: &[(&str, String)]) -> Result<Decoded<T>>
    where
        T: DeserializeOwned + HasEnvelope,
    {
        let (status, body) = self.transport.call(method, params).await?;
        if !(200..300).contains(&status) {
            tracing::warn!(
                method = %method,
                status = status,
                body = %body,
                "Slack API returned an HTTP error"
            );
            return Err(HarvestError::Status {
                method: method.to_string(),
                status,
            });
        }
        decode(method, body)
    }

    // ===== Cursor-paginated collections =====

    pub async fn conversations_list(
        &self,
        types: &str,
        cursor: Option<&str>,
    ) -> Result<Decoded<ConversationsListResponse>> {
        let mut params = vec![
            ("types", types.to_string()),
            ("limit", self.page_size.channels.to_string()),
        ];
        push_cursor(&mut params, cursor);
        self.get("conversations.list", &params).await
    }

    pub async fn conversations_history(
        &self,
        channel: &str,
        cursor: Option<&str>,
    ) -> Result<Decoded<MessagesResponse>> {
        let mut params = vec![
            ("channel", channel.to_string()),
            ("limit", self.page_size.messages.to_string()),
        ];
        push_cursor(&mut params, cursor);
        self.get("conversations.history", &params).await
    }

    pub async fn conversations_replies(
        &self,
        channel: &str,
        thread_ts: &str,
        cursor: Option<&str>,
    ) -> Result<Decoded<MessagesResponse>> {
        let mut params = vec![
            ("channel", channel.to_string()),
            ("ts", thread_ts.to_string()),
            ("limit", self.page_size.replies.to_string()),
        ];
        push_cursor(&mut params, cursor);
        self.get("conversations.replies", &params).await
    }

    pub async fn users_list(&self, cursor: Option<&str>) -> Result<Decoded<UsersListResponse>> {
        let mut params = vec![("limit", self.page_size.users.to_string())];
        push_cursor(&mut params, cursor);
        self.get("users.list", &params).await
    }

    // ===== Page-number collections =====

    pub async fn files_list(&self, channel: &str, page: u32) -> Result<Decoded<FilesListResponse>> {
        let params = [
            ("channel", channel.to_string()),
            ("count", self.page_size.files.to_string()),
            ("page", page.to_string()),
        ];
        self.get("files.list", &params).await
    }

    // ===== Single entities =====

    pub async fn conversations_info(&self, channel: &str) -> Result<Channel> {
        let method = "conversations.info";
        let response: ConversationInfoResponse = self
            .get(method, &[("channel", channel.to_string())])
            .await?
            .into_result(method)?;
        response.channel.ok_or_else(|| not_found("channel", channel))
    }

    pub async fn users_info(&self, user: &str) -> Result<User> {
        let method = "users.info";
        let response: UserInfoResponse = self
            .get(method, &[("user", user.to_string())])
            .await?
            .into_result(method)?;
        response.user.ok_or_else(|| not_found("user", user))
    }

    pub async fn bots_info(&self, bot: &str) -> Result<Bot> {
        let method = "bots.info";
        let response: BotInfoResponse = self
            .get(method, &[("bot", bot.to_string())])
            .await?
            .into_result(method)?;
        response.bot.ok_or_else(|| not_found("bot", bot))
    }

    pub async fn files_info(&self, file: &str) -> Result<File> {
        let method = "files.info";
        let response: FileInfoResponse = self
            .get(method, &[("file", file.to_string())])
            .await?
            .into_result(method)?;
        response.file.ok_or_else(|| not_found("file", file))
    }

    pub async fn team_info(&self) -> Result<Team> {
        let method = "team.info";
        let response: TeamInfoResponse = self.get(method, &[]).await?.into_result(method)?;
        response.team.ok_or_else(|| not_found("team", "current"))
    }

    pub async fn get_permalink(&self, channel: &str, message_ts: &str) -> Result<String> {
        let method = "chat.getPermalink";
        let response: PermalinkResponse = self
            .get(
                method,
                &[
                    ("channel", channel.to_string()),
                    ("message_ts", message_ts.to_string()),
                ],
            )
            .await?
            .into_result(method)?;
        response
            .permalink
            .filter(|link| !link.is_empty())
            .ok_or_else(|| not_found("permalink", message_ts))
    }

    /// Downloads file content with the bearer token
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.transport.download(url).await
    }
}

fn push_cursor(params: &mut Vec<(&str, String)>, cursor: Option<&str>) {
    if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
        params.push(("cursor", cursor.to_string()));
    }
}

fn not_found(kind: &'static str, key: &str) -> HarvestError {
    HarvestError::NotFound {
        kind,
        key: key.to_string(),
    }
}
