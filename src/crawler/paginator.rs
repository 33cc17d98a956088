//! Sequential pagination over Slack collections
//!
//! Slack uses two continuation styles:
//!
//! | Style  | Wire shape                            | Continue while        |
//! |--------|---------------------------------------|-----------------------|
//! | Cursor | `response_metadata.next_cursor`       | cursor is non-empty   |
//! | Page   | `paging.page`, `paging.pages`         | `page < pages`        |
//!
//! A `Paginator` requests one page at a time and only asks for the next page
//! once the caller has consumed the current one, so a collection is never
//! fetched concurrently. An `ok: false` page is logged with its raw body and
//! ends the stream quietly; `outcome()` tells the two endings apart.

use crate::api::{
    ConversationsListResponse, Decoded, FilesListResponse, HasEnvelope, MessagesResponse,
    ResponseMetadata, UsersListResponse,
};
use crate::api::{Channel, File, Message, User};
use crate::Result;
use std::future::Future;
use std::marker::PhantomData;

/// Continuation token passed back to the fetch function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageToken {
    Cursor(String),
    Page(u32),
}

impl PageToken {
    /// Cursor to send, `None` on the first request
    pub fn cursor(token: Option<&PageToken>) -> Option<&str> {
        match token {
            Some(PageToken::Cursor(cursor)) => Some(cursor.as_str()),
            _ => None,
        }
    }

    /// Page number to send, starting at 1
    pub fn page(token: Option<&PageToken>) -> u32 {
        match token {
            Some(PageToken::Page(page)) => *page,
            _ => 1,
        }
    }
}

/// How a pagination stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Still has pages to fetch
    Pending,
    /// The last page said there was nothing more
    Exhausted,
    /// Slack answered `ok: false` with this error code
    ApiError(String),
    /// The fetch itself failed (transport or decode)
    Failed,
}

/// A response type that carries one page of a collection
pub trait Paginated: HasEnvelope {
    type Item;

    /// Token for the following page, `None` when this is the last page
    fn next_token(&self) -> Option<PageToken>;

    fn into_items(self) -> Vec<Self::Item>;
}

fn cursor_token(metadata: Option<&ResponseMetadata>) -> Option<PageToken> {
    metadata
        .map(|m| m.next_cursor.trim())
        .filter(|cursor| !cursor.is_empty())
        .map(|cursor| PageToken::Cursor(cursor.to_string()))
}

impl Paginated for ConversationsListResponse {
    type Item = Channel;

    fn next_token(&self) -> Option<PageToken> {
        cursor_token(self.response_metadata.as_ref())
    }

    fn into_items(self) -> Vec<Channel> {
        self.channels
    }
}

impl Paginated for UsersListResponse {
    type Item = User;

    fn next_token(&self) -> Option<PageToken> {
        cursor_token(self.response_metadata.as_ref())
    }

    fn into_items(self) -> Vec<User> {
        self.members
    }
}

impl Paginated for MessagesResponse {
    type Item = Message;

    fn next_token(&self) -> Option<PageToken> {
        cursor_token(self.response_metadata.as_ref())
    }

    fn into_items(self) -> Vec<Message> {
        self.messages
    }
}

impl Paginated for FilesListResponse {
    type Item = File;

    fn next_token(&self) -> Option<PageToken> {
        let paging = self.paging.as_ref()?;
        if paging.page < paging.pages {
            Some(PageToken::Page(paging.page + 1))
        } else {
            None
        }
    }

    fn into_items(self) -> Vec<File> {
        self.files
    }
}

/// Drives a fetch function across all pages of one collection
pub struct Paginator<P, F> {
    method: &'static str,
    fetch: F,
    next: Option<Option<PageToken>>,
    outcome: PageOutcome,
    pages_fetched: usize,
    _page: PhantomData<fn() -> P>,
}

impl<P, F, Fut> Paginator<P, F>
where
    P: Paginated,
    F: FnMut(Option<PageToken>) -> Fut,
    Fut: Future<Output = Result<Decoded<P>>>,
{
    /// Creates a paginator; `fetch` receives `None` for the first page
    ///
    /// # Example
    ///
    /// ```no_run
    /// use slack_harvest::api::SlackApi;
    /// use slack_harvest::crawler::{PageToken, Paginator};
    ///
    /// # async fn example(api: &SlackApi) -> slack_harvest::Result<()> {
    /// let mut history = Paginator::new("conversations.history", |token: Option<PageToken>| async move {
    ///     api.conversations_history("C1", PageToken::cursor(token.as_ref())).await
    /// });
    /// while let Some(messages) = history.next_page().await? {
    ///     println!("{} messages", messages.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(method: &'static str, fetch: F) -> Self {
        Self {
            method,
            fetch,
            next: Some(None),
            outcome: PageOutcome::Pending,
            pages_fetched: 0,
            _page: PhantomData,
        }
    }

    /// Fetches the next page
    ///
    /// Returns `Ok(None)` once the collection is exhausted or Slack reported
    /// an error; transport and decode failures are returned as `Err` and also
    /// end the stream.
    pub async fn next_page(&mut self) -> Result<Option<Vec<P::Item>>> {
        let Some(token) = self.next.take() else {
            return Ok(None);
        };

        let page = match (self.fetch)(token).await {
            Ok(page) => page,
            Err(e) => {
                self.outcome = PageOutcome::Failed;
                return Err(e);
            }
        };

        if !page.is_ok() {
            tracing::warn!(
                method = %self.method,
                error = %page.error_code(),
                body = %page.raw,
                pages_fetched = self.pages_fetched,
                "Slack API error, stopping pagination"
            );
            self.outcome = PageOutcome::ApiError(page.error_code().to_string());
            return Ok(None);
        }

        self.pages_fetched += 1;
        match page.value.next_token() {
            Some(token) => self.next = Some(Some(token)),
            None => self.outcome = PageOutcome::Exhausted,
        }

        Ok(Some(page.value.into_items()))
    }

    /// Hands every item to `on_item`, page by page, and reports how the stream ended
    pub async fn for_each<G>(mut self, mut on_item: G) -> Result<PageOutcome>
    where
        G: FnMut(P::Item),
    {
        while let Some(items) = self.next_page().await? {
            for item in items {
                on_item(item);
            }
        }
        Ok(self.outcome)
    }

    /// Drains the whole collection into a vector
    pub async fn collect(self) -> Result<Vec<P::Item>> {
        let mut all = Vec::new();
        self.for_each(|item| all.push(item)).await?;
        Ok(all)
    }

    pub fn outcome(&self) -> &PageOutcome {
        &self.outcome
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}
