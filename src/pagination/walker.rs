//! Pagination Walker
//!
//! Follows a continuation field through a report, handing each page to a
//! [`StorageSink`] before the next one is requested.

use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::ReportsClient;
use crate::core::{HttpMethod, HttpResponse};
use crate::error::{ProtocolError, ReportsError, TerminalHttpError};
use crate::pagination::StorageSink;

/// Continuation field used by the reporting API.
pub const DEFAULT_CURSOR_FIELD: &str = "nextPageUrl";

/// A fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based position in the walk.
    pub sequence: usize,
    /// Final response for this page.
    pub response: HttpResponse,
    /// Parsed JSON body, or the raw text when the body is not JSON.
    pub body: Value,
    /// Cursor for the following page, if any.
    pub next_cursor: Option<String>,
}

impl Page {
    /// HTTP status of the page response.
    pub fn status(&self) -> u16 {
        self.response.status
    }

    /// URL the page was fetched from.
    pub fn url(&self) -> &str {
        &self.response.url
    }

    /// Returns true if there is a next page.
    pub fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Where a walk begins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StartPosition {
    /// The starting path given to the walker.
    #[default]
    Beginning,
    /// A cursor recorded from an earlier, interrupted walk.
    Cursor(String),
}

/// Walk options.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// JSON field holding the continuation cursor.
    pub cursor_field: String,
    /// Abort with [`TerminalHttpError`] instead of delivering a non-2xx page.
    pub require_success: bool,
    /// Where to start.
    pub start: StartPosition,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            cursor_field: DEFAULT_CURSOR_FIELD.to_string(),
            require_success: false,
            start: StartPosition::Beginning,
        }
    }
}

impl WalkOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the continuation field.
    pub fn with_cursor_field(mut self, field: impl Into<String>) -> Self {
        self.cursor_field = field.into();
        self
    }

    /// Sets whether non-2xx pages abort the walk.
    pub fn with_require_success(mut self, require: bool) -> Self {
        self.require_success = require;
        self
    }

    /// Resume from a recorded cursor.
    pub fn resume_from(mut self, cursor: impl Into<String>) -> Self {
        self.start = StartPosition::Cursor(cursor.into());
        self
    }
}

/// Walk state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkState {
    /// `cursor` is the next page to fetch.
    HasNext { cursor: String },
    /// `cursor` is being fetched or delivered. Stays here if that fails.
    Fetching { cursor: String },
    /// Page delivered; `next` decides between `HasNext` and `Done`.
    Delivered { next: Option<String> },
    /// No continuation left.
    Done,
}

impl WalkState {
    /// Cursor still to be fetched, including one whose fetch failed.
    pub fn pending_cursor(&self) -> Option<&str> {
        match self {
            Self::HasNext { cursor } | Self::Fetching { cursor } => Some(cursor),
            Self::Delivered { next } => next.as_deref(),
            Self::Done => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Outcome of a completed walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkSummary {
    /// Pages handed to the sink by this walker.
    pub pages_delivered: usize,
    /// Cursor of the final page fetched.
    pub last_cursor: Option<String>,
}

/// Extract the continuation cursor. Absent, `null` and `""` all end the walk.
pub fn extract_cursor(body: &Value, field: &str) -> Result<Option<String>, ProtocolError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(cursor)) if cursor.is_empty() => Ok(None),
        Some(Value::String(cursor)) => Ok(Some(cursor.clone())),
        Some(_) => Err(ProtocolError::InvalidCursor {
            field: field.to_string(),
        }),
    }
}

/// Sequential cursor walker over one report resource.
pub struct PaginationWalker<'a> {
    client: &'a ReportsClient,
    params: Vec<(String, String)>,
    headers: HeaderMap,
    options: WalkOptions,
    state: WalkState,
    delivered: usize,
    last_cursor: Option<String>,
}

impl<'a> PaginationWalker<'a> {
    /// Creates a walker starting at `path`, or at the resume cursor in `options`.
    ///
    /// `params` are applied to every page request.
    pub fn new(
        client: &'a ReportsClient,
        path: impl Into<String>,
        params: Vec<(String, String)>,
        options: WalkOptions,
    ) -> Self {
        let cursor = match &options.start {
            StartPosition::Beginning => path.into(),
            StartPosition::Cursor(cursor) => cursor.clone(),
        };

        Self {
            client,
            params,
            headers: HeaderMap::new(),
            options,
            state: WalkState::HasNext { cursor },
            delivered: 0,
            last_cursor: None,
        }
    }

    /// Extra headers for every page request.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Current state. After a failed walk this holds the cursor to resume from.
    pub fn state(&self) -> &WalkState {
        &self.state
    }

    /// Pages delivered so far.
    pub fn pages_delivered(&self) -> usize {
        self.delivered
    }

    /// Fetch pages and deliver them to `sink` until the cursor runs out.
    ///
    /// Any error aborts the walk. Pages already delivered stay delivered, and
    /// calling `walk` again re-fetches the page that failed.
    pub async fn walk<S>(&mut self, sink: &mut S) -> Result<WalkSummary, ReportsError>
    where
        S: StorageSink + ?Sized,
    {
        while self.next_page(sink).await? {}

        debug!(pages = self.delivered, "Pagination complete");
        Ok(WalkSummary {
            pages_delivered: self.delivered,
            last_cursor: self.last_cursor.clone(),
        })
    }

    /// Fetch and deliver a single page.
    ///
    /// Returns `true` while another page remains. A body that is not JSON is
    /// delivered as raw text and then fails the walk with
    /// [`ProtocolError::InvalidJson`], leaving its cursor pending.
    pub async fn next_page<S>(&mut self, sink: &mut S) -> Result<bool, ReportsError>
    where
        S: StorageSink + ?Sized,
    {
        let cursor = match &self.state {
            WalkState::HasNext { cursor }
            | WalkState::Fetching { cursor }
            | WalkState::Delivered { next: Some(cursor) } => cursor.clone(),
            WalkState::Delivered { next: None } | WalkState::Done => {
                self.state = WalkState::Done;
                return Ok(false);
            }
        };

        self.state = WalkState::Fetching {
            cursor: cursor.clone(),
        };
        let response = self.fetch(&cursor).await?;
        let sequence = self.delivered + 1;

        let body = match response.json::<Value>() {
            Ok(body) => body,
            Err(error) => {
                let page = Page {
                    sequence,
                    body: Value::String(response.text()),
                    response,
                    next_cursor: None,
                };
                sink.deliver(&page).await?;
                self.delivered += 1;
                warn!(
                    sequence = page.sequence,
                    status = page.status(),
                    url = page.url(),
                    "Delivered page with a non-JSON body"
                );
                return Err(error);
            }
        };
        let next_cursor = extract_cursor(&body, &self.options.cursor_field)?;

        let page = Page {
            sequence,
            response,
            body,
            next_cursor,
        };
        sink.deliver(&page).await?;
        self.state = WalkState::Delivered {
            next: page.next_cursor.clone(),
        };
        self.delivered += 1;
        self.last_cursor = Some(cursor);
        info!(
            sequence = page.sequence,
            status = page.status(),
            url = page.url(),
            has_next = page.has_next(),
            "Delivered page"
        );

        self.state = match page.next_cursor {
            Some(cursor) => WalkState::HasNext { cursor },
            None => WalkState::Done,
        };
        Ok(!self.state.is_done())
    }

    async fn fetch(&self, cursor: &str) -> Result<HttpResponse, ReportsError> {
        let response = self
            .client
            .request(HttpMethod::Get, cursor, &self.params, &self.headers)
            .await?;

        if self.options.require_success && !response.is_success() {
            return Err(TerminalHttpError {
                status: response.status,
                url: response.url.clone(),
                body: response.text(),
            }
            .into());
        }

        Ok(response)
    }
}
