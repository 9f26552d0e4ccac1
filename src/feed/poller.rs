use std::time::Duration;

use async_trait::async_trait;

use crate::client::Connection;
use crate::error::ClientError;
use crate::feed::{FeedInfo, FeedPage, ALL_FEED};
use crate::types::SequenceNumber;

const FEEDS_RESOURCE: &str = "feeds";

/// Longest server-side wait a long-poll may ask for.
pub const MAX_WAIT: Duration = Duration::from_secs(60);

/// Response header carrying the feed's current sequence number on head-only
/// queries.
pub const CURRENT_SEQUENCE_NUMBER_HEADER: &str = "Feed-Current-Sequence-Number";

/// Restricts a poll to the slice of aggregate ids whose hash modulo `count`
/// equals `number`.
///
/// Partitions let several independent consumers split one feed without
/// overlap. Entries of one aggregate always land in the same partition, so
/// per-aggregate ordering survives the split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    count: u32,
    number: u32,
}

impl Partition {
    pub fn new(count: u32, number: u32) -> Result<Self, ClientError> {
        if count < 2 {
            return Err(ClientError::Validation(format!(
                "partition count must be at least 2, got {}",
                count
            )));
        }
        if number >= count {
            return Err(ClientError::Validation(format!(
                "partition number must be less than count {}, got {}",
                count, number
            )));
        }
        Ok(Self { count, number })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn number(&self) -> u32 {
        self.number
    }
}

/// One bounded feed fetch, validated at construction.
///
/// A successfully built query never fails locally when polled: every
/// precondition (non-negative position, wait window, partition arguments,
/// type filter scope) is checked here, before any network call.
#[derive(Debug, Clone)]
pub struct FeedQuery {
    feed: String,
    since: SequenceNumber,
    limit: Option<usize>,
    wait: Option<Duration>,
    partition: Option<Partition>,
    types: Vec<String>,
}

impl FeedQuery {
    pub fn new(feed: impl Into<String>, since: SequenceNumber) -> Result<Self, ClientError> {
        let feed = feed.into();
        if feed.is_empty() {
            return Err(ClientError::Validation("feed name must not be empty".to_string()));
        }
        if since < 0 {
            return Err(ClientError::Validation(format!(
                "feed position must not be negative, got {}",
                since
            )));
        }

        Ok(Self {
            feed,
            since,
            limit: None,
            wait: None,
            partition: None,
            types: Vec::new(),
        })
    }

    /// Maximum number of entries per page.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Long-poll server-side for up to `wait` (at most 60s) before returning
    /// an empty page.
    pub fn wait(mut self, wait: Duration) -> Result<Self, ClientError> {
        if wait > MAX_WAIT {
            return Err(ClientError::Validation(format!(
                "wait must not exceed {}s, got {}s",
                MAX_WAIT.as_secs(),
                wait.as_secs()
            )));
        }
        self.wait = Some(wait);
        Ok(self)
    }

    pub fn partition(mut self, partition: Partition) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Restricts the poll to the given aggregate types. Only the synthetic
    /// all-aggregates feed spans types, so a filter on any other feed is
    /// rejected.
    pub fn types(mut self, types: Vec<String>) -> Result<Self, ClientError> {
        if self.feed != ALL_FEED {
            return Err(ClientError::Validation(format!(
                "type filter is only valid on the `{}` feed, not `{}`",
                ALL_FEED, self.feed
            )));
        }
        self.types = types;
        Ok(self)
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    pub fn since(&self) -> SequenceNumber {
        self.since
    }

    /// The same query repositioned at `since`, for pagination.
    pub(crate) fn at(&self, since: SequenceNumber) -> Self {
        let mut query = self.clone();
        query.since = since;
        query
    }

    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("since", self.since.to_string())];
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(wait) = self.wait {
            params.push(("wait", wait.as_secs().to_string()));
        }
        if let Some(partition) = self.partition {
            params.push(("partitionCount", partition.count.to_string()));
            params.push(("partitionNumber", partition.number.to_string()));
        }
        if !self.types.is_empty() {
            params.push(("types", self.types.join(",")));
        }
        params
    }
}

/// Issues one bounded fetch of feed entries.
///
/// Implemented over HTTP by [`HttpFeedPoller`]; consumer tests script their
/// own sequence of pages against this trait.
#[async_trait]
pub trait FeedPoller: Send + Sync {
    async fn poll(&self, query: &FeedQuery) -> Result<FeedPage, ClientError>;
}

/// [`FeedPoller`] backed by the remote store's feeds resource.
#[derive(Debug, Clone)]
pub struct HttpFeedPoller {
    connection: Connection,
}

impl HttpFeedPoller {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Lists the feeds the store currently exposes.
    pub async fn list_feeds(&self) -> Result<Vec<FeedInfo>, ClientError> {
        let url = self.connection.url(&[FEEDS_RESOURCE]);
        let response = self.connection.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// The feed's current head position, fetched without transferring entries.
    pub async fn current_sequence_number(&self, feed: &str) -> Result<SequenceNumber, ClientError> {
        let url = self.connection.url(&[FEEDS_RESOURCE, feed]);
        let response = self.connection.head(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        response
            .headers()
            .get(CURRENT_SEQUENCE_NUMBER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| ClientError::Http {
                status: status.as_u16(),
                body: format!("missing or invalid {} header", CURRENT_SEQUENCE_NUMBER_HEADER),
            })
    }
}

#[async_trait]
impl FeedPoller for HttpFeedPoller {
    #[tracing::instrument(skip_all, fields(feed = %query.feed(), since = query.since()), err)]
    async fn poll(&self, query: &FeedQuery) -> Result<FeedPage, ClientError> {
        let url = self.connection.url(&[FEEDS_RESOURCE, query.feed()]);
        let response = self
            .connection
            .get(url)
            .query(&query.query_params())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}
