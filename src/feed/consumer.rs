use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::error::ClientError;
use crate::feed::cursor::SequenceCursor;
use crate::feed::poller::{FeedPoller, FeedQuery, Partition};
use crate::feed::{FeedEntry, FeedPage};
use crate::types::SequenceNumber;

/// What an [`EntryHandler`] decided about one feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The entry was handled; the cursor advances past it.
    Processed,
    /// The entry was not handled; the cursor stays put so the entry is
    /// redelivered on a later replay, and consumption continues with the
    /// next entry.
    RetryRequested,
}

/// Caller-supplied per-entry callback.
///
/// Delivery is at-least-once: a crash between handling and cursor
/// advancement redelivers the entry, so handlers must be idempotent.
/// Returning an error fail-stops the drain (and, inside a subscription,
/// terminates that subscription).
#[async_trait]
pub trait EntryHandler: Send + Sync {
    async fn handle(
        &self,
        entry: &FeedEntry,
    ) -> Result<EntryOutcome, Box<dyn std::error::Error + Send + Sync>>;
}

/// Tunables for a [`FeedConsumer`].
#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    /// Keep polling while pages report more entries, without waiting.
    pub eager_fetching: bool,
    /// Pause between subscription cycles, measured from the end of one drain
    /// to the start of the next.
    pub poll_delay: Duration,
    pub limit: Option<usize>,
    pub wait: Option<Duration>,
    pub partition: Option<Partition>,
    pub types: Vec<String>,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            eager_fetching: true,
            poll_delay: Duration::from_secs(2),
            limit: None,
            wait: None,
            partition: None,
            types: Vec::new(),
        }
    }
}

/// Identifies one subscription within its [`FeedConsumer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A running subscription: its shutdown signal and the polling task.
struct Subscription {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Signals the task to stop and waits for it to finish. An in-flight
    /// poll runs to completion first; no callbacks fire after this returns.
    async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

/// Drives a [`FeedPoller`] in a loop, delivering entries to a caller handler
/// and advancing the cursor after each successfully handled entry.
///
/// One-shot consumption goes through [`FeedConsumer::drain_all`]; continuous
/// consumption through [`FeedConsumer::subscribe`], which re-runs the drain
/// on a fixed delay until stopped. Each subscription runs on its own task,
/// so its handler invocations never overlap; distinct subscriptions are
/// independent of each other.
pub struct FeedConsumer {
    feed: String,
    poller: Arc<dyn FeedPoller>,
    cursor: Arc<dyn SequenceCursor>,
    options: Arc<ConsumerOptions>,
    next_subscription_id: AtomicU64,
    subscriptions: Mutex<HashMap<SubscriptionId, Subscription>>,
}

impl FeedConsumer {
    pub fn new(
        feed: impl Into<String>,
        poller: Arc<dyn FeedPoller>,
        cursor: Arc<dyn SequenceCursor>,
    ) -> Self {
        Self::with_options(feed, poller, cursor, ConsumerOptions::default())
    }

    pub fn with_options(
        feed: impl Into<String>,
        poller: Arc<dyn FeedPoller>,
        cursor: Arc<dyn SequenceCursor>,
        options: ConsumerOptions,
    ) -> Self {
        Self {
            feed: feed.into(),
            poller,
            cursor,
            options: Arc::new(options),
            next_subscription_id: AtomicU64::new(0),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    pub fn cursor(&self) -> &dyn SequenceCursor {
        self.cursor.as_ref()
    }

    /// One bounded fetch from `since`, without touching the cursor. Pacing
    /// and handling are the caller's.
    pub async fn drain_once(&self, since: SequenceNumber) -> Result<FeedPage, ClientError> {
        let query = build_query(&self.feed, &self.options, since)?;
        self.poller.poll(&query).await
    }

    /// Polls from `since` and hands every entry to `handler` in feed order,
    /// advancing the cursor past each processed entry. With eager fetching
    /// (the default), follow-up pages are fetched immediately while the store
    /// reports more; otherwise a single page is drained.
    ///
    /// Returns the position consumption stopped at, which is where the next
    /// drain should resume. The cursor can trail this position when a
    /// handler requested a retry for some entry.
    pub async fn drain_all(
        &self,
        since: SequenceNumber,
        handler: &dyn EntryHandler,
    ) -> Result<SequenceNumber, ClientError> {
        drain(
            &self.feed,
            self.poller.as_ref(),
            self.cursor.as_ref(),
            &self.options,
            since,
            handler,
        )
        .await
    }

    /// Schedules [`FeedConsumer::drain_all`] to re-run on a fixed delay,
    /// starting at `since`, until the subscription is stopped or a drain
    /// fails. Cycles never overlap.
    ///
    /// A failed drain terminates the subscription rather than carrying on
    /// against a possibly inconsistent position.
    pub async fn subscribe(
        &self,
        since: SequenceNumber,
        handler: Arc<dyn EntryHandler>,
    ) -> Result<SubscriptionId, ClientError> {
        // Surface bad query options here instead of inside the task.
        build_query(&self.feed, &self.options, since)?;

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let feed = self.feed.clone();
        let poller = Arc::clone(&self.poller);
        let cursor = Arc::clone(&self.cursor);
        let options = Arc::clone(&self.options);

        let task = tokio::spawn(async move {
            let mut position = since;
            loop {
                let drained = drain(
                    &feed,
                    poller.as_ref(),
                    cursor.as_ref(),
                    &options,
                    position,
                    handler.as_ref(),
                )
                .await;

                match drained {
                    Ok(next) => position = next,
                    Err(error) => {
                        tracing::error!(feed = %feed, error = %error, "subscription failed, stopping");
                        break;
                    }
                }

                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = tokio::time::sleep(options.poll_delay) => {}
                }
            }
        });

        let id = SubscriptionId(self.next_subscription_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .lock()
            .await
            .insert(id, Subscription { stop: stop_tx, task });
        tracing::info!(feed = %self.feed, subscription = id.0, since, "subscription started");
        Ok(id)
    }

    /// Stops one subscription. Returns `false` when the id is unknown, which
    /// includes subscriptions already stopped through [`FeedConsumer::close`].
    pub async fn stop(&self, id: SubscriptionId) -> bool {
        let subscription = self.subscriptions.lock().await.remove(&id);
        match subscription {
            Some(subscription) => {
                subscription.stop().await;
                tracing::info!(feed = %self.feed, subscription = id.0, "subscription stopped");
                true
            }
            None => false,
        }
    }

    /// Stops every subscription, letting in-flight polls finish. After this
    /// returns no further handler callbacks fire.
    pub async fn close(&self) {
        let subscriptions: Vec<Subscription> = {
            let mut guard = self.subscriptions.lock().await;
            guard.drain().map(|(_, subscription)| subscription).collect()
        };
        let stopped = subscriptions.len();
        join_all(subscriptions.into_iter().map(Subscription::stop)).await;
        if stopped > 0 {
            tracing::info!(feed = %self.feed, subscriptions = stopped, "consumer closed");
        }
    }
}

fn build_query(
    feed: &str,
    options: &ConsumerOptions,
    since: SequenceNumber,
) -> Result<FeedQuery, ClientError> {
    let mut query = FeedQuery::new(feed, since)?;
    if let Some(limit) = options.limit {
        query = query.limit(limit);
    }
    if let Some(wait) = options.wait {
        query = query.wait(wait)?;
    }
    if let Some(partition) = options.partition {
        query = query.partition(partition);
    }
    if !options.types.is_empty() {
        query = query.types(options.types.clone())?;
    }
    Ok(query)
}

async fn drain(
    feed: &str,
    poller: &dyn FeedPoller,
    cursor: &dyn SequenceCursor,
    options: &ConsumerOptions,
    since: SequenceNumber,
    handler: &dyn EntryHandler,
) -> Result<SequenceNumber, ClientError> {
    let query = build_query(feed, options, since)?;
    let mut position = since;
    loop {
        let page = poller.poll(&query.at(position)).await?;
        tracing::debug!(
            feed = %feed,
            entries = page.entries.len(),
            has_more = page.has_more,
            current_sequence_number = page.current_sequence_number,
            "feed page fetched"
        );

        for entry in &page.entries {
            match handler.handle(entry).await.map_err(ClientError::Handler)? {
                EntryOutcome::Processed => cursor.advance(entry.sequence_number)?,
                EntryOutcome::RetryRequested => {
                    tracing::debug!(
                        feed = %feed,
                        sequence_number = entry.sequence_number,
                        "handler requested retry, cursor not advanced"
                    );
                }
            }
        }

        // A page that does not move the position cannot be followed up
        // without polling the same window again.
        let next = page.current_sequence_number.max(position);
        if !options.eager_fetching || !page.has_more || next == position {
            return Ok(next);
        }
        position = next;
    }
}
