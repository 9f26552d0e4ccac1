use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::event::Event;
use crate::types::SequenceNumber;

pub mod consumer;
pub mod cursor;
pub mod poller;

pub use consumer::{ConsumerOptions, EntryHandler, EntryOutcome, FeedConsumer, SubscriptionId};
pub use cursor::{InMemorySequenceCursor, SequenceCursor};
pub use poller::{FeedPoller, FeedQuery, HttpFeedPoller, Partition};

/// Name of the synthetic feed spanning all aggregate types.
pub const ALL_FEED: &str = "_all";

/// One committed batch as it appears on a feed.
///
/// Entries are feed-unique and strictly ordered by `sequence_number`; one
/// entry corresponds to one previously appended batch.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub sequence_number: SequenceNumber,
    pub aggregate_id: Uuid,
    /// Commit time in epoch milliseconds.
    pub timestamp: i64,
    pub events: Vec<Event>,
}

impl FeedEntry {
    /// The commit time as a [`DateTime`], if the timestamp is representable.
    pub fn occurred_on(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// One page of feed entries.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,
    /// More entries were available beyond this page at the time of the poll.
    pub has_more: bool,
    /// The position to poll from next. This moves even when every entry on
    /// the page was skipped, so paginating on it always makes progress.
    pub current_sequence_number: SequenceNumber,
}

/// Summary of one feed as listed by the store.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedInfo {
    pub aggregate_type: String,
    pub aggregate_count: i64,
    pub batch_count: i64,
    pub event_count: i64,
}
