//! Async client for a remote, HTTP-reachable event store.
//!
//! Two subsystems make up the crate. The aggregate side loads an event
//! history, folds it into typed state with a [`fold::Folder`], runs a
//! caller-supplied decision and appends the resulting events under
//! optimistic concurrency ([`session::AggregateSession`]). The feed side
//! consumes ordered, resumable streams of committed batches:
//! [`feed::FeedPoller`] fetches one bounded page, [`feed::FeedConsumer`]
//! drives it in drain or subscription loops and tracks progress through a
//! [`feed::SequenceCursor`].
//!
//! All network access goes through one shared [`client::Connection`], built
//! from a validated [`client::ClientConfig`].

pub mod client;
pub mod error;
pub mod event;
pub mod feed;
pub mod fold;
pub mod session;
pub mod state;
pub mod store;
pub mod types;

pub use client::{ClientConfig, Connection};
pub use error::ClientError;
pub use event::{Event, EventBatch};
pub use feed::{
    ConsumerOptions, EntryHandler, EntryOutcome, FeedConsumer, FeedEntry, FeedInfo, FeedPage,
    FeedPoller, FeedQuery, HttpFeedPoller, InMemorySequenceCursor, Partition, SequenceCursor,
    SubscriptionId, ALL_FEED,
};
pub use fold::Folder;
pub use session::{AggregateSession, RetryStrategy, SessionConfig};
pub use state::AggregateState;
pub use store::{AggregateStore, HttpAggregateStore, LoadedAggregate};
pub use types::{AggregateVersion, SequenceNumber};
