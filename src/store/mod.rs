use std::ops::Deref;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ClientError;
use crate::event::{Event, EventBatch};
use crate::types::AggregateVersion;

pub mod http;

pub use http::HttpAggregateStore;

/// The event history of one aggregate instance as returned by the store,
/// together with the store's authoritative version.
///
/// The version is the one the store reports, not a local count: it is the
/// value a conditional append must match to succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAggregate {
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub version: AggregateVersion,
    pub events: Vec<Event>,
}

/// An AggregateStore loads the event history an aggregate instance has
/// accumulated and appends new batches of events to it.
///
/// Appends are atomic per batch: either every event in the batch is stored,
/// or none is. The store itself never retries; a failed conditional append
/// surfaces as [`ClientError::ConcurrencyConflict`] and the reload-decide
/// cycle is the caller's.
#[async_trait]
pub trait AggregateStore {
    /// Loads the full event history of an aggregate instance.
    ///
    /// Fails with [`ClientError::NotFound`] when the instance has no history.
    async fn load(&self, aggregate_type: &str, aggregate_id: Uuid) -> Result<LoadedAggregate, ClientError>;

    /// Appends a batch of events to one aggregate instance.
    ///
    /// An empty batch is a no-op and must succeed without touching the store.
    /// With `expected_version` set, the append fails with
    /// [`ClientError::ConcurrencyConflict`] unless the store's current version
    /// matches.
    async fn append(&self, aggregate_type: &str, batch: EventBatch) -> Result<(), ClientError>;

    /// Whether the aggregate instance has any event history.
    async fn exists(&self, aggregate_type: &str, aggregate_id: Uuid) -> Result<bool, ClientError>;
}

/// Blanket implementation making an [`AggregateStore`] out of every (smart) pointer
/// to an [`AggregateStore`], e.g. `&Store`, `Box<Store>`, `Arc<Store>`.
#[async_trait]
impl<T, S> AggregateStore for T
where
    S: AggregateStore + ?Sized,
    T: Deref<Target = S> + Send + Sync,
{
    async fn load(&self, aggregate_type: &str, aggregate_id: Uuid) -> Result<LoadedAggregate, ClientError> {
        self.deref().load(aggregate_type, aggregate_id).await
    }

    async fn append(&self, aggregate_type: &str, batch: EventBatch) -> Result<(), ClientError> {
        self.deref().append(aggregate_type, batch).await
    }

    async fn exists(&self, aggregate_type: &str, aggregate_id: Uuid) -> Result<bool, ClientError> {
        self.deref().exists(aggregate_type, aggregate_id).await
    }
}
