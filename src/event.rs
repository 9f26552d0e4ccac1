use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ClientError;
use crate::types::AggregateVersion;

/// A single domain event as it travels over the wire.
///
/// The payload stays an untyped [`Value`]: the type string decides which fold
/// handler applies, and event types unknown to this process remain
/// representable as generic key-value data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Uniquely identifies the event among all events of all aggregates.
    /// Uniqueness is enforced by the remote store, not locally.
    pub event_id: Uuid,
    /// Decides which fold handler applies to this event.
    pub event_type: String,
    /// The event payload.
    pub data: Value,
    /// Opaque encrypted payload, carried untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_data: Option<String>,
}

impl Event {
    /// Creates an event with a freshly generated id.
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self::with_id(Uuid::new_v4(), event_type, data)
    }

    /// Creates an event with a caller-supplied id.
    pub fn with_id(event_id: Uuid, event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            data,
            encrypted_data: None,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

/// One atomic append request: an ordered list of events for one aggregate
/// instance, optionally conditional on the aggregate's current version.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EventBatch {
    pub aggregate_id: Uuid,
    pub events: Vec<Event>,
    /// `None` appends unconditionally. `Some(v)` makes the remote store fail
    /// the append unless its current version equals `v`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<AggregateVersion>,
}

impl EventBatch {
    pub fn new(
        aggregate_id: Uuid,
        events: Vec<Event>,
        expected_version: Option<AggregateVersion>,
    ) -> Result<Self, ClientError> {
        if aggregate_id.is_nil() {
            return Err(ClientError::Validation(
                "batch aggregate id must not be nil".to_string(),
            ));
        }

        Ok(Self {
            aggregate_id,
            events,
            expected_version,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
