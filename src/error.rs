use uuid::Uuid;

use crate::types::{AggregateVersion, SequenceNumber};

/// Error type returned by every fallible operation in this crate.
///
/// Local precondition failures ([`ClientError::Validation`]) are always raised
/// before any network call. Nothing in this crate retries on its own: conflicts,
/// transport failures and handler failures are surfaced to the caller of the
/// operation that hit them.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// Malformed local input: empty credentials, bad partition arguments, a type
    /// filter on a named feed, a negative cursor position, a nil aggregate id.
    #[error("validation error: {0}")]
    Validation(String),
    /// The aggregate has no event history on the remote store.
    #[error("aggregate {aggregate_type}/{aggregate_id} not found")]
    NotFound {
        aggregate_type: String,
        aggregate_id: Uuid,
    },
    /// Conditional append failed: the remote version no longer matches the
    /// expected one. Reload-decide-append again is the caller's decision.
    #[error("version conflict on aggregate {aggregate_id}: expected version {expected_version}")]
    ConcurrencyConflict {
        aggregate_id: Uuid,
        expected_version: AggregateVersion,
    },
    /// A fold encountered an event type with no registered handler and no
    /// ignore policy.
    #[error("no fold handler registered for event type `{event_type}`")]
    MissingHandler { event_type: String },
    /// A cursor was asked to move backward or stand still.
    #[error("cursor cannot advance to {requested}: current position is {current}")]
    NonMonotonicCursor {
        current: SequenceNumber,
        requested: SequenceNumber,
    },
    /// Network level failure.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    /// Non-2xx response not otherwise classified.
    #[error("unexpected http status {status}: {body}")]
    Http { status: u16, body: String },
    /// Serialization/deserialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Error raised by a caller-supplied feed entry handler.
    #[error(transparent)]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl ClientError {
    /// Classify a non-2xx response from the aggregates resource.
    pub(crate) fn from_aggregate_status(
        status: u16,
        body: String,
        aggregate_type: &str,
        aggregate_id: Uuid,
        expected_version: Option<AggregateVersion>,
    ) -> Self {
        match status {
            404 => Self::NotFound {
                aggregate_type: aggregate_type.to_string(),
                aggregate_id,
            },
            409 => Self::ConcurrencyConflict {
                aggregate_id,
                expected_version: expected_version.unwrap_or_default(),
            },
            400 | 422 => Self::Validation(body),
            _ => Self::Http { status, body },
        }
    }

    /// True for conflicts that a caller-supplied retry strategy may act upon.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
