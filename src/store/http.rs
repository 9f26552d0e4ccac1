use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::client::Connection;
use crate::error::ClientError;
use crate::event::{Event, EventBatch};
use crate::store::{AggregateStore, LoadedAggregate};
use crate::types::AggregateVersion;

const AGGREGATES_RESOURCE: &str = "aggregates";

/// Wire shape of the aggregate resource returned by
/// `GET /aggregates/{type}/{id}`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AggregateResponse {
    aggregate_version: AggregateVersion,
    events: Vec<Event>,
}

/// [`AggregateStore`] backed by the remote store's aggregates resource.
///
/// Owns nothing beyond a [`Connection`] clone, so it is itself cheap to
/// clone and share.
#[derive(Debug, Clone)]
pub struct HttpAggregateStore {
    connection: Connection,
}

impl HttpAggregateStore {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl AggregateStore for HttpAggregateStore {
    #[tracing::instrument(skip_all, fields(aggregate_type = %aggregate_type, aggregate_id = %aggregate_id), err)]
    async fn load(&self, aggregate_type: &str, aggregate_id: Uuid) -> Result<LoadedAggregate, ClientError> {
        let url = self
            .connection
            .url(&[AGGREGATES_RESOURCE, aggregate_type, &aggregate_id.to_string()]);

        let response = self.connection.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_aggregate_status(
                status.as_u16(),
                body,
                aggregate_type,
                aggregate_id,
                None,
            ));
        }

        let aggregate: AggregateResponse = response.json().await?;
        Ok(LoadedAggregate {
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            version: aggregate.aggregate_version,
            events: aggregate.events,
        })
    }

    #[tracing::instrument(skip_all, fields(aggregate_type = %aggregate_type, aggregate_id = %batch.aggregate_id, events = batch.events.len()), err)]
    async fn append(&self, aggregate_type: &str, batch: EventBatch) -> Result<(), ClientError> {
        // An empty batch changes nothing; appending it is a local no-op.
        if batch.is_empty() {
            return Ok(());
        }

        let url = self.connection.url(&[AGGREGATES_RESOURCE, aggregate_type, "events"]);

        let response = self.connection.post(url).json(&batch).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_aggregate_status(
                status.as_u16(),
                body,
                aggregate_type,
                batch.aggregate_id,
                batch.expected_version,
            ));
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, fields(aggregate_type = %aggregate_type, aggregate_id = %aggregate_id), err)]
    async fn exists(&self, aggregate_type: &str, aggregate_id: Uuid) -> Result<bool, ClientError> {
        let url = self
            .connection
            .url(&[AGGREGATES_RESOURCE, aggregate_type, &aggregate_id.to_string()]);

        let response = self.connection.head(url).send().await?;
        let status = response.status();
        match status.as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => Err(ClientError::Http {
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }
}
