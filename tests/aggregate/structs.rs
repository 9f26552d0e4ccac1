use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use esrs_client::{
    AggregateStore, AggregateVersion, ClientError, Event, EventBatch, Folder, LoadedAggregate,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderState {
    pub placed: bool,
    pub canceled: bool,
    pub amount: i64,
}

pub fn order_folder() -> Folder<OrderState> {
    Folder::new()
        .handler("order-placed", |mut order: OrderState, event: &Event| {
            order.placed = true;
            order.amount = event.data()["amount"].as_i64().unwrap_or(0);
            order
        })
        .handler("order-amended", |mut order: OrderState, event: &Event| {
            order.amount += event.data()["delta"].as_i64().unwrap_or(0);
            order
        })
        .handler("order-canceled", |mut order: OrderState, _event: &Event| {
            order.canceled = true;
            order
        })
}

pub fn order_placed(amount: i64) -> Event {
    Event::new("order-placed", json!({ "amount": amount }))
}

pub fn order_amended(delta: i64) -> Event {
    Event::new("order-amended", json!({ "delta": delta }))
}

pub fn order_canceled() -> Event {
    Event::new("order-canceled", json!({}))
}

/// [`AggregateStore`] over a plain map, counting loads and appends so tests
/// can assert how often the session actually reached for the store.
#[derive(Default)]
pub struct InMemoryStore {
    aggregates: Mutex<HashMap<Uuid, (AggregateVersion, Vec<Event>)>>,
    loads: AtomicUsize,
    appends: AtomicUsize,
    injected_conflicts: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    /// The next `count` non-empty appends fail with a version conflict.
    pub fn inject_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl AggregateStore for InMemoryStore {
    async fn load(&self, aggregate_type: &str, aggregate_id: Uuid) -> Result<LoadedAggregate, ClientError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let aggregates = self.aggregates.lock().unwrap();
        match aggregates.get(&aggregate_id) {
            Some((version, events)) => Ok(LoadedAggregate {
                aggregate_id,
                aggregate_type: aggregate_type.to_string(),
                version: *version,
                events: events.clone(),
            }),
            None => Err(ClientError::NotFound {
                aggregate_type: aggregate_type.to_string(),
                aggregate_id,
            }),
        }
    }

    async fn append(&self, _aggregate_type: &str, batch: EventBatch) -> Result<(), ClientError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.appends.fetch_add(1, Ordering::SeqCst);

        if self.injected_conflicts.load(Ordering::SeqCst) > 0 {
            self.injected_conflicts.fetch_sub(1, Ordering::SeqCst);
            return Err(ClientError::ConcurrencyConflict {
                aggregate_id: batch.aggregate_id,
                expected_version: batch.expected_version.unwrap_or_default(),
            });
        }

        let mut aggregates = self.aggregates.lock().unwrap();
        let current_version = aggregates
            .get(&batch.aggregate_id)
            .map(|(version, _)| *version)
            .unwrap_or(0);
        if let Some(expected_version) = batch.expected_version {
            if expected_version != current_version {
                return Err(ClientError::ConcurrencyConflict {
                    aggregate_id: batch.aggregate_id,
                    expected_version,
                });
            }
        }
        let entry = aggregates.entry(batch.aggregate_id).or_insert((0, Vec::new()));
        entry.0 += batch.events.len() as AggregateVersion;
        entry.1.extend(batch.events);
        Ok(())
    }

    async fn exists(&self, _aggregate_type: &str, aggregate_id: Uuid) -> Result<bool, ClientError> {
        Ok(self.aggregates.lock().unwrap().contains_key(&aggregate_id))
    }
}
