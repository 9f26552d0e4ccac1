use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ClientError;
use crate::event::{Event, EventBatch};
use crate::fold::Folder;
use crate::state::AggregateState;
use crate::store::AggregateStore;

/// How often, and with which pause, a conflicted update is re-attempted.
///
/// The default performs no retries: a [`ClientError::ConcurrencyConflict`]
/// surfaces to the caller on the first conflict.
#[derive(Debug, Clone, Copy)]
pub struct RetryStrategy {
    retries: u32,
    sleep: Duration,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            retries: 0,
            sleep: Duration::ZERO,
        }
    }
}

impl RetryStrategy {
    pub fn new(retries: u32, sleep: Duration) -> Self {
        Self { retries, sleep }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

/// Tunables for an [`AggregateSession`].
///
/// The defaults are the safe ones: saves insist on a fresh aggregate id,
/// updates append conditionally on the loaded version, and no state is
/// cached between operations.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub require_unique_id_on_save: bool,
    pub use_optimistic_concurrency_on_update: bool,
    pub retry: RetryStrategy,
    pub cache_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            require_unique_id_on_save: true,
            use_optimistic_concurrency_on_update: true,
            retry: RetryStrategy::default(),
            cache_enabled: false,
        }
    }
}

/// Runs the load, decide, append cycle for one aggregate type.
///
/// A session ties together a store, a [`Folder`] for that type's events and
/// a concurrency policy. It holds no per-instance locks: concurrent updates
/// to the same aggregate are arbitrated by the store through conditional
/// appends, and a lost race is replayed by reloading and deciding again.
pub struct AggregateSession<S, T> {
    aggregate_type: String,
    store: T,
    folder: Folder<S>,
    config: SessionConfig,
    cache: Mutex<HashMap<Uuid, AggregateState<S>>>,
}

impl<S, T> AggregateSession<S, T>
where
    S: Default + Clone + Send,
    T: AggregateStore + Sync,
{
    pub fn new(aggregate_type: impl Into<String>, store: T, folder: Folder<S>) -> Self {
        Self::with_config(aggregate_type, store, folder, SessionConfig::default())
    }

    pub fn with_config(
        aggregate_type: impl Into<String>,
        store: T,
        folder: Folder<S>,
        config: SessionConfig,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            store,
            folder,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// Creates a new aggregate instance by appending its first events.
    ///
    /// With `require_unique_id_on_save` (the default) the append is
    /// conditional on version 0, so saving onto an id that already has
    /// history fails with [`ClientError::ConcurrencyConflict`].
    pub async fn save(&self, aggregate_id: Uuid, events: Vec<Event>) -> Result<(), ClientError> {
        let expected_version = if self.config.require_unique_id_on_save {
            Some(0)
        } else {
            None
        };

        let batch = EventBatch::new(aggregate_id, events, expected_version)?;
        let result = self.store.append(&self.aggregate_type, batch).await;
        self.invalidate(aggregate_id).await;
        result
    }

    /// Loads the aggregate's history and folds it into typed state.
    ///
    /// The returned version is the store's authoritative one, which is what
    /// a subsequent conditional append has to match.
    pub async fn load_state(&self, aggregate_id: Uuid) -> Result<AggregateState<S>, ClientError> {
        if self.config.cache_enabled {
            if let Some(state) = self.cache.lock().await.get(&aggregate_id) {
                return Ok(state.clone());
            }
        }

        let state = self.load_from_store(aggregate_id).await?;
        if self.config.cache_enabled {
            self.cache.lock().await.insert(aggregate_id, state.clone());
        }
        Ok(state)
    }

    /// Runs one reload-decide-append cycle, retrying lost races per the
    /// configured [`RetryStrategy`].
    ///
    /// `decide` observes the freshly folded state and returns the events to
    /// append. Returning no events completes the update without touching the
    /// store. On a conflict the cached state (if any) is dropped so the next
    /// attempt decides against reloaded history.
    pub async fn update<F>(&self, aggregate_id: Uuid, decide: F) -> Result<AggregateState<S>, ClientError>
    where
        F: Fn(&S) -> Vec<Event>,
    {
        let mut attempts_left = self.config.retry.retries;

        loop {
            let state = self.load_state(aggregate_id).await?;
            let events = decide(state.inner());
            if events.is_empty() {
                return Ok(state);
            }

            let expected_version = if self.config.use_optimistic_concurrency_on_update {
                Some(state.version())
            } else {
                None
            };

            let produced = events.clone();
            let batch = EventBatch::new(aggregate_id, events, expected_version)?;
            match self.store.append(&self.aggregate_type, batch).await {
                Ok(()) => {
                    let next = self.apply(state, &produced)?;
                    if self.config.cache_enabled {
                        self.cache.lock().await.insert(aggregate_id, next.clone());
                    }
                    return Ok(next);
                }
                Err(error) => {
                    self.invalidate(aggregate_id).await;
                    if error.is_conflict() && attempts_left > 0 {
                        attempts_left -= 1;
                        tracing::debug!(
                            aggregate_id = %aggregate_id,
                            attempts_left,
                            "version conflict, retrying update"
                        );
                        if !self.config.retry.sleep.is_zero() {
                            tokio::time::sleep(self.config.retry.sleep).await;
                        }
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Whether the aggregate instance has any event history.
    pub async fn exists(&self, aggregate_id: Uuid) -> Result<bool, ClientError> {
        self.store.exists(&self.aggregate_type, aggregate_id).await
    }

    /// Builds an aggregate entirely in memory from a command sequence, without
    /// touching the store. See [`Folder::from_commands`].
    pub fn from_commands<C, F>(
        &self,
        commands: &[C],
        decide: F,
    ) -> Result<(AggregateState<S>, Vec<Event>), ClientError>
    where
        F: Fn(&S, &C) -> Vec<Event>,
    {
        self.folder.from_commands(commands, decide)
    }

    async fn load_from_store(&self, aggregate_id: Uuid) -> Result<AggregateState<S>, ClientError> {
        let loaded = self.store.load(&self.aggregate_type, aggregate_id).await?;
        let folded = self.folder.fold(&loaded.events)?;
        Ok(AggregateState::new(loaded.version, folded.into_inner()))
    }

    fn apply(&self, state: AggregateState<S>, events: &[Event]) -> Result<AggregateState<S>, ClientError> {
        let version = state.version() + events.len() as i64;
        let mut inner = state.into_inner();
        for event in events {
            inner = self.folder.apply_one(inner, event)?;
        }
        Ok(AggregateState::new(version, inner))
    }

    async fn invalidate(&self, aggregate_id: Uuid) {
        if self.config.cache_enabled {
            self.cache.lock().await.remove(&aggregate_id);
        }
    }
}
