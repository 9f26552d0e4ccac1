use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use esrs_client::{AggregateSession, ClientError, RetryStrategy, SessionConfig};

use structs::*;

mod structs;

fn session(store: Arc<InMemoryStore>) -> AggregateSession<OrderState, Arc<InMemoryStore>> {
    AggregateSession::new("order", store, order_folder())
}

fn session_with_config(
    store: Arc<InMemoryStore>,
    config: SessionConfig,
) -> AggregateSession<OrderState, Arc<InMemoryStore>> {
    AggregateSession::with_config("order", store, order_folder(), config)
}

#[tokio::test]
async fn save_then_update_runs_the_full_cycle() {
    let store = Arc::new(InMemoryStore::new());
    let session = session(store.clone());
    let order_id = Uuid::new_v4();

    session.save(order_id, vec![order_placed(1000)]).await.unwrap();

    let state = session.load_state(order_id).await.unwrap();
    assert_eq!(state.version(), 1);
    assert!(state.inner().placed);
    assert_eq!(state.inner().amount, 1000);

    let state = session
        .update(order_id, |order| {
            if order.canceled {
                vec![]
            } else {
                vec![order_canceled()]
            }
        })
        .await
        .unwrap();

    assert_eq!(state.version(), 2);
    assert!(state.inner().canceled);
    assert_eq!(store.appends(), 2);
}

#[tokio::test]
async fn update_with_no_events_never_touches_the_store() {
    let store = Arc::new(InMemoryStore::new());
    let session = session(store.clone());
    let order_id = Uuid::new_v4();

    session.save(order_id, vec![order_placed(500)]).await.unwrap();
    assert_eq!(store.appends(), 1);

    let state = session.update(order_id, |_| vec![]).await.unwrap();
    assert_eq!(state.version(), 1);
    assert_eq!(store.appends(), 1);
}

#[tokio::test]
async fn save_rejects_an_existing_id_by_default() {
    let store = Arc::new(InMemoryStore::new());
    let session = session(store);
    let order_id = Uuid::new_v4();

    session.save(order_id, vec![order_placed(100)]).await.unwrap();
    let error = session.save(order_id, vec![order_placed(100)]).await.unwrap_err();
    assert!(error.is_conflict());
}

#[tokio::test]
async fn save_appends_unconditionally_when_unique_id_check_is_off() {
    let store = Arc::new(InMemoryStore::new());
    let config = SessionConfig {
        require_unique_id_on_save: false,
        ..SessionConfig::default()
    };
    let session = session_with_config(store, config);
    let order_id = Uuid::new_v4();

    session.save(order_id, vec![order_placed(100)]).await.unwrap();
    session.save(order_id, vec![order_amended(50)]).await.unwrap();

    let state = session.load_state(order_id).await.unwrap();
    assert_eq!(state.version(), 2);
    assert_eq!(state.inner().amount, 150);
}

#[tokio::test]
async fn version_counts_every_accepted_event() {
    let store = Arc::new(InMemoryStore::new());
    let session = session(store);
    let order_id = Uuid::new_v4();

    session.save(order_id, vec![order_placed(100)]).await.unwrap();
    for _ in 0..4 {
        session.update(order_id, |_| vec![order_amended(1)]).await.unwrap();
    }

    let state = session.load_state(order_id).await.unwrap();
    assert_eq!(state.version(), 5);
    assert_eq!(state.inner().amount, 104);
}

#[tokio::test]
async fn conflicts_surface_without_retry_by_default() {
    let store = Arc::new(InMemoryStore::new());
    let session = session(store.clone());
    let order_id = Uuid::new_v4();

    session.save(order_id, vec![order_placed(100)]).await.unwrap();

    store.inject_conflicts(1);
    let error = session
        .update(order_id, |_| vec![order_canceled()])
        .await
        .unwrap_err();
    assert!(error.is_conflict());
}

#[tokio::test]
async fn retry_strategy_reloads_and_reappends_after_a_conflict() {
    let store = Arc::new(InMemoryStore::new());
    let config = SessionConfig {
        retry: RetryStrategy::new(1, Duration::ZERO),
        ..SessionConfig::default()
    };
    let session = session_with_config(store.clone(), config);
    let order_id = Uuid::new_v4();

    session.save(order_id, vec![order_placed(100)]).await.unwrap();

    store.inject_conflicts(1);
    let state = session
        .update(order_id, |_| vec![order_canceled()])
        .await
        .unwrap();

    assert_eq!(state.version(), 2);
    assert!(state.inner().canceled);
    // initial save, the conflicted attempt, the successful retry
    assert_eq!(store.appends(), 3);
}

#[tokio::test]
async fn cached_state_skips_the_network_load() {
    let store = Arc::new(InMemoryStore::new());
    let config = SessionConfig {
        cache_enabled: true,
        ..SessionConfig::default()
    };
    let session = session_with_config(store.clone(), config);
    let order_id = Uuid::new_v4();

    session.save(order_id, vec![order_placed(100)]).await.unwrap();

    session.load_state(order_id).await.unwrap();
    session.load_state(order_id).await.unwrap();
    assert_eq!(store.loads(), 1);

    let state = session.update(order_id, |_| vec![order_amended(1)]).await.unwrap();
    assert_eq!(state.version(), 2);
    assert_eq!(store.loads(), 1);
}

#[tokio::test]
async fn a_conflict_invalidates_the_cached_state() {
    let store = Arc::new(InMemoryStore::new());
    let config = SessionConfig {
        cache_enabled: true,
        ..SessionConfig::default()
    };
    let session = session_with_config(store.clone(), config);
    let order_id = Uuid::new_v4();

    session.save(order_id, vec![order_placed(100)]).await.unwrap();
    session.load_state(order_id).await.unwrap();
    assert_eq!(store.loads(), 1);

    store.inject_conflicts(1);
    let error = session
        .update(order_id, |_| vec![order_canceled()])
        .await
        .unwrap_err();
    assert!(error.is_conflict());

    session.load_state(order_id).await.unwrap();
    assert_eq!(store.loads(), 2);
}

#[tokio::test]
async fn updating_an_unknown_aggregate_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let session = session(store);

    let error = session
        .update(Uuid::new_v4(), |_| vec![order_canceled()])
        .await
        .unwrap_err();
    assert!(matches!(error, ClientError::NotFound { .. }));
}

#[tokio::test]
async fn exists_reflects_saved_history() {
    let store = Arc::new(InMemoryStore::new());
    let session = session(store);
    let order_id = Uuid::new_v4();

    assert!(!session.exists(order_id).await.unwrap());
    session.save(order_id, vec![order_placed(100)]).await.unwrap();
    assert!(session.exists(order_id).await.unwrap());
}

#[tokio::test]
async fn from_commands_builds_an_aggregate_without_any_store() {
    enum Command {
        Place(i64),
        Cancel,
    }

    let store = Arc::new(InMemoryStore::new());
    let session = session(store.clone());

    let decide = |order: &OrderState, command: &Command| match command {
        Command::Place(amount) => vec![order_placed(*amount)],
        Command::Cancel if order.placed => vec![order_canceled()],
        Command::Cancel => vec![],
    };

    let (state, events) = session
        .from_commands(&[Command::Place(700), Command::Cancel], decide)
        .unwrap();

    assert_eq!(state.version(), 2);
    assert!(state.inner().canceled);
    assert_eq!(events.len(), 2);
    assert_eq!(store.loads(), 0);
    assert_eq!(store.appends(), 0);
}
