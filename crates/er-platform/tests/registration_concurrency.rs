//! Registration Concurrency Tests
//!
//! Many simultaneous `register` calls against one event, timeouts and
//! abandoned attempts, all on the in-memory datastore.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use er_platform::domain::{EventId, NewEvent, UserIdentity, UserRole};
use er_platform::repository::{EventRepository, MemoryStore};
use er_platform::service::RegistrationService;
use er_platform::PlatformError;

fn member(id: i64) -> UserIdentity {
    UserIdentity {
        id,
        email: format!("member{}@example.com", id),
        role: UserRole::Member,
    }
}

async fn event_with_capacity(store: &MemoryStore, capacity: i32) -> EventId {
    store
        .insert(
            NewEvent {
                title: "Concurrency".to_string(),
                description: "Contended event".to_string(),
                event_date: NaiveDate::from_ymd_opt(2030, 9, 1).unwrap(),
                event_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                location: "Arena".to_string(),
                max_capacity: capacity,
            },
            1,
        )
        .await
        .unwrap()
        .id
}

fn service(store: &MemoryStore, timeout: Duration) -> RegistrationService {
    RegistrationService::new(Arc::new(store.clone()), timeout)
}

/// Fire one `register` per user id on separate tasks and collect the outcomes.
async fn register_concurrently(
    service: &RegistrationService,
    event_id: EventId,
    users: impl Iterator<Item = i64>,
) -> Vec<Result<i64, PlatformError>> {
    let handles: Vec<_> = users
        .map(|user_id| {
            let service = service.clone();
            tokio::spawn(async move { service.register(&member(user_id), event_id).await })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_never_exceeded_under_contention() {
    let store = MemoryStore::new().with_latency(Duration::from_millis(1));
    let capacity = 5;
    let event_id = event_with_capacity(&store, capacity).await;
    let service = service(&store, Duration::from_secs(30));

    let results = register_concurrently(&service, event_id, 1..=20).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let full = results
        .iter()
        .filter(|r| matches!(r, Err(PlatformError::EventFull { .. })))
        .count();

    assert_eq!(succeeded, capacity as usize);
    assert_eq!(full, 20 - capacity as usize);
    assert_eq!(store.confirmed_count(event_id).await, i64::from(capacity));
    assert_eq!(store.registration_rows().await, capacity as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_users_one_seat() {
    let store = MemoryStore::new().with_latency(Duration::from_millis(5));
    let event_id = event_with_capacity(&store, 1).await;
    let service = service(&store, Duration::from_secs(10));

    let results = register_concurrently(&service, event_id, [1, 2].into_iter()).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(PlatformError::EventFull { .. })))
            .count(),
        1
    );
    assert_eq!(store.confirmed_count(event_id).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_user_racing_registers_once() {
    let store = MemoryStore::new().with_latency(Duration::from_millis(1));
    let event_id = event_with_capacity(&store, 10).await;
    let service = service(&store, Duration::from_secs(30));

    let results = register_concurrently(&service, event_id, std::iter::repeat(7).take(8)).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(PlatformError::AlreadyRegistered { .. }))));
    assert_eq!(store.confirmed_count(event_id).await, 1);
}

#[tokio::test]
async fn test_timeout_is_transient_and_rolls_back() {
    let store = MemoryStore::new().with_latency(Duration::from_millis(200));
    let event_id = event_with_capacity(&store, 3).await;
    let service = service(&store, Duration::from_millis(50));

    let err = service.register(&member(1), event_id).await.unwrap_err();

    assert!(matches!(err, PlatformError::TransientStore { .. }));
    assert!(err.is_retryable());
    assert_eq!(store.registration_rows().await, 0);
}

#[tokio::test]
async fn test_abandoned_attempt_leaves_no_row() {
    let store = MemoryStore::new().with_latency(Duration::from_millis(40));
    let event_id = event_with_capacity(&store, 3).await;
    let service = service(&store, Duration::from_secs(10));

    let task = {
        let service = service.clone();
        tokio::spawn(async move { service.register(&member(1), event_id).await })
    };
    // Mid-transaction: begin and lock_event have run, the insert has not committed
    tokio::time::sleep(Duration::from_millis(100)).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert_eq!(store.registration_rows().await, 0);

    // The event lock was released with the abandoned transaction
    service.register(&member(2), event_id).await.unwrap();
    assert_eq!(store.confirmed_count(event_id).await, 1);
}
