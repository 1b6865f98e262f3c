//! Registration Service
//!
//! Capacity-gated registration. Every write runs in one datastore
//! transaction that first locks the event row, so concurrent attempts for the
//! same event are serialized and re-read occupancy after the previous holder
//! committed. Confirmed registrations can therefore never exceed capacity.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::domain::{
    EventId, Registrant, Registration, RegistrationId, RegistrationStatus, UserId, UserIdentity,
};
use crate::error::{PlatformError, Result};
use crate::repository::RegistrationStore;
use crate::service::{bounded, checks};

#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn RegistrationStore>,
    timeout: Duration,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn RegistrationStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Register the caller for an event.
    ///
    /// Fails with `NotFound` for an unknown event, `AlreadyRegistered` when a
    /// confirmed registration exists, and `EventFull` when occupancy has
    /// reached capacity, in that order. No row is written on any failure.
    pub async fn register(&self, identity: &UserIdentity, event_id: EventId) -> Result<RegistrationId> {
        let user_id = identity.id;
        let result = bounded(self.timeout, "register", async {
            let mut tx = self.store.begin().await?;

            let capacity = tx
                .lock_event(event_id)
                .await?
                .ok_or_else(|| PlatformError::not_found("Event", event_id))?;

            if tx.find_confirmed(user_id, event_id).await?.is_some() {
                return Err(PlatformError::AlreadyRegistered { user_id, event_id });
            }

            if !capacity.has_room() {
                debug!(event_id, occupancy = capacity.occupancy, max_capacity = capacity.max_capacity, "Event full");
                return Err(PlatformError::EventFull { event_id });
            }

            let registration = tx.insert_confirmed(user_id, event_id).await?;
            tx.commit().await?;
            Ok(registration.id)
        })
        .await;

        match &result {
            Ok(registration_id) => {
                info!(user_id, event_id, registration_id, "Registration confirmed");
            }
            Err(e) => log_store_failure("register", user_id, Some(event_id), e),
        }
        result
    }

    /// Cancel the caller's confirmed registration, freeing one seat.
    pub async fn cancel(&self, identity: &UserIdentity, event_id: EventId) -> Result<Registration> {
        let user_id = identity.id;
        let result = bounded(self.timeout, "cancel", async {
            let mut tx = self.store.begin().await?;

            tx.lock_event(event_id)
                .await?
                .ok_or_else(|| PlatformError::not_found("Event", event_id))?;

            let existing = tx
                .find_confirmed(user_id, event_id)
                .await?
                .ok_or_else(|| {
                    PlatformError::not_found("Registration", format!("user {} event {}", user_id, event_id))
                })?;

            let cancelled = tx.set_status(existing.id, RegistrationStatus::Cancelled).await?;
            tx.commit().await?;
            Ok(cancelled)
        })
        .await;

        match &result {
            Ok(registration) => {
                info!(user_id, event_id, registration_id = registration.id, "Registration cancelled");
            }
            Err(e) => log_store_failure("cancel", user_id, Some(event_id), e),
        }
        result
    }

    /// The caller's registrations in any status, newest first
    pub async fn my_registrations(&self, identity: &UserIdentity) -> Result<Vec<Registration>> {
        bounded(self.timeout, "my_registrations", self.store.list_for_user(identity.id))
            .await
            .map_err(|e| {
                log_store_failure("my_registrations", identity.id, None, &e);
                e
            })
    }

    /// Registrants of one event. Administrators only.
    pub async fn event_registrations(&self, identity: &UserIdentity, event_id: EventId) -> Result<Vec<Registrant>> {
        checks::require_admin(identity)?;

        bounded(self.timeout, "event_registrations", self.store.list_for_event(event_id))
            .await
            .map_err(|e| {
                log_store_failure("event_registrations", identity.id, Some(event_id), &e);
                e
            })
    }
}

/// Business outcomes are expected; only datastore trouble is logged as an error.
fn log_store_failure(operation: &'static str, user_id: UserId, event_id: Option<EventId>, err: &PlatformError) {
    let store_trouble = matches!(
        err,
        PlatformError::TransientStore { .. } | PlatformError::Database(_) | PlatformError::Internal { .. }
    );

    match (event_id, store_trouble) {
        (Some(event_id), true) => {
            error!(operation, user_id, event_id, error = %err, "Registration datastore failure");
        }
        (None, true) => error!(operation, user_id, error = %err, "Registration datastore failure"),
        (Some(event_id), false) => debug!(operation, user_id, event_id, error = %err, "Registration rejected"),
        (None, false) => debug!(operation, user_id, error = %err, "Registration rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewEvent, UserRole};
    use crate::repository::{EventRepository, MemoryStore, RegistrationStore};
    use chrono::{NaiveDate, NaiveTime};

    fn member(id: i64) -> UserIdentity {
        UserIdentity {
            id,
            email: format!("user{}@example.com", id),
            role: UserRole::Member,
        }
    }

    async fn setup(capacity: i32) -> (MemoryStore, RegistrationService, EventId) {
        let store = MemoryStore::new();
        let event = EventRepository::insert(
            &store,
            NewEvent {
                title: "Demo".to_string(),
                description: "Demo event".to_string(),
                event_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
                event_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                location: "Main hall".to_string(),
                max_capacity: capacity,
            },
            1,
        )
        .await
        .unwrap();
        let service = RegistrationService::new(Arc::new(store.clone()), Duration::from_secs(5));
        (store, service, event.id)
    }

    #[tokio::test]
    async fn test_register_then_repeat_is_already_registered() {
        let (store, service, event_id) = setup(2).await;

        service.register(&member(1), event_id).await.unwrap();
        let err = service.register(&member(1), event_id).await.unwrap_err();

        assert!(matches!(err, PlatformError::AlreadyRegistered { .. }));
        assert_eq!(store.confirmed_count(event_id).await, 1);
    }

    #[tokio::test]
    async fn test_register_unknown_event_writes_nothing() {
        let (store, service, _) = setup(2).await;

        let err = service.register(&member(1), 999).await.unwrap_err();

        assert!(matches!(err, PlatformError::NotFound { .. }));
        assert_eq!(store.registration_rows().await, 0);
    }

    #[tokio::test]
    async fn test_full_event_rejects() {
        let (store, service, event_id) = setup(1).await;

        service.register(&member(1), event_id).await.unwrap();
        let err = service.register(&member(2), event_id).await.unwrap_err();

        assert!(matches!(err, PlatformError::EventFull { .. }));
        assert_eq!(store.registration_rows().await, 1);
    }

    #[tokio::test]
    async fn test_cancel_frees_seat_and_allows_reregistration() {
        let (store, service, event_id) = setup(1).await;

        service.register(&member(1), event_id).await.unwrap();
        let cancelled = service.cancel(&member(1), event_id).await.unwrap();
        assert_eq!(cancelled.status, RegistrationStatus::Cancelled);
        assert_eq!(store.confirmed_count(event_id).await, 0);

        service.register(&member(2), event_id).await.unwrap();
        service.cancel(&member(2), event_id).await.unwrap();
        service.register(&member(1), event_id).await.unwrap();
        assert_eq!(store.confirmed_count(event_id).await, 1);
    }

    #[tokio::test]
    async fn test_cancel_without_registration_is_not_found() {
        let (_, service, event_id) = setup(1).await;
        let err = service.cancel(&member(1), event_id).await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_event_registrations_requires_admin() {
        let (_, service, event_id) = setup(1).await;
        let err = service.event_registrations(&member(1), event_id).await.unwrap_err();
        assert!(matches!(err, PlatformError::Unauthorized { .. }));
    }

    /// Collects formatted log lines for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_my_registrations_failure_log_has_no_event_id() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = MemoryStore::new();
        let service = RegistrationService::new(Arc::new(store.clone()), Duration::from_millis(20));

        // An open transaction holds the store, so the listing times out
        let _tx = store.begin().await.unwrap();
        let err = service.my_registrations(&member(7)).await.unwrap_err();
        assert!(matches!(err, PlatformError::TransientStore { .. }));

        let text = logs.text();
        let line = text
            .lines()
            .find(|l| l.contains("Registration datastore failure"))
            .unwrap();
        assert!(line.contains("my_registrations"));
        assert!(line.contains("user_id=7"));
        assert!(!line.contains("event_id"));
    }
}
