//! In-memory datastore backend
//!
//! Every transaction holds one process-wide lock from `begin` until commit or
//! drop and works on a staged copy of the state, so an abandoned transaction
//! leaves nothing behind. Suitable for tests and single-process experiments.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    Event, EventCapacity, EventId, EventSummary, NewEvent, NewUser, Registrant, Registration,
    RegistrationId, RegistrationStatus, SummaryQuery, User, UserId,
};
use crate::error::{PlatformError, Result};
use crate::repository::{EventRepository, RegistrationStore, RegistrationTx, UserRepository};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: Vec<User>,
    events: Vec<Event>,
    registrations: Vec<Registration>,
    next_user_id: i64,
    next_event_id: i64,
    next_registration_id: i64,
}

impl MemoryState {
    fn occupancy(&self, event_id: EventId) -> i64 {
        self.registrations
            .iter()
            .filter(|r| r.event_id == event_id && r.is_confirmed())
            .count() as i64
    }

    fn is_registered(&self, user_id: UserId, event_id: EventId) -> bool {
        self.registrations
            .iter()
            .any(|r| r.user_id == user_id && r.event_id == event_id && r.is_confirmed())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every transactional step, to widen race windows and exercise timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of confirmed registrations for an event, read outside any transaction.
    pub async fn confirmed_count(&self, event_id: EventId) -> i64 {
        self.state.lock().await.occupancy(event_id)
    }

    /// Total number of registration rows in any status.
    pub async fn registration_rows(&self) -> usize {
        self.state.lock().await.registrations.len()
    }
}

async fn pause(latency: Option<Duration>) {
    if let Some(d) = latency {
        tokio::time::sleep(d).await;
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(PlatformError::duplicate("User", "email", user.email));
        }

        state.next_user_id += 1;
        let created = User {
            id: state.next_user_id,
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.state.lock().await.users.len() as i64)
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn insert(&self, event: NewEvent, created_by: UserId) -> Result<Event> {
        let mut state = self.state.lock().await;
        state.next_event_id += 1;
        let created = Event {
            id: state.next_event_id,
            title: event.title,
            description: event.description,
            event_date: event.event_date,
            event_time: event.event_time,
            location: event.location,
            max_capacity: event.max_capacity,
            created_by: Some(created_by),
            created_at: Utc::now(),
        };
        state.events.push(created.clone());
        Ok(created)
    }

    async fn summaries(&self, query: SummaryQuery) -> Result<Vec<EventSummary>> {
        let state = self.state.lock().await;

        let mut events: Vec<&Event> = state
            .events
            .iter()
            .filter(|e| query.from_date.map_or(true, |from| e.event_date >= from))
            .filter(|e| query.event_id.map_or(true, |id| e.id == id))
            .collect();
        events.sort_by_key(|e| (e.event_date, e.event_time, e.id));

        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(events
            .into_iter()
            .take(limit)
            .map(|e| EventSummary {
                event: e.clone(),
                current_registrations: state.occupancy(e.id),
                is_registered: query
                    .viewer
                    .map_or(false, |viewer| state.is_registered(viewer, e.id)),
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn RegistrationTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        pause(self.latency).await;
        Ok(Box::new(MemoryRegistrationTx {
            guard,
            staged,
            latency: self.latency,
        }))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Registration>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Registration> = state
            .registrations
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.registered_at.cmp(&a.registered_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn list_for_event(&self, event_id: EventId) -> Result<Vec<Registrant>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Registrant> = state
            .registrations
            .iter()
            .filter(|r| r.event_id == event_id)
            .filter_map(|r| {
                state.users.iter().find(|u| u.id == r.user_id).map(|u| Registrant {
                    registration: r.clone(),
                    email: u.email.clone(),
                    full_name: u.full_name.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.registration
                .registered_at
                .cmp(&b.registration.registered_at)
                .then(a.registration.id.cmp(&b.registration.id))
        });
        Ok(rows)
    }
}

struct MemoryRegistrationTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    latency: Option<Duration>,
}

#[async_trait]
impl RegistrationTx for MemoryRegistrationTx {
    async fn lock_event(&mut self, event_id: EventId) -> Result<Option<EventCapacity>> {
        pause(self.latency).await;
        Ok(self
            .staged
            .events
            .iter()
            .find(|e| e.id == event_id)
            .map(|e| EventCapacity {
                event_id,
                max_capacity: e.max_capacity,
                occupancy: self.staged.occupancy(event_id),
            }))
    }

    async fn find_confirmed(&mut self, user_id: UserId, event_id: EventId) -> Result<Option<Registration>> {
        Ok(self
            .staged
            .registrations
            .iter()
            .find(|r| r.user_id == user_id && r.event_id == event_id && r.is_confirmed())
            .cloned())
    }

    async fn insert_confirmed(&mut self, user_id: UserId, event_id: EventId) -> Result<Registration> {
        if self.staged.is_registered(user_id, event_id) {
            return Err(PlatformError::AlreadyRegistered { user_id, event_id });
        }
        pause(self.latency).await;

        self.staged.next_registration_id += 1;
        let registration = Registration {
            id: self.staged.next_registration_id,
            user_id,
            event_id,
            status: RegistrationStatus::Confirmed,
            registered_at: Utc::now(),
        };
        self.staged.registrations.push(registration.clone());
        Ok(registration)
    }

    async fn set_status(&mut self, id: RegistrationId, status: RegistrationStatus) -> Result<Registration> {
        let row = self
            .staged
            .registrations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PlatformError::not_found("Registration", id))?;
        row.status = status;
        Ok(row.clone())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryRegistrationTx { mut guard, staged, .. } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use crate::domain::UserRole;

    fn new_event(date: (i32, u32, u32), capacity: i32) -> NewEvent {
        NewEvent {
            title: "Event".to_string(),
            description: "Description".to_string(),
            event_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            event_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            location: "Room 1".to_string(),
            max_capacity: capacity,
        }
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            full_name: "Test User".to_string(),
            role: UserRole::Member,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        UserRepository::insert(&store, new_user("a@example.com")).await.unwrap();
        let err = UserRepository::insert(&store, new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, PlatformError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let event = EventRepository::insert(&store, new_event((2030, 1, 1), 5), 1).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_confirmed(1, event.id).await.unwrap();
            // dropped without commit
        }

        assert_eq!(store.registration_rows().await, 0);
    }

    #[tokio::test]
    async fn test_committed_transaction_visible() {
        let store = MemoryStore::new();
        let event = EventRepository::insert(&store, new_event((2030, 1, 1), 5), 1).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_confirmed(1, event.id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.confirmed_count(event.id).await, 1);
    }

    #[tokio::test]
    async fn test_summaries_filter_and_order() {
        let store = MemoryStore::new();
        let late = EventRepository::insert(&store, new_event((2030, 3, 1), 5), 1).await.unwrap();
        let early = EventRepository::insert(&store, new_event((2030, 2, 1), 5), 1).await.unwrap();
        EventRepository::insert(&store, new_event((2029, 1, 1), 5), 1).await.unwrap();

        let summaries = store
            .summaries(SummaryQuery::upcoming(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()))
            .await
            .unwrap();

        let ids: Vec<EventId> = summaries.iter().map(|s| s.event.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }

    #[tokio::test]
    async fn test_summaries_viewer_flag() {
        let store = MemoryStore::new();
        let event = EventRepository::insert(&store, new_event((2030, 1, 1), 5), 1).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_confirmed(42, event.id).await.unwrap();
        tx.commit().await.unwrap();

        let as_viewer = store.summaries(SummaryQuery::default().for_viewer(Some(42))).await.unwrap();
        assert!(as_viewer[0].is_registered);
        assert_eq!(as_viewer[0].current_registrations, 1);

        let as_other = store.summaries(SummaryQuery::default().for_viewer(Some(7))).await.unwrap();
        assert!(!as_other[0].is_registered);
    }
}
