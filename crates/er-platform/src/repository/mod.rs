//! Repository Layer
//!
//! Datastore gateway for users, events and registrations. Each concern is a
//! trait with two backends:
//! - `postgres`: production store on `sqlx::PgPool`
//! - `memory`: in-process store for tests and local experiments
//!
//! Repositories execute queries and enforce storage-level uniqueness only.
//! Registration rules live in `service::registration`.

use async_trait::async_trait;

use crate::domain::{
    Event, EventCapacity, EventId, EventSummary, NewEvent, NewUser, Registrant, Registration,
    RegistrationId, RegistrationStatus, SummaryQuery, User, UserId,
};
use crate::error::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PostgresStore, connect_pool};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account. A taken email fails with `PlatformError::Duplicate`.
    async fn insert(&self, user: NewUser) -> Result<User>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>>;
    async fn count(&self) -> Result<i64>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert(&self, event: NewEvent, created_by: UserId) -> Result<Event>;

    /// Events with confirmed occupancy and viewer flag, read from one snapshot.
    async fn summaries(&self, query: SummaryQuery) -> Result<Vec<EventSummary>>;

    /// Cheap round trip used by readiness probes
    async fn ping(&self) -> Result<()>;
}

/// Entry point for registration writes.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Open a transaction. Dropping it without `commit` rolls everything back.
    async fn begin(&self) -> Result<Box<dyn RegistrationTx>>;

    /// All registrations of a user, newest first
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Registration>>;

    /// All registrations of an event with registrant details, oldest first
    async fn list_for_event(&self, event_id: EventId) -> Result<Vec<Registrant>>;
}

/// One registration transaction.
#[async_trait]
pub trait RegistrationTx: Send {
    /// Lock the event until the transaction ends and report its capacity and
    /// confirmed occupancy as seen after the lock was granted.
    async fn lock_event(&mut self, event_id: EventId) -> Result<Option<EventCapacity>>;

    async fn find_confirmed(&mut self, user_id: UserId, event_id: EventId) -> Result<Option<Registration>>;

    /// Insert a confirmed registration. A confirmed duplicate fails with
    /// `PlatformError::AlreadyRegistered`.
    async fn insert_confirmed(&mut self, user_id: UserId, event_id: EventId) -> Result<Registration>;

    async fn set_status(&mut self, id: RegistrationId, status: RegistrationStatus) -> Result<Registration>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
