//! Event Catalog Service
//!
//! Read side of the platform plus administrative event creation. Every list
//! is served by a single `EventRepository::summaries` call so occupancy and
//! the viewer flag always come from the same snapshot.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::domain::{
    CreateEventCommand, DashboardStats, Event, EventId, EventSummary, NewEvent, SummaryQuery,
    UserId, UserIdentity,
};
use crate::error::{PlatformError, Result};
use crate::repository::EventRepository;
use crate::service::{bounded, checks};

/// Number of events on the landing page
pub const FEATURED_LIMIT: u32 = 6;

#[derive(Clone)]
pub struct EventCatalogService {
    events: Arc<dyn EventRepository>,
    timeout: Duration,
}

impl EventCatalogService {
    pub fn new(events: Arc<dyn EventRepository>, timeout: Duration) -> Self {
        Self { events, timeout }
    }

    async fn read(&self, operation: &'static str, query: SummaryQuery) -> Result<Vec<EventSummary>> {
        bounded(self.timeout, operation, self.events.summaries(query))
            .await
            .map_err(|e| {
                error!(operation, error = %e, "Catalog read failed");
                e
            })
    }

    /// Events dated on or after `as_of`, ordered by date then time.
    pub async fn list_upcoming(&self, as_of: NaiveDate, viewer: Option<UserId>) -> Result<Vec<EventSummary>> {
        self.read("list_upcoming", SummaryQuery::upcoming(as_of).for_viewer(viewer))
            .await
    }

    /// Every event with its occupancy, past ones included.
    pub async fn admin_summary(&self) -> Result<Vec<EventSummary>> {
        self.read("admin_summary", SummaryQuery::default()).await
    }

    /// First `limit` upcoming events
    pub async fn featured(&self, as_of: NaiveDate, viewer: Option<UserId>, limit: u32) -> Result<Vec<EventSummary>> {
        self.read(
            "featured",
            SummaryQuery::upcoming(as_of).for_viewer(viewer).with_limit(limit),
        )
        .await
    }

    pub async fn get_event(&self, event_id: EventId, viewer: Option<UserId>) -> Result<EventSummary> {
        self.read("get_event", SummaryQuery::default().with_event(event_id).for_viewer(viewer))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::not_found("Event", event_id))
    }

    /// Dashboard totals, derived from one summary read.
    pub async fn dashboard_stats(&self, as_of: NaiveDate) -> Result<DashboardStats> {
        let summaries = self.read("dashboard_stats", SummaryQuery::default()).await?;
        Ok(DashboardStats::from_summaries(&summaries, as_of))
    }

    /// Create an event. Role and field validation happen before the store is touched.
    pub async fn create_event(&self, identity: &UserIdentity, cmd: CreateEventCommand) -> Result<Event> {
        checks::require_admin(identity)?;
        let new_event = NewEvent::parse(cmd)?;

        let event = bounded(self.timeout, "create_event", self.events.insert(new_event, identity.id))
            .await
            .map_err(|e| {
                error!(admin_id = identity.id, error = %e, "Event creation failed");
                e
            })?;

        info!(event_id = event.id, admin_id = identity.id, max_capacity = event.max_capacity, "Event created");
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;
    use crate::repository::MemoryStore;

    fn identity(role: UserRole) -> UserIdentity {
        UserIdentity {
            id: 1,
            email: "admin@example.com".to_string(),
            role,
        }
    }

    fn command(date: &str) -> CreateEventCommand {
        CreateEventCommand {
            title: Some("Workshop".to_string()),
            description: Some("Hands-on".to_string()),
            event_date: Some(date.to_string()),
            event_time: Some("10:00".to_string()),
            location: Some("Lab".to_string()),
            max_capacity: Some(10),
        }
    }

    fn service() -> EventCatalogService {
        EventCatalogService::new(Arc::new(MemoryStore::new()), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_member_cannot_create_event() {
        let catalog = service();
        let err = catalog
            .create_event(&identity(UserRole::Member), command("2030-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Unauthorized { .. }));
        assert!(catalog.admin_summary().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_capacity_rejected() {
        let catalog = service();
        let mut cmd = command("2030-01-01");
        cmd.max_capacity = Some(0);

        let err = catalog.create_event(&identity(UserRole::Admin), cmd).await.unwrap_err();
        assert!(matches!(err, PlatformError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_list_upcoming_excludes_past() {
        let catalog = service();
        let admin = identity(UserRole::Admin);
        catalog.create_event(&admin, command("2020-01-01")).await.unwrap();
        catalog.create_event(&admin, command("2030-01-01")).await.unwrap();

        let as_of = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let upcoming = catalog.list_upcoming(as_of, None).await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert!(upcoming.iter().all(|s| s.event.event_date >= as_of));

        let stats = catalog.dashboard_stats(as_of).await.unwrap();
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.upcoming_events, 1);
    }

    #[tokio::test]
    async fn test_featured_respects_limit() {
        let catalog = service();
        let admin = identity(UserRole::Admin);
        for day in 1..=8 {
            catalog
                .create_event(&admin, command(&format!("2030-01-{:02}", day)))
                .await
                .unwrap();
        }

        let as_of = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let featured = catalog.featured(as_of, None, FEATURED_LIMIT).await.unwrap();
        assert_eq!(featured.len(), FEATURED_LIMIT as usize);
    }

    #[tokio::test]
    async fn test_get_missing_event_is_not_found() {
        let err = service().get_event(404, None).await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
    }
}
