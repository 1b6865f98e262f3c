//! Event Entity and Read Models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::domain::UserId;
use crate::error::{PlatformError, Result};

pub type EventId = i64;

/// A scheduled event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub event_time: NaiveTime,
    pub location: String,
    /// Always positive
    pub max_capacity: i32,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Raw event creation input, as submitted by an administrator
#[derive(Debug, Clone, Default)]
pub struct CreateEventCommand {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<String>,
    pub event_time: Option<String>,
    pub location: Option<String>,
    pub max_capacity: Option<i64>,
}

/// Validated event creation input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub event_time: NaiveTime,
    pub location: String,
    pub max_capacity: i32,
}

impl NewEvent {
    /// Validate a creation command. Every field is required and must be non-blank.
    pub fn parse(cmd: CreateEventCommand) -> Result<Self> {
        let title = required("title", cmd.title)?;
        let description = required("description", cmd.description)?;
        let event_date = required("eventDate", cmd.event_date)?;
        let event_time = required("eventTime", cmd.event_time)?;
        let location = required("location", cmd.location)?;
        let max_capacity = cmd
            .max_capacity
            .ok_or_else(|| PlatformError::validation("maxCapacity is required"))?;

        let event_date = NaiveDate::parse_from_str(&event_date, "%Y-%m-%d").map_err(|_| {
            PlatformError::validation(format!("eventDate must be YYYY-MM-DD, got '{}'", event_date))
        })?;
        let event_time = parse_time(&event_time)?;

        if max_capacity <= 0 {
            return Err(PlatformError::validation("maxCapacity must be a positive integer"));
        }
        let max_capacity = i32::try_from(max_capacity)
            .map_err(|_| PlatformError::validation("maxCapacity is too large"))?;

        Ok(Self {
            title,
            description,
            event_date,
            event_time,
            location,
            max_capacity,
        })
    }
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PlatformError::validation(format!("{} is required", field))),
    }
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| PlatformError::validation(format!("eventTime must be HH:MM, got '{}'", value)))
}

/// Event with its confirmed occupancy and the viewer's registration flag.
///
/// Both counts come from the same read, never from two separate queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub event: Event,
    pub current_registrations: i64,
    pub is_registered: bool,
}

impl EventSummary {
    pub fn is_full(&self) -> bool {
        self.current_registrations >= i64::from(self.event.max_capacity)
    }

    pub fn spots_left(&self) -> i64 {
        (i64::from(self.event.max_capacity) - self.current_registrations).max(0)
    }

    pub fn is_past(&self, as_of: NaiveDate) -> bool {
        self.event.event_date < as_of
    }
}

/// Filter for summary reads. Results are always ordered by (date, time, id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryQuery {
    /// Only events on or after this date
    pub from_date: Option<NaiveDate>,
    /// Whose registrations drive `is_registered`; `None` leaves it false
    pub viewer: Option<UserId>,
    pub event_id: Option<EventId>,
    pub limit: Option<u32>,
}

impl SummaryQuery {
    pub fn upcoming(as_of: NaiveDate) -> Self {
        Self {
            from_date: Some(as_of),
            ..Default::default()
        }
    }

    pub fn for_viewer(mut self, viewer: Option<UserId>) -> Self {
        self.viewer = viewer;
        self
    }

    pub fn with_event(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Capacity snapshot taken while the event is locked for registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventCapacity {
    pub event_id: EventId,
    pub max_capacity: i32,
    pub occupancy: i64,
}

impl EventCapacity {
    pub fn has_room(&self) -> bool {
        self.occupancy < i64::from(self.max_capacity)
    }
}

/// Aggregates shown on the admin dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_events: u64,
    pub total_registrations: i64,
    pub upcoming_events: u64,
}

impl DashboardStats {
    pub fn from_summaries(summaries: &[EventSummary], as_of: NaiveDate) -> Self {
        Self {
            total_events: summaries.len() as u64,
            total_registrations: summaries.iter().map(|s| s.current_registrations).sum(),
            upcoming_events: summaries.iter().filter(|s| !s.is_past(as_of)).count() as u64,
        }
    }
}
