//! Admin API
//!
//! Event creation, occupancy overview and registrant lists. Every handler
//! requires the admin role.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::common::{json_body, path_param, query_params, ApiResult, AsOfQuery};
use crate::api::events::{EventSummaryResponse, RegistrationResponse};
use crate::api::middleware::Authenticated;
use crate::domain::{CreateEventCommand, DashboardStats, EventId, EventSummary, Registrant};
use crate::error::PlatformError;
use crate::service::{checks, EventCatalogService, RegistrationService};

/// Create event request. Every field is required.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    /// YYYY-MM-DD
    pub event_date: Option<String>,
    /// HH:MM or HH:MM:SS
    pub event_time: Option<String>,
    pub location: Option<String>,
    /// Positive integer
    pub max_capacity: Option<i64>,
}

impl From<CreateEventRequest> for CreateEventCommand {
    fn from(r: CreateEventRequest) -> Self {
        Self {
            title: r.title,
            description: r.description,
            event_date: r.event_date,
            event_time: r.event_time,
            location: r.location,
            max_capacity: r.max_capacity,
        }
    }
}

/// Registrant DTO
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrantResponse {
    pub registration: RegistrationResponse,
    pub email: String,
    pub full_name: String,
}

impl From<Registrant> for RegistrantResponse {
    fn from(r: Registrant) -> Self {
        Self {
            registration: r.registration.into(),
            email: r.email,
            full_name: r.full_name,
        }
    }
}

/// Dashboard totals
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStatsResponse {
    pub total_events: u64,
    /// Confirmed registrations across all events
    pub total_registrations: i64,
    pub upcoming_events: u64,
}

impl From<DashboardStats> for DashboardStatsResponse {
    fn from(s: DashboardStats) -> Self {
        Self {
            total_events: s.total_events,
            total_registrations: s.total_registrations,
            upcoming_events: s.upcoming_events,
        }
    }
}

/// Admin service state
#[derive(Clone)]
pub struct AdminState {
    pub catalog: EventCatalogService,
    pub registrations: RegistrationService,
}

/// All events with occupancy
#[utoipa::path(
    get,
    path = "/api/admin/events",
    tag = "admin",
    responses(
        (status = 200, description = "Every event, past ones included", body = Vec<EventSummaryResponse>),
        (status = 401, description = "Not an administrator")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_all_events(
    State(state): State<AdminState>,
    Authenticated(identity): Authenticated,
) -> ApiResult<Vec<EventSummaryResponse>> {
    checks::require_admin(&identity)?;

    let events = state.catalog.admin_summary().await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

/// Create an event
#[utoipa::path(
    post,
    path = "/api/admin/events",
    tag = "admin",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventSummaryResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Not an administrator")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_event(
    State(state): State<AdminState>,
    Authenticated(identity): Authenticated,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EventSummaryResponse>), PlatformError> {
    checks::require_admin(&identity)?;
    let req = json_body(payload)?;

    let event = state.catalog.create_event(&identity, req.into()).await?;
    let summary = EventSummary {
        event,
        current_registrations: 0,
        is_registered: false,
    };

    Ok((StatusCode::CREATED, Json(summary.into())))
}

/// Registrants of one event
#[utoipa::path(
    get,
    path = "/api/admin/events/{id}/registrations",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "Event ID")
    ),
    responses(
        (status = 200, description = "Registrations in any status, oldest first", body = Vec<RegistrantResponse>),
        (status = 401, description = "Not an administrator"),
        (status = 404, description = "Event not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn event_registrations(
    State(state): State<AdminState>,
    Authenticated(identity): Authenticated,
    id: Result<Path<EventId>, PathRejection>,
) -> ApiResult<Vec<RegistrantResponse>> {
    checks::require_admin(&identity)?;
    let id = path_param(id)?;

    // 404 for unknown events instead of an empty list
    state.catalog.get_event(id, None).await?;
    let registrants = state.registrations.event_registrations(&identity, id).await?;
    Ok(Json(registrants.into_iter().map(Into::into).collect()))
}

/// Dashboard statistics
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "admin",
    params(AsOfQuery),
    responses(
        (status = 200, description = "Dashboard totals", body = DashboardStatsResponse),
        (status = 401, description = "Not an administrator")
    ),
    security(("bearer_auth" = []))
)]
pub async fn dashboard_stats(
    State(state): State<AdminState>,
    Authenticated(identity): Authenticated,
    query: Result<Query<AsOfQuery>, QueryRejection>,
) -> ApiResult<DashboardStatsResponse> {
    checks::require_admin(&identity)?;
    let query = query_params(query)?;

    let stats = state.catalog.dashboard_stats(query.date()).await?;
    Ok(Json(stats.into()))
}

/// Create the admin router
pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/events", get(list_all_events).post(create_event))
        .route("/events/:id/registrations", get(event_registrations))
        .route("/stats", get(dashboard_stats))
        .with_state(state)
}
