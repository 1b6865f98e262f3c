//! Events API
//!
//! Member-facing catalog and registration endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::common::{json_body, path_param, query_params, ApiResult, AsOfQuery};
use crate::api::middleware::{Authenticated, OptionalAuth};
use crate::domain::{EventId, EventSummary, Registration};
use crate::error::PlatformError;
use crate::service::catalog::FEATURED_LIMIT;
use crate::service::{EventCatalogService, RegistrationService};

/// Event with occupancy, as seen by the caller
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventSummaryResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// YYYY-MM-DD
    pub event_date: String,
    /// HH:MM:SS
    pub event_time: String,
    pub location: String,
    pub max_capacity: i32,
    pub current_registrations: i64,
    pub spots_left: i64,
    pub is_full: bool,
    /// Whether the caller holds a confirmed registration
    pub is_registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<i64>,
    pub created_at: String,
}

impl From<EventSummary> for EventSummaryResponse {
    fn from(s: EventSummary) -> Self {
        let spots_left = s.spots_left();
        let is_full = s.is_full();
        let e = s.event;
        Self {
            id: e.id,
            title: e.title,
            description: e.description,
            event_date: e.event_date.format("%Y-%m-%d").to_string(),
            event_time: e.event_time.format("%H:%M:%S").to_string(),
            location: e.location,
            max_capacity: e.max_capacity,
            current_registrations: s.current_registrations,
            spots_left,
            is_full,
            is_registered: s.is_registered,
            created_by: e.created_by,
            created_at: e.created_at.to_rfc3339(),
        }
    }
}

/// Register request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub event_id: Option<i64>,
}

/// Register response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub registration_id: i64,
    pub event_id: i64,
}

/// Registration DTO
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
    /// confirmed or cancelled
    pub status: String,
    pub registered_at: String,
}

impl From<Registration> for RegistrationResponse {
    fn from(r: Registration) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            event_id: r.event_id,
            status: r.status.as_str().to_string(),
            registered_at: r.registered_at.to_rfc3339(),
        }
    }
}

/// Events service state
#[derive(Clone)]
pub struct EventsState {
    pub catalog: EventCatalogService,
    pub registrations: RegistrationService,
}

/// List upcoming events
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "events",
    params(AsOfQuery),
    responses(
        (status = 200, description = "Upcoming events ordered by date and time", body = Vec<EventSummaryResponse>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_events(
    State(state): State<EventsState>,
    Authenticated(identity): Authenticated,
    query: Result<Query<AsOfQuery>, QueryRejection>,
) -> ApiResult<Vec<EventSummaryResponse>> {
    let query = query_params(query)?;
    let events = state.catalog.list_upcoming(query.date(), Some(identity.id)).await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

/// Featured upcoming events for the landing page
#[utoipa::path(
    get,
    path = "/api/events/featured",
    tag = "events",
    params(AsOfQuery),
    responses(
        (status = 200, description = "Up to six upcoming events", body = Vec<EventSummaryResponse>)
    )
)]
pub async fn featured_events(
    State(state): State<EventsState>,
    OptionalAuth(identity): OptionalAuth,
    query: Result<Query<AsOfQuery>, QueryRejection>,
) -> ApiResult<Vec<EventSummaryResponse>> {
    let query = query_params(query)?;
    let viewer = identity.map(|i| i.id);
    let events = state.catalog.featured(query.date(), viewer, FEATURED_LIMIT).await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

/// Get one event
#[utoipa::path(
    get,
    path = "/api/events/{id}",
    tag = "events",
    params(
        ("id" = i64, Path, description = "Event ID")
    ),
    responses(
        (status = 200, description = "Event found", body = EventSummaryResponse),
        (status = 404, description = "Event not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_event(
    State(state): State<EventsState>,
    Authenticated(identity): Authenticated,
    id: Result<Path<EventId>, PathRejection>,
) -> ApiResult<EventSummaryResponse> {
    let id = path_param(id)?;
    let event = state.catalog.get_event(id, Some(identity.id)).await?;
    Ok(Json(event.into()))
}

/// Register for an event
#[utoipa::path(
    post,
    path = "/api/events/register",
    tag = "events",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration confirmed", body = RegisterResponse),
        (status = 400, description = "Missing or malformed eventId"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Event full or already registered"),
        (status = 503, description = "Datastore unavailable, safe to retry")
    ),
    security(("bearer_auth" = []))
)]
pub async fn register(
    State(state): State<EventsState>,
    Authenticated(identity): Authenticated,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), PlatformError> {
    let event_id = json_body(payload)?
        .event_id
        .ok_or_else(|| PlatformError::validation("eventId is required"))?;

    let registration_id = state.registrations.register(&identity, event_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            registration_id,
            event_id,
        }),
    ))
}

/// Cancel the caller's registration
#[utoipa::path(
    post,
    path = "/api/events/{id}/cancel",
    tag = "events",
    params(
        ("id" = i64, Path, description = "Event ID")
    ),
    responses(
        (status = 200, description = "Registration cancelled", body = RegistrationResponse),
        (status = 404, description = "No confirmed registration for this event")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_registration(
    State(state): State<EventsState>,
    Authenticated(identity): Authenticated,
    id: Result<Path<EventId>, PathRejection>,
) -> ApiResult<RegistrationResponse> {
    let id = path_param(id)?;
    let registration = state.registrations.cancel(&identity, id).await?;
    Ok(Json(registration.into()))
}

/// The caller's registrations
#[utoipa::path(
    get,
    path = "/api/registrations/mine",
    tag = "registrations",
    responses(
        (status = 200, description = "Registrations, newest first", body = Vec<RegistrationResponse>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_registrations(
    State(state): State<EventsState>,
    Authenticated(identity): Authenticated,
) -> ApiResult<Vec<RegistrationResponse>> {
    let registrations = state.registrations.my_registrations(&identity).await?;
    Ok(Json(registrations.into_iter().map(Into::into).collect()))
}

/// Create the events router
pub fn events_router(state: EventsState) -> Router {
    Router::new()
        .route("/", get(list_events))
        .route("/featured", get(featured_events))
        .route("/register", post(register))
        .route("/:id", get(get_event))
        .route("/:id/cancel", post(cancel_registration))
        .with_state(state)
}

/// Create the registrations router
pub fn registrations_router(state: EventsState) -> Router {
    Router::new()
        .route("/mine", get(my_registrations))
        .with_state(state)
}
