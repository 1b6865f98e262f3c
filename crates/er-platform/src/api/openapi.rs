//! OpenAPI Documentation

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Platform API OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Event Registration API",
        version = "1.0.0",
        description = "Event catalog, capacity-checked registration and administration"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "events", description = "Event catalog and registration"),
        (name = "registrations", description = "The caller's registrations"),
        (name = "admin", description = "Event administration"),
        (name = "auth", description = "Authentication"),
        (name = "monitoring", description = "Health probes")
    ),
    paths(
        super::events::list_events,
        super::events::featured_events,
        super::events::get_event,
        super::events::register,
        super::events::cancel_registration,
        super::events::my_registrations,
        super::admin::list_all_events,
        super::admin::create_event,
        super::admin::event_registrations,
        super::admin::dashboard_stats,
        super::auth::signup,
        super::auth::login,
        super::auth::logout,
        super::auth::get_current_user,
        super::monitoring::health,
        super::monitoring::ready,
    ),
    components(
        schemas(
            super::events::EventSummaryResponse,
            super::events::RegisterRequest,
            super::events::RegisterResponse,
            super::events::RegistrationResponse,
            super::admin::CreateEventRequest,
            super::admin::RegistrantResponse,
            super::admin::DashboardStatsResponse,
            super::auth::SignupRequest,
            super::auth::LoginRequest,
            super::auth::SessionResponse,
            super::auth::UserResponse,
            super::common::ApiError,
            er_common::HealthReport,
            er_common::ComponentHealth,
            er_common::HealthStatus,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct PlatformApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_registration_path() {
        let doc = PlatformApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/events/register"));
        assert!(doc.paths.paths.contains_key("/api/admin/events/{id}/registrations"));
    }
}
