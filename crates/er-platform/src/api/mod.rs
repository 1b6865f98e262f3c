//! API Layer
//!
//! REST endpoints for the platform: member-facing events, admin and auth
//! routers plus health probes and the OpenAPI document.

use axum::{Extension, Router};
use std::sync::Arc;
use std::time::Duration;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use er_config::AppConfig;

use crate::error::Result;
use crate::repository::{EventRepository, RegistrationStore, UserRepository};
use crate::service::{
    Argon2Config, AuthConfig, AuthService, EventCatalogService, IdentityService,
    PasswordService, RegistrationService,
};

pub mod admin;
pub mod auth;
pub mod common;
pub mod events;
pub mod middleware;
pub mod monitoring;
pub mod openapi;

pub use common::*;
pub use middleware::{AppState, Authenticated, OptionalAuth, SESSION_COOKIE};

pub use admin::{AdminState, admin_router};
pub use auth::{AuthState, auth_router};
pub use events::{EventsState, events_router, registrations_router};
pub use monitoring::{MonitoringState, monitoring_router};
pub use openapi::PlatformApiDoc;

/// Every service the HTTP layer needs, wired to one datastore.
#[derive(Clone)]
pub struct PlatformState {
    pub auth_service: Arc<AuthService>,
    pub identity: IdentityService,
    pub catalog: EventCatalogService,
    pub registrations: RegistrationService,
    pub events: Arc<dyn EventRepository>,
    pub store_timeout: Duration,
    pub cookie_secure: bool,
}

impl PlatformState {
    /// Wire services against a store that implements all three repositories.
    pub fn new<S>(store: Arc<S>, config: &AppConfig) -> Result<Self>
    where
        S: UserRepository + EventRepository + RegistrationStore + 'static,
    {
        let store_timeout = config.database.statement_timeout();
        let passwords = PasswordService::new(Argon2Config::from(&config.password))?;

        Ok(Self {
            auth_service: Arc::new(AuthService::new(AuthConfig::from(&config.auth))),
            identity: IdentityService::new(store.clone(), passwords, store_timeout),
            catalog: EventCatalogService::new(store.clone(), store_timeout),
            registrations: RegistrationService::new(store.clone(), store_timeout),
            events: store,
            store_timeout,
            cookie_secure: config.auth.cookie_secure,
        })
    }
}

/// Build the full application router, without transport layers.
pub fn create_router(state: PlatformState) -> Router {
    let app_state = AppState {
        auth_service: state.auth_service.clone(),
    };
    let events_state = EventsState {
        catalog: state.catalog.clone(),
        registrations: state.registrations.clone(),
    };
    let admin_state = AdminState {
        catalog: state.catalog.clone(),
        registrations: state.registrations.clone(),
    };
    let auth_state = AuthState {
        auth_service: state.auth_service.clone(),
        identity: state.identity.clone(),
        cookie_secure: state.cookie_secure,
    };
    let monitoring_state = MonitoringState {
        events: state.events.clone(),
        ping_timeout: state.store_timeout,
    };

    Router::new()
        .nest("/api/events", events_router(events_state.clone()))
        .nest("/api/registrations", registrations_router(events_state))
        .nest("/api/admin", admin_router(admin_state))
        .nest("/auth", auth_router(auth_state))
        .merge(monitoring_router(monitoring_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", PlatformApiDoc::openapi()))
        .layer(Extension(app_state))
}
