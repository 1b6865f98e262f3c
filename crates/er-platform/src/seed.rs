//! Development data seeding
//!
//! Populates an empty datastore with an administrator, a member and a few
//! upcoming events. Only used when the server runs in dev mode.

use chrono::{Days, NaiveDate, NaiveTime};
use std::sync::Arc;
use tracing::info;

use crate::domain::{NewEvent, UserRole};
use crate::error::{PlatformError, Result};
use crate::repository::EventRepository;
use crate::service::{IdentityService, SignupCommand};

pub const DEV_ADMIN_EMAIL: &str = "admin@example.com";
pub const DEV_ADMIN_PASSWORD: &str = "admin12345";
pub const DEV_MEMBER_EMAIL: &str = "member@example.com";
pub const DEV_MEMBER_PASSWORD: &str = "member12345";

/// (title, description, days from today, hour, location, capacity)
const SAMPLE_EVENTS: &[(&str, &str, u64, u32, &str, i32)] = &[
    ("Rust Workshop", "Hands-on introduction to ownership and borrowing", 7, 10, "Room 101", 30),
    ("Community Meetup", "Lightning talks and networking", 14, 18, "Main Hall", 100),
    ("Database Internals", "How row locks and MVCC actually work", 21, 14, "Room 204", 2),
    ("Hack Night", "Bring a project, leave with a demo", 30, 19, "Lab B", 20),
];

pub struct DevDataSeeder {
    identity: IdentityService,
    events: Arc<dyn EventRepository>,
}

impl DevDataSeeder {
    pub fn new(identity: IdentityService, events: Arc<dyn EventRepository>) -> Self {
        Self { identity, events }
    }

    /// Seed when no user exists yet. Returns whether anything was written.
    pub async fn seed(&self, today: NaiveDate) -> Result<bool> {
        if self.identity.user_count().await? > 0 {
            info!("Datastore already has users, skipping dev seed");
            return Ok(false);
        }

        let admin = self
            .identity
            .create_user(
                SignupCommand {
                    full_name: "Dev Admin".to_string(),
                    email: DEV_ADMIN_EMAIL.to_string(),
                    password: DEV_ADMIN_PASSWORD.to_string(),
                },
                UserRole::Admin,
            )
            .await?;

        self.identity
            .signup(SignupCommand {
                full_name: "Dev Member".to_string(),
                email: DEV_MEMBER_EMAIL.to_string(),
                password: DEV_MEMBER_PASSWORD.to_string(),
            })
            .await?;

        for (title, description, days, hour, location, capacity) in SAMPLE_EVENTS {
            let event_date = today
                .checked_add_days(Days::new(*days))
                .ok_or_else(|| PlatformError::internal("Seed date out of range"))?;
            let event_time = NaiveTime::from_hms_opt(*hour, 0, 0)
                .ok_or_else(|| PlatformError::internal("Invalid seed time"))?;

            self.events
                .insert(
                    NewEvent {
                        title: title.to_string(),
                        description: description.to_string(),
                        event_date,
                        event_time,
                        location: location.to_string(),
                        max_capacity: *capacity,
                    },
                    admin.id,
                )
                .await?;
        }

        info!(
            admin = DEV_ADMIN_EMAIL,
            member = DEV_MEMBER_EMAIL,
            events = SAMPLE_EVENTS.len(),
            "Seeded development data"
        );
        Ok(true)
    }
}
