//! Postgres datastore backend

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::time::Duration;
use tracing::{debug, info};

use er_config::DatabaseConfig;

use crate::domain::{
    Event, EventCapacity, EventId, EventSummary, NewEvent, NewUser, Registrant, Registration,
    RegistrationId, RegistrationStatus, SummaryQuery, User, UserId,
};
use crate::error::{is_unique_violation, PlatformError, Result};
use crate::repository::{EventRepository, RegistrationStore, RegistrationTx, UserRepository};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        full_name TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'member' CHECK (role IN ('member', 'admin')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        event_date DATE NOT NULL,
        event_time TIME NOT NULL,
        location TEXT NOT NULL,
        max_capacity INTEGER NOT NULL CHECK (max_capacity > 0),
        created_by BIGINT REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_events_schedule ON events(event_date, event_time)",
    r#"
    CREATE TABLE IF NOT EXISTS registrations (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES users(id),
        event_id BIGINT NOT NULL REFERENCES events(id),
        status TEXT NOT NULL CHECK (status IN ('confirmed', 'cancelled')),
        registered_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    // At most one confirmed registration per (user, event)
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS uq_registrations_confirmed
        ON registrations(user_id, event_id) WHERE status = 'confirmed'
    "#,
    "CREATE INDEX IF NOT EXISTS idx_registrations_event ON registrations(event_id, status)",
];

const EVENT_COLUMNS: &str =
    "e.id, e.title, e.description, e.event_date, e.event_time, e.location, e.max_capacity, e.created_by, e.created_at";

const REGISTRATION_COLUMNS: &str = "id, user_id, event_id, status, registered_at";

/// Build the connection pool. Connections are opened lazily.
pub fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect_lazy(&config.url)?;
    Ok(pool)
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PostgresStore {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self { pool, statement_timeout }
    }

    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }
}

fn event_from_row(row: &PgRow) -> Result<Event> {
    Ok(Event {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        event_date: row.try_get("event_date")?,
        event_time: row.try_get("event_time")?,
        location: row.try_get("location")?,
        max_capacity: row.try_get("max_capacity")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        full_name: row.try_get("full_name")?,
        role: role.parse()?,
        created_at: row.try_get("created_at")?,
    })
}

fn registration_from_row(row: &PgRow) -> Result<Registration> {
    let status: String = row.try_get("status")?;
    Ok(Registration {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        event_id: row.try_get("event_id")?,
        status: status.parse()?,
        registered_at: row.try_get("registered_at")?,
    })
}

#[async_trait]
impl UserRepository for PostgresStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, full_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, full_name, role, created_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => user_from_row(&row),
            Err(e) if is_unique_violation(&e) => {
                Err(PlatformError::duplicate("User", "email", user.email))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, full_name, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, full_name, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

#[async_trait]
impl EventRepository for PostgresStore {
    async fn insert(&self, event: NewEvent, created_by: UserId) -> Result<Event> {
        let sql = format!(
            r#"
            INSERT INTO events AS e (title, description, event_date, event_time, location, max_capacity, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&event.title)
            .bind(&event.description)
            .bind(event.event_date)
            .bind(event.event_time)
            .bind(&event.location)
            .bind(event.max_capacity)
            .bind(created_by)
            .fetch_one(&self.pool)
            .await?;
        event_from_row(&row)
    }

    async fn summaries(&self, query: SummaryQuery) -> Result<Vec<EventSummary>> {
        // One statement: occupancy and the viewer flag share a snapshot.
        let sql = format!(
            r#"
            SELECT {},
                   COUNT(r.id) AS current_registrations,
                   COALESCE(BOOL_OR(r.user_id = $1::BIGINT), FALSE) AS is_registered
            FROM events e
            LEFT JOIN registrations r ON r.event_id = e.id AND r.status = 'confirmed'
            WHERE ($2::DATE IS NULL OR e.event_date >= $2::DATE)
              AND ($3::BIGINT IS NULL OR e.id = $3::BIGINT)
            GROUP BY e.id
            ORDER BY e.event_date, e.event_time, e.id
            LIMIT $4
            "#,
            EVENT_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(query.viewer)
            .bind(query.from_date)
            .bind(query.event_id)
            .bind(query.limit.map(i64::from))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(EventSummary {
                    event: event_from_row(row)?,
                    current_registrations: row.try_get("current_registrations")?,
                    is_registered: row.try_get("is_registered")?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl RegistrationStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn RegistrationTx>> {
        let mut tx = self.pool.begin().await?;

        // Default READ COMMITTED: every statement after the row lock sees
        // registrations committed by the previous lock holder.
        let millis = self.statement_timeout.as_millis();
        sqlx::query(&format!("SET LOCAL statement_timeout = {}", millis))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("SET LOCAL lock_timeout = {}", millis))
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgRegistrationTx { tx }))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Registration>> {
        let sql = format!(
            "SELECT {} FROM registrations WHERE user_id = $1 ORDER BY registered_at DESC, id DESC",
            REGISTRATION_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?;
        rows.iter().map(registration_from_row).collect()
    }

    async fn list_for_event(&self, event_id: EventId) -> Result<Vec<Registrant>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.user_id, r.event_id, r.status, r.registered_at, u.email, u.full_name
            FROM registrations r
            JOIN users u ON u.id = r.user_id
            WHERE r.event_id = $1
            ORDER BY r.registered_at, r.id
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Registrant {
                    registration: registration_from_row(row)?,
                    email: row.try_get("email")?,
                    full_name: row.try_get("full_name")?,
                })
            })
            .collect()
    }
}

/// Transaction handle; sqlx rolls back on drop unless committed.
struct PgRegistrationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RegistrationTx for PgRegistrationTx {
    async fn lock_event(&mut self, event_id: EventId) -> Result<Option<EventCapacity>> {
        let locked = sqlx::query("SELECT max_capacity FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = locked else {
            return Ok(None);
        };
        let max_capacity: i32 = row.try_get("max_capacity")?;

        // Separate statement so the count is taken after the lock was granted.
        let occupancy: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM registrations WHERE event_id = $1 AND status = 'confirmed'",
        )
        .bind(event_id)
        .fetch_one(&mut *self.tx)
        .await?
        .try_get("n")?;

        debug!(event_id, max_capacity, occupancy, "Locked event");
        Ok(Some(EventCapacity {
            event_id,
            max_capacity,
            occupancy,
        }))
    }

    async fn find_confirmed(&mut self, user_id: UserId, event_id: EventId) -> Result<Option<Registration>> {
        let sql = format!(
            "SELECT {} FROM registrations WHERE user_id = $1 AND event_id = $2 AND status = 'confirmed'",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(event_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(registration_from_row).transpose()
    }

    async fn insert_confirmed(&mut self, user_id: UserId, event_id: EventId) -> Result<Registration> {
        let sql = format!(
            "INSERT INTO registrations (user_id, event_id, status) VALUES ($1, $2, 'confirmed') RETURNING {}",
            REGISTRATION_COLUMNS
        );
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(event_id)
            .fetch_one(&mut *self.tx)
            .await;

        match result {
            Ok(row) => registration_from_row(&row),
            Err(e) if is_unique_violation(&e) => {
                Err(PlatformError::AlreadyRegistered { user_id, event_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_status(&mut self, id: RegistrationId, status: RegistrationStatus) -> Result<Registration> {
        let sql = format!(
            "UPDATE registrations SET status = $2 WHERE id = $1 RETURNING {}",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| PlatformError::not_found("Registration", id))?;
        registration_from_row(&row)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
