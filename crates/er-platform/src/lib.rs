//! Event Registration Platform
//!
//! Core platform providing:
//! - Event catalog with live occupancy counts
//! - Capacity-gated registration that cannot overshoot under concurrency
//! - Member and administrator accounts with signed sessions
//! - Postgres and in-memory datastores behind the same repository traits

pub mod domain;
pub mod repository;
pub mod service;
pub mod api;
pub mod error;
pub mod seed;

pub use domain::*;
pub use error::PlatformError;
