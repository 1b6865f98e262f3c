//! Domain Models
//!
//! Core entities of the registration platform: events, users, and the
//! registrations linking them. Identifiers are database-assigned integers.

pub mod event;
pub mod user;
pub mod registration;

pub use event::*;
pub use user::*;
pub use registration::*;
