//! Role checks shared by services and handlers

use crate::domain::UserIdentity;
use crate::error::{PlatformError, Result};

/// Only administrators may create events and view registrant lists.
pub fn require_admin(identity: &UserIdentity) -> Result<()> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(PlatformError::unauthorized("Administrator access required"))
    }
}
