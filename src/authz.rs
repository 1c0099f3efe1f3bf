use uuid::Uuid;

use crate::error::ApiError;

/// Only the owner of a resource may modify it.
pub fn ensure_owner(owner_id: Uuid, actor_id: Uuid, action: &str) -> Result<(), ApiError> {
    if owner_id == actor_id {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("You are not authorized to {}", action)))
    }
}
