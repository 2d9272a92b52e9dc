//! The authenticated caller of an engine operation.

use serde::{Deserialize, Serialize};

use parkhub_core::types::id::UserId;
use parkhub_entity::user::{User, UserRole};

use crate::error::{EngineError, EngineResult};

/// An already-authenticated principal.
///
/// Credential checks happen in the request layer; the engine only checks
/// capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The acting user.
    pub user_id: UserId,
    /// The acting user's role.
    pub role: UserRole,
}

impl Principal {
    /// A principal with role `admin`.
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: UserRole::Admin,
        }
    }

    /// A principal with role `user`.
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            role: UserRole::User,
        }
    }

    /// Lot and user administration.
    pub fn require_admin(&self) -> EngineResult<()> {
        match self.role {
            UserRole::Admin => Ok(()),
            UserRole::User => Err(EngineError::Forbidden(
                "Administrator role required".to_string(),
            )),
        }
    }

    /// Booking, parking and vacating.
    pub fn require_user(&self) -> EngineResult<()> {
        match self.role {
            UserRole::User => Ok(()),
            UserRole::Admin => Err(EngineError::Forbidden(
                "Administrators cannot hold reservations".to_string(),
            )),
        }
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
        }
    }
}
