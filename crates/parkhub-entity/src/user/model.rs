//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use parkhub_core::types::id::UserId;

use super::role::UserRole;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Argon2 password hash.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// User role.
    pub role: UserRole,
    /// When the user was registered.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Check if this user has admin privileges.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Fields indexed for keyword search.
    pub fn search_fields(&self) -> Vec<String> {
        vec![self.username.clone(), self.email.clone()]
    }
}

/// A user as returned by read endpoints: every column except the hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    /// Unique user identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// User role.
    pub role: UserRole,
    /// When the user was registered.
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// A non-admin user together with the time of their most recent booking.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserActivity {
    /// The user.
    #[sqlx(flatten)]
    pub user: User,
    /// Latest `booking_timestamp` across all of the user's reservations.
    pub last_booking: Option<DateTime<Utc>>,
}

impl UserActivity {
    /// Whether the user has not booked since `cutoff` (or never booked).
    pub fn is_inactive_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_booking.is_none_or(|last| last < cutoff)
    }
}
