//! User domain entities.

pub mod model;
pub mod role;

pub use model::{User, UserActivity, UserView};
pub use role::UserRole;
