//! Registration and deletion of users.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use parkhub_cache::ReadCache;
use parkhub_core::error::ErrorKind;
use parkhub_core::time::Clock;
use parkhub_core::traits::search::SearchEntity;
use parkhub_core::types::id::UserId;
use parkhub_database::EntityStore;
use parkhub_entity::job::Task;
use parkhub_entity::spot::SpotStatus;
use parkhub_entity::user::{User, UserRole};

use crate::context::Principal;
use crate::dispatch::{TaskDispatcher, dispatch_after_commit};
use crate::error::{EngineError, EngineResult};
use crate::locks::LotLocks;
use crate::password::{MIN_PASSWORD_LENGTH, PasswordHasher};

/// Registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Plaintext password, hashed before storage.
    pub password: String,
    /// Role of the new account.
    pub role: UserRole,
}

/// Handles user accounts.
#[derive(Debug, Clone)]
pub struct UserService {
    store: Arc<dyn EntityStore>,
    cache: Arc<ReadCache>,
    dispatcher: Arc<dyn TaskDispatcher>,
    locks: Arc<LotLocks>,
    clock: Arc<dyn Clock>,
    hasher: PasswordHasher,
}

impl UserService {
    /// Creates a new user service.
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<ReadCache>,
        dispatcher: Arc<dyn TaskDispatcher>,
        locks: Arc<LotLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache,
            dispatcher,
            locks,
            clock,
            hasher: PasswordHasher::new(),
        }
    }

    /// Create an account.
    pub async fn register(&self, req: NewUser) -> EngineResult<User> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_lowercase();

        if username.is_empty() {
            return Err(EngineError::validation("Username is required"));
        }
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(EngineError::validation("Invalid email format"));
        }
        if req.password.len() < MIN_PASSWORD_LENGTH {
            return Err(EngineError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        if self.store.find_user_by_username(&username).await?.is_some() {
            return Err(EngineError::validation("Username is already taken"));
        }
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(EngineError::validation("Email is already registered"));
        }

        let user = User {
            id: UserId::new(),
            username,
            email,
            password_hash: self.hasher.hash_password(&req.password)?,
            role: req.role,
            created_at: self.clock.now(),
        };

        let mut tx = self.store.begin().await?;
        tx.insert_user(&user).await.map_err(|e| match e.kind {
            // Lost a race with a concurrent registration.
            ErrorKind::Conflict => EngineError::validation("Username or email already registered"),
            _ => EngineError::Store(e),
        })?;
        tx.commit().await?;

        self.cache.invalidate_all().await;
        info!(user_id = %user.id, username = %user.username, role = %user.role, "User registered");
        self.sync_index(user.id).await;

        Ok(user)
    }

    /// Check a username/password pair.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> EngineResult<User> {
        let user = self
            .store
            .find_user_by_username(username.trim())
            .await?
            .ok_or_else(|| EngineError::not_found("Unknown username or password"))?;

        if self.hasher.verify_password(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(EngineError::not_found("Unknown username or password"))
        }
    }

    /// Register `req` as an admin unless an admin account already exists.
    ///
    /// Returns the created account, or `None` when nothing was done.
    pub async fn ensure_admin(&self, req: NewUser) -> EngineResult<Option<User>> {
        if self.store.list_users().await?.iter().any(User::is_admin) {
            return Ok(None);
        }
        let admin = self
            .register(NewUser {
                role: UserRole::Admin,
                ..req
            })
            .await?;
        info!(user_id = %admin.id, "Bootstrapped admin account");
        Ok(Some(admin))
    }

    /// Delete an account with its reservations.
    ///
    /// Spots held by the user's active reservations are released first.
    pub async fn delete_user(&self, principal: &Principal, user_id: UserId) -> EngineResult<()> {
        principal.require_admin()?;

        let held_lots = self
            .store
            .reservation_history(user_id)
            .await?
            .into_iter()
            .filter(|d| d.reservation.is_active)
            .map(|d| d.lot_id)
            .collect();
        let _guards = self.locks.acquire_many(held_lots).await;

        let mut tx = self.store.begin().await?;
        let active = tx.active_reservations_for_user(user_id).await?;
        for reservation in &active {
            tx.set_spot_status(reservation.spot_id, SpotStatus::Available)
                .await?;
        }
        if !tx.delete_user(user_id).await? {
            return Err(EngineError::not_found(format!("User {user_id} not found")));
        }
        tx.commit().await?;

        self.cache.invalidate_all().await;
        info!(%user_id, released = active.len(), "User deleted");
        self.sync_index(user_id).await;

        Ok(())
    }

    async fn sync_index(&self, user_id: UserId) {
        dispatch_after_commit(
            self.dispatcher.as_ref(),
            Task::SyncSearchIndex {
                entity: SearchEntity::User,
                id: user_id.into_uuid(),
            },
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::Harness;

    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
            role: UserRole::User,
        }
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let h = Harness::new();
        let user = h
            .users()
            .register(new_user("kiran", "Kiran@Example.com"))
            .await
            .unwrap();

        assert_eq!(user.email, "kiran@example.com");
        assert_ne!(user.password_hash, "s3cret-pass");
        assert!(
            h.users()
                .verify_credentials("kiran", "s3cret-pass")
                .await
                .is_ok()
        );
        assert!(h.users().verify_credentials("kiran", "wrong-pass").await.is_err());
    }

    #[tokio::test]
    async fn test_duplicates_rejected() {
        let h = Harness::new();
        h.users()
            .register(new_user("kiran", "kiran@example.com"))
            .await
            .unwrap();

        for dup in [
            new_user("kiran", "other@example.com"),
            new_user("other", "kiran@example.com"),
        ] {
            assert!(matches!(
                h.users().register(dup).await,
                Err(EngineError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_ensure_admin_runs_once() {
        let h = Harness::new();
        let created = h
            .users()
            .ensure_admin(new_user("root", "root@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.role, UserRole::Admin);

        let again = h
            .users()
            .ensure_admin(new_user("root2", "root2@example.com"))
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(h.store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_user_releases_spots() {
        let h = Harness::new();
        let user = h.user("kiran").await;
        let lot = h.lot(2, 10.0).await;
        let id = h.allocator().book(&user, lot.id, 2).await.unwrap()[0].id;
        h.lifecycle().confirm_park(&user, id).await.unwrap();

        h.users().delete_user(&h.admin, user.user_id).await.unwrap();

        let spots = h.store.list_spots(lot.id).await.unwrap();
        assert!(spots.iter().all(|s| s.status == SpotStatus::Available));
        assert!(h.store.find_reservation(id).await.unwrap().is_none());
        assert!(h.store.find_user(user.user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_user() {
        let h = Harness::new();
        assert!(matches!(
            h.users().delete_user(&h.admin, UserId::new()).await,
            Err(EngineError::NotFound(_))
        ));
    }
}
