// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User repository: CRUD over the user store, with every password write
//! routed through the hasher.

use crate::config::AdminAccount;
use crate::db::UserStore;
use crate::error::AppError;
use crate::models::{NewUser, User, UserUpdate};
use crate::services::password::PasswordHasher;
use chrono::NaiveDate;
use std::sync::Arc;

/// Birthday recorded for the bootstrap administrator.
const ADMIN_BIRTHDAY: (i32, u32, u32) = (2000, 1, 1);

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
}

impl UserRepository {
    pub fn new(store: Arc<dyn UserStore>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Create a user with a fresh id and an empty event set.
    pub async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let password_hash = self.hasher.hash_blocking(new_user.password).await?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: new_user.username,
            email: new_user.email,
            password_hash,
            birthday: new_user.birthday,
            events: Vec::new(),
        };

        self.store.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User created");

        Ok(user)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        self.store.get_user(id).await
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.store.find_user_by_username(username).await
    }

    pub async fn list(&self) -> Result<Vec<User>, AppError> {
        self.store.list_users().await
    }

    pub async fn update_by_id(&self, id: &str, update: UserUpdate) -> Result<User, AppError> {
        let user = self
            .store
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        self.apply_update(user, update).await
    }

    pub async fn update_by_username(
        &self,
        username: &str,
        update: UserUpdate,
    ) -> Result<User, AppError> {
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))?;
        self.apply_update(user, update).await
    }

    /// Merge `update` into `user` and persist. Only a newly supplied
    /// password is hashed; the stored hash is otherwise kept as is.
    async fn apply_update(&self, mut user: User, update: UserUpdate) -> Result<User, AppError> {
        if update.is_empty() {
            return Ok(user);
        }

        let password_changed = update.password.is_some();

        if let Some(username) = update.username {
            user.username = username;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(birthday) = update.birthday {
            user.birthday = birthday;
        }
        if let Some(password) = update.password {
            user.password_hash = self.hasher.hash_blocking(password).await?;
        }

        // None: deleted between our read and write.
        let stored = self
            .store
            .update_user_profile(&user)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))?;

        tracing::info!(user_id = %stored.id, password_changed, "User updated");
        Ok(stored)
    }

    /// Delete a user. The caller is responsible for cleaning up the
    /// participant sets of the returned user's events.
    pub async fn delete_by_id(&self, id: &str) -> Result<User, AppError> {
        let user = self
            .store
            .delete_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        tracing::info!(user_id = %user.id, "User deleted");
        Ok(user)
    }

    pub async fn delete_by_username(&self, username: &str) -> Result<User, AppError> {
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))?;
        self.delete_by_id(&user.id).await
    }

    /// Create the administrator account unless a user with that username
    /// already exists. Existing credentials are never touched.
    ///
    /// Returns `true` if the account was created by this call.
    pub async fn ensure_admin(&self, admin: &AdminAccount) -> Result<bool, AppError> {
        if self.get_by_username(&admin.username).await?.is_some() {
            tracing::info!(username = %admin.username, "Admin user already exists");
            return Ok(false);
        }

        let (year, month, day) = ADMIN_BIRTHDAY;
        let birthday = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Invalid admin birthday")))?;

        let result = self
            .create(NewUser {
                username: admin.username.clone(),
                email: admin.email.clone(),
                password: admin.password.clone(),
                birthday,
            })
            .await;

        match result {
            Ok(_) => {
                tracing::info!(username = %admin.username, "Admin user created");
                Ok(true)
            }
            // Either a concurrent bootstrap won, or another account holds
            // the admin email. Only the former leaves an admin behind.
            Err(AppError::DuplicateKey(msg)) => {
                if self.get_by_username(&admin.username).await?.is_some() {
                    tracing::info!(username = %admin.username, reason = %msg, "Admin user already exists");
                    return Ok(false);
                }
                tracing::error!(username = %admin.username, reason = %msg, "Admin user could not be created");
                Err(AppError::DuplicateKey(msg))
            }
            Err(e) => Err(e),
        }
    }
}
