// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage traits implemented by each document store backend.
//!
//! Every method touches exactly one document. Anything spanning both
//! collections goes through [`crate::services::RelationshipMaintainer`].

use crate::error::AppError;
use crate::models::{Event, User};
use async_trait::async_trait;

/// Persistence for the `users` collection.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with `DuplicateKey` if the username or
    /// email is already taken.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    /// Write the profile fields (username, email, password hash, birthday)
    /// of an existing user. The stored event set is left as it is. Returns
    /// the stored user, or `None` if no user has this id. Fails with
    /// `DuplicateKey` if the username or email belongs to another user.
    async fn update_user_profile(&self, user: &User) -> Result<Option<User>, AppError>;

    /// Remove a user, returning the removed record.
    async fn delete_user(&self, id: &str) -> Result<Option<User>, AppError>;

    /// Add an event id to the user's event set (no-op if present).
    /// Returns the updated user, or `None` if the user does not exist.
    async fn add_event_to_user(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<Option<User>, AppError>;

    /// Remove an event id from the user's event set. Returns `false` if the
    /// user does not exist.
    async fn remove_event_from_user(&self, user_id: &str, event_id: &str)
        -> Result<bool, AppError>;
}

/// Persistence for the `events` collection.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_event(&self, event: &Event) -> Result<(), AppError>;

    async fn get_event(&self, id: &str) -> Result<Option<Event>, AppError>;

    async fn list_events(&self) -> Result<Vec<Event>, AppError>;

    /// Write name, schedule and address of an existing event. The stored
    /// participant set is left as it is. Returns the stored event, or `None`
    /// if no event has this id.
    async fn update_event_details(&self, event: &Event) -> Result<Option<Event>, AppError>;

    async fn delete_event(&self, id: &str) -> Result<Option<Event>, AppError>;

    /// Add a user id to the participant set (no-op if present).
    /// Returns the updated event, or `None` if the event does not exist.
    async fn add_participant(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Event>, AppError>;

    /// Remove a user id from the participant set. Returns `false` if the
    /// event does not exist.
    async fn remove_participant(&self, event_id: &str, user_id: &str) -> Result<bool, AppError>;
}

/// Insert `id` into `set` unless already present. Returns whether it was added.
pub(crate) fn add_to_set(set: &mut Vec<String>, id: &str) -> bool {
    if set.iter().any(|existing| existing == id) {
        return false;
    }
    set.push(id.to_string());
    true
}

/// Remove every occurrence of `id` from `set`. Returns whether anything changed.
pub(crate) fn remove_from_set(set: &mut Vec<String>, id: &str) -> bool {
    let before = set.len();
    set.retain(|existing| existing != id);
    set.len() != before
}
