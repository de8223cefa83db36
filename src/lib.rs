// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event-Roster: users, events, and who goes where.
//!
//! This crate provides a REST backend for user accounts and events, with
//! a many-to-many participation relationship kept consistent on both sides.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use config::{Config, ConfigError};
use db::{EventStore, UserStore};
use services::{EventRepository, PasswordHasher, RelationshipMaintainer, UserRepository};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub users: UserRepository,
    pub events: EventRepository,
    pub relationships: RelationshipMaintainer,
}

impl AppState {
    /// Wire repositories and the relationship maintainer to one store.
    pub fn new<S>(config: Config, store: Arc<S>) -> Result<Self, ConfigError>
    where
        S: UserStore + EventStore + 'static,
    {
        let hasher = PasswordHasher::new(config.hash_cost)?;
        let user_store: Arc<dyn UserStore> = store.clone();
        let event_store: Arc<dyn EventStore> = store;

        Ok(Self {
            config,
            users: UserRepository::new(user_store.clone(), hasher),
            events: EventRepository::new(event_store.clone()),
            relationships: RelationshipMaintainer::new(user_store, event_store),
        })
    }
}
