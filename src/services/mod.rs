// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod events;
pub mod password;
pub mod relationships;
pub mod users;

pub use auth::{Authenticator, LoginState};
pub use events::EventRepository;
pub use password::PasswordHasher;
pub use relationships::RelationshipMaintainer;
pub use users::UserRepository;
