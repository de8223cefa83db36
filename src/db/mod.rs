// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore, or in-memory for development).

pub mod firestore;
pub mod in_memory;
pub mod store;

pub use firestore::FirestoreDb;
pub use in_memory::InMemoryDb;
pub use store::{EventStore, UserStore};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const EVENTS: &str = "events";
    /// Create-only reservations enforcing unique usernames (Firestore only).
    pub const USERNAMES: &str = "user_usernames";
    /// Create-only reservations enforcing unique emails (Firestore only).
    pub const EMAILS: &str = "user_emails";
}
