// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod event;
pub mod user;

pub use event::{Event, EventUpdate, NewEvent};
pub use user::{NewUser, User, UserResponse, UserUpdate};
