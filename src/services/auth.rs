// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Username/password login.

use crate::error::AppError;
use crate::models::User;
use crate::services::users::UserRepository;

/// Progress of a single login attempt.
#[derive(Debug)]
pub enum LoginState {
    Unauthenticated,
    /// User found, password check pending.
    Verifying(User),
    Authenticated(User),
    Rejected,
}

impl LoginState {
    fn name(&self) -> &'static str {
        match self {
            LoginState::Unauthenticated => "unauthenticated",
            LoginState::Verifying(_) => "verifying",
            LoginState::Authenticated(_) => "authenticated",
            LoginState::Rejected => "rejected",
        }
    }
}

/// Drives [`LoginState`] to a terminal state.
pub struct Authenticator<'a> {
    users: &'a UserRepository,
}

impl<'a> Authenticator<'a> {
    pub fn new(users: &'a UserRepository) -> Self {
        Self { users }
    }

    /// Advance one step. Terminal states are returned unchanged.
    async fn step(
        &self,
        state: LoginState,
        username: &str,
        password: &str,
    ) -> Result<LoginState, AppError> {
        Ok(match state {
            LoginState::Unauthenticated => match self.users.get_by_username(username).await? {
                Some(user) => LoginState::Verifying(user),
                None => LoginState::Rejected,
            },
            LoginState::Verifying(user) => {
                let valid = self
                    .users
                    .hasher()
                    .verify_blocking(password.to_string(), user.password_hash.clone())
                    .await?;
                if valid {
                    LoginState::Authenticated(user)
                } else {
                    LoginState::Rejected
                }
            }
            terminal => terminal,
        })
    }

    /// Authenticate a user. Unknown usernames and wrong passwords both end
    /// in [`AppError::AuthenticationFailed`].
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AppError> {
        let mut state = LoginState::Unauthenticated;

        loop {
            state = self.step(state, username, password).await?;
            tracing::debug!(username, state = state.name(), "Login state");

            match state {
                LoginState::Authenticated(user) => {
                    tracing::info!(user_id = %user.id, "Login succeeded");
                    return Ok(user);
                }
                LoginState::Rejected => {
                    tracing::info!(username, "Login rejected");
                    return Err(AppError::AuthenticationFailed);
                }
                _ => {}
            }
        }
    }
}
