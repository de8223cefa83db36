// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User record stored in the `users` collection.
///
/// Never serialize this type into an HTTP response: it carries the password
/// hash. Use [`UserResponse`] instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// UUID (also used as document ID)
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string, never plaintext
    #[serde(rename = "password")]
    pub password_hash: String,
    pub birthday: NaiveDate,
    /// IDs of events this user participates in
    #[serde(default)]
    pub events: Vec<String>,
}

/// Fields accepted when creating a user. The password is plaintext here and
/// only becomes a [`User`] after it has been hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub birthday: NaiveDate,
}

/// Partial update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub birthday: Option<NaiveDate>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.birthday.is_none()
    }
}

/// User as returned by the API (no password hash).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub birthday: NaiveDate,
    pub events: Vec<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            birthday: user.birthday,
            events: user.events,
        }
    }
}

/// Parse a birthday given either as a calendar date or as an RFC 3339
/// timestamp (only the date part is kept).
pub fn parse_birthday(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password_hash: "$argon2id$v=19$m=8,t=1,p=1$c2FsdA$aGFzaA".to_string(),
            birthday: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            events: vec!["e1".to_string()],
        }
    }

    #[test]
    fn test_response_has_no_password() {
        let json = serde_json::to_value(UserResponse::from(sample_user())).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["birthday"], "1990-01-01");
        assert_eq!(json["events"][0], "e1");
    }

    #[test]
    fn test_stored_user_keeps_hash_under_password_key() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json["password"].as_str().unwrap().starts_with("$argon2id$"));
    }

    #[test]
    fn test_missing_events_defaults_to_empty() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u2",
            "username": "bob",
            "email": "b@x.com",
            "password": "$argon2id$...",
            "birthday": "1985-06-15",
        }))
        .unwrap();
        assert!(user.events.is_empty());
    }

    #[test]
    fn test_parse_birthday_formats() {
        let expected = NaiveDate::from_ymd_opt(1990, 1, 1);
        assert_eq!(parse_birthday("1990-01-01"), expected);
        assert_eq!(parse_birthday("1990-01-01T00:00:00Z"), expected);
        assert_eq!(parse_birthday("not a date"), None);
        assert_eq!(parse_birthday("1990-13-01"), None);
    }
}
