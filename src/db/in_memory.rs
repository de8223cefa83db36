// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory document store for local development and tests.

use crate::db::store::{add_to_set, remove_from_set, EventStore, UserStore};
use crate::error::AppError;
use crate::models::{Event, User};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Both collections behind async locks. Each trait method holds a lock for
/// its whole read-modify-write, which gives per-document atomicity.
#[derive(Debug, Default)]
pub struct InMemoryDb {
    users: RwLock<HashMap<String, User>>,
    events: RwLock<HashMap<String, Event>>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Check username/email uniqueness against every user except `skip_id`.
fn check_unique(
    users: &HashMap<String, User>,
    candidate: &User,
    skip_id: Option<&str>,
) -> Result<(), AppError> {
    for existing in users.values() {
        if Some(existing.id.as_str()) == skip_id {
            continue;
        }
        if existing.username == candidate.username {
            return Err(AppError::DuplicateKey(format!(
                "Username '{}' already exists",
                candidate.username
            )));
        }
        if existing.email == candidate.email {
            return Err(AppError::DuplicateKey(format!(
                "Email '{}' already exists",
                candidate.email
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for InMemoryDb {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(AppError::DuplicateKey(format!(
                "User with ID '{}' already exists",
                user.id
            )));
        }
        check_unique(&users, user, None)?;
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update_user_profile(&self, user: &User) -> Result<Option<User>, AppError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Ok(None);
        }
        check_unique(&users, user, Some(&user.id))?;
        Ok(users.get_mut(&user.id).map(|existing| {
            existing.username = user.username.clone();
            existing.email = user.email.clone();
            existing.password_hash = user.password_hash.clone();
            existing.birthday = user.birthday;
            existing.clone()
        }))
    }

    async fn delete_user(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.write().await.remove(id))
    }

    async fn add_event_to_user(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<Option<User>, AppError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(user_id).map(|user| {
            add_to_set(&mut user.events, event_id);
            user.clone()
        }))
    }

    async fn remove_event_from_user(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<bool, AppError> {
        let mut users = self.users.write().await;
        Ok(users
            .get_mut(user_id)
            .map(|user| remove_from_set(&mut user.events, event_id))
            .is_some())
    }
}

#[async_trait]
impl EventStore for InMemoryDb {
    async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
        let mut events = self.events.write().await;
        if events.contains_key(&event.id) {
            return Err(AppError::DuplicateKey(format!(
                "Event with ID '{}' already exists",
                event.id
            )));
        }
        events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn get_event(&self, id: &str) -> Result<Option<Event>, AppError> {
        Ok(self.events.read().await.get(id).cloned())
    }

    async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        let mut events: Vec<Event> = self.events.read().await.values().cloned().collect();
        events.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn update_event_details(&self, event: &Event) -> Result<Option<Event>, AppError> {
        let mut events = self.events.write().await;
        Ok(events.get_mut(&event.id).map(|existing| {
            existing.name = event.name.clone();
            existing.schedule = event.schedule.clone();
            existing.address = event.address.clone();
            existing.clone()
        }))
    }

    async fn delete_event(&self, id: &str) -> Result<Option<Event>, AppError> {
        Ok(self.events.write().await.remove(id))
    }

    async fn add_participant(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Event>, AppError> {
        let mut events = self.events.write().await;
        Ok(events.get_mut(event_id).map(|event| {
            add_to_set(&mut event.participants, user_id);
            event.clone()
        }))
    }

    async fn remove_participant(&self, event_id: &str, user_id: &str) -> Result<bool, AppError> {
        let mut events = self.events.write().await;
        Ok(events
            .get_mut(event_id)
            .map(|event| remove_from_set(&mut event.participants, user_id))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn user(id: &str, username: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            birthday: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            events: vec![],
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_username_and_email() {
        let db = InMemoryDb::new();
        db.insert_user(&user("1", "alice", "a@x.com")).await.unwrap();

        let err = db
            .insert_user(&user("2", "alice", "other@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey(_)));

        let err = db
            .insert_user(&user("3", "someone", "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey(_)));

        assert_eq!(db.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_profile_update_allows_keeping_own_username() {
        let db = InMemoryDb::new();
        db.insert_user(&user("1", "alice", "a@x.com")).await.unwrap();
        db.insert_user(&user("2", "bob", "b@x.com")).await.unwrap();

        let mut alice = db.get_user("1").await.unwrap().unwrap();
        alice.email = "alice@x.com".to_string();
        assert!(db.update_user_profile(&alice).await.unwrap().is_some());

        alice.username = "bob".to_string();
        let err = db.update_user_profile(&alice).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey(_)));

        let ghost = user("9", "ghost", "g@x.com");
        assert!(db.update_user_profile(&ghost).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_update_keeps_concurrently_added_event() {
        let db = InMemoryDb::new();
        db.insert_user(&user("1", "alice", "a@x.com")).await.unwrap();

        // A stale copy read before the event was linked.
        let mut stale = db.get_user("1").await.unwrap().unwrap();
        db.add_event_to_user("1", "e1").await.unwrap();

        stale.email = "alice@x.com".to_string();
        let stored = db.update_user_profile(&stale).await.unwrap().unwrap();
        assert_eq!(stored.email, "alice@x.com");
        assert_eq!(stored.events, vec!["e1"]);
    }

    #[tokio::test]
    async fn test_event_details_update_keeps_participants() {
        let db = InMemoryDb::new();
        let event = Event {
            id: "e1".to_string(),
            name: "Meetup".to_string(),
            schedule: "2024-05-01".to_string(),
            address: None,
            participants: vec![],
        };
        db.insert_event(&event).await.unwrap();
        db.add_participant("e1", "u1").await.unwrap();

        let mut renamed = event.clone();
        renamed.name = "Renamed".to_string();
        let stored = db.update_event_details(&renamed).await.unwrap().unwrap();
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.participants, vec!["u1"]);

        renamed.id = "missing".to_string();
        assert!(db.update_event_details(&renamed).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_operations_on_missing_documents() {
        let db = InMemoryDb::new();
        assert!(db.add_event_to_user("nobody", "e1").await.unwrap().is_none());
        assert!(!db.remove_event_from_user("nobody", "e1").await.unwrap());
        assert!(db.add_participant("nothing", "u1").await.unwrap().is_none());
        assert!(!db.remove_participant("nothing", "u1").await.unwrap());
    }
}
