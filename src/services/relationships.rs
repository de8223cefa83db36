// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relationship maintainer: the only code that edits a user's event set or
//! an event's participant set.
//!
//! Each step is atomic on its own document, but a multi-document update is
//! not transactional. A crash or a conflicting request between steps can
//! leave one side referencing the other without the reverse link. Nothing
//! repairs that automatically.

use crate::db::{EventStore, UserStore};
use crate::error::AppError;
use crate::models::User;
use futures_util::{stream, StreamExt};
use std::future::Future;
use std::sync::Arc;

const MAX_CONCURRENT_DB_OPS: usize = 50;

#[derive(Clone)]
pub struct RelationshipMaintainer {
    users: Arc<dyn UserStore>,
    events: Arc<dyn EventStore>,
}

/// Run `op` for every id with bounded concurrency. Returns how many calls
/// found their target document; the first error wins.
async fn fan_out<'a, F, Fut>(ids: &'a [String], op: F) -> Result<usize, AppError>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = Result<bool, AppError>>,
{
    // Futures are built up front so the stream holds no borrowing closure,
    // which keeps the caller's future `Send`.
    let pending: Vec<Fut> = ids.iter().map(|id| op(id.as_str())).collect();
    let results: Vec<Result<bool, AppError>> = stream::iter(pending)
        .buffer_unordered(MAX_CONCURRENT_DB_OPS)
        .collect()
        .await;

    let mut found = 0;
    for result in results {
        if result? {
            found += 1;
        }
    }
    Ok(found)
}

impl RelationshipMaintainer {
    pub fn new(users: Arc<dyn UserStore>, events: Arc<dyn EventStore>) -> Self {
        Self { users, events }
    }

    /// Fail with a validation error naming every id that has no user.
    pub async fn ensure_users_exist(&self, user_ids: &[String]) -> Result<(), AppError> {
        let pending: Vec<_> = user_ids
            .iter()
            .map(|id| async move {
                let user = self.users.get_user(id).await?;
                Ok::<_, AppError>(if user.is_none() { Some(id) } else { None })
            })
            .collect();
        let checks: Vec<Result<Option<&String>, AppError>> = stream::iter(pending)
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect()
            .await;

        let mut missing = Vec::new();
        for check in checks {
            if let Some(id) = check? {
                missing.push(id.as_str());
            }
        }

        if missing.is_empty() {
            return Ok(());
        }
        missing.sort_unstable();
        Err(AppError::Validation(format!(
            "Unknown participant ids: {}",
            missing.join(", ")
        )))
    }

    /// Link a freshly created event into each participant's event set.
    pub async fn on_event_created(
        &self,
        event_id: &str,
        participant_ids: &[String],
    ) -> Result<(), AppError> {
        let linked = fan_out(participant_ids, |user_id| async move {
            let user = self.users.add_event_to_user(user_id, event_id).await?;
            if user.is_none() {
                tracing::warn!(user_id, event_id, "Participant vanished before linking");
            }
            Ok::<_, AppError>(user.is_some())
        })
        .await?;

        tracing::debug!(
            event_id,
            linked,
            requested = participant_ids.len(),
            "Linked event to participants"
        );
        Ok(())
    }

    /// Remove a deleted event from each former participant's event set.
    pub async fn on_event_deleted(
        &self,
        event_id: &str,
        former_participant_ids: &[String],
    ) -> Result<(), AppError> {
        let unlinked = fan_out(former_participant_ids, |user_id| {
            self.users.remove_event_from_user(user_id, event_id)
        })
        .await?;

        tracing::debug!(event_id, unlinked, "Unlinked deleted event from users");
        Ok(())
    }

    /// Add `event_id` to the user, then `user_id` to the event.
    ///
    /// An unknown user stops before the event is touched. An unknown event
    /// is reported after the user-side write, which is left in place.
    pub async fn on_user_added_to_event(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<User, AppError> {
        let user = self
            .users
            .add_event_to_user(user_id, event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        if self.events.add_participant(event_id, user_id).await?.is_none() {
            tracing::warn!(
                user_id,
                event_id,
                "Event not found after linking user; user keeps a dangling event reference"
            );
            return Err(AppError::NotFound(format!("Event {} not found", event_id)));
        }

        tracing::info!(user_id, event_id, "User added to event");
        Ok(user)
    }

    /// Remove a deleted user from each former event's participant set.
    pub async fn on_user_deleted(
        &self,
        user_id: &str,
        former_event_ids: &[String],
    ) -> Result<(), AppError> {
        let unlinked = fan_out(former_event_ids, |event_id| {
            self.events.remove_participant(event_id, user_id)
        })
        .await?;

        tracing::debug!(user_id, unlinked, "Unlinked deleted user from events");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDb;
    use crate::models::Event;
    use chrono::NaiveDate;

    struct Fixture {
        db: Arc<InMemoryDb>,
        maintainer: RelationshipMaintainer,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(InMemoryDb::new());
        let maintainer = RelationshipMaintainer::new(db.clone(), db.clone());
        Fixture { db, maintainer }
    }

    async fn seed_user(db: &InMemoryDb, id: &str) {
        db.insert_user(&User {
            id: id.to_string(),
            username: format!("user-{}", id),
            email: format!("{}@x.com", id),
            password_hash: "hash".to_string(),
            birthday: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            events: vec![],
        })
        .await
        .unwrap();
    }

    async fn seed_event(db: &InMemoryDb, id: &str, participants: &[&str]) {
        db.insert_event(&Event {
            id: id.to_string(),
            name: "Meetup".to_string(),
            schedule: "2024-05-01".to_string(),
            address: None,
            participants: participants.iter().map(|p| p.to_string()).collect(),
        })
        .await
        .unwrap();
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_maintainer_futures_are_send() {
        // Handlers are spawned onto the multi-threaded runtime.
        let f = fixture();
        let participants = ids(&["u1", "u2"]);
        assert_send(f.maintainer.ensure_users_exist(&participants));
        assert_send(f.maintainer.on_event_created("e1", &participants));
        assert_send(f.maintainer.on_event_deleted("e1", &participants));
        assert_send(f.maintainer.on_user_added_to_event("u1", "e1"));
        assert_send(f.maintainer.on_user_deleted("u1", &participants));
    }

    #[tokio::test]
    async fn test_add_user_to_event_links_both_sides_idempotently() {
        let f = fixture();
        seed_user(&f.db, "u1").await;
        seed_event(&f.db, "e1", &[]).await;

        f.maintainer.on_user_added_to_event("u1", "e1").await.unwrap();
        let user = f.maintainer.on_user_added_to_event("u1", "e1").await.unwrap();

        assert_eq!(user.events, vec!["e1"]);
        let event = f.db.get_event("e1").await.unwrap().unwrap();
        assert_eq!(event.participants, vec!["u1"]);
    }

    #[tokio::test]
    async fn test_unknown_user_leaves_event_untouched() {
        let f = fixture();
        seed_event(&f.db, "e1", &[]).await;

        let err = f
            .maintainer
            .on_user_added_to_event("ghost", "e1")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        let event = f.db.get_event("e1").await.unwrap().unwrap();
        assert!(event.participants.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_event_keeps_user_side_write() {
        let f = fixture();
        seed_user(&f.db, "u1").await;

        let err = f
            .maintainer
            .on_user_added_to_event("u1", "missing")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        let user = f.db.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.events, vec!["missing"]);
    }

    #[tokio::test]
    async fn test_event_created_and_deleted() {
        let f = fixture();
        seed_user(&f.db, "u1").await;
        seed_user(&f.db, "u2").await;
        let participants = ids(&["u1", "u2"]);

        f.maintainer.on_event_created("e1", &participants).await.unwrap();
        f.maintainer.on_event_created("e1", &participants).await.unwrap();
        for id in ["u1", "u2"] {
            let user = f.db.get_user(id).await.unwrap().unwrap();
            assert_eq!(user.events, vec!["e1"]);
        }

        f.maintainer.on_event_deleted("e1", &participants).await.unwrap();
        for id in ["u1", "u2"] {
            let user = f.db.get_user(id).await.unwrap().unwrap();
            assert!(user.events.is_empty());
        }
    }

    #[tokio::test]
    async fn test_user_deleted_cleans_participant_sets() {
        let f = fixture();
        seed_event(&f.db, "e1", &["u1", "u2"]).await;
        seed_event(&f.db, "e2", &["u1"]).await;

        // "e3" no longer exists; removal from it is a no-op.
        f.maintainer
            .on_user_deleted("u1", &ids(&["e1", "e2", "e3"]))
            .await
            .unwrap();

        let e1 = f.db.get_event("e1").await.unwrap().unwrap();
        let e2 = f.db.get_event("e2").await.unwrap().unwrap();
        assert_eq!(e1.participants, vec!["u2"]);
        assert!(e2.participants.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_users_exist_lists_missing_ids() {
        let f = fixture();
        seed_user(&f.db, "u1").await;

        f.maintainer.ensure_users_exist(&ids(&["u1"])).await.unwrap();
        f.maintainer.ensure_users_exist(&[]).await.unwrap();

        let err = f
            .maintainer
            .ensure_users_exist(&ids(&["u1", "zed", "abe"]))
            .await
            .unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.ends_with("abe, zed"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
