// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profiles, password hashes, event sets)
//! - Events (details and participant sets)
//!
//! Every read-modify-write reads through its transaction, so a concurrent
//! writer to the same document aborts the commit and the attempt is retried.
//! Usernames and emails are claimed by create-only reservation documents
//! (`user_usernames/{key}`, `user_emails/{key}`) written in the same
//! transaction as the user, so a second claim fails at commit.

use crate::db::collections;
use crate::db::store::{add_to_set, remove_from_set, EventStore, UserStore};
use crate::error::AppError;
use crate::models::{Event, User};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::{FirestoreConsistencySelector, FirestoreTransaction, FirestoreWritePrecondition};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;

/// Attempts per transaction before a contention error is returned.
const MAX_TRANSACTION_ATTEMPTS: usize = 5;

/// Fields written by a profile update. The event set is never among them.
const USER_PROFILE_FIELDS: [&str; 4] = ["username", "email", "password", "birthday"];

/// Fields written by an event details update. Participants are never among them.
const EVENT_DETAIL_FIELDS: [&str; 3] = ["name", "schedule", "address"];

/// Reservation document claiming a username or email for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UniqueKey {
    user_id: String,
}

/// Document id for a reservation. Encoded so any value is a legal id.
fn reservation_id(value: &str) -> String {
    format!("k_{}", urlencoding::encode(value))
}

fn db_error(e: FirestoreError) -> AppError {
    AppError::Database(e.to_string())
}

/// Run `attempt` again while it fails with a retryable error (aborted
/// transaction, unavailable backend), up to [`MAX_TRANSACTION_ATTEMPTS`].
/// Each attempt begins its own transaction.
async fn retry_contended<T, F, Fut>(operation: &str, attempt: F) -> Result<T, FirestoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FirestoreError>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(FirestoreError::DatabaseError(ref e))
                if e.retry_possible && tries < MAX_TRANSACTION_ATTEMPTS =>
            {
                tracing::warn!(
                    operation,
                    attempt = tries,
                    error = %e.details,
                    "Transaction contended, retrying"
                );
                tries += 1;
            }
            result => return result,
        }
    }
}

// ─── Transaction Steps ───────────────────────────────────────

/// Read a document inside `transaction`, registering it for conflict detection.
async fn read_in<T>(
    client: &firestore::FirestoreDb,
    transaction: &FirestoreTransaction<'_>,
    collection: &str,
    id: &str,
) -> Result<Option<T>, FirestoreError>
where
    T: DeserializeOwned + Send,
{
    let reader = client.clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
        transaction.transaction_id().clone(),
    ));
    let doc: Option<T> = reader
        .fluent()
        .select()
        .by_id_in(collection)
        .obj()
        .one(id)
        .await?;
    Ok(doc)
}

/// Roll back and hand `result` through.
async fn abandon<T>(transaction: FirestoreTransaction<'_>, result: T) -> T {
    let _ = transaction.rollback().await;
    result
}

/// Stage a write that fails the commit if the document already exists.
fn stage_create<T>(
    client: &firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    collection: &str,
    id: &str,
    doc: &T,
) -> Result<(), FirestoreError>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    client
        .fluent()
        .update()
        .in_col(collection)
        .precondition(FirestoreWritePrecondition::Exists(false))
        .document_id(id)
        .object(doc)
        .add_to_transaction(transaction)?;
    Ok(())
}

/// Stage a write of `doc`, limited to `fields` when given.
fn stage_update<T>(
    client: &firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    collection: &str,
    id: &str,
    doc: &T,
    fields: Option<&[&str]>,
) -> Result<(), FirestoreError>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    let update = client.fluent().update();
    let update = match fields {
        Some(fields) => update.fields(fields.iter().copied()),
        None => update,
    };
    update
        .in_col(collection)
        .document_id(id)
        .object(doc)
        .add_to_transaction(transaction)?;
    Ok(())
}

fn stage_delete(
    client: &firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    collection: &str,
    id: &str,
) -> Result<(), FirestoreError> {
    client
        .fluent()
        .delete()
        .from(collection)
        .document_id(id)
        .add_to_transaction(transaction)?;
    Ok(())
}

async fn try_modify_doc<T, F>(
    client: &firestore::FirestoreDb,
    collection: &str,
    id: &str,
    mutate: &F,
) -> Result<Option<T>, FirestoreError>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    F: Fn(&mut T) -> bool + Sync,
{
    let mut transaction = client.begin_transaction().await?;

    let current: Option<T> = match read_in(client, &transaction, collection, id).await {
        Ok(doc) => doc,
        Err(e) => return abandon(transaction, Err(e)).await,
    };
    let Some(mut doc) = current else {
        return abandon(transaction, Ok(None)).await;
    };
    if !mutate(&mut doc) {
        return abandon(transaction, Ok(Some(doc))).await;
    }

    stage_update(client, &mut transaction, collection, id, &doc, None)?;
    transaction.commit().await?;
    Ok(Some(doc))
}

async fn try_take_doc<T>(
    client: &firestore::FirestoreDb,
    collection: &str,
    id: &str,
) -> Result<Option<T>, FirestoreError>
where
    T: DeserializeOwned + Send,
{
    let mut transaction = client.begin_transaction().await?;

    let current: Option<T> = match read_in(client, &transaction, collection, id).await {
        Ok(doc) => doc,
        Err(e) => return abandon(transaction, Err(e)).await,
    };
    let Some(doc) = current else {
        return abandon(transaction, Ok(None)).await;
    };

    stage_delete(client, &mut transaction, collection, id)?;
    transaction.commit().await?;
    Ok(Some(doc))
}

async fn try_insert_user(
    client: &firestore::FirestoreDb,
    user: &User,
) -> Result<(), FirestoreError> {
    let mut transaction = client.begin_transaction().await?;
    let claim = UniqueKey {
        user_id: user.id.clone(),
    };

    stage_create(
        client,
        &mut transaction,
        collections::USERNAMES,
        &reservation_id(&user.username),
        &claim,
    )?;
    stage_create(
        client,
        &mut transaction,
        collections::EMAILS,
        &reservation_id(&user.email),
        &claim,
    )?;
    stage_create(client, &mut transaction, collections::USERS, &user.id, user)?;

    transaction.commit().await?;
    Ok(())
}

/// Move reservations for changed keys and write the profile fields. The
/// returned user carries the event set as read in the transaction.
async fn try_update_profile(
    client: &firestore::FirestoreDb,
    user: &User,
) -> Result<Option<User>, FirestoreError> {
    let mut transaction = client.begin_transaction().await?;

    let current: Option<User> =
        match read_in(client, &transaction, collections::USERS, &user.id).await {
            Ok(doc) => doc,
            Err(e) => return abandon(transaction, Err(e)).await,
        };
    let Some(mut stored) = current else {
        return abandon(transaction, Ok(None)).await;
    };

    let claim = UniqueKey {
        user_id: user.id.clone(),
    };
    let moved_keys = [
        (collections::USERNAMES, &stored.username, &user.username),
        (collections::EMAILS, &stored.email, &user.email),
    ];
    for (collection, old, new) in moved_keys {
        if old != new {
            stage_create(
                client,
                &mut transaction,
                collection,
                &reservation_id(new),
                &claim,
            )?;
            stage_delete(client, &mut transaction, collection, &reservation_id(old))?;
        }
    }

    stored.username = user.username.clone();
    stored.email = user.email.clone();
    stored.password_hash = user.password_hash.clone();
    stored.birthday = user.birthday;

    stage_update(
        client,
        &mut transaction,
        collections::USERS,
        &stored.id,
        &stored,
        Some(&USER_PROFILE_FIELDS[..]),
    )?;
    transaction.commit().await?;
    Ok(Some(stored))
}

/// Delete a user together with its username and email reservations.
async fn try_delete_user(
    client: &firestore::FirestoreDb,
    id: &str,
) -> Result<Option<User>, FirestoreError> {
    let mut transaction = client.begin_transaction().await?;

    let current: Option<User> = match read_in(client, &transaction, collections::USERS, id).await {
        Ok(doc) => doc,
        Err(e) => return abandon(transaction, Err(e)).await,
    };
    let Some(user) = current else {
        return abandon(transaction, Ok(None)).await;
    };

    stage_delete(client, &mut transaction, collections::USERS, id)?;
    stage_delete(
        client,
        &mut transaction,
        collections::USERNAMES,
        &reservation_id(&user.username),
    )?;
    stage_delete(
        client,
        &mut transaction,
        collections::EMAILS,
        &reservation_id(&user.email),
    )?;

    transaction.commit().await?;
    Ok(Some(user))
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any token; skip the credential lookup entirely.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client for testing.
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic Document Helpers ────────────────────────────────

    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(db_error)
    }

    async fn list_docs<T>(&self, collection: &str) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    async fn write_doc<T>(&self, collection: &str, id: &str, doc: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let _: T = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(doc)
            .execute()
            .await
            .map_err(db_error)?;
        Ok(())
    }

    /// Read a document and delete it in one transaction, returning what was read.
    async fn take_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        let client = self.get_client()?;
        retry_contended("take_doc", || try_take_doc(client, collection, id))
            .await
            .map_err(db_error)
    }

    /// Read-modify-write a single document inside a transaction.
    ///
    /// `mutate` returns whether it changed the document; unchanged documents
    /// are not written. It may run more than once if the transaction is
    /// retried. Returns `None` if the document does not exist.
    async fn modify_doc<T, F>(
        &self,
        collection: &str,
        id: &str,
        mutate: F,
    ) -> Result<Option<T>, AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: Fn(&mut T) -> bool + Send + Sync,
    {
        let client = self.get_client()?;
        let mutate = &mutate;
        retry_contended("modify_doc", || {
            try_modify_doc(client, collection, id, mutate)
        })
        .await
        .map_err(db_error)
    }

    // ─── User Queries ────────────────────────────────────────────

    async fn find_user_by_field(&self, field: &str, value: &str) -> Result<Option<User>, AppError> {
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field(field).eq(value)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(db_error)?;

        Ok(users.into_iter().next())
    }

    /// Name the key `candidate` lost a reservation race on.
    async fn duplicate_key_error(&self, candidate: &User) -> Result<AppError, AppError> {
        let owner: Option<UniqueKey> = self
            .get_doc(collections::USERNAMES, &reservation_id(&candidate.username))
            .await?;

        Ok(match owner {
            Some(owner) if owner.user_id != candidate.id => {
                AppError::DuplicateKey(format!("Username '{}' already exists", candidate.username))
            }
            _ => AppError::DuplicateKey(format!("Email '{}' already exists", candidate.email)),
        })
    }
}

// ─── User Operations ─────────────────────────────────────────

#[async_trait]
impl UserStore for FirestoreDb {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let client = self.get_client()?;
        match retry_contended("insert_user", || try_insert_user(client, user)).await {
            Ok(()) => Ok(()),
            Err(FirestoreError::DataConflictError(_)) => {
                Err(self.duplicate_key_error(user).await?)
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        self.get_doc(collections::USERS, id).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.find_user_by_field("username", username).await
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.list_docs(collections::USERS).await
    }

    async fn update_user_profile(&self, user: &User) -> Result<Option<User>, AppError> {
        let client = self.get_client()?;
        match retry_contended("update_user_profile", || try_update_profile(client, user)).await {
            Ok(stored) => Ok(stored),
            Err(FirestoreError::DataConflictError(_)) => {
                Err(self.duplicate_key_error(user).await?)
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn delete_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let client = self.get_client()?;
        retry_contended("delete_user", || try_delete_user(client, id))
            .await
            .map_err(db_error)
    }

    async fn add_event_to_user(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<Option<User>, AppError> {
        self.modify_doc(collections::USERS, user_id, |user: &mut User| {
            add_to_set(&mut user.events, event_id)
        })
        .await
    }

    async fn remove_event_from_user(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<bool, AppError> {
        let updated = self
            .modify_doc(collections::USERS, user_id, |user: &mut User| {
                remove_from_set(&mut user.events, event_id)
            })
            .await?;
        Ok(updated.is_some())
    }
}

// ─── Event Operations ────────────────────────────────────────

#[async_trait]
impl EventStore for FirestoreDb {
    async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
        self.write_doc(collections::EVENTS, &event.id, event).await
    }

    async fn get_event(&self, id: &str) -> Result<Option<Event>, AppError> {
        self.get_doc(collections::EVENTS, id).await
    }

    async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        self.list_docs(collections::EVENTS).await
    }

    async fn update_event_details(&self, event: &Event) -> Result<Option<Event>, AppError> {
        let result: Result<Event, FirestoreError> = self
            .get_client()?
            .fluent()
            .update()
            .fields(EVENT_DETAIL_FIELDS)
            .in_col(collections::EVENTS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&event.id)
            .object(event)
            .execute()
            .await;

        match result {
            Ok(stored) => Ok(Some(stored)),
            Err(FirestoreError::DataNotFoundError(_)) => Ok(None),
            Err(e) => Err(db_error(e)),
        }
    }

    async fn delete_event(&self, id: &str) -> Result<Option<Event>, AppError> {
        self.take_doc(collections::EVENTS, id).await
    }

    async fn add_participant(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Event>, AppError> {
        self.modify_doc(collections::EVENTS, event_id, |event: &mut Event| {
            add_to_set(&mut event.participants, user_id)
        })
        .await
    }

    async fn remove_participant(&self, event_id: &str, user_id: &str) -> Result<bool, AppError> {
        let updated = self
            .modify_doc(collections::EVENTS, event_id, |event: &mut Event| {
                remove_from_set(&mut event.participants, user_id)
            })
            .await?;
        Ok(updated.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_id_is_a_legal_document_id() {
        assert_eq!(reservation_id("alice"), "k_alice");
        assert_eq!(reservation_id("a/b"), "k_a%2Fb");
        assert_eq!(reservation_id(".."), "k_..");
        assert_ne!(reservation_id("a@x.com"), reservation_id("a@x.org"));
    }

    #[tokio::test]
    async fn test_offline_store_reports_database_error() {
        let db = FirestoreDb::new_mock();
        assert!(matches!(
            db.get_user("u1").await,
            Err(AppError::Database(_))
        ));
        assert!(matches!(
            db.add_participant("e1", "u1").await,
            Err(AppError::Database(_))
        ));
    }
}
