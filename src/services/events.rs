// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event repository: CRUD over the event store.

use crate::db::EventStore;
use crate::error::AppError;
use crate::models::{Event, EventUpdate, NewEvent};
use std::sync::Arc;

#[derive(Clone)]
pub struct EventRepository {
    store: Arc<dyn EventStore>,
}

impl EventRepository {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Store a new event with whatever participant list it carries.
    /// Participants are not checked against the user collection here.
    pub async fn create(&self, new_event: NewEvent) -> Result<Event, AppError> {
        let event = Event {
            id: uuid::Uuid::new_v4().to_string(),
            name: new_event.name,
            schedule: new_event.schedule,
            address: new_event.address,
            participants: new_event.participants,
        };

        self.store.insert_event(&event).await?;
        tracing::info!(
            event_id = %event.id,
            participants = event.participants.len(),
            "Event created"
        );

        Ok(event)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Event>, AppError> {
        self.store.get_event(id).await
    }

    pub async fn list(&self) -> Result<Vec<Event>, AppError> {
        self.store.list_events().await
    }

    pub async fn update_by_id(&self, id: &str, update: EventUpdate) -> Result<Event, AppError> {
        let mut event = self
            .store
            .get_event(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))?;

        if let Some(name) = update.name {
            event.name = name;
        }
        if let Some(schedule) = update.schedule {
            event.schedule = schedule;
        }
        if let Some(address) = update.address {
            event.address = Some(address);
        }

        let stored = self
            .store
            .update_event_details(&event)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))?;

        tracing::info!(event_id = %stored.id, "Event updated");
        Ok(stored)
    }

    /// Delete an event. The caller is responsible for removing it from the
    /// returned event's participants.
    pub async fn delete_by_id(&self, id: &str) -> Result<Event, AppError> {
        let event = self
            .store
            .delete_event(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))?;
        tracing::info!(event_id = %event.id, "Event deleted");
        Ok(event)
    }
}
