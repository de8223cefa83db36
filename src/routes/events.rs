// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event routes.
//!
//! Clients send a few loosely shaped fields; they are coerced into
//! [`NewEvent`] / [`EventUpdate`] before anything else runs:
//! - `schedule` may be a string or a list of strings (first element wins)
//! - participants come as `participantes` or `participants`, either a bare
//!   list or an object with a `participants` list; blank entries are dropped
//! - `address` may also be sent as `direccion`

use crate::error::{AppError, Result};
use crate::models::event::dedup_ids;
use crate::models::{Event, EventUpdate, NewEvent};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
}

// ─── Input Coercion ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn first(self) -> String {
        match self {
            OneOrMany::One(value) => value,
            OneOrMany::Many(values) => values.into_iter().next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParticipantsField {
    List(Vec<Option<String>>),
    Nested {
        #[serde(default)]
        participants: Vec<Option<String>>,
    },
}

impl ParticipantsField {
    fn into_ids(self) -> Vec<String> {
        let raw = match self {
            ParticipantsField::List(ids) => ids,
            ParticipantsField::Nested { participants } => participants,
        };
        dedup_ids(
            raw.into_iter()
                .flatten()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateEventBody {
    name: Option<String>,
    schedule: Option<OneOrMany>,
    address: Option<String>,
    direccion: Option<String>,
    participantes: Option<ParticipantsField>,
    participants: Option<ParticipantsField>,
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

/// Blank addresses count as absent.
fn optional_address(address: Option<String>, direccion: Option<String>) -> Option<String> {
    address
        .or(direccion)
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
}

impl CreateEventBody {
    fn into_new_event(self) -> Result<NewEvent> {
        Ok(NewEvent {
            name: required("name", self.name)?,
            schedule: required("schedule", self.schedule.map(OneOrMany::first))?,
            address: optional_address(self.address, self.direccion),
            participants: self
                .participantes
                .or(self.participants)
                .map(ParticipantsField::into_ids)
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateEventBody {
    name: Option<String>,
    schedule: Option<OneOrMany>,
    address: Option<String>,
    direccion: Option<String>,
}

impl UpdateEventBody {
    fn into_update(self) -> Result<EventUpdate> {
        Ok(EventUpdate {
            name: self.name.map(|n| required("name", Some(n))).transpose()?,
            schedule: self
                .schedule
                .map(|s| required("schedule", Some(s.first())))
                .transpose()?,
            address: optional_address(self.address, self.direccion),
        })
    }
}

// ─── Handlers ────────────────────────────────────────────────

/// Create an event and link it into each participant's event set.
async fn create_event(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CreateEventBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Event>)> {
    let Json(body) = payload?;
    let new_event = body.into_new_event()?;

    state
        .relationships
        .ensure_users_exist(&new_event.participants)
        .await?;

    let event = state.events.create(new_event).await?;
    state
        .relationships
        .on_event_created(&event.id, &event.participants)
        .await?;

    Ok((StatusCode::CREATED, Json(event)))
}

async fn list_events(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Event>>> {
    let events = state.events.list().await?;
    tracing::debug!(count = events.len(), "Listing events");
    Ok(Json(events))
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Event>> {
    state
        .events
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<UpdateEventBody>, JsonRejection>,
) -> Result<Json<Event>> {
    let Json(body) = payload?;
    let event = state.events.update_by_id(&id, body.into_update()?).await?;
    Ok(Json(event))
}

/// Delete an event and remove it from every former participant.
async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Event>> {
    let event = state.events.delete_by_id(&id).await?;
    state
        .relationships
        .on_event_deleted(&event.id, &event.participants)
        .await?;
    Ok(Json(event))
}
