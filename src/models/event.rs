// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Event record stored in the `events` collection. Also the API shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Event {
    /// UUID (also used as document ID)
    pub id: String,
    pub name: String,
    pub schedule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// IDs of participating users
    #[serde(default)]
    pub participants: Vec<String>,
}

/// Validated input for creating an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub schedule: String,
    pub address: Option<String>,
    /// Deduplicated, first occurrence order
    pub participants: Vec<String>,
}

/// Partial update. Participants are owned by the relationship maintainer and
/// cannot be changed here.
#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub address: Option<String>,
}

/// Drop duplicates while keeping the order in which ids first appear.
pub fn dedup_ids<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let ids = vec!["b", "a", "b", "c", "a"]
            .into_iter()
            .map(String::from);
        assert_eq!(dedup_ids(ids), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_address_omitted_when_absent() {
        let event = Event {
            id: "e1".to_string(),
            name: "Meetup".to_string(),
            schedule: "2024-05-01".to_string(),
            address: None,
            participants: vec![],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("address").is_none());
        assert_eq!(json["participants"], serde_json::json!([]));
    }
}
