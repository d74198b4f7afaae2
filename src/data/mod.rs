//! Core data models for the Epic Timeline CLI
//!
//! This module contains the data types used throughout the application for
//! representing saga events, locations, characters, and songs, plus the
//! filter parameters accepted by the events endpoint. Field names follow the
//! backend's camelCase JSON convention.

pub mod characters;
pub mod events;

pub use characters::CharactersClient;
pub use events::EventsClient;

use serde::{Deserialize, Serialize};

/// A single event on the saga timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    /// Unique identifier for the event
    pub id: u64,
    /// Short title, e.g. "The Fall of Troy"
    pub title: String,
    /// Narrative description of what happens
    pub description: String,
    /// Position of the event within the overall timeline
    pub sequence_order: u32,
    /// In-world timestamp of the event (no timezone; mythological dates)
    pub event_timestamp: String,
    /// Where the event takes place
    pub location: EventLocation,
    /// The saga this event belongs to
    pub saga: SagaRef,
    /// Characters involved in the event
    pub characters: Vec<Character>,
    /// Songs covering the event
    #[serde(default)]
    pub songs: Vec<Song>,
    /// Additional context such as narrative importance
    pub event_context: EventContext,
}

/// A location on the saga map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLocation {
    pub id: u64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    /// Name of the saga this location is associated with
    pub saga: String,
    pub significance: String,
}

/// Reference to a saga from within an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaRef {
    pub id: u64,
    pub title: String,
    pub description: String,
}

/// A character appearing in the timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 'Hero', 'God', 'Goddess', 'Monster', and so on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_protagonist: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub powers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<CharacterRelationship>>,
}

/// A relationship between two characters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRelationship {
    pub character_id: u64,
    pub character_name: String,
    /// 'ally', 'enemy', 'family', 'patron', and so on
    pub relationship_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A song covering part of the timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: u64,
    pub title: String,
    pub track_number: u32,
    pub duration_seconds: u32,
}

/// Narrative context attached to an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    /// pivotal, legendary, major, or minor
    pub importance: String,
}

/// Filter, paging, and sort parameters for the events endpoint.
///
/// All fields are optional; omitted fields are skipped during serialization
/// so that cache keys derived from two equal filters always match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilterParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saga_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    /// "asc" or "desc"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// Paginated envelope returned by the events endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    pub content: Vec<ApiEvent>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::derive_key;

    #[test]
    fn test_api_event_deserializes_backend_json() {
        let json = r#"{
            "id": 1,
            "title": "The Trojan Horse",
            "description": "The Greeks enter Troy hidden inside a wooden horse.",
            "sequenceOrder": 1,
            "eventTimestamp": "1184-04-24T23:00:00",
            "location": {
                "id": 1,
                "name": "Troy",
                "latitude": 39.957,
                "longitude": 26.238,
                "description": "The legendary city of Troy",
                "saga": "Troy Saga",
                "significance": "Site of the siege"
            },
            "saga": { "id": 1, "title": "The Troy Saga", "description": "The beginning" },
            "characters": [
                { "id": 1, "name": "Odysseus", "characterType": "Hero", "isProtagonist": true }
            ],
            "songs": [
                { "id": 1, "title": "The Horse and the Infant", "trackNumber": 1, "durationSeconds": 222 }
            ],
            "eventContext": { "importance": "legendary" }
        }"#;

        let event: ApiEvent = serde_json::from_str(json).expect("should deserialize");
        assert_eq!(event.id, 1);
        assert_eq!(event.sequence_order, 1);
        assert_eq!(event.location.name, "Troy");
        assert_eq!(event.characters[0].name, "Odysseus");
        assert_eq!(event.characters[0].is_protagonist, Some(true));
        assert_eq!(event.songs[0].track_number, 1);
        assert_eq!(event.event_context.importance, "legendary");
    }

    #[test]
    fn test_event_page_tolerates_missing_page_fields() {
        let page: EventPage = serde_json::from_str(r#"{ "content": [] }"#)
            .expect("should deserialize with defaults");
        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 0);
    }

    #[test]
    fn test_filter_params_omitted_fields_do_not_change_the_key() {
        let explicit = EventFilterParams {
            location_id: Some("troy".to_string()),
            ..Default::default()
        };
        let mut with_none = explicit.clone();
        with_none.search = None;

        assert_eq!(
            derive_key("events", Some(&explicit)),
            derive_key("events", Some(&with_none))
        );
    }

    #[test]
    fn test_filter_params_values_change_the_key() {
        let troy = EventFilterParams {
            location_id: Some("troy".to_string()),
            ..Default::default()
        };
        let ithaca = EventFilterParams {
            location_id: Some("ithaca".to_string()),
            ..Default::default()
        };

        assert_ne!(derive_key("events", Some(&troy)), derive_key("events", Some(&ithaca)));
    }

    #[test]
    fn test_character_roundtrip_preserves_optional_fields() {
        let character = Character {
            id: 4,
            name: "Athena".to_string(),
            description: Some("Goddess of wisdom".to_string()),
            character_type: Some("Goddess".to_string()),
            is_protagonist: Some(false),
            aliases: Some(vec!["Pallas Athena".to_string()]),
            powers: Some(vec!["Divine Wisdom".to_string()]),
            relationships: Some(vec![CharacterRelationship {
                character_id: 1,
                character_name: "Odysseus".to_string(),
                relationship_type: "patron".to_string(),
                description: None,
            }]),
        };

        let json = serde_json::to_string(&character).expect("should serialize");
        let back: Character = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(back.name, "Athena");
        assert_eq!(back.aliases.as_deref(), Some(&["Pallas Athena".to_string()][..]));
        assert_eq!(back.relationships.map(|r| r.len()), Some(1));
    }
}
