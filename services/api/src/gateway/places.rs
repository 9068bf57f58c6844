//! services/api/src/gateway/places.rs
//!
//! Nearby care search. Results are ephemeral and never persisted.

use super::parse::{parse_json, strip_code_fences};
use super::prompts::{places_prompt, places_schema, PLACES_SYSTEM_INSTRUCTION};
use super::AiGateway;
use medscan_core::domain::{CarePlace, PlaceFilter, SearchLocation};
use medscan_core::ports::ModelRequest;
use serde::Deserialize;
use std::cmp::Ordering;
use tracing::{info, warn};

const PLACES_TEMPERATURE: f32 = 0.3;

/// The model may answer with a bare array or wrap it in `{"places": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlacesReply {
    Bare(Vec<CarePlace>),
    Wrapped { places: Vec<CarePlace> },
}

/// Places with a priority score come first (highest score first); the rest
/// follow by distance. Ties on score fall back to distance.
fn rank(a: &CarePlace, b: &CarePlace) -> Ordering {
    match (a.priority_score, b.priority_score) {
        (Some(x), Some(y)) => y
            .total_cmp(&x)
            .then_with(|| a.distance_km.total_cmp(&b.distance_km)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.distance_km.total_cmp(&b.distance_km),
    }
}

/// Assigns synthetic ids, orders the list, and makes sure one entry is the top pick.
pub fn reconcile_places(mut places: Vec<CarePlace>) -> Vec<CarePlace> {
    places.retain(|p| !p.name.trim().is_empty());
    for (index, place) in places.iter_mut().enumerate() {
        if place.id.trim().is_empty() {
            place.id = format!("place-{}", index + 1);
        }
    }
    places.sort_by(rank);
    if !places.iter().any(|p| p.is_top_recommendation) {
        if let Some(first) = places.first_mut() {
            first.is_top_recommendation = true;
        }
    }
    places
}

impl AiGateway {
    /// Finds care places near `location`. Never fails: any problem yields an empty list.
    pub async fn find_nearby_places(
        &self,
        location: &SearchLocation,
        filter: PlaceFilter,
        radius_km: f64,
    ) -> Vec<CarePlace> {
        let request = ModelRequest {
            system_instruction: PLACES_SYSTEM_INSTRUCTION.to_string(),
            prompt: places_prompt(location, filter, radius_km),
            image: None,
            response_schema: Some(places_schema()),
            temperature: PLACES_TEMPERATURE,
        };

        let raw = match self.places_model.generate(request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Place search failed: {}", e);
                return Vec::new();
            }
        };

        let places = match parse_json::<PlacesReply>(&raw) {
            Ok(PlacesReply::Bare(places)) | Ok(PlacesReply::Wrapped { places }) => places,
            Err(e) => {
                warn!(
                    "Place search reply was not a list of places ({}): {:.200}",
                    e,
                    strip_code_fences(&raw)
                );
                return Vec::new();
            }
        };

        let places = reconcile_places(places);
        info!("Place search returned {} results", places.len());
        places
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedModel;
    use std::sync::Arc;

    fn location() -> SearchLocation {
        SearchLocation::Coordinates { lat: 18.52, lng: 73.85 }
    }

    #[tokio::test]
    async fn outage_returns_an_empty_list() {
        let gateway = AiGateway::with_model(Arc::new(ScriptedModel::failing()));
        let places = gateway
            .find_nearby_places(&location(), PlaceFilter::Both, 5.0)
            .await;
        assert!(places.is_empty());
    }

    #[tokio::test]
    async fn garbage_returns_an_empty_list() {
        let gateway = AiGateway::with_model(Arc::new(ScriptedModel::replying("No results found nearby.")));
        let places = gateway
            .find_nearby_places(&location(), PlaceFilter::Hospital, 2.0)
            .await;
        assert!(places.is_empty());
    }

    #[tokio::test]
    async fn fenced_array_is_parsed_ranked_and_given_ids() {
        let reply = r#"```json
[
  {"name": "City Pharmacy", "type": "Pharmacy", "address": "MG Road", "distanceKm": 0.8},
  {"id": "abc", "name": "Ruby Hall Clinic", "type": "Hospital", "address": "Sassoon Rd", "distanceKm": 2.4, "priorityScore": 92},
  {"name": "Sahyadri Hospital", "type": "Hospital", "address": "Karve Rd", "distanceKm": 1.1, "priorityScore": 75},
  {"name": "Corner Store", "type": "Grocery", "address": "Lane 4", "distanceKm": 0.2}
]
```"#;
        let gateway = AiGateway::with_model(Arc::new(ScriptedModel::replying(reply)));

        let places = gateway
            .find_nearby_places(&location(), PlaceFilter::Both, 5.0)
            .await;

        let names: Vec<&str> = places.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Ruby Hall Clinic", "Sahyadri Hospital", "Corner Store", "City Pharmacy"]
        );
        assert_eq!(places[0].id, "abc");
        assert_eq!(places[3].id, "place-1");
        assert!(places[0].is_top_recommendation);
        assert_eq!(places[2].place_type, medscan_core::domain::PlaceType::Other);
    }

    #[tokio::test]
    async fn wrapped_object_is_accepted() {
        let reply = r#"{"places": [{"name": "Apollo Pharmacy", "type": "Pharmacy", "address": "FC Road", "distanceKm": 1.0}]}"#;
        let gateway = AiGateway::with_model(Arc::new(ScriptedModel::replying(reply)));
        let places = gateway
            .find_nearby_places(&location(), PlaceFilter::Pharmacy, 3.0)
            .await;
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].id, "place-1");
    }
}
