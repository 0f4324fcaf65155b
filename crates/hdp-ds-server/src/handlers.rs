//! Observation search keyed by the mapped patient.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::DsState;
use crate::token;

/// Returns the patient's Observation bundle. Every resource subject is the
/// hashed local patient from the internal token.
pub async fn observation_search(State(state): State<DsState>, headers: HeaderMap) -> Response {
    let claims = match token::authenticate(&headers, &state.local_tokens) {
        Ok(claims) => claims,
        Err(error) => {
            tracing::debug!(error = %error, "rejected bearer");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "unauthorized"})),
            )
                .into_response();
        }
    };

    let entries: Vec<Value> = sample_observations(&claims.patient)
        .into_iter()
        .map(|resource| json!({"resource": resource, "search": {"mode": "match"}}))
        .collect();
    let bundle = json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": entries.len(),
        "entry": entries,
    });
    Json(bundle).into_response()
}

/// The demonstration data set behind this Data Source. A production
/// deployment replaces this with its clinical repository.
fn sample_observations(patient: &str) -> Vec<Value> {
    [("718-7", "Hemoglobin [Mass/volume] in Blood", 13.9, "g/dL"), (
        "2345-7",
        "Glucose [Mass/volume] in Serum or Plasma",
        92.0,
        "mg/dL",
    )]
    .into_iter()
    .map(|(code, display, value, unit)| {
        json!({
            "resourceType": "Observation",
            "id": Uuid::new_v4().to_string(),
            "status": "final",
            "code": {
                "coding": [{"system": "http://loinc.org", "code": code, "display": display}],
            },
            "subject": {"reference": patient},
            "valueQuantity": {"value": value, "unit": unit},
            "meta": {
                "security": [{
                    "system": "http://fhir.health.gov.il/cs/hdp-information-buckets",
                    "code": "laboratoryTests",
                }],
            },
        })
    })
    .collect()
}
