//! Unauthenticated discovery endpoints: SMART configuration and the
//! CapabilityStatement.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use hdp_auth::smart::SmartConfiguration;
use hdp_core::resources::ResourceType;

use crate::server::AppState;

pub async fn smart_configuration(State(state): State<AppState>) -> Json<SmartConfiguration> {
    Json(SmartConfiguration::build(
        &state.config.server.public_base_url,
    ))
}

pub async fn metadata(State(state): State<AppState>) -> Json<Value> {
    Json(capability_statement(&state.config.server.public_base_url))
}

fn search_params_of(resource_type: ResourceType) -> Vec<&'static str> {
    match resource_type {
        ResourceType::Organization => vec!["type", "name", "identifier"],
        ResourceType::Endpoint => vec!["thumbprint"],
        ResourceType::HealthcareService => {
            vec!["providedBy", "category", "type", "identifier", "name", "active"]
        }
        ResourceType::Consent => vec!["_id", "status", "patient", "patient.identifier", "pcm-service"],
        ResourceType::VerificationResult => vec![],
    }
}

fn capability_statement(public_base_url: &str) -> Value {
    let base = public_base_url.trim_end_matches('/');
    let resources: Vec<Value> = ResourceType::ALL
        .iter()
        .map(|resource_type| {
            let search_params: Vec<Value> = search_params_of(*resource_type)
                .into_iter()
                .map(|name| json!({"name": name, "type": "string"}))
                .collect();
            json!({
                "type": resource_type.as_str(),
                "interaction": [
                    {"code": "read"},
                    {"code": "create"},
                    {"code": "update"},
                    {"code": "search-type"},
                ],
                "searchParam": search_params,
            })
        })
        .collect();

    json!({
        "resourceType": "CapabilityStatement",
        "status": "active",
        "kind": "instance",
        "fhirVersion": "4.0.1",
        "format": ["application/fhir+json"],
        "implementation": {
            "description": "Patient Consent Manager",
            "url": format!("{base}/r4"),
        },
        "rest": [{
            "mode": "server",
            "security": {
                "extension": [{
                    "url": "http://fhir-registry.smarthealthit.org/StructureDefinition/oauth-uris",
                    "extension": [
                        {"url": "token", "valueUri": format!("{base}/token")},
                        {"url": "introspect", "valueUri": format!("{base}/introspect")},
                    ],
                }],
                "service": [{
                    "coding": [{
                        "system": "http://terminology.hl7.org/CodeSystem/restful-security-service",
                        "code": "SMART-on-FHIR",
                    }],
                }],
            },
            "resource": resources,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_statement_lists_all_types() {
        let statement = capability_statement("https://pcm.example/");
        let resources = statement["rest"][0]["resource"].as_array().unwrap();
        assert_eq!(resources.len(), 5);
        assert_eq!(resources[0]["type"], "Organization");
        assert_eq!(
            statement["rest"][0]["security"]["extension"][0]["extension"][0]["valueUri"],
            "https://pcm.example/token"
        );
    }
}
