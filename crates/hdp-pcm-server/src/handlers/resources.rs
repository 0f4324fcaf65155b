//! FHIR-style REST handlers under `/r4`.
//!
//! All routes here require mTLS plus a bearer token minted by the co-located
//! authorization server; authorization decisions are made per resource in
//! `authz`.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use hdp_core::resources::{
    AnyResource, Consent, Endpoint, HealthcareService, Organization, VerificationResult,
};
use hdp_store::bundle::Bundle;
use hdp_store::include::{expand_includes, parse_includes};
use hdp_store::search::{
    SearchParams, consent_matches, endpoint_matches, organization_matches, service_matches,
};

use crate::authz::{self, AuthContext};
use crate::outcome::RsError;
use crate::peer_cert;
use crate::server::AppState;

/// mTLS gate plus bearer authentication for RS routes.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, RsError> {
    peer_cert::extract_peer(
        headers,
        state.trust_anchor.as_deref().map(Vec::as_slice),
        state.config.tls.require_client_cert,
    )
    .map_err(|error| RsError::login(error.description()))?;
    authz::authenticate(headers, &state.tokens, &state.store)
}

fn search_params(pairs: Vec<(String, String)>) -> SearchParams {
    SearchParams::from_pairs(pairs)
}

fn rs_base(state: &AppState) -> String {
    format!(
        "{}/r4",
        state.config.server.public_base_url.trim_end_matches('/')
    )
}

fn created(resource: impl serde::Serialize) -> Response {
    (StatusCode::CREATED, Json(resource)).into_response()
}

// ---------------------------------------------------------------------------
// Organization
// ---------------------------------------------------------------------------

pub async fn organization_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Bundle>, RsError> {
    authenticate(&state, &headers)?;
    let params = search_params(pairs);

    let matches: Vec<AnyResource> = state
        .store
        .organizations
        .all()
        .into_iter()
        .filter(|org| organization_matches(org, &params))
        .map(AnyResource::Organization)
        .collect();

    let includes = parse_includes(&params);
    let included = expand_includes(&state.store, &includes, &matches, |_| true);
    Ok(Json(Bundle::searchset(&rs_base(&state), matches, included)))
}

pub async fn organization_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AnyResource>, RsError> {
    authenticate(&state, &headers)?;
    state
        .store
        .organizations
        .get(&id)
        .map(|org| Json(AnyResource::Organization(org)))
        .ok_or_else(|| RsError::not_found("Organization", &id))
}

pub async fn organization_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut incoming): Json<Organization>,
) -> Result<Response, RsError> {
    let caller = authenticate(&state, &headers)?;
    if !caller.is_admin {
        return Err(RsError::forbidden("organizations are PCM-managed"));
    }
    // Exactly one administrative organization exists.
    if incoming.is_pcm() && state.store.pcm_organization().is_some() {
        return Err(RsError::invalid("a pcm organization already exists"));
    }
    if incoming.id.is_empty() {
        incoming.id = Uuid::new_v4().to_string();
    }
    state
        .store
        .organizations
        .insert_new("Organization", incoming.id.clone(), incoming.clone())?;
    Ok(created(AnyResource::Organization(incoming)))
}

pub async fn organization_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(incoming): Json<Organization>,
) -> Result<Json<AnyResource>, RsError> {
    let caller = authenticate(&state, &headers)?;
    state.store.organizations.with_entry(&id, |entry| {
        let stored = entry.ok_or_else(|| RsError::not_found("Organization", &id))?;
        let updated = authz::organization_update(&caller, stored, incoming)?;
        *stored = updated.clone();
        Ok(Json(AnyResource::Organization(updated)))
    })
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

pub async fn endpoint_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Bundle>, RsError> {
    authenticate(&state, &headers)?;
    let params = search_params(pairs);
    let matches: Vec<AnyResource> = state
        .store
        .endpoints
        .all()
        .into_iter()
        .filter(|endpoint| endpoint_matches(endpoint, &params))
        .map(AnyResource::Endpoint)
        .collect();
    Ok(Json(Bundle::searchset(&rs_base(&state), matches, Vec::new())))
}

pub async fn endpoint_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AnyResource>, RsError> {
    authenticate(&state, &headers)?;
    state
        .store
        .endpoints
        .get(&id)
        .map(|endpoint| Json(AnyResource::Endpoint(endpoint)))
        .ok_or_else(|| RsError::not_found("Endpoint", &id))
}

pub async fn endpoint_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut incoming): Json<Endpoint>,
) -> Result<Response, RsError> {
    let caller = authenticate(&state, &headers)?;
    authz::endpoint_create(&caller, &incoming)?;
    // Addresses double as RFC 8707 resource indicators and must stay unique.
    if state.store.endpoint_by_address(&incoming.address).is_some() {
        return Err(RsError::invalid(format!(
            "an endpoint with address '{}' already exists",
            incoming.address
        )));
    }
    if incoming.id.is_empty() {
        incoming.id = Uuid::new_v4().to_string();
    }
    state
        .store
        .endpoints
        .insert_new("Endpoint", incoming.id.clone(), incoming.clone())?;
    Ok(created(AnyResource::Endpoint(incoming)))
}

pub async fn endpoint_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut incoming): Json<Endpoint>,
) -> Result<Json<AnyResource>, RsError> {
    let caller = authenticate(&state, &headers)?;
    state.store.endpoints.with_entry(&id, |entry| {
        let stored = entry.ok_or_else(|| RsError::not_found("Endpoint", &id))?;
        authz::endpoint_update(&caller, stored)?;
        incoming.id = stored.id.clone();
        *stored = incoming.clone();
        Ok(Json(AnyResource::Endpoint(incoming)))
    })
}

// ---------------------------------------------------------------------------
// HealthcareService
// ---------------------------------------------------------------------------

pub async fn service_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Bundle>, RsError> {
    authenticate(&state, &headers)?;
    let params = search_params(pairs);
    let matches: Vec<AnyResource> = state
        .store
        .services
        .all()
        .into_iter()
        .filter(|service| service_matches(service, &params))
        .map(AnyResource::HealthcareService)
        .collect();
    Ok(Json(Bundle::searchset(&rs_base(&state), matches, Vec::new())))
}

pub async fn service_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AnyResource>, RsError> {
    authenticate(&state, &headers)?;
    state
        .store
        .services
        .get(&id)
        .map(|service| Json(AnyResource::HealthcareService(service)))
        .ok_or_else(|| RsError::not_found("HealthcareService", &id))
}

pub async fn service_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut incoming): Json<HealthcareService>,
) -> Result<Response, RsError> {
    let caller = authenticate(&state, &headers)?;
    if incoming.id.is_empty() {
        incoming.id = Uuid::new_v4().to_string();
    }
    let outcome = authz::service_create(&caller, incoming);

    // The canonical twin is committed before the instance that references it.
    if let Some(canonical) = outcome.canonical {
        state.store.services.insert_new(
            "HealthcareService",
            canonical.id.clone(),
            canonical,
        )?;
    }
    state.store.services.insert_new(
        "HealthcareService",
        outcome.service.id.clone(),
        outcome.service.clone(),
    )?;
    Ok(created(AnyResource::HealthcareService(outcome.service)))
}

pub async fn service_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(incoming): Json<HealthcareService>,
) -> Result<Json<AnyResource>, RsError> {
    let caller = authenticate(&state, &headers)?;
    state.store.services.with_entry(&id, |entry| {
        let stored = entry.ok_or_else(|| RsError::not_found("HealthcareService", &id))?;
        let updated = authz::service_update(&caller, stored, incoming)?;
        *stored = updated.clone();
        Ok(Json(AnyResource::HealthcareService(updated)))
    })
}

// ---------------------------------------------------------------------------
// Consent
// ---------------------------------------------------------------------------

pub async fn consent_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Bundle>, RsError> {
    let caller = authenticate(&state, &headers)?;
    let params = search_params(pairs);

    // Non-admins only see consents they are a party to; the include
    // expansion below starts from that filtered set, which keeps it inside
    // the caller's visible graph.
    let matches: Vec<AnyResource> = state
        .store
        .consents
        .all()
        .into_iter()
        .filter(|consent| authz::consent_visible(&caller, consent))
        .filter(|consent| consent_matches(consent, &params))
        .map(AnyResource::Consent)
        .collect();

    let includes = parse_includes(&params);
    let included = expand_includes(&state.store, &includes, &matches, |_| true);
    Ok(Json(Bundle::searchset(&rs_base(&state), matches, included)))
}

pub async fn consent_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AnyResource>, RsError> {
    let caller = authenticate(&state, &headers)?;
    let consent = state
        .store
        .consents
        .get(&id)
        .ok_or_else(|| RsError::not_found("Consent", &id))?;
    // Non-parties get the same 404 as a missing id.
    if !authz::consent_visible(&caller, &consent) {
        return Err(RsError::not_found("Consent", &id));
    }
    Ok(Json(AnyResource::Consent(consent)))
}

pub async fn consent_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(incoming): Json<Consent>,
) -> Result<Response, RsError> {
    let caller = authenticate(&state, &headers)?;
    let consent = authz::consent_create(&caller, &state.store, incoming)?;
    state
        .store
        .consents
        .insert_new("Consent", consent.id.clone(), consent.clone())?;
    Ok(created(AnyResource::Consent(consent)))
}

pub async fn consent_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(incoming): Json<Consent>,
) -> Result<Json<AnyResource>, RsError> {
    let caller = authenticate(&state, &headers)?;
    state.store.consents.with_entry(&id, |entry| {
        let stored = entry.ok_or_else(|| RsError::not_found("Consent", &id))?;
        let updated = authz::consent_update(&caller, stored, incoming)?;
        Ok(Json(AnyResource::Consent(updated)))
    })
}

// ---------------------------------------------------------------------------
// VerificationResult
// ---------------------------------------------------------------------------

pub async fn verification_result_search(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Bundle>, RsError> {
    authenticate(&state, &headers)?;
    let matches: Vec<AnyResource> = state
        .store
        .verification_results
        .all()
        .into_iter()
        .map(AnyResource::VerificationResult)
        .collect();
    Ok(Json(Bundle::searchset(&rs_base(&state), matches, Vec::new())))
}

pub async fn verification_result_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AnyResource>, RsError> {
    authenticate(&state, &headers)?;
    state
        .store
        .verification_results
        .get(&id)
        .map(|result| Json(AnyResource::VerificationResult(result)))
        .ok_or_else(|| RsError::not_found("VerificationResult", &id))
}

pub async fn verification_result_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut incoming): Json<VerificationResult>,
) -> Result<Response, RsError> {
    let caller = authenticate(&state, &headers)?;
    if incoming.id.is_empty() {
        incoming.id = Uuid::new_v4().to_string();
    }
    let result = authz::verification_result_create(&caller, &state.store, incoming);
    state.store.verification_results.insert_new(
        "VerificationResult",
        result.id.clone(),
        result.clone(),
    )?;
    Ok(created(AnyResource::VerificationResult(result)))
}
