//! Resource-server authorization: bearer authentication and the per-resource
//! rules.
//!
//! Every API request carries mTLS plus a bearer token minted by the
//! co-located authorization server. The caller's organization comes from the
//! token; the PCM administrative organization gets the admin rules.

use axum::http::HeaderMap;
use uuid::Uuid;

use hdp_auth::token::TokenStore;
use hdp_core::Reference;
use hdp_core::resources::{
    Consent, ConsentRole, ConsentStatus, Endpoint, HealthcareService, Organization,
    VerificationResult,
};
use hdp_core::terminology::SYS_CONSENT_ID;
use hdp_core::types::{CodeableConcept, Coding, Identifier};
use hdp_store::ResourceStore;

use crate::outcome::RsError;

/// The authenticated caller of a resource-server request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub client_id: String,
    pub organization_id: String,
    pub scope: String,
    pub is_admin: bool,
}

impl AuthContext {
    /// The consent-machine role of this caller towards `consent`.
    #[must_use]
    pub fn consent_role(&self, consent: &Consent) -> ConsentRole {
        if self.is_admin {
            ConsentRole::Admin
        } else if consent.is_requester(&self.organization_id) {
            ConsentRole::Requester
        } else {
            ConsentRole::Other
        }
    }
}

/// Authenticates the bearer token against the shared token store.
///
/// # Errors
///
/// Returns a 401 `login` outcome when the bearer is missing, unknown, or
/// expired.
pub fn authenticate(
    headers: &HeaderMap,
    tokens: &TokenStore,
    store: &ResourceStore,
) -> Result<AuthContext, RsError> {
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| RsError::login("missing bearer token"))?;

    let record = tokens
        .get_active(bearer, hdp_core::time::unix_now())
        .ok_or_else(|| RsError::login("invalid or expired token"))?;

    let is_admin = store.is_admin_organization(&record.organization_id);
    Ok(AuthContext {
        client_id: record.client_id,
        organization_id: record.organization_id,
        scope: record.scope,
        is_admin,
    })
}

// ---------------------------------------------------------------------------
// Organization
// ---------------------------------------------------------------------------

/// Applies the Organization update rules, returning the resource to store.
///
/// Non-admin callers may only update their own organization, with `partOf`
/// and `type` preserved from storage; a deactivated organization stays
/// inactive (re-activation is admin-only).
///
/// # Errors
///
/// 403 when the caller may not update this organization.
pub fn organization_update(
    caller: &AuthContext,
    stored: &Organization,
    mut incoming: Organization,
) -> Result<Organization, RsError> {
    incoming.id = stored.id.clone();
    if caller.is_admin {
        return Ok(incoming);
    }
    if caller.organization_id != stored.id {
        return Err(RsError::forbidden(
            "organizations may only update themselves",
        ));
    }
    incoming.part_of = stored.part_of.clone();
    incoming.r#type = stored.r#type.clone();
    if !stored.active && incoming.active {
        // Silently preserved; re-activation is an admin operation.
        incoming.active = false;
    }
    Ok(incoming)
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Validates an Endpoint create.
///
/// # Errors
///
/// 403 when a non-admin sets `managingOrganization` to anyone but itself.
pub fn endpoint_create(caller: &AuthContext, endpoint: &Endpoint) -> Result<(), RsError> {
    if caller.is_admin {
        return Ok(());
    }
    if !endpoint.is_managed_by(&caller.organization_id) {
        return Err(RsError::forbidden(
            "endpoints must be managed by the creating organization",
        ));
    }
    Ok(())
}

/// Validates an Endpoint update.
///
/// # Errors
///
/// 403 when a non-admin touches an endpoint it does not manage.
pub fn endpoint_update(caller: &AuthContext, stored: &Endpoint) -> Result<(), RsError> {
    if caller.is_admin || stored.is_managed_by(&caller.organization_id) {
        Ok(())
    } else {
        Err(RsError::forbidden(
            "only the managing organization may update an endpoint",
        ))
    }
}

// ---------------------------------------------------------------------------
// HealthcareService
// ---------------------------------------------------------------------------

/// Outcome of a HealthcareService create: the resource to store, plus a
/// canonical twin when one was auto-created. The canonical is committed
/// before the instance that references it.
#[derive(Debug)]
pub struct ServiceCreate {
    pub service: HealthcareService,
    pub canonical: Option<HealthcareService>,
}

/// Applies the HealthcareService create rules.
///
/// Admin creates either variant as submitted. A non-admin catalog submission
/// is stored as a catalog; anything else becomes an instance owned by the
/// caller, linked to an explicit or auto-created canonical.
pub fn service_create(caller: &AuthContext, mut service: HealthcareService) -> ServiceCreate {
    if caller.is_admin {
        return ServiceCreate {
            service,
            canonical: None,
        };
    }

    if service.is_catalog() {
        if service.catalog_identifier().is_none() {
            service.set_catalog_identifier(Uuid::new_v4().to_string());
        }
        return ServiceCreate {
            service,
            canonical: None,
        };
    }

    service.provided_by = Some(Reference::to("Organization", &caller.organization_id));
    if service.active.is_none() {
        service.active = Some(false);
    }
    service.tag_instance();

    let canonical = if service.based_on_canonical().is_none() {
        let mut twin = service.clone();
        twin.id = Uuid::new_v4().to_string();
        twin.provided_by = None;
        twin.tag_catalog();
        twin.set_catalog_identifier(Uuid::new_v4().to_string());
        service.set_based_on_canonical(Reference::to("HealthcareService", &twin.id));
        Some(twin)
    } else {
        None
    };

    ServiceCreate { service, canonical }
}

/// Applies the HealthcareService update rules, returning the resource to
/// store.
///
/// # Errors
///
/// 403 when a non-admin edits a catalog or another provider's instance.
pub fn service_update(
    caller: &AuthContext,
    stored: &HealthcareService,
    mut incoming: HealthcareService,
) -> Result<HealthcareService, RsError> {
    incoming.id = stored.id.clone();
    if caller.is_admin {
        return Ok(incoming);
    }
    if stored.is_catalog() {
        return Err(RsError::forbidden("catalog services are PCM-managed"));
    }
    if !stored.is_provided_by(&caller.organization_id) {
        return Err(RsError::forbidden(
            "only the providing organization may update a service",
        ));
    }
    incoming.provided_by = stored.provided_by.clone();
    Ok(incoming)
}

// ---------------------------------------------------------------------------
// Consent
// ---------------------------------------------------------------------------

/// Builds the stored form of a created Consent.
///
/// The server owns id, business identifier, the default scope/category/
/// purpose codings, the `proposed` status, and the sole IRCP actor (the
/// caller). The patient identifier and the pcm-service link come from the
/// submission.
///
/// # Errors
///
/// 400 without a patient identifier; 403 when the caller's organization is
/// not registered.
pub fn consent_create(
    caller: &AuthContext,
    store: &ResourceStore,
    incoming: Consent,
) -> Result<Consent, RsError> {
    let patient = incoming
        .patient
        .clone()
        .ok_or_else(|| RsError::invalid("Consent.patient.identifier is required"))?;
    let caller_org = store
        .organizations
        .get(&caller.organization_id)
        .ok_or_else(|| RsError::forbidden("caller organization is not registered"))?;

    let id = Uuid::new_v4().to_string();
    let mut consent = Consent::proposed(id.clone(), patient.identifier);
    consent
        .identifier
        .push(Identifier::new(SYS_CONSENT_ID, id));
    consent.scope = Some(CodeableConcept::of(Coding::new(
        "http://terminology.hl7.org/CodeSystem/consentscope",
        "patient-privacy",
    )));
    consent.category = vec![CodeableConcept::of(Coding::new(
        "http://loinc.org",
        "59284-0",
    ))];
    consent.provision.purpose = vec![Coding::new(
        "http://terminology.hl7.org/CodeSystem/v3-ActReason",
        "TREAT",
    )];
    consent.provision.actor = vec![hdp_core::resources::ConsentActor::new(
        hdp_core::terminology::ROLE_IRCP,
        caller_org.reference(),
    )];
    consent.extension = incoming.extension;
    Ok(consent)
}

/// Whether the caller may read this consent. Non-parties get a 404 upstream,
/// not a 403, so existence is not disclosed.
#[must_use]
pub fn consent_visible(caller: &AuthContext, consent: &Consent) -> bool {
    caller.is_admin || consent.is_actor(&caller.organization_id)
}

/// Applies the Consent update rules under the store's entry lock, returning
/// the stored result.
///
/// Admin may set any field. The requester's only permitted change is
/// `status ← inactive` with everything else byte-identical.
///
/// # Errors
///
/// 403 on any other change or on a non-requester update.
pub fn consent_update(
    caller: &AuthContext,
    stored: &mut Consent,
    mut incoming: Consent,
) -> Result<Consent, RsError> {
    incoming.id = stored.id.clone();
    if caller.is_admin {
        *stored = incoming;
        return Ok(stored.clone());
    }

    let role = caller.consent_role(stored);
    if role != ConsentRole::Requester {
        return Err(RsError::forbidden("only the requester may update a consent"));
    }

    let mut expected = stored.clone();
    expected.status = ConsentStatus::Inactive;
    let same_shape = serde_json::to_value(&incoming).ok() == serde_json::to_value(&expected).ok();
    if !same_shape {
        return Err(RsError::forbidden(
            "the requester may only set status to inactive",
        ));
    }

    stored
        .transition(ConsentStatus::Inactive, role)
        .map_err(|_| RsError::forbidden("the requester may only deactivate an active consent"))?;
    Ok(stored.clone())
}

// ---------------------------------------------------------------------------
// VerificationResult
// ---------------------------------------------------------------------------

/// Applies the VerificationResult create defaults: an absent validator
/// becomes the caller's parent organization, or the caller itself without a
/// parent.
pub fn verification_result_create(
    caller: &AuthContext,
    store: &ResourceStore,
    mut incoming: VerificationResult,
) -> VerificationResult {
    if incoming.needs_default_validator() {
        let validator_ref = store
            .organizations
            .get(&caller.organization_id)
            .and_then(|org| org.part_of.clone())
            .unwrap_or_else(|| Reference::to("Organization", &caller.organization_id));
        incoming.validator = vec![hdp_core::resources::ValidatorAttestation {
            organization: validator_ref,
        }];
    }
    incoming
}
