//! Consent: the patient's authorization for an SP to pull data from Data
//! Sources.
//!
//! Lifecycle: `proposed` → `active` (approval, adds custodian actors) or
//! `rejected`; `active` → `inactive` (requester or admin). `rejected` and
//! `inactive` are terminal for the SP-visible lifecycle; the PCM admin may
//! move a consent to any state.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::reference::Reference;
use crate::terminology::{EXT_PCM_SERVICE, ROLE_CST, ROLE_IRCP, SYS_PARTICIPATION_TYPE};
use crate::types::{CodeableConcept, Coding, Extension, Identifier, find_extension};

/// Consent status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentStatus {
    Proposed,
    Active,
    Inactive,
    Rejected,
}

impl ConsentStatus {
    /// The wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is attempting a consent transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentRole {
    /// The PCM administrative organization (also how approval-UI mutations
    /// reach the store).
    Admin,
    /// The IRCP actor that created the consent.
    Requester,
    /// Anyone else.
    Other,
}

/// The explicit transition function of the consent state machine.
///
/// Admin transitions are unrestricted. The requester may only deactivate an
/// active consent. Nobody else transitions anything.
#[must_use]
pub fn transition_allowed(from: ConsentStatus, to: ConsentStatus, by: ConsentRole) -> bool {
    match by {
        ConsentRole::Admin => true,
        ConsentRole::Requester => {
            from == ConsentStatus::Active && to == ConsentStatus::Inactive
        }
        ConsentRole::Other => false,
    }
}

/// The patient the consent is about, carried as an identifier-only reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentPatient {
    pub identifier: Identifier,
}

/// An actor in the consent's provision: the requesting SP (IRCP) or a
/// custodian Data Source (CST).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentActor {
    pub role: CodeableConcept,
    pub reference: Reference,
}

impl ConsentActor {
    /// Creates an actor with a participation-type role coding.
    pub fn new(role_code: &str, reference: Reference) -> Self {
        Self {
            role: CodeableConcept::of(Coding::new(SYS_PARTICIPATION_TYPE, role_code)),
            reference,
        }
    }

    /// Returns `true` if the actor carries the given role code.
    #[must_use]
    pub fn has_role(&self, code: &str) -> bool {
        self.role.has_coding(SYS_PARTICIPATION_TYPE, code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Provision {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actor: Vec<ConsentActor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub purpose: Vec<Coding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consent {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    pub status: ConsentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<ConsentPatient>,
    #[serde(default)]
    pub provision: Provision,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

impl Consent {
    /// Creates a proposed consent for a patient.
    pub fn proposed(id: impl Into<String>, patient: Identifier) -> Self {
        Self {
            id: id.into(),
            identifier: Vec::new(),
            status: ConsentStatus::Proposed,
            scope: None,
            category: Vec::new(),
            patient: Some(ConsentPatient { identifier: patient }),
            provision: Provision::default(),
            extension: Vec::new(),
        }
    }

    /// The requesting actor (IRCP). Creation guarantees exactly one.
    #[must_use]
    pub fn requester(&self) -> Option<&ConsentActor> {
        self.provision.actor.iter().find(|a| a.has_role(ROLE_IRCP))
    }

    /// The custodian actors (CST), added on approval.
    #[must_use]
    pub fn custodians(&self) -> Vec<&ConsentActor> {
        self.provision
            .actor
            .iter()
            .filter(|a| a.has_role(ROLE_CST))
            .collect()
    }

    /// Returns `true` if `Organization/{id}` appears as an actor in any role.
    #[must_use]
    pub fn is_actor(&self, organization_id: &str) -> bool {
        self.provision
            .actor
            .iter()
            .any(|a| a.reference.points_to("Organization", organization_id))
    }

    /// Returns `true` if `Organization/{id}` is the IRCP actor.
    #[must_use]
    pub fn is_requester(&self, organization_id: &str) -> bool {
        self.requester()
            .is_some_and(|a| a.reference.points_to("Organization", organization_id))
    }

    /// The linked healthcare service, if any.
    #[must_use]
    pub fn pcm_service(&self) -> Option<&Reference> {
        find_extension(&self.extension, EXT_PCM_SERVICE).and_then(|e| e.value_reference.as_ref())
    }

    /// Links the consent to a healthcare service.
    pub fn set_pcm_service(&mut self, service: Reference) {
        self.extension.retain(|e| e.url != EXT_PCM_SERVICE);
        self.extension
            .push(Extension::reference(EXT_PCM_SERVICE, service));
    }

    /// The business identifier under `system`, if present.
    #[must_use]
    pub fn identifier_in(&self, system: &str) -> Option<&str> {
        self.identifier
            .iter()
            .find(|i| i.system.as_deref() == Some(system))
            .map(|i| i.value.as_str())
    }

    /// Applies a status transition on behalf of `by`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` when the state machine forbids
    /// the move.
    pub fn transition(&mut self, to: ConsentStatus, by: ConsentRole) -> Result<()> {
        if !transition_allowed(self.status, to, by) {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::SYS_NATIONAL_ID;

    fn consent_with_requester(status: ConsentStatus) -> Consent {
        let mut c = Consent::proposed("c-1", Identifier::new(SYS_NATIONAL_ID, "99887766"));
        c.status = status;
        c.provision.actor.push(ConsentActor::new(
            ROLE_IRCP,
            Reference::to("Organization", "org-sp"),
        ));
        c
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ConsentStatus::Proposed).unwrap(),
            serde_json::json!("proposed")
        );
        let back: ConsentStatus = serde_json::from_value(serde_json::json!("inactive")).unwrap();
        assert_eq!(back, ConsentStatus::Inactive);
    }

    #[test]
    fn admin_transitions_are_unrestricted() {
        for from in [
            ConsentStatus::Proposed,
            ConsentStatus::Active,
            ConsentStatus::Inactive,
            ConsentStatus::Rejected,
        ] {
            for to in [
                ConsentStatus::Proposed,
                ConsentStatus::Active,
                ConsentStatus::Inactive,
                ConsentStatus::Rejected,
            ] {
                assert!(transition_allowed(from, to, ConsentRole::Admin));
            }
        }
    }

    #[test]
    fn requester_may_only_deactivate_active() {
        assert!(transition_allowed(
            ConsentStatus::Active,
            ConsentStatus::Inactive,
            ConsentRole::Requester
        ));
        assert!(!transition_allowed(
            ConsentStatus::Proposed,
            ConsentStatus::Active,
            ConsentRole::Requester
        ));
        assert!(!transition_allowed(
            ConsentStatus::Inactive,
            ConsentStatus::Active,
            ConsentRole::Requester
        ));
        assert!(!transition_allowed(
            ConsentStatus::Active,
            ConsentStatus::Inactive,
            ConsentRole::Other
        ));
    }

    #[test]
    fn transition_mutates_or_rejects() {
        let mut c = consent_with_requester(ConsentStatus::Active);
        c.transition(ConsentStatus::Inactive, ConsentRole::Requester)
            .unwrap();
        assert_eq!(c.status, ConsentStatus::Inactive);

        let err = c
            .transition(ConsentStatus::Active, ConsentRole::Requester)
            .unwrap_err();
        assert!(err.to_string().contains("not permitted"));
    }

    #[test]
    fn actor_queries() {
        let mut c = consent_with_requester(ConsentStatus::Active);
        c.provision.actor.push(ConsentActor::new(
            ROLE_CST,
            Reference::to("Organization", "org-vaccine-repo"),
        ));

        assert!(c.is_actor("org-sp"));
        assert!(c.is_actor("org-vaccine-repo"));
        assert!(!c.is_actor("org-other"));
        assert!(c.is_requester("org-sp"));
        assert!(!c.is_requester("org-vaccine-repo"));
        assert_eq!(c.custodians().len(), 1);
    }
}
