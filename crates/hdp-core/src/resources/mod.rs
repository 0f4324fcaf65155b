//! Typed resources held by the PCM store.

mod consent;
mod endpoint;
mod healthcare_service;
mod organization;
mod verification_result;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use consent::{Consent, ConsentActor, ConsentPatient, ConsentRole, ConsentStatus, Provision};
pub use endpoint::Endpoint;
pub use healthcare_service::HealthcareService;
pub use organization::Organization;
pub use verification_result::{ValidatorAttestation, VerificationResult};

/// The resource types served by the PCM resource server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Organization,
    Endpoint,
    HealthcareService,
    Consent,
    VerificationResult,
}

impl ResourceType {
    /// All types, in the order they appear in the capability statement.
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Organization,
        ResourceType::Endpoint,
        ResourceType::HealthcareService,
        ResourceType::Consent,
        ResourceType::VerificationResult,
    ];

    /// The wire name of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "Organization",
            Self::Endpoint => "Endpoint",
            Self::HealthcareService => "HealthcareService",
            Self::Consent => "Consent",
            Self::VerificationResult => "VerificationResult",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Organization" => Ok(Self::Organization),
            "Endpoint" => Ok(Self::Endpoint),
            "HealthcareService" => Ok(Self::HealthcareService),
            "Consent" => Ok(Self::Consent),
            "VerificationResult" => Ok(Self::VerificationResult),
            other => Err(crate::CoreError::invalid_resource(format!(
                "unknown resource type '{other}'"
            ))),
        }
    }
}

/// A resource of any served type, used by search bundles and includes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
pub enum AnyResource {
    Organization(Organization),
    Endpoint(Endpoint),
    HealthcareService(HealthcareService),
    Consent(Consent),
    VerificationResult(VerificationResult),
}

impl AnyResource {
    /// The resource's id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Organization(r) => &r.id,
            Self::Endpoint(r) => &r.id,
            Self::HealthcareService(r) => &r.id,
            Self::Consent(r) => &r.id,
            Self::VerificationResult(r) => &r.id,
        }
    }

    /// The resource's type.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Organization(_) => ResourceType::Organization,
            Self::Endpoint(_) => ResourceType::Endpoint,
            Self::HealthcareService(_) => ResourceType::HealthcareService,
            Self::Consent(_) => ResourceType::Consent,
            Self::VerificationResult(_) => ResourceType::VerificationResult,
        }
    }

    /// The relative reference key `Type/id`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.resource_type(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_round_trips() {
        for rt in ResourceType::ALL {
            assert_eq!(rt.as_str().parse::<ResourceType>().unwrap(), rt);
        }
        assert!("Patient".parse::<ResourceType>().is_err());
    }

    #[test]
    fn any_resource_serializes_with_resource_type() {
        let org = Organization::new("org-1", "Test Org");
        let any = AnyResource::Organization(org);
        let json = serde_json::to_value(&any).unwrap();
        assert_eq!(json["resourceType"], "Organization");
        assert_eq!(any.key(), "Organization/org-1");
    }
}
