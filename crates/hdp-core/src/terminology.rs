//! Fixed terminology: code systems, extension URLs, and scope strings.
//!
//! These values are part of the platform's wire contract and must match the
//! values understood by consent UIs, Data Sources, and Service Providers.

/// Extension carrying certificate thumbprints on Organization/Endpoint.
pub const EXT_APPLICABLE_CERTIFICATES: &str =
    "http://pcm.fhir.health.gov.il/StructureDefinition/ext-applicable-certificates";

/// Nested extension url for a single thumbprint value.
pub const EXT_THUMBPRINT: &str = "thumbprint";

/// Extension linking a Consent to the HealthcareService it covers.
pub const EXT_PCM_SERVICE: &str =
    "http://pcm.fhir.health.gov.il/StructureDefinition/ext-pcm-service";

/// Extension linking an instance HealthcareService to its catalog entry.
pub const EXT_BASED_ON_CANONICAL: &str =
    "http://pcm.fhir.health.gov.il/StructureDefinition/ext-based-on-canonical-healthcareservice";

/// Identifier system for consent business identifiers.
pub const SYS_CONSENT_ID: &str = "http://pcm.fhir.health.gov.il/identifier/pcm-consent-id";

/// Identifier system for patient national ids.
pub const SYS_NATIONAL_ID: &str = "http://fhir.health.gov.il/identifier/il-national-id";

/// Identifier system for healthcare-service catalog ids.
pub const SYS_SERVICE_CATALOG_ID: &str =
    "http://pcm.fhir.health.gov.il/identifier/pcm-healthcareservice-catalog-id";

/// Code system for PCM organization types.
pub const SYS_ORG_TYPE: &str = "http://fhir.health.gov.il/cs/pcm-org-type";

/// Organization type codes.
pub const ORG_TYPE_PARENT: &str = "parent-org";
pub const ORG_TYPE_SERVICE_PROVIDER: &str = "service-provider";
pub const ORG_TYPE_SOURCE: &str = "source";
pub const ORG_TYPE_PCM: &str = "pcm";

/// Meta-tag system distinguishing catalog and instance services.
pub const SYS_META_TAG: &str = "http://pcm.fhir.health.gov.il/cs/pcm-meta-tag";

/// Meta-tag codes.
pub const TAG_CATALOG: &str = "catalog";
pub const TAG_INSTANCE: &str = "instance";

/// Consent actor role system (HL7 v3 participation types).
pub const SYS_PARTICIPATION_TYPE: &str =
    "http://terminology.hl7.org/CodeSystem/v3-ParticipationType";

/// Consent actor role: information recipient (the requesting SP).
pub const ROLE_IRCP: &str = "IRCP";

/// Consent actor role: custodian (a Data Source organization).
pub const ROLE_CST: &str = "CST";

/// The scope granted to consent-bound Data Source access tokens.
pub const SCOPE_DS_DATA: &str = "patient/Observation.rs?_security=http://fhir.health.gov.il/cs/hdp-information-buckets|laboratoryTests&date=ge2024-01-01";

/// Default scope for PCM resource-server access.
pub const SCOPE_SYSTEM_CRUDS: &str = "system/*.cruds";

/// Scope required to call token introspection.
pub const SCOPE_INTROSPECTION: &str = "introspection";
