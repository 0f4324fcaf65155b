//! Resource reference parsing.
//!
//! All cross-resource links in the store are relative reference strings of
//! the form `Type/id`. The reference graph (Organization↔Endpoint,
//! Organization partOf) is a DAG over these strings; nothing holds in-memory
//! pointers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A FHIR-style literal reference, serialized as `{"reference": "Type/id"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// The relative reference string (`Type/id`).
    pub reference: String,
}

impl Reference {
    /// Creates a reference to the given resource.
    pub fn to(resource_type: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self {
            reference: format!("{resource_type}/{id}"),
        }
    }

    /// Creates a reference from a raw string.
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    /// Splits the reference into `(resource_type, id)`.
    ///
    /// Absolute URLs are accepted by taking the last two path segments, so
    /// `https://pcm.example/r4/Organization/org-1` parses the same as
    /// `Organization/org-1`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidReference` when the string has no `/` or an
    /// empty component.
    pub fn parts(&self) -> Result<(&str, &str)> {
        split_reference(&self.reference)
    }

    /// Returns the resource type component, if the reference parses.
    #[must_use]
    pub fn resource_type(&self) -> Option<&str> {
        self.parts().ok().map(|(t, _)| t)
    }

    /// Returns the id component, if the reference parses.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.parts().ok().map(|(_, id)| id)
    }

    /// Returns `true` if this reference points at `Type/id`.
    #[must_use]
    pub fn points_to(&self, resource_type: &str, id: &str) -> bool {
        self.parts() == Ok((resource_type, id))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)
    }
}

/// Splits a reference string into `(resource_type, id)`.
///
/// # Errors
///
/// Returns `CoreError::InvalidReference` for strings without both components.
pub fn split_reference(reference: &str) -> Result<(&str, &str)> {
    let trimmed = reference.trim_end_matches('/');
    let mut segments = trimmed.rsplit('/');
    let id = segments.next().unwrap_or_default();
    let resource_type = segments.next().unwrap_or_default();
    if id.is_empty() || resource_type.is_empty() {
        return Err(CoreError::invalid_reference(reference));
    }
    Ok((resource_type, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_reference_parses() {
        let r = Reference::to("Organization", "org-1");
        assert_eq!(r.parts().unwrap(), ("Organization", "org-1"));
        assert_eq!(r.resource_type(), Some("Organization"));
        assert_eq!(r.id(), Some("org-1"));
        assert!(r.points_to("Organization", "org-1"));
        assert!(!r.points_to("Organization", "org-2"));
    }

    #[test]
    fn absolute_reference_takes_trailing_segments() {
        let r = Reference::new("https://pcm.example/r4/Consent/c-42");
        assert_eq!(r.parts().unwrap(), ("Consent", "c-42"));
    }

    #[test]
    fn malformed_reference_is_rejected() {
        assert!(Reference::new("justanid").parts().is_err());
        assert!(Reference::new("/x").parts().is_err());
        assert!(Reference::new("").parts().is_err());
    }

    #[test]
    fn serializes_as_object() {
        let r = Reference::to("Endpoint", "ep-1");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json, serde_json::json!({"reference": "Endpoint/ep-1"}));
    }
}
