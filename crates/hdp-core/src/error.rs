//! Core error types shared across the platform crates.

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the domain model and resource store.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The requested resource does not exist.
    #[error("{resource_type}/{id} not found")]
    NotFound {
        /// Resource type name.
        resource_type: String,
        /// Resource id.
        id: String,
    },

    /// A resource with the same id already exists.
    #[error("{resource_type}/{id} already exists")]
    Conflict {
        /// Resource type name.
        resource_type: String,
        /// Resource id.
        id: String,
    },

    /// The resource payload is structurally invalid.
    #[error("invalid resource: {message}")]
    InvalidResource {
        /// Description of the problem.
        message: String,
    },

    /// A reference string could not be parsed or resolved.
    #[error("invalid reference: {reference}")]
    InvalidReference {
        /// The offending reference string.
        reference: String,
    },

    /// A state transition was rejected by the consent state machine.
    #[error("transition from '{from}' to '{to}' is not permitted")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },
}

impl CoreError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `InvalidResource` error.
    #[must_use]
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidReference` error.
    #[must_use]
    pub fn invalid_reference(reference: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
        }
    }

    /// Returns `true` if this error should surface as HTTP 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
