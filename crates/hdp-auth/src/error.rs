//! Authorization error types with OAuth 2.0 wire mapping.

/// Result alias for authorization operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Errors surfaced by the token endpoint, introspection, and the resource
/// server's authorization layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The client is unknown, its assertion is malformed, or the signature
    /// or audience check failed.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// A referenced grant (consent) is missing or not active.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The requested scope is not allowed for this client.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
    },

    /// The request is missing a required parameter or is malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The requested resource indicator does not match any endpoint owned by
    /// a custodian of the referenced consents (RFC 8707).
    #[error("Invalid target: {message}")]
    InvalidTarget {
        /// Description of why the target is invalid.
        message: String,
    },

    /// The authenticated client is not authorized for the requested binding
    /// (e.g. asserting another organization's identity).
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of why the client is unauthorized.
        message: String,
    },

    /// Access denied: mTLS gate failure or a caller that is not a party to
    /// the consent.
    #[error("Access denied: {message}")]
    AccessDenied {
        /// Description of why access was denied.
        message: String,
    },

    /// The grant type is not supported.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The offending grant type.
        grant_type: String,
    },

    /// The request lacks valid authentication credentials.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the request is unauthorized.
        message: String,
    },

    /// The authenticated caller may not perform this operation.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why the operation is forbidden.
        message: String,
    },

    /// An unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidTarget` error.
    #[must_use]
    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::InvalidTarget {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `AccessDenied` error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The OAuth 2.0 `error` code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidTarget { .. } => "invalid_target",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::AccessDenied { .. } => "access_denied",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Forbidden { .. } => "access_denied",
            Self::Internal { .. } => "server_error",
        }
    }

    /// The HTTP status code this error surfaces with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient { .. }
            | Self::UnauthorizedClient { .. }
            | Self::AccessDenied { .. }
            | Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::InvalidGrant { .. }
            | Self::InvalidScope { .. }
            | Self::InvalidRequest { .. }
            | Self::InvalidTarget { .. }
            | Self::UnsupportedGrantType { .. } => 400,
            Self::Internal { .. } => 500,
        }
    }

    /// The human-readable `error_description` for the OAuth error body.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::InvalidClient { message }
            | Self::InvalidGrant { message }
            | Self::InvalidScope { message }
            | Self::InvalidRequest { message }
            | Self::InvalidTarget { message }
            | Self::UnauthorizedClient { message }
            | Self::AccessDenied { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::Internal { message } => message.clone(),
            Self::UnsupportedGrantType { grant_type } => {
                format!("Grant type '{grant_type}' is not supported")
            }
        }
    }
}
