//! OperationOutcome error responses for the resource server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use hdp_core::CoreError;

/// Minimal FHIR OperationOutcome for API error responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationOutcome {
    #[serde(rename = "resourceType")]
    pub resource_type: &'static str,
    pub issue: Vec<OperationOutcomeIssue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationOutcomeIssue {
    /// fatal | error | warning | information
    pub severity: &'static str,
    /// FHIR issue type code (subset used): login | forbidden | not-found |
    /// invalid | processing
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

impl OperationOutcome {
    pub fn error(code: &'static str, diagnostics: impl Into<String>) -> Self {
        Self {
            resource_type: "OperationOutcome",
            issue: vec![OperationOutcomeIssue {
                severity: "error",
                code,
                diagnostics: Some(diagnostics.into()),
            }],
        }
    }
}

/// A resource-server error: status plus outcome body.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {diagnostics}")]
pub struct RsError {
    pub status: StatusCode,
    pub code: &'static str,
    pub diagnostics: String,
}

impl RsError {
    /// 401 with issue code `login`: missing/failed mTLS or bearer.
    #[must_use]
    pub fn login(diagnostics: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "login",
            diagnostics: diagnostics.into(),
        }
    }

    /// 403 with issue code `forbidden`.
    #[must_use]
    pub fn forbidden(diagnostics: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code: "forbidden",
            diagnostics: diagnostics.into(),
        }
    }

    /// 404 with issue code `not-found`. Also used to hide consents from
    /// non-parties.
    #[must_use]
    pub fn not_found(resource_type: &str, id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not-found",
            diagnostics: format!("{resource_type}/{id} not found"),
        }
    }

    /// 400 with issue code `invalid`.
    #[must_use]
    pub fn invalid(diagnostics: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid",
            diagnostics: diagnostics.into(),
        }
    }
}

impl From<CoreError> for RsError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::NotFound { resource_type, id } => Self::not_found(resource_type, id),
            CoreError::Conflict { .. } => Self {
                status: StatusCode::CONFLICT,
                code: "processing",
                diagnostics: err.to_string(),
            },
            _ => Self::invalid(err.to_string()),
        }
    }
}

impl IntoResponse for RsError {
    fn into_response(self) -> Response {
        let outcome = OperationOutcome::error(self.code, self.diagnostics);
        (self.status, Json(outcome)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_shape() {
        let outcome = OperationOutcome::error("forbidden", "no");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["resourceType"], "OperationOutcome");
        assert_eq!(json["issue"][0]["severity"], "error");
        assert_eq!(json["issue"][0]["code"], "forbidden");
    }

    #[test]
    fn core_error_mapping() {
        let err: RsError = CoreError::not_found("Consent", "c-1").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        let err: RsError = CoreError::conflict("Consent", "c-1").into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        let err: RsError = CoreError::invalid_resource("bad").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
