use axum::http::StatusCode;
use std::fmt;

use crate::error::AppError;

/// Why a request was stopped at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// The authorization service cannot be reached (or could not answer, fail-closed).
    ServiceUnavailable,
    /// Missing or malformed credentials.
    Unauthorized,
    /// Valid credentials that are inactive or insufficient for the route's scope.
    Forbidden,
}

impl RejectReason {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable => "service_unavailable",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final decision for one request. Produced once, never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Allow,
    Reject(RejectReason),
}

impl Outcome {
    /// Map to the gateway error type so a rejection can be returned with `?`.
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Self::Allow => Ok(()),
            Self::Reject(RejectReason::ServiceUnavailable) => Err(AppError::ServiceUnavailable),
            Self::Reject(RejectReason::Unauthorized) => Err(AppError::Unauthorized),
            Self::Reject(RejectReason::Forbidden) => Err(AppError::Forbidden),
        }
    }
}
