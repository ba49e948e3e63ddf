use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{assign::SourceEmpty, game::SessionCode, state_machine::PlanError},
};

/// Failures of the session, seat and turn services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No session exists under the code.
    #[error("session `{0}` not found")]
    NotFound(SessionCode),
    /// Every seat of the session is taken.
    #[error("session `{0}` is full")]
    SeatingFull(SessionCode),
    /// A content pool needed to deal a round is empty.
    #[error("cannot deal a round: {0}")]
    AssignmentSourceEmpty(#[from] SourceEmpty),
    /// A uniqueness constraint was hit and retries were exhausted.
    #[error("write conflict on `{0}`")]
    WriteConflict(String),
    /// Any other store failure; not retried.
    #[error("session store unavailable")]
    Unavailable(#[source] StorageError),
    /// Bad capacity, seat index or payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The request is illegal in the session's current phase or variant.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { key, .. } => ServiceError::WriteConflict(key),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("rejected payload: {err}"))
    }
}

/// Failure of an HTTP handler, rendered as a status code and a JSON body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// The session store could not be reached.
    #[error("store unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(code) => AppError::NotFound(format!("session `{code}`")),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            err @ (ServiceError::SeatingFull(_) | ServiceError::WriteConflict(_)) => {
                AppError::Conflict(err.to_string())
            }
            err @ ServiceError::AssignmentSourceEmpty(_) => AppError::Internal(err.to_string()),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = ErrorBody {
            status: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Stale { expected, actual } => ServiceError::InvalidState(format!(
                "action issued at turn {expected} but the session is at turn {actual}"
            )),
            PlanError::InvalidTransition(invalid) => {
                ServiceError::InvalidState(invalid.to_string())
            }
            PlanError::SourceEmpty(source) => ServiceError::AssignmentSourceEmpty(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::session_store::Table;

    #[test]
    fn conflicts_are_recoverable_write_conflicts() {
        let err: ServiceError = StorageError::Conflict {
            table: Table::Seats,
            key: "ABCDEF/1".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::WriteConflict(ref key) if key == "ABCDEF/1"));
    }

    #[test]
    fn seating_full_maps_to_conflict_status() {
        let code: SessionCode = "ABCDEF".parse().unwrap();
        let response = AppError::from(ServiceError::SeatingFull(code)).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
