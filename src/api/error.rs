use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

use crate::bundle::BundleError;
use crate::replay::ReplayError;
use crate::storage::StoreError;

use super::response::ErrorResponse;

/// Errors returned by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// The request could not be extracted (bad path parameter or body).
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("operation did not complete within {0:?}")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Store(e) | ApiError::Replay(ReplayError::Store(e)) => store_status(e),
            ApiError::Replay(ReplayError::MissingInput(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "MISSING_INPUT")
            }
            ApiError::Bundle(_) | ApiError::Replay(ReplayError::Bundle(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "BUILD_FAILED")
            }
            ApiError::Replay(ReplayError::Eval(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "EVAL_FAILED")
            }
            ApiError::Rejected { status, .. } => (*status, "INVALID_REQUEST"),
            ApiError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

fn store_status(err: &StoreError) -> (StatusCode, &'static str) {
    match err {
        StoreError::InvalidRule(_) => (StatusCode::BAD_REQUEST, "INVALID_RULE"),
        StoreError::RuleNotFound(_) | StoreError::DecisionNotFound(_) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        }
        StoreError::DuplicateRuleId(_) | StoreError::DuplicateDecisionId(_) => {
            (StatusCode::CONFLICT, "DUPLICATE_ID")
        }
        StoreError::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            error!(error = %self, code, "Request failed");
        } else {
            warn!(error = %self, code, "Request rejected");
        }

        (status, Json(ErrorResponse::new(self.to_string(), code))).into_response()
    }
}
