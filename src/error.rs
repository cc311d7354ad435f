use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Raised while fitting any of the models. Fatal at startup.
#[derive(Debug, Error, PartialEq)]
pub enum TrainingFailure {
    #[error("training corpus is empty")]
    EmptyCorpus,

    #[error("no term survived tokenization and stop-word filtering")]
    EmptyVocabulary,

    #[error("no ratings available for the recommender")]
    EmptyRatings,

    #[error("feature vector has dimension {found}, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid training parameter: {0}")]
    InvalidParameter(String),

    #[error("least-squares system for {0} is not positive definite")]
    Singular(String),

    #[error("training diverged: {0}")]
    NonFinite(String),
}

/// The id has no fitted latent-factor row.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ColdStartError {
    #[error("user {0} has no fitted factors")]
    User(i64),

    #[error("provider {0} has no fitted factors")]
    Provider(i64),
}

/// Errors surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = self.to_string();
        HttpResponse::build(self.status_code()).json(ErrorBody { error: &message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn validation_error_renders_as_bad_request_json() {
        let err = ApiError::Validation("Review text required".into());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Review text required"}));
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(ApiError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn cold_start_names_missing_id() {
        assert_eq!(ColdStartError::User(7).to_string(), "user 7 has no fitted factors");
        assert_eq!(ColdStartError::Provider(3).to_string(), "provider 3 has no fitted factors");
    }
}
