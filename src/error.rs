use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::{debug, error, warn};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    #[error("product store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StoreUnavailable(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Validation(m) => {
                debug!("rejected request: {}", m);
                HttpResponse::BadRequest().json(json!({ "error": m }))
            }
            AppError::Auth(m) => {
                warn!("unauthorized request: {}", m);
                HttpResponse::Unauthorized().json(json!({ "error": m }))
            }
            AppError::NotFound(m) => HttpResponse::NotFound().json(json!({ "error": m })),
            // Server-side detail goes to the log, never into the body.
            AppError::StoreUnavailable(_) | AppError::Config(_) | AppError::Internal(_) => {
                error!("{}", self);
                HttpResponse::InternalServerError().json(json!({ "error": "Server error" }))
            }
        }
    }
}
