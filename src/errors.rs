use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::booking::BookingError;

/// Error surface shared by all handlers. The three-way split between bad
/// input, missing referenced entity, and state conflict is part of the API
/// contract; infrastructure failures are surfaced generically.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("unauthorized")]
    Unauthorized,
    #[error("internal error")]
    Infrastructure(#[from] sqlx::Error),
    #[error("internal error")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Infrastructure(_) | ApiError::Token(_) => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Infrastructure(_) | ApiError::Token(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Infrastructure(err) => {
                log::error!("Infrastructure error: {err}");
                "internal error".to_string()
            }
            ApiError::Token(err) => {
                log::error!("Token error: {err}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": { "code": self.code(), "message": message }
        }))
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(message) => ApiError::Validation(message.to_string()),
            BookingError::ServiceNotOffered => {
                ApiError::Validation("service is not offered by this stylist".to_string())
            }
            BookingError::StylistNotFound => ApiError::NotFound("stylist"),
            BookingError::SlotTaken => ApiError::Conflict("slot already taken"),
            BookingError::Infrastructure(err) => ApiError::Infrastructure(err),
        }
    }
}
