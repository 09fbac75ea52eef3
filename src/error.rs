use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilmorateError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, FilmorateError>;

impl FilmorateError {
    pub fn validation(message: impl Into<String>) -> Self {
        FilmorateError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        FilmorateError::NotFound(message.into())
    }

    fn kind(&self) -> &'static str {
        match self {
            FilmorateError::Validation(_) => "Validation error",
            FilmorateError::NotFound(_) => "Not found",
            FilmorateError::Storage(_) | FilmorateError::Serialization(_) => "Internal error",
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub description: String,
}

impl ResponseError for FilmorateError {
    fn status_code(&self) -> StatusCode {
        match self {
            FilmorateError::Validation(_) => StatusCode::BAD_REQUEST,
            FilmorateError::NotFound(_) => StatusCode::NOT_FOUND,
            FilmorateError::Storage(_) | FilmorateError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let description = match self {
            FilmorateError::Validation(message) | FilmorateError::NotFound(message) => {
                message.clone()
            }
            FilmorateError::Storage(_) | FilmorateError::Serialization(_) => {
                error!("{:?}", self);
                "Database error".to_owned()
            }
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.kind().to_owned(),
            description,
        })
    }
}
