use actix_web::{error::ResponseError, http::header, http::StatusCode, HttpResponse};
use bloodbank_types::ParseError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BloodBankError>;

#[derive(Error, Debug)]
pub enum BloodBankError {
    #[error("Username or email already registered: {0}")]
    DuplicateIdentity(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Invalid blood type: {0}")]
    InvalidBloodType(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Login required")]
    Unauthorized,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration failure: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ParseError> for BloodBankError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidBloodType(value) => BloodBankError::InvalidBloodType(value),
            other => BloodBankError::Validation(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for BloodBankError {
    fn from(err: validator::ValidationErrors) -> Self {
        BloodBankError::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for BloodBankError {
    fn from(err: config::ConfigError) -> Self {
        BloodBankError::Config(err.to_string())
    }
}

impl ResponseError for BloodBankError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        if let BloodBankError::Unauthorized = self {
            return HttpResponse::build(status_code)
                .insert_header((header::LOCATION, "/login"))
                .finish();
        }

        if status_code.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.public_message(),
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            BloodBankError::DuplicateIdentity(_) => StatusCode::CONFLICT,
            BloodBankError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            BloodBankError::InvalidReference(_) => StatusCode::BAD_REQUEST,
            BloodBankError::InvalidBloodType(_) => StatusCode::BAD_REQUEST,
            BloodBankError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
            BloodBankError::InvalidState(_) => StatusCode::CONFLICT,
            BloodBankError::NotFound(_) => StatusCode::NOT_FOUND,
            BloodBankError::Unauthorized => StatusCode::SEE_OTHER,
            BloodBankError::Validation(_) => StatusCode::BAD_REQUEST,
            BloodBankError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BloodBankError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BloodBankError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BloodBankError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl BloodBankError {
    fn error_type(&self) -> &str {
        match self {
            BloodBankError::DuplicateIdentity(_) => "duplicate_identity",
            BloodBankError::InvalidCredentials => "invalid_credentials",
            BloodBankError::InvalidReference(_) => "invalid_reference",
            BloodBankError::InvalidBloodType(_) => "invalid_blood_type",
            BloodBankError::InvalidQuantity(_) => "invalid_quantity",
            BloodBankError::InvalidState(_) => "invalid_state",
            BloodBankError::NotFound(_) => "not_found",
            BloodBankError::Unauthorized => "unauthorized",
            BloodBankError::Validation(_) => "validation_error",
            BloodBankError::Storage(_) => "storage_failure",
            BloodBankError::Migration(_) => "storage_failure",
            BloodBankError::Config(_) => "config_error",
            BloodBankError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to show the caller. Server-side failures stay generic; the detail is logged.
    fn public_message(&self) -> String {
        if self.status_code().is_server_error() {
            "The operation failed and no changes were saved".to_string()
        } else {
            self.to_string()
        }
    }

    /// True when the storage layer rejected a write on a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            BloodBankError::Storage(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}
