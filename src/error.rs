use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{Span, error, warn};

use crate::api::response::ApiResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("User is already registered")]
    AlreadyRegistered,

    #[error("User is not registered")]
    NotRegistered,

    #[error("OTP not found or expired, please request a new one")]
    OtpNotFound,

    #[error("Invalid OTP")]
    OtpMismatch,

    #[error("Invalid credentials")]
    BadCredentials,

    #[error("Password and confirm password do not match")]
    PasswordMismatch,

    #[error("Student is not enrolled in the course")]
    NotEnrolled,

    #[error("Course is already reviewed by the user")]
    AlreadyReviewed,

    /// The primary operation committed, only the follow-up email failed.
    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Authentication(_) => "authentication_error",
            AppError::Authorization(_) => "authorization_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Validation(_) => "validation_error",
            AppError::Conflict(_) => "conflict_error",
            AppError::AlreadyRegistered => "already_registered",
            AppError::NotRegistered => "not_registered",
            AppError::OtpNotFound => "otp_not_found",
            AppError::OtpMismatch => "otp_mismatch",
            AppError::BadCredentials => "bad_credentials",
            AppError::PasswordMismatch => "password_mismatch",
            AppError::NotEnrolled => "not_enrolled",
            AppError::AlreadyReviewed => "already_reviewed",
            AppError::NotificationFailed(_) => "notification_failed",
            AppError::ExternalService(_) => "external_service_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = self.kind();

        match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
            }
            AppError::NotificationFailed(msg) | AppError::ExternalService(msg) => {
                error!(message = %msg, context = %ctx, kind = error_kind, "External service error");
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal server error");
            }
            _ => {
                warn!(message = %message, context = %ctx, kind = error_kind, "Request rejected");
            }
        }

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            match self {
                AppError::Database(_)
                | AppError::Internal(_)
                | AppError::ExternalService(_)
                | AppError::NotificationFailed(_) => {
                    current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
                }
                _ => {}
            }
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Database(_) => Status::InternalServerError,
            AppError::Authentication(_) => Status::Unauthorized,
            AppError::Authorization(_) => Status::Forbidden,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Validation(_) => Status::BadRequest,
            AppError::Conflict(_) => Status::Conflict,
            AppError::AlreadyRegistered => Status::Conflict,
            AppError::NotRegistered => Status::Unauthorized,
            AppError::OtpNotFound => Status::BadRequest,
            AppError::OtpMismatch => Status::BadRequest,
            AppError::BadCredentials => Status::Unauthorized,
            AppError::PasswordMismatch => Status::BadRequest,
            AppError::NotEnrolled => Status::Forbidden,
            AppError::AlreadyReviewed => Status::Conflict,
            AppError::NotificationFailed(_) => Status::BadGateway,
            AppError::ExternalService(_) => Status::ServiceUnavailable,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }

    /// Message safe to hand back to clients. Store and internal failures are
    /// reduced to a generic string.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
            AppError::NotificationFailed(_) => {
                "Password changed, but the confirmation email could not be sent".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn to_status_with_log(&self, context: &str) -> Status {
        self.log_and_record(context);
        self.status_code()
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        let status = self.to_status_with_log(&format!("Request to {} {}", req.method(), req.uri()));

        let data = match &self {
            AppError::NotificationFailed(_) => Some(json!({ "passwordChanged": true })),
            _ => None,
        };

        let body = ApiResponse {
            success: false,
            message: self.public_message(),
            data,
            error: Some(self.kind().to_string()),
        };

        Custom(status, Json(body)).respond_to(req)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Cryptography error: {}", error))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        AppError::Authentication(format!("Invalid session token: {}", error))
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(error: lettre::transport::smtp::Error) -> Self {
        AppError::ExternalService(format!("SMTP error: {}", error))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(error: lettre::error::Error) -> Self {
        AppError::Internal(format!("Email build error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("Serialization error: {}", error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.to_status_with_log("Error conversion into Status")
    }
}
