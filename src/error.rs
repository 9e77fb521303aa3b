//! # Error Handling
//!
//! This module defines the application's error types and how they're turned
//! into HTTP responses.
//!
//! ## Error Taxonomy:
//! - **BadRequest**: the client sent something we can't decode (400)
//! - **NotFound**: no such route (404)
//! - **ExternalToolFailure**: the transcription executable ran but left no
//!   transcript behind (500, with its exit code and output in the body)
//! - **Internal**: anything else that went wrong on our side (500)
//!
//! All bodies are plain text. Clients of this service are scripts that
//! print the body on failure, so the diagnostic is the body itself.

use crate::multipart::DecodeError;
use actix_web::http::{header::ContentType, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use std::fmt;
use tracing::{error, warn};

/// Custom error types for the application.
///
/// ## Usage Example:
/// ```rust,ignore
/// return Err(AppError::BadRequest("Expected multipart/form-data".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Client sent a body we can't work with
    BadRequest(String),

    /// Requested route doesn't exist
    NotFound(String),

    /// The transcription executable produced no artifact.
    ///
    /// `exit_code` is `None` only when no code could be determined at all;
    /// on Unix a signal-terminated process reports the negated signal number.
    ExternalToolFailure {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Filesystem failures, spawn failures, unreadable artifacts
    Internal(String),
}

impl AppError {
    /// Record the error server-side.
    ///
    /// Client errors are logged at `warn` since they aren't our fault;
    /// everything else is a server-side failure and goes to `error` with the
    /// full diagnostic.
    pub fn log(&self) {
        match self {
            AppError::BadRequest(_) | AppError::NotFound(_) => {
                warn!(status = %self.status_code().as_u16(), "{}", self);
            }
            _ => {
                error!(status = %self.status_code().as_u16(), "{}", self);
            }
        }
    }
}

/// Display doubles as the response body, so the wording here is what
/// clients see.
impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "{}", msg),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::ExternalToolFailure {
                exit_code,
                stdout,
                stderr,
            } => {
                let code = exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
                write!(
                    f,
                    "Transcription tool failed.\nReturn code: {}\nstdout: {}\nstderr: {}\n",
                    code, stdout, stderr
                )
            }
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

/// Converts our errors into HTTP responses.
///
/// ## HTTP Status Code Mapping:
/// - BadRequest → 400
/// - NotFound → 404
/// - ExternalToolFailure/Internal → 500
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ExternalToolFailure { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.to_string())
    }
}

/// Every decode failure is the client's problem.
impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let tool = AppError::ExternalToolFailure {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(tool.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_decode_errors_are_bad_requests() {
        let err: AppError = DecodeError::NoFileFound.into();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "No file found in request"));

        let err: AppError = DecodeError::NotMultipart.into();
        assert_eq!(err.to_string(), "Expected multipart/form-data");
    }

    #[test]
    fn test_tool_failure_report_embeds_output_verbatim() {
        let err = AppError::ExternalToolFailure {
            exit_code: Some(0),
            stdout: "loading model\n".to_string(),
            stderr: "no speech found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Transcription tool failed.\nReturn code: 0\nstdout: loading model\n\nstderr: no speech found\n"
        );
    }

    #[actix_web::test]
    async fn test_internal_error_response_carries_description() {
        let resp = AppError::Internal("failed to run whisper: not found".into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"Internal error: failed to run whisper: not found");
    }

    #[actix_web::test]
    async fn test_error_response_is_plain_text() {
        let resp = AppError::BadRequest("No file found in request".into()).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/plain; charset=utf-8"
        );

        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"No file found in request");
    }
}
