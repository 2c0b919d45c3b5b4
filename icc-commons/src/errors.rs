use actix_web::http;
use actix_web::HttpResponse;
use serde_json::json;

/// Errors surfaced by the HTTP status/metrics surface.
#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum SurfaceError {
    /// Failed to serialize a response body as JSON.
    #[error("failed to serialize JSON: {0}")]
    FailedJsonOut(String),
    /// The request did not carry a supported `Accept` header.
    #[error("invalid Content-Type requested")]
    InvalidContentType,
    /// One or more mandatory client parameters were missing.
    #[error("mandatory client parameters missing: {0:?}")]
    MissingParams(Vec<String>),
}

impl actix_web::error::ResponseError for SurfaceError {
    fn error_response(&self) -> HttpResponse {
        self.as_json_error()
    }

    fn status_code(&self) -> http::StatusCode {
        self.as_status_code()
    }
}

impl SurfaceError {
    /// Return the HTTP JSON error response.
    pub fn as_json_error(&self) -> HttpResponse {
        let code = self.as_status_code();
        let json_body = json!({
            "kind": self.as_kind(),
            "value": self.to_string(),
        });
        HttpResponse::build(code).json(json_body)
    }

    fn as_status_code(&self) -> http::StatusCode {
        match self {
            SurfaceError::FailedJsonOut(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
            SurfaceError::InvalidContentType => http::StatusCode::NOT_ACCEPTABLE,
            SurfaceError::MissingParams(_) => http::StatusCode::BAD_REQUEST,
        }
    }

    fn as_kind(&self) -> &'static str {
        match self {
            SurfaceError::FailedJsonOut(_) => "failed_json_out",
            SurfaceError::InvalidContentType => "invalid_content_type",
            SurfaceError::MissingParams(_) => "missing_params",
        }
    }
}
