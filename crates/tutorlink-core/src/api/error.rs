use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The access token was rejected and could not be refreshed. The local
    /// session has been cleared; the wrapped error is the original failure.
    #[error("Session expired - sign in again")]
    SessionExpired(#[source] Box<ApiError>),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Credential storage error: {0:#}")]
    Storage(anyhow::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 => ApiError::BadRequest(truncated),
            401 => ApiError::Unauthorized(truncated),
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            409 => ApiError::Conflict(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            code => ApiError::Status {
                status: code,
                body: truncated,
            },
        }
    }

    /// The failure that started it all, looking through `SessionExpired`.
    pub fn original(&self) -> &ApiError {
        match self {
            ApiError::SessionExpired(inner) => inner.original(),
            other => other,
        }
    }

    /// HTTP status of the failure, if it came from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self.original() {
            ApiError::BadRequest(_) => Some(StatusCode::BAD_REQUEST),
            ApiError::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            ApiError::AccessDenied(_) => Some(StatusCode::FORBIDDEN),
            ApiError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            ApiError::Conflict(_) => Some(StatusCode::CONFLICT),
            ApiError::RateLimited => Some(StatusCode::TOO_MANY_REQUESTS),
            ApiError::Status { status, .. } => StatusCode::from_u16(*status).ok(),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }

    /// True for a 401, whether or not the session was cleared because of it.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.original(), ApiError::Unauthorized(_))
    }

    /// True when the caller must send the user back to sign-in.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(ApiError::from_status(StatusCode::BAD_REQUEST, "x"), ApiError::BadRequest(_)));
        assert!(matches!(ApiError::from_status(StatusCode::UNAUTHORIZED, ""), ApiError::Unauthorized(_)));
        assert!(matches!(ApiError::from_status(StatusCode::CONFLICT, ""), ApiError::Conflict(_)));
        assert!(matches!(ApiError::from_status(StatusCode::BAD_GATEWAY, ""), ApiError::ServerError(_)));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, "tea"),
            ApiError::Status { status: 418, .. }
        ));
    }

    #[test]
    fn test_truncate_body() {
        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
        assert_eq!(ApiError::truncate_body("short"), "short");
    }

    #[test]
    fn test_session_expired_exposes_original() {
        let err = ApiError::SessionExpired(Box::new(ApiError::Unauthorized("token expired".to_string())));
        assert!(err.is_session_expired());
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(matches!(err.original(), ApiError::Unauthorized(body) if body == "token expired"));
    }
}
