use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fop_core::error::FopError;

// ---------------------------------------------------------------------------
// Internal sentinels for explicit status codes
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 401 through the `anyhow::Error` chain.
#[derive(Debug)]
struct UnauthorizedError(String);

impl std::fmt::Display for UnauthorizedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UnauthorizedError {}

/// Carries an explicit HTTP 404 through the `anyhow::Error` chain.
#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(UnauthorizedError(msg.into()).into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }
}

fn fop_status(e: &FopError) -> StatusCode {
    match e {
        FopError::UnknownPlatform(_)
        | FopError::GroupNotFound(_)
        | FopError::AthleteNotInGroup(_) => StatusCode::NOT_FOUND,
        FopError::RuleViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FopError::NothingToOverride(_) | FopError::NoActiveGroup => StatusCode::CONFLICT,
        FopError::EngineClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
        FopError::InvalidConfig(_) | FopError::Io(_) | FopError::Yaml(_) | FopError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<UnauthorizedError>().is_some() {
            StatusCode::UNAUTHORIZED
        } else if self.0.downcast_ref::<NotFoundError>().is_some() {
            StatusCode::NOT_FOUND
        } else if let Some(e) = self.0.downcast_ref::<FopError>() {
            fop_status(e)
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
