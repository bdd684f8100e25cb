//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use thiserror::Error as ThisError;

use crate::auth::AuthError;
use crate::projects::ValidationError;

// Errors

#[derive(ThisError, Debug)]
#[error("Not found: {0}")]
pub struct NotFound(pub String);

pub struct ApiError(anyhow::Error);

impl ApiError {
    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<ValidationError>().is_some() {
            StatusCode::BAD_REQUEST
        } else if matches!(
            self.0.downcast_ref::<AuthError>(),
            Some(AuthError::InvalidCredentials)
        ) {
            StatusCode::UNAUTHORIZED
        } else if self.0.downcast_ref::<NotFound>().is_some() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Convert `ApiError` into an Axum compatible response. Errors the
/// client caused are reported as is, anything else is a 500.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self.0);
            return (status, format!("Something went wrong: {}", self.0)).into_response();
        }
        tracing::debug!("Rejected request: {}", self.0);
        (status, self.0.to_string()).into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Re-export public types from each route

pub mod auth {
    pub use crate::api::routes::auth::public::*;
}

pub mod projects {
    pub use crate::api::routes::projects::public::*;
}
