use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// RepoError
///
/// Failures raised by the persistence layer. Unique-constraint violations are
/// surfaced as `Conflict` so handlers can answer 409 instead of 500.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl RepoError {
    /// Maps a sqlx error, turning unique violations into `Conflict` with `message`.
    pub fn from_sqlx(err: sqlx::Error, message: &str) -> Self {
        let unique_violation =
            matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
        if unique_violation {
            RepoError::Conflict(message.to_string())
        } else {
            RepoError::Database(err)
        }
    }
}

/// AuthError
///
/// Raised only when the session collaborators cannot answer. A missing or
/// invalid session is not an error: resolvers return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth provider unavailable: {0}")]
    Provider(String),
    #[error(transparent)]
    Storage(#[from] RepoError),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Provider(err.to_string())
    }
}

/// AppError
///
/// The error type returned by handlers. Collaborator failures are logged and
/// masked behind a generic message; client mistakes are echoed back.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Repo(RepoError::Conflict(_)) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Auth(AuthError::Provider(_)) => StatusCode::BAD_GATEWAY,
            AppError::Auth(_) | AppError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Service temporarily unavailable".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
