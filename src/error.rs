use reqwest::StatusCode;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::error::HttpDaoError;

/// Convenient result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced to callers of the session client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required argument was empty or malformed; nothing was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The backend rejected the credentials. The stored token has been cleared.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The backend refused the request.
    #[error("request rejected ({status}): {detail}")]
    Rejected {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Server `detail` message, or the canonical status reason.
        detail: String,
    },
    /// The realtime endpoint could not be derived from the API base URL.
    #[error("invalid realtime endpoint: {0}")]
    InvalidEndpoint(String),
    /// Backend unreachable or answered with an unreadable payload.
    #[error("backend unavailable")]
    Unavailable(#[source] HttpDaoError),
}

impl ClientError {
    /// Message suitable for a user-facing notice.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Rejected { detail, .. } => detail.clone(),
            ClientError::Unavailable(source) => source.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<HttpDaoError> for ClientError {
    fn from(err: HttpDaoError) -> Self {
        match err {
            HttpDaoError::Unauthorized { path } => {
                ClientError::Unauthorized(format!("token rejected for `{path}`"))
            }
            HttpDaoError::RequestStatus {
                path,
                status,
                detail,
            } => {
                let detail = detail.unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("`{path}` failed"))
                });
                match status {
                    StatusCode::UNAUTHORIZED => ClientError::Unauthorized(detail),
                    StatusCode::NOT_FOUND => ClientError::NotFound(detail),
                    status => ClientError::Rejected { status, detail },
                }
            }
            other => ClientError::Unavailable(other),
        }
    }
}

impl From<ValidationErrors> for ClientError {
    fn from(err: ValidationErrors) -> Self {
        ClientError::InvalidArgument(format!("validation failed: {}", err))
    }
}
