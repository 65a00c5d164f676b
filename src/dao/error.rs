//! Error types shared by the REST data-access layer.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`HttpDaoError`] failures.
pub type HttpResult<T> = Result<T, HttpDaoError>;

/// Failures that can occur while talking to the planning backend.
#[derive(Debug, Error)]
pub enum HttpDaoError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The configured base URL cannot be parsed.
    #[error("invalid API base URL `{url}`")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The base URL cannot carry path segments (e.g. `mailto:`).
    #[error("API base URL `{url}` cannot be used as a base")]
    CannotBeBase { url: String },
    /// The request could not be sent.
    #[error("failed to send request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The backend rejected the bearer token.
    #[error("unauthorized request to `{path}`")]
    Unauthorized { path: String },
    /// The backend answered with a non-success status.
    #[error("unexpected response status {status} for `{path}`")]
    RequestStatus {
        path: String,
        status: StatusCode,
        /// `detail` field of the error body, when present.
        detail: Option<String>,
    },
    /// Response payload could not be parsed into the expected model.
    #[error("failed to decode response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}
