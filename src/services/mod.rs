use crate::error::{ClientError, ClientResult};

/// Login and registration against the account endpoints.
pub mod auth_service;
/// Realtime WebSocket channel for one session.
pub mod channel;
/// Planning actions (create, vote, reveal, estimate) sent over REST.
pub mod dispatcher;
/// One-shot session snapshot fetch.
pub mod snapshot;
/// Reducer fed by the realtime channel, published over a watch channel.
pub mod subscription;

/// Reject empty or whitespace-only identifiers before any request is made.
pub(crate) fn require_non_empty(what: &str, value: &str) -> ClientResult<()> {
    if value.trim().is_empty() {
        return Err(ClientError::InvalidArgument(format!(
            "{what} must not be empty"
        )));
    }
    Ok(())
}
