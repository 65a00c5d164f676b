use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    dao::planning::PlanningStore,
    dto::planning::SessionSnapshot,
    error::{ClientError, ClientResult},
    services::require_non_empty,
};

/// Fetches the authoritative session state once per session id.
///
/// The snapshot is never patched by realtime events; fetch again to refresh it.
#[derive(Clone)]
pub struct SnapshotFetcher {
    store: Arc<dyn PlanningStore>,
}

impl SnapshotFetcher {
    pub fn new(store: Arc<dyn PlanningStore>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self, session_id: &str) -> ClientResult<SessionSnapshot> {
        require_non_empty("session id", session_id)?;

        match self.store.find_session(session_id.to_string()).await {
            Ok(session) => {
                debug!(
                    session_id,
                    status = ?session.status,
                    scale = %session.scale,
                    vote_count = session.vote_count,
                    "session snapshot fetched"
                );
                Ok(session)
            }
            Err(err) => {
                let err = ClientError::from(err);
                warn!(session_id, error = %err, "failed to fetch session snapshot");
                Err(err)
            }
        }
    }
}
