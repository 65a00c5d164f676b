//! Planning actions. Each one validates its arguments locally, issues exactly one REST call
//! and hands the outcome back to the caller; none of them touch the session view, which only
//! changes through realtime events.

use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use crate::{
    dao::{error::HttpResult, planning::PlanningStore},
    dto::{
        planning::{
            CreateSessionRequest, EstimateRequest, EstimateResponse, RevealResponse,
            SessionSnapshot, VoteRequest, VoteResponse,
        },
        scale::EstimationScale,
    },
    error::{ClientError, ClientResult},
    services::require_non_empty,
};

/// Stateless front for the planning write endpoints.
#[derive(Clone)]
pub struct ActionDispatcher {
    store: Arc<dyn PlanningStore>,
}

impl ActionDispatcher {
    pub fn new(store: Arc<dyn PlanningStore>) -> Self {
        Self { store }
    }

    /// Open a voting round for `story_id`. `None` picks the fibonacci scale.
    pub async fn create_session(
        &self,
        story_id: &str,
        scale: Option<EstimationScale>,
    ) -> ClientResult<SessionSnapshot> {
        let scale = scale.unwrap_or_default();
        if scale == EstimationScale::Unknown {
            return Err(ClientError::InvalidArgument(
                "cannot create a session with an unknown scale".into(),
            ));
        }
        let request = CreateSessionRequest {
            story_id: story_id.trim().to_string(),
            scale,
        };
        request.validate()?;

        let result = self.store.create_session(request).await;
        let session = outcome("create_session", story_id, result)?;
        info!(session_id = %session.id, scale = %session.scale, "planning session created");
        Ok(session)
    }

    pub async fn submit_vote(&self, session_id: &str, value: &str) -> ClientResult<VoteResponse> {
        require_non_empty("session id", session_id)?;
        let request = VoteRequest {
            value: value.to_string(),
        };
        request.validate()?;

        let result = self.store.submit_vote(session_id.to_string(), request).await;
        outcome("submit_vote", session_id, result)
    }

    pub async fn reveal(&self, session_id: &str) -> ClientResult<RevealResponse> {
        require_non_empty("session id", session_id)?;

        let result = self.store.reveal(session_id.to_string()).await;
        outcome("reveal", session_id, result)
    }

    /// Record the agreed estimate. Surrounding whitespace is trimmed before sending.
    pub async fn set_final_estimate(
        &self,
        session_id: &str,
        estimate: &str,
    ) -> ClientResult<EstimateResponse> {
        require_non_empty("session id", session_id)?;
        let request = EstimateRequest::new(estimate);
        request.validate()?;

        let result = self
            .store
            .set_estimate(session_id.to_string(), request)
            .await;
        outcome("set_final_estimate", session_id, result)
    }
}

fn outcome<T>(action: &'static str, target: &str, result: HttpResult<T>) -> ClientResult<T> {
    match result {
        Ok(value) => {
            info!(action, target, "planning action accepted");
            Ok(value)
        }
        Err(err) => {
            let err = ClientError::from(err);
            warn!(action, target, error = %err, "planning action failed");
            Err(err)
        }
    }
}
