use futures::future::BoxFuture;
use reqwest::Method;

use crate::dto::planning::{
    CreateSessionRequest, EstimateRequest, EstimateResponse, RevealResponse, SessionSnapshot,
    VoteRequest, VoteResponse,
};

use super::{error::HttpResult, http::ApiClient};

/// Abstraction over the planning-session REST endpoints.
pub trait PlanningStore: Send + Sync {
    fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> BoxFuture<'static, HttpResult<SessionSnapshot>>;
    fn find_session(&self, session_id: String) -> BoxFuture<'static, HttpResult<SessionSnapshot>>;
    fn submit_vote(
        &self,
        session_id: String,
        request: VoteRequest,
    ) -> BoxFuture<'static, HttpResult<VoteResponse>>;
    fn reveal(&self, session_id: String) -> BoxFuture<'static, HttpResult<RevealResponse>>;
    fn set_estimate(
        &self,
        session_id: String,
        request: EstimateRequest,
    ) -> BoxFuture<'static, HttpResult<EstimateResponse>>;
}

/// [`PlanningStore`] backed by the REST API.
#[derive(Clone)]
pub struct HttpPlanningStore {
    api: ApiClient,
}

impl HttpPlanningStore {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl PlanningStore for HttpPlanningStore {
    fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> BoxFuture<'static, HttpResult<SessionSnapshot>> {
        let api = self.api.clone();
        Box::pin(async move {
            api.send_json(Method::POST, &["planning", "sessions"], &request)
                .await
        })
    }

    fn find_session(&self, session_id: String) -> BoxFuture<'static, HttpResult<SessionSnapshot>> {
        let api = self.api.clone();
        Box::pin(async move { api.get(&["planning", "sessions", session_id.as_str()]).await })
    }

    fn submit_vote(
        &self,
        session_id: String,
        request: VoteRequest,
    ) -> BoxFuture<'static, HttpResult<VoteResponse>> {
        let api = self.api.clone();
        Box::pin(async move {
            api.send_json(
                Method::POST,
                &["planning", "sessions", session_id.as_str(), "vote"],
                &request,
            )
            .await
        })
    }

    fn reveal(&self, session_id: String) -> BoxFuture<'static, HttpResult<RevealResponse>> {
        let api = self.api.clone();
        Box::pin(async move {
            api.post_empty(&["planning", "sessions", session_id.as_str(), "reveal"])
                .await
        })
    }

    fn set_estimate(
        &self,
        session_id: String,
        request: EstimateRequest,
    ) -> BoxFuture<'static, HttpResult<EstimateResponse>> {
        let api = self.api.clone();
        Box::pin(async move {
            api.send_json(
                Method::PUT,
                &["planning", "sessions", session_id.as_str(), "estimate"],
                &request,
            )
            .await
        })
    }
}
