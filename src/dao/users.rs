use crate::dto::auth::{LoginForm, RegisterRequest, TokenResponse, UserResponse};

use super::{error::HttpResult, http::ApiClient};

/// Account endpoints. Both calls are anonymous: no bearer token, no 401 policy.
#[derive(Clone)]
pub struct UserStore {
    api: ApiClient,
}

impl UserStore {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Exchange credentials for a bearer token (form-encoded).
    pub async fn login(&self, form: &LoginForm) -> HttpResult<TokenResponse> {
        self.api.post_form_anonymous(&["users", "login"], form).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> HttpResult<UserResponse> {
        self.api
            .post_json_anonymous(&["users", "register"], request)
            .await
    }
}
