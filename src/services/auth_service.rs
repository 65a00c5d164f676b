use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use crate::{
    dao::{http::ApiClient, users::UserStore},
    dto::auth::{LoginForm, RegisterRequest, UserResponse},
    error::{ClientError, ClientResult},
    state::auth::{AuthContext, TokenClaims},
};

/// Role assigned when registration does not name one.
pub const DEFAULT_ROLE: &str = "developer";

/// Account operations bound to the shared [`AuthContext`].
#[derive(Clone)]
pub struct AuthService {
    users: UserStore,
    auth: Arc<AuthContext>,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        let auth = Arc::clone(api.auth());
        Self {
            users: UserStore::new(api),
            auth,
        }
    }

    /// Exchange credentials for a token and store it.
    ///
    /// With `remember`, the username is kept for the next login; otherwise any remembered
    /// one is forgotten. Returns the claims of the new token when it carries any.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember: bool,
    ) -> ClientResult<Option<TokenClaims>> {
        let form = LoginForm {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        form.validate()?;

        let token = match self.users.login(&form).await {
            Ok(token) => token,
            Err(err) => {
                let err = ClientError::from(err);
                warn!(username = %form.username, error = %err, "login failed");
                return Err(err);
            }
        };

        self.auth.set_token(token.access_token);
        self.auth
            .remember_username(remember.then(|| form.username.clone()));
        info!(username = %form.username, "logged in");
        Ok(self.auth.claims())
    }

    /// Create an account. `role` defaults to [`DEFAULT_ROLE`].
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: Option<&str>,
    ) -> ClientResult<UserResponse> {
        let request = RegisterRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
            role: role.unwrap_or(DEFAULT_ROLE).to_string(),
        };
        request.validate()?;

        let user = self.users.register(&request).await.map_err(|err| {
            let err = ClientError::from(err);
            warn!(username = %request.username, error = %err, "registration failed");
            err
        })?;
        info!(user_id = %user.id, role = %user.role, "account registered");
        Ok(user)
    }

    /// Username for the next login: `given` when it is not blank, else the remembered one.
    pub fn login_username(&self, given: Option<&str>) -> Option<String> {
        given
            .map(str::trim)
            .filter(|username| !username.is_empty())
            .map(str::to_string)
            .or_else(|| self.auth.remembered_username())
    }

    /// Forget the token; the remembered username survives.
    pub fn logout(&self) {
        self.auth.clear();
    }
}
