use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use crate::state::auth::AuthContext;

use super::error::{HttpDaoError, HttpResult};

/// Error payload returned by the backend (`{"detail": ...}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        match self.detail? {
            serde_json::Value::String(message) => Some(message),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Thin REST client bound to one API base URL and the shared [`AuthContext`].
///
/// Authenticated calls carry the bearer token and apply the 401 policy; anonymous
/// calls (login, register) do neither.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<Url>,
    auth: Arc<AuthContext>,
}

impl ApiClient {
    /// Build a client for `base_url`.
    pub fn new(base_url: &str, auth: Arc<AuthContext>) -> HttpResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| HttpDaoError::ClientBuilder { source })?;

        let trimmed = base_url.trim_end_matches('/');
        let url = Url::parse(trimmed).map_err(|source| HttpDaoError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        if url.cannot_be_a_base() {
            return Err(HttpDaoError::CannotBeBase {
                url: base_url.to_string(),
            });
        }

        Ok(Self {
            client,
            base_url: Arc::new(url),
            auth,
        })
    }

    /// Shared auth context used for bearer tokens.
    pub fn auth(&self) -> &Arc<AuthContext> {
        &self.auth
    }

    /// Append `segments` (percent-encoded) to the base URL path.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = Url::clone(&self.base_url);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub(crate) async fn get<T>(&self, segments: &[&str]) -> HttpResult<T>
    where
        T: DeserializeOwned,
    {
        self.send(Method::GET, segments, |builder| builder).await
    }

    pub(crate) async fn send_json<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> HttpResult<T>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        self.send(method, segments, |builder| builder.json(body))
            .await
    }

    pub(crate) async fn post_empty<T>(&self, segments: &[&str]) -> HttpResult<T>
    where
        T: DeserializeOwned,
    {
        self.send(Method::POST, segments, |builder| builder).await
    }

    pub(crate) async fn post_form_anonymous<F, T>(
        &self,
        segments: &[&str],
        form: &F,
    ) -> HttpResult<T>
    where
        F: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments);
        let path = url.path().to_string();
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|source| HttpDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;
        self.decode(response, path, false).await
    }

    pub(crate) async fn post_json_anonymous<B, T>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> HttpResult<T>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments);
        let path = url.path().to_string();
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| HttpDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;
        self.decode(response, path, false).await
    }

    async fn send<T, F>(&self, method: Method, segments: &[&str], prepare: F) -> HttpResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = self.endpoint(segments);
        let path = url.path().to_string();
        let mut builder = self.client.request(method, url);
        if let Some(token) = self.auth.token() {
            builder = builder.bearer_auth(token);
        }

        let response =
            prepare(builder)
                .send()
                .await
                .map_err(|source| HttpDaoError::RequestSend {
                    path: path.clone(),
                    source,
                })?;
        self.decode(response, path, true).await
    }

    async fn decode<T>(
        &self,
        response: Response,
        path: String,
        authenticated: bool,
    ) -> HttpResult<T>
    where
        T: DeserializeOwned,
    {
        match response.status() {
            StatusCode::UNAUTHORIZED if authenticated => {
                self.auth.handle_unauthorized();
                Err(HttpDaoError::Unauthorized { path })
            }
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|source| HttpDaoError::DecodeResponse { path, source }),
            status => {
                let detail = response
                    .json::<ErrorBody>()
                    .await
                    .ok()
                    .and_then(ErrorBody::into_message);
                Err(HttpDaoError::RequestStatus {
                    path,
                    status,
                    detail,
                })
            }
        }
    }
}
