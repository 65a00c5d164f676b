//! Process-wide bearer token holder with optional on-disk persistence.

use std::{
    fmt, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Roles allowed to reveal votes and record estimates on sessions they did not create.
const FACILITATOR_ROLES: [&str; 2] = ["product_owner", "scrum_master"];

/// Callback fired whenever the backend answers 401.
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

/// Values persisted between runs: the bearer token and an optional remembered username.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remembered_username: Option<String>,
}

/// Claims read from the (unverified) JWT payload segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// User identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Username.
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl TokenClaims {
    /// Decode the payload segment of `token`. Returns `None` for anything that is not a
    /// base64url JSON object.
    pub fn decode(token: &str) -> Option<Self> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Whether the role is one of the facilitator roles.
    pub fn is_facilitator(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| FACILITATOR_ROLES.contains(&role))
    }
}

/// Single owner of the bearer token used by REST calls and the realtime channel.
///
/// Every 401 goes through [`AuthContext::handle_unauthorized`], which drops the token
/// (in memory and on disk) and notifies the injected hook.
pub struct AuthContext {
    credentials: RwLock<Credentials>,
    path: Option<PathBuf>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl AuthContext {
    /// Context that keeps credentials in memory only.
    pub fn in_memory() -> Self {
        Self {
            credentials: RwLock::new(Credentials::default()),
            path: None,
            on_unauthorized: None,
        }
    }

    /// Load credentials from `path`, starting empty when the file is missing or unreadable.
    ///
    /// Later updates are written back to the same file.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let credentials = read_credentials(&path);
        Self {
            credentials: RwLock::new(credentials),
            path: Some(path),
            on_unauthorized: None,
        }
    }

    /// Register the callback fired after a 401 clears the token.
    pub fn with_unauthorized_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_unauthorized = Some(Arc::new(hook));
        self
    }

    /// Current bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    /// Store a fresh bearer token.
    pub fn set_token(&self, token: impl Into<String>) {
        self.update(|credentials| credentials.token = Some(token.into()));
    }

    /// Drop the bearer token. The remembered username is kept.
    pub fn clear(&self) {
        self.update(|credentials| credentials.token = None);
    }

    pub fn remembered_username(&self) -> Option<String> {
        self.read().remembered_username.clone()
    }

    /// Remember (or forget, with `None`) the username for the next login.
    pub fn remember_username(&self, username: Option<String>) {
        self.update(|credentials| credentials.remembered_username = username);
    }

    /// Claims of the current token.
    pub fn claims(&self) -> Option<TokenClaims> {
        self.token().as_deref().and_then(TokenClaims::decode)
    }

    /// Apply the global 401 policy: clear the token and notify the hook.
    pub fn handle_unauthorized(&self) {
        warn!("backend rejected credentials; clearing stored token");
        self.clear();
        if let Some(hook) = &self.on_unauthorized {
            hook();
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Credentials> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Credentials),
    {
        let snapshot = {
            let mut guard = self
                .credentials
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            mutate(&mut guard);
            guard.clone()
        };
        if let Some(path) = &self.path {
            write_credentials(path, &snapshot);
        }
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let credentials = self.read();
        f.debug_struct("AuthContext")
            .field("has_token", &credentials.token.is_some())
            .field("remembered_username", &credentials.remembered_username)
            .field("path", &self.path)
            .finish()
    }
}

fn read_credentials(path: &Path) -> Credentials {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<Credentials>(&contents) {
            Ok(credentials) => {
                info!(path = %path.display(), "loaded stored credentials");
                credentials
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to parse stored credentials; starting signed out"
                );
                Credentials::default()
            }
        },
        Err(err) if err.kind() == ErrorKind::NotFound => Credentials::default(),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "failed to read stored credentials; starting signed out"
            );
            Credentials::default()
        }
    }
}

fn write_credentials(path: &Path, credentials: &Credentials) {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if let Err(err) = fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %err, "failed to create credentials directory");
            return;
        }
    }
    let payload = match serde_json::to_string_pretty(credentials) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize credentials");
            return;
        }
    };
    if let Err(err) = fs::write(path, payload) {
        warn!(path = %path.display(), error = %err, "failed to persist credentials");
    }
}

#[cfg(test)]
pub(crate) fn fake_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}
