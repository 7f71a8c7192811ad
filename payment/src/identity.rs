//! Client for the external identity service.
//!
//! The identity service owns users and roles. This service only asks it who a bearer
//! token belongs to and looks up other users by id.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sp_payment_common::{PaymentError, RequestPrincipal, Result, Role};

/// A user as known to the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    pub role_id: i64,
}

impl UserProfile {
    /// Create a new profile.
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            role_id: role.id(),
        }
    }

    /// Decoded role, `None` for unknown ids.
    pub fn role(&self) -> Option<Role> {
        Role::from_id(self.role_id)
    }
}

/// Operations this service needs from the identity service.
#[async_trait::async_trait]
pub trait IdentityClient: Send + Sync {
    /// Resolve a bearer token to the principal of a request.
    async fn authenticate(&self, token: &str) -> Result<RequestPrincipal>;

    /// The caller's own user.
    async fn find_me(&self, principal: &RequestPrincipal) -> Result<UserProfile>;

    /// Another user, looked up with the caller's token.
    async fn find_user(&self, principal: &RequestPrincipal, user_id: &str) -> Result<UserProfile>;
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    error: Option<ApiError>,
}

/// Map an identity-service response to a profile.
fn decode_profile(status: StatusCode, body: &[u8]) -> Result<UserProfile> {
    let envelope: Option<Envelope<UserProfile>> = serde_json::from_slice(body).ok();

    if !status.is_success() {
        let error = envelope.and_then(|e| e.error).unwrap_or_default();
        info!(status = %status, code = error.code, msg = %error.msg, "Identity service refused");
        return Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PaymentError::NoAccess,
            StatusCode::NOT_FOUND => PaymentError::NotFound,
            _ => PaymentError::Transport(format!("identity service returned {}", status)),
        });
    }

    envelope
        .and_then(|e| e.data)
        .ok_or_else(|| PaymentError::Transport("identity service sent no user".to_string()))
}

/// [`IdentityClient`] over HTTP.
pub struct HttpIdentityClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    /// Create a new client for `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn get_profile(&self, path: &str, token: &str) -> Result<UserProfile> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Identity service unreachable");
                PaymentError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        debug!(url = %url, status = %status, "Identity service responded");
        decode_profile(status, &body)
    }
}

#[async_trait::async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn authenticate(&self, token: &str) -> Result<RequestPrincipal> {
        if token.is_empty() {
            return Err(PaymentError::NoAccess);
        }
        let me = self.get_profile("/accounts/me", token).await?;
        Ok(RequestPrincipal::new(me.role_id, me.user_id, token))
    }

    async fn find_me(&self, principal: &RequestPrincipal) -> Result<UserProfile> {
        self.get_profile("/accounts/me", &principal.token).await
    }

    async fn find_user(&self, principal: &RequestPrincipal, user_id: &str) -> Result<UserProfile> {
        self.get_profile(&format!("/accounts/{}", user_id), &principal.token)
            .await
    }
}

/// In-process [`IdentityClient`] backed by a fixed user table. Tokens are user ids.
#[derive(Default)]
pub struct StaticIdentityClient {
    users: RwLock<HashMap<String, UserProfile>>,
}

impl StaticIdentityClient {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user.
    pub fn insert(&self, user: UserProfile) {
        self.users.write().insert(user.user_id.clone(), user);
    }

    fn lookup(&self, user_id: &str) -> Option<UserProfile> {
        self.users.read().get(user_id).cloned()
    }
}

#[async_trait::async_trait]
impl IdentityClient for StaticIdentityClient {
    async fn authenticate(&self, token: &str) -> Result<RequestPrincipal> {
        let me = self.lookup(token).ok_or(PaymentError::NoAccess)?;
        Ok(RequestPrincipal::new(me.role_id, me.user_id, token))
    }

    async fn find_me(&self, principal: &RequestPrincipal) -> Result<UserProfile> {
        self.lookup(&principal.user_id).ok_or(PaymentError::NoAccess)
    }

    async fn find_user(&self, _principal: &RequestPrincipal, user_id: &str) -> Result<UserProfile> {
        self.lookup(user_id).ok_or(PaymentError::NotFound)
    }
}
