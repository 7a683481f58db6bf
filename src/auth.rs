// Identity client: trades tenant/user/password for a token with a single
// POST. Any failure along the way (transport, status, body shape) is
// logged and reported to the caller as "no token".

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::{Result, TransferError};

pub const TRACING_TARGET: &str = "tcstore_cli::auth";

/// Session credentials. Never serialized; the password only leaves the
/// process inside the token request body.
#[derive(Clone)]
pub struct Credentials {
    pub tenant_name: String,
    pub user_name: String,
    password: String,
}

impl Credentials {
    pub fn new(
        tenant_name: impl Into<String>,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Credentials {
            tenant_name: tenant_name.into(),
            user_name: user_name.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_name", &self.tenant_name)
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque bearer token sent as `X-Auth-Token`. Expiry is decided by the
/// server and not tracked here.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        AuthToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Anything that can produce a token from credentials.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// `None` means authentication failed for whatever reason; the caller
    /// must abort its workflow.
    async fn request_token(&self, credentials: &Credentials) -> Option<AuthToken>;
}

/// Body of `POST /identity/v2.0/tokens`.
#[derive(Serialize, Debug)]
pub(crate) struct CreateTokenRequest<'a> {
    pub auth: Authentication<'a>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Authentication<'a> {
    pub tenant_name: &'a str,
    pub password_credentials: PasswordCredentials<'a>,
}

#[derive(Serialize, Debug)]
pub(crate) struct PasswordCredentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl<'a> CreateTokenRequest<'a> {
    pub(crate) fn from_credentials(credentials: &'a Credentials) -> Self {
        CreateTokenRequest {
            auth: Authentication {
                tenant_name: &credentials.tenant_name,
                password_credentials: PasswordCredentials {
                    username: &credentials.user_name,
                    password: credentials.password(),
                },
            },
        }
    }
}

/// Only `access.token.id` matters; every level is optional so a partial
/// or error body still decodes and is then rejected for the missing id.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct CreateTokenResponse {
    pub access: Option<Access>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct Access {
    pub token: Option<TokenInfo>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct TokenInfo {
    pub id: Option<String>,
}

impl CreateTokenResponse {
    pub(crate) fn into_token(self) -> Option<AuthToken> {
        self.access
            .and_then(|a| a.token)
            .and_then(|t| t.id)
            .filter(|id| !id.is_empty())
            .map(AuthToken)
    }
}

/// HTTP client for the identity endpoint.
#[derive(Clone, Debug)]
pub struct AuthClient {
    http: Client,
    endpoint: Url,
}

impl AuthClient {
    pub fn new(http: Client, endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| TransferError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        Ok(AuthClient { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn try_request_token(&self, credentials: &Credentials) -> Result<AuthToken> {
        let body = CreateTokenRequest::from_credentials(credentials);
        let res = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        let parsed: CreateTokenResponse = res.json().await?;
        match parsed.into_token() {
            Some(token) => Ok(token),
            None => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    %status,
                    "Token response had no access.token.id"
                );
                Err(TransferError::Authentication)
            }
        }
    }
}

#[async_trait]
impl TokenSource for AuthClient {
    async fn request_token(&self, credentials: &Credentials) -> Option<AuthToken> {
        match self.try_request_token(credentials).await {
            Ok(token) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    tenant = %credentials.tenant_name,
                    "Token issued"
                );
                Some(token)
            }
            Err(e) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    tenant = %credentials.tenant_name,
                    error = %e,
                    "Token request failed"
                );
                None
            }
        }
    }
}
