//! Auth backend client for login, registration and token validation.
//!
//! All calls go through the gateway's `/api/auth` route.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthOperation, Result};
use crate::ClientConfig;

/// Request payload for username/password login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Request payload for registration.
///
/// Fields the auth backend accepts beyond the required three can be passed
/// through `extra`; they are flattened into the JSON body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    /// Desired username.
    pub username: String,
    /// Contact email.
    pub email: String,
    /// Desired password.
    pub password: String,
    /// Additional backend-specific fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A token issued by a successful login or registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Opaque bearer token.
    pub token: String,
    /// Username reported by the backend, if any.
    pub username: Option<String>,
}

/// Raw success body. The backend has shipped both `{token, user: {username}}`
/// and a flat `{token, username, ...}`.
#[derive(Debug, Deserialize)]
struct RawAuthResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    username: Option<String>,
}

/// Error payload from the auth backend.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
}

/// The shapes the validate route is known to answer with.
///
/// A `valid` key decides the answer whenever it is present; `success` is
/// only consulted without one. A present key holding anything but a boolean,
/// or any other shape, lands in `Unrecognized` and is treated as invalid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum ValidateResponse {
    /// A bare JSON boolean.
    Bare(bool),
    /// `{"valid": bool}`
    Valid {
        /// Validity flag.
        valid: bool,
    },
    /// `{"success": bool}`
    Success {
        /// Validity flag.
        success: bool,
    },
    /// Any other JSON value.
    Unrecognized(serde_json::Value),
}

impl From<serde_json::Value> for ValidateResponse {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match &value {
            Value::Bool(valid) => Self::Bare(*valid),
            Value::Object(object) => match (object.get("valid"), object.get("success")) {
                (Some(Value::Bool(valid)), _) => Self::Valid { valid: *valid },
                (None, Some(Value::Bool(success))) => Self::Success { success: *success },
                _ => Self::Unrecognized(value.clone()),
            },
            _ => Self::Unrecognized(value.clone()),
        }
    }
}

impl ValidateResponse {
    /// Whether this response says the token is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Bare(valid) | Self::Valid { valid } | Self::Success { success: valid } => *valid,
            Self::Unrecognized(value) => {
                tracing::warn!(response = %value, "Unrecognized validate response, treating as invalid");
                false
            }
        }
    }
}

/// Operations the session manager needs from the auth backend.
///
/// This trait abstracts the HTTP client so the manager can be driven by
/// any backend implementation.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the credentials or cannot
    /// be reached.
    async fn login(&self, req: &LoginRequest) -> Result<IssuedToken>;

    /// Create an account and receive a token for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the registration or cannot
    /// be reached.
    async fn register(&self, req: &RegisterRequest) -> Result<IssuedToken>;

    /// Ask the backend whether a token is still valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or answers with a
    /// non-success status.
    async fn validate(&self, token: &str) -> Result<ValidateResponse>;
}

/// Client for the auth backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    config: ClientConfig,
    client: reqwest::Client,
}

impl HttpAuthBackend {
    /// Create a new auth client with the given configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a new auth client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { config, client }
    }

    async fn post_credentials<T: Serialize + Sync>(
        &self,
        operation: AuthOperation,
        path: &str,
        body: &T,
    ) -> Result<IssuedToken> {
        let url = self.config.auth_url(path);
        tracing::debug!(url = %url, %operation, "Calling auth backend");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| AuthError::Unreachable { operation, source })?;

        let response = check_status(operation, response).await?;

        let raw: RawAuthResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::InvalidResponse {
                    operation,
                    detail: e.to_string(),
                })?;

        let token = raw
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse {
                operation,
                detail: "response carried no token".to_string(),
            })?;

        let username = raw.user.and_then(|u| u.username).or(raw.username);

        Ok(IssuedToken { token, username })
    }
}

/// Turn a non-success response into `AuthError::Rejected`.
async fn check_status(
    operation: AuthOperation,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorPayload>()
        .await
        .ok()
        .and_then(|p| p.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| operation.generic_failure().to_string());

    tracing::debug!(%operation, status = %status, message = %message, "Auth backend rejected request");

    Err(AuthError::Rejected {
        operation,
        status,
        message,
    })
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn login(&self, req: &LoginRequest) -> Result<IssuedToken> {
        self.post_credentials(AuthOperation::Login, "/login", req)
            .await
    }

    async fn register(&self, req: &RegisterRequest) -> Result<IssuedToken> {
        self.post_credentials(AuthOperation::Register, "/register", req)
            .await
    }

    async fn validate(&self, token: &str) -> Result<ValidateResponse> {
        let operation = AuthOperation::Validate;
        let url = self.config.auth_url("/validate");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|source| AuthError::Unreachable { operation, source })?;

        let response = check_status(operation, response).await?;

        response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse {
                operation,
                detail: e.to_string(),
            })
    }
}

/// Check a token against the backend, answering `false` on any doubt.
///
/// `None` and empty tokens are rejected without a network call.
pub async fn verify_token<B: AuthBackend + ?Sized>(backend: &B, token: Option<&str>) -> bool {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return false;
    };

    match backend.validate(token).await {
        Ok(response) => response.is_valid(),
        Err(e) => {
            tracing::warn!(error = %e, "Token validation error");
            false
        }
    }
}
