//! Reqwest-backed gateway implementation.

use async_trait::async_trait;
use gateway_traits::{BackendGateway, GatewayError, Operation, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Connection settings for the REST gateway.
///
/// The defaults point at the production identity endpoints; tests and
/// emulators override the URLs wholesale.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Project API key, appended to every request as the `key` query
    /// parameter.
    pub api_key: String,
    /// Base URL of the identity endpoints, without a trailing action.
    pub identity_url: String,
    /// URL of the refresh (secure-token) endpoint.
    pub token_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts";
pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Read the API key from `IDENTITY_API_KEY`, with optional endpoint
    /// overrides from `IDENTITY_ENDPOINT` and `IDENTITY_TOKEN_ENDPOINT`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("IDENTITY_API_KEY")
            .map_err(|_| GatewayError::Transport("IDENTITY_API_KEY is not set".to_string()))?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("IDENTITY_ENDPOINT") {
            config.identity_url = url;
        }
        if let Ok(url) = std::env::var("IDENTITY_TOKEN_ENDPOINT") {
            config.token_url = url;
        }
        Ok(config)
    }
}

/// [`BackendGateway`] over HTTPS.
///
/// Stateless besides the connection pool; a single instance serves any
/// number of concurrent operations.
pub struct RestBackendGateway {
    client: Client,
    config: GatewayConfig,
}

impl RestBackendGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("identity-session-core/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }

    /// Use a caller-configured reqwest client instead of the default pool.
    pub fn with_client(client: Client, config: GatewayConfig) -> Self {
        Self { client, config }
    }

    fn route(&self, op: Operation) -> Result<Url> {
        let raw = match op {
            Operation::RefreshToken => self.config.token_url.clone(),
            _ => format!("{}:{}", self.config.identity_url, endpoint_action(op)),
        };
        let mut url = Url::parse(&raw)
            .map_err(|e| GatewayError::Transport(format!("invalid endpoint URL {raw:?}: {e}")))?;
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        Ok(url)
    }

    async fn execute(&self, op: Operation, payload: Value) -> Result<Value> {
        let url = self.route(op)?;
        debug!(op = %op, "dispatching backend request");

        // The token endpoint takes its body form-encoded; every identity
        // endpoint takes JSON.
        let request = if op == Operation::RefreshToken {
            let form = serde_urlencoded::to_string(&payload).map_err(|e| {
                GatewayError::Transport(format!("failed to form-encode payload: {e}"))
            })?;
            self.client
                .post(url)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(form)
        } else {
            self.client.post(url).json(&payload)
        };

        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(format!("failed to read response body: {e}")))?;

        if (200..300).contains(&status) {
            if body.trim().is_empty() {
                return Ok(Value::Object(Default::default()));
            }
            return serde_json::from_str(&body).map_err(|e| {
                GatewayError::Transport(format!("backend returned unparseable body: {e}"))
            });
        }

        warn!(op = %op, status, "backend request failed");
        Err(classify_failure(status, &body))
    }
}

fn endpoint_action(op: Operation) -> &'static str {
    match op {
        Operation::SignUp | Operation::SignInAnonymous => "signUp",
        Operation::SignInPassword => "signInWithPassword",
        Operation::SignInOauth | Operation::LinkOauth => "signInWithIdp",
        Operation::SignInCustomToken => "signInWithCustomToken",
        Operation::LinkEmail
        | Operation::Unlink
        | Operation::UpdateProfile
        | Operation::ChangePassword => "update",
        Operation::GetLinkedAccounts => "createAuthUri",
        Operation::GetUser => "lookup",
        Operation::SendPasswordReset | Operation::SendEmailVerification => "sendOobCode",
        Operation::DeleteUser => "delete",
        Operation::SendPhoneCode => "sendVerificationCode",
        Operation::ConfirmPhoneCode => "signInWithPhoneNumber",
        // Routed to the token endpoint, never through here.
        Operation::RefreshToken => "token",
    }
}

fn map_send_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Transport("request timed out".to_string())
    } else if err.is_connect() {
        GatewayError::Transport(format!("connection failed: {err}"))
    } else {
        GatewayError::Transport(err.to_string())
    }
}

/// Translate a non-2xx response into the gateway taxonomy.
///
/// The backend's rejection envelope is `{"error": {"message": "CODE"}}`,
/// where the message sometimes carries trailing detail after the code.
/// The full message is passed through verbatim; classifying the code head
/// is the caller's business.
fn classify_failure(status: u16, body: &str) -> GatewayError {
    let envelope: Option<Value> = serde_json::from_str(body).ok();
    let code = envelope
        .as_ref()
        .and_then(|v| v["error"]["message"].as_str())
        .map(str::to_string);

    match code {
        Some(code) => GatewayError::Rejection {
            code,
            message: format!("backend returned HTTP {status}"),
        },
        None if status >= 500 => {
            GatewayError::Transport(format!("backend returned HTTP {status}"))
        }
        None => GatewayError::Rejection {
            code: "UNKNOWN".to_string(),
            message: format!("backend returned HTTP {status} without a rejection envelope"),
        },
    }
}

#[async_trait]
impl BackendGateway for RestBackendGateway {
    async fn invoke(
        &self,
        op: Operation,
        payload: Value,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            result = self.execute(op, payload) => result,
        }
    }
}
