//! The backend gateway trait and its closed operation set.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// The closed set of remote operations the core issues.
///
/// Every call the session core makes is one of these; a transport
/// implementation routes each to its backend endpoint. The set is fixed by
/// the core's API surface: adding a variant is an API change, not a
/// configuration concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create a new account (email/password, or anonymous when no
    /// credentials are supplied).
    SignUp,
    /// Sign in with email and password.
    SignInPassword,
    /// Sign in anonymously.
    SignInAnonymous,
    /// Sign in with a third-party OAuth assertion.
    SignInOauth,
    /// Exchange a backend-minted custom token for a session.
    SignInCustomToken,
    /// Exchange a refresh token for a fresh ID token.
    RefreshToken,
    /// Attach an email/password credential to an existing account.
    LinkEmail,
    /// Attach a third-party OAuth credential to an existing account.
    LinkOauth,
    /// Detach a provider from an account.
    Unlink,
    /// Query the providers attached to an email.
    GetLinkedAccounts,
    /// Fetch the account profile for an ID token.
    GetUser,
    /// Dispatch a password-reset email.
    SendPasswordReset,
    /// Dispatch an address-verification email.
    SendEmailVerification,
    /// Update display name / photo URL.
    UpdateProfile,
    /// Change the account password.
    ChangePassword,
    /// Delete the account. Irreversible.
    DeleteUser,
    /// Send an SMS verification code to a phone number.
    SendPhoneCode,
    /// Confirm an SMS verification code.
    ConfirmPhoneCode,
}

impl Operation {
    /// Stable snake_case identifier, used for logging and diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SignUp => "sign_up",
            Operation::SignInPassword => "sign_in_password",
            Operation::SignInAnonymous => "sign_in_anonymous",
            Operation::SignInOauth => "sign_in_oauth",
            Operation::SignInCustomToken => "sign_in_custom_token",
            Operation::RefreshToken => "refresh_token",
            Operation::LinkEmail => "link_email",
            Operation::LinkOauth => "link_oauth",
            Operation::Unlink => "unlink",
            Operation::GetLinkedAccounts => "get_linked_accounts",
            Operation::GetUser => "get_user",
            Operation::SendPasswordReset => "send_password_reset",
            Operation::SendEmailVerification => "send_email_verification",
            Operation::UpdateProfile => "update_profile",
            Operation::ChangePassword => "change_password",
            Operation::DeleteUser => "delete_user",
            Operation::SendPhoneCode => "send_phone_code",
            Operation::ConfirmPhoneCode => "confirm_phone_code",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstract RPC capability over the identity backend.
///
/// The payload and result are opaque JSON at this boundary; the core's wire
/// mapping layer owns their shape. Implementations must perform exactly one
/// network exchange per call and must honor the cancellation token.
///
/// # Example
///
/// ```ignore
/// use gateway_traits::{BackendGateway, Operation};
/// use tokio_util::sync::CancellationToken;
///
/// async fn lookup(gateway: &dyn BackendGateway, id_token: &str) -> gateway_traits::Result<serde_json::Value> {
///     let payload = serde_json::json!({ "idToken": id_token });
///     gateway.invoke(Operation::GetUser, payload, &CancellationToken::new()).await
/// }
/// ```
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Execute one remote operation.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Transport`](crate::GatewayError::Transport) if the
    ///   exchange never completed
    /// - [`GatewayError::Rejection`](crate::GatewayError::Rejection) if the
    ///   backend refused the operation
    /// - [`GatewayError::Cancelled`](crate::GatewayError::Cancelled) if the
    ///   token fired first
    async fn invoke(
        &self,
        op: Operation,
        payload: Value,
        cancel: &CancellationToken,
    ) -> Result<Value>;
}
