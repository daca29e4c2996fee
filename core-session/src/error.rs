//! Error taxonomy for the session core.
//!
//! Three failure families cross the public API:
//!
//! - [`AuthError::InvalidArgument`]: a local precondition failed; no
//!   network call was made.
//! - [`AuthError::Transport`] / [`AuthError::Cancelled`]: the exchange did
//!   not complete; remote state is unknown.
//! - [`AuthError::Rejected`]: the backend refused the operation, with its
//!   code classified into [`RejectionCode`] so callers can branch on it.
//!
//! Rejection codes are never collapsed into a generic failure: "refresh
//! token expired, re-authenticate" and "wrong password, prompt again"
//! demand different caller reactions.

use gateway_traits::GatewayError;
use thiserror::Error;

/// Classified backend rejection codes.
///
/// Each variant corresponds to one or more stable code strings the backend
/// emits; codes the core does not recognize are preserved verbatim in
/// [`RejectionCode::Unrecognized`] rather than discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionCode {
    /// The email is already registered (`EMAIL_EXISTS`).
    EmailExists,
    /// No account exists for the email (`EMAIL_NOT_FOUND`).
    EmailNotFound,
    /// Wrong password for the account (`INVALID_PASSWORD`).
    InvalidPassword,
    /// Password does not meet backend policy (`WEAK_PASSWORD`).
    WeakPassword,
    /// The account has been disabled by an administrator (`USER_DISABLED`).
    UserDisabled,
    /// The account no longer exists (`USER_NOT_FOUND`).
    UserNotFound,
    /// The presented ID token is invalid (`INVALID_ID_TOKEN`).
    InvalidIdToken,
    /// The credential is too old for a sensitive operation
    /// (`CREDENTIAL_TOO_OLD_LOGIN_AGAIN`).
    CredentialTooOld,
    /// The ID token has expired (`TOKEN_EXPIRED`).
    TokenExpired,
    /// The refresh token is invalid or revoked (`INVALID_REFRESH_TOKEN`).
    InvalidRefreshToken,
    /// The provider credential is already attached to an account
    /// (`FEDERATED_USER_ID_ALREADY_LINKED`, `CREDENTIAL_ALREADY_IN_USE`).
    ProviderAlreadyLinked,
    /// Unlinking would leave the account unreachable (`LAST_PROVIDER`).
    LastProvider,
    /// The sign-in method is disabled for this project
    /// (`OPERATION_NOT_ALLOWED`).
    OperationNotAllowed,
    /// The SMS code did not match (`INVALID_CODE`).
    InvalidVerificationCode,
    /// The phone verification session is invalid, expired or already
    /// consumed (`INVALID_SESSION_INFO`, `SESSION_EXPIRED`).
    InvalidSessionInfo,
    /// The anti-abuse token was rejected (`CAPTCHA_CHECK_FAILED`).
    InvalidRecaptcha,
    /// The backend is throttling this client (`TOO_MANY_ATTEMPTS_TRY_LATER`).
    TooManyAttempts,
    /// A code the core does not recognize, preserved verbatim.
    Unrecognized(String),
}

impl RejectionCode {
    /// Classify a raw backend code string.
    ///
    /// The backend may append detail after the code itself
    /// (`"WEAK_PASSWORD : Password should be at least 6 characters"`);
    /// classification keys on the leading token only.
    pub fn classify(raw: &str) -> Self {
        let head = raw
            .split([':', ' '])
            .next()
            .unwrap_or(raw)
            .trim();
        match head {
            "EMAIL_EXISTS" => RejectionCode::EmailExists,
            "EMAIL_NOT_FOUND" => RejectionCode::EmailNotFound,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => RejectionCode::InvalidPassword,
            "WEAK_PASSWORD" => RejectionCode::WeakPassword,
            "USER_DISABLED" => RejectionCode::UserDisabled,
            "USER_NOT_FOUND" => RejectionCode::UserNotFound,
            "INVALID_ID_TOKEN" => RejectionCode::InvalidIdToken,
            "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => RejectionCode::CredentialTooOld,
            "TOKEN_EXPIRED" => RejectionCode::TokenExpired,
            "INVALID_REFRESH_TOKEN" => RejectionCode::InvalidRefreshToken,
            "FEDERATED_USER_ID_ALREADY_LINKED" | "CREDENTIAL_ALREADY_IN_USE" => {
                RejectionCode::ProviderAlreadyLinked
            }
            "LAST_PROVIDER" => RejectionCode::LastProvider,
            "OPERATION_NOT_ALLOWED" => RejectionCode::OperationNotAllowed,
            "INVALID_CODE" => RejectionCode::InvalidVerificationCode,
            "INVALID_SESSION_INFO" | "SESSION_EXPIRED" => RejectionCode::InvalidSessionInfo,
            "CAPTCHA_CHECK_FAILED" => RejectionCode::InvalidRecaptcha,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => RejectionCode::TooManyAttempts,
            _ => RejectionCode::Unrecognized(raw.to_string()),
        }
    }

    /// Whether this rejection means the current session is no longer usable
    /// and the user must authenticate again.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            RejectionCode::InvalidIdToken
                | RejectionCode::TokenExpired
                | RejectionCode::CredentialTooOld
                | RejectionCode::InvalidRefreshToken
                | RejectionCode::UserDisabled
                | RejectionCode::UserNotFound
        )
    }

    /// Stable identifier for logging.
    pub fn as_str(&self) -> &str {
        match self {
            RejectionCode::EmailExists => "EMAIL_EXISTS",
            RejectionCode::EmailNotFound => "EMAIL_NOT_FOUND",
            RejectionCode::InvalidPassword => "INVALID_PASSWORD",
            RejectionCode::WeakPassword => "WEAK_PASSWORD",
            RejectionCode::UserDisabled => "USER_DISABLED",
            RejectionCode::UserNotFound => "USER_NOT_FOUND",
            RejectionCode::InvalidIdToken => "INVALID_ID_TOKEN",
            RejectionCode::CredentialTooOld => "CREDENTIAL_TOO_OLD_LOGIN_AGAIN",
            RejectionCode::TokenExpired => "TOKEN_EXPIRED",
            RejectionCode::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            RejectionCode::ProviderAlreadyLinked => "FEDERATED_USER_ID_ALREADY_LINKED",
            RejectionCode::LastProvider => "LAST_PROVIDER",
            RejectionCode::OperationNotAllowed => "OPERATION_NOT_ALLOWED",
            RejectionCode::InvalidVerificationCode => "INVALID_CODE",
            RejectionCode::InvalidSessionInfo => "INVALID_SESSION_INFO",
            RejectionCode::InvalidRecaptcha => "CAPTCHA_CHECK_FAILED",
            RejectionCode::TooManyAttempts => "TOO_MANY_ATTEMPTS_TRY_LATER",
            RejectionCode::Unrecognized(raw) => raw,
        }
    }
}

impl std::fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    /// A caller-supplied argument violated a locally checked precondition.
    /// Raised before any network call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend call could not complete. Retry is at the caller's
    /// discretion; the core never retries internally.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The in-flight call was cancelled via its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// The backend explicitly refused the operation.
    #[error("backend rejected request: {code}")]
    Rejected {
        code: RejectionCode,
        message: String,
    },

    /// The backend reported success but its payload did not decode.
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    /// A local serialization step failed. Indicates a bug, not a caller or
    /// backend problem.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Convenience accessor for the classified rejection code, if any.
    pub fn rejection_code(&self) -> Option<&RejectionCode> {
        match self {
            AuthError::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<GatewayError> for AuthError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transport(message) => AuthError::Transport(message),
            GatewayError::Cancelled => AuthError::Cancelled,
            GatewayError::Rejection { code, message } => AuthError::Rejected {
                code: RejectionCode::classify(&code),
                message,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// Reject empty or whitespace-only required string arguments before any
/// network call. Format validation beyond non-emptiness is
/// backend-authoritative and not re-implemented here.
pub(crate) fn require_non_empty(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AuthError::InvalidArgument(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_plain_codes() {
        assert_eq!(
            RejectionCode::classify("EMAIL_EXISTS"),
            RejectionCode::EmailExists
        );
        assert_eq!(
            RejectionCode::classify("INVALID_REFRESH_TOKEN"),
            RejectionCode::InvalidRefreshToken
        );
        assert_eq!(
            RejectionCode::classify("LAST_PROVIDER"),
            RejectionCode::LastProvider
        );
    }

    #[test]
    fn test_classify_strips_trailing_detail() {
        assert_eq!(
            RejectionCode::classify("WEAK_PASSWORD : Password should be at least 6 characters"),
            RejectionCode::WeakPassword
        );
        assert_eq!(
            RejectionCode::classify("TOO_MANY_ATTEMPTS_TRY_LATER : Try again later"),
            RejectionCode::TooManyAttempts
        );
    }

    #[test]
    fn test_classify_aliases() {
        assert_eq!(
            RejectionCode::classify("INVALID_LOGIN_CREDENTIALS"),
            RejectionCode::InvalidPassword
        );
        assert_eq!(
            RejectionCode::classify("SESSION_EXPIRED"),
            RejectionCode::InvalidSessionInfo
        );
        assert_eq!(
            RejectionCode::classify("CREDENTIAL_ALREADY_IN_USE"),
            RejectionCode::ProviderAlreadyLinked
        );
    }

    #[test]
    fn test_classify_preserves_unrecognized() {
        let code = RejectionCode::classify("SOMETHING_NEW");
        assert_eq!(code, RejectionCode::Unrecognized("SOMETHING_NEW".into()));
        assert_eq!(code.as_str(), "SOMETHING_NEW");
    }

    #[test]
    fn test_requires_reauth() {
        assert!(RejectionCode::TokenExpired.requires_reauth());
        assert!(RejectionCode::InvalidRefreshToken.requires_reauth());
        assert!(!RejectionCode::InvalidPassword.requires_reauth());
        assert!(!RejectionCode::EmailExists.requires_reauth());
    }

    #[test]
    fn test_gateway_error_conversion() {
        let err: AuthError = GatewayError::Rejection {
            code: "TOKEN_EXPIRED".into(),
            message: "backend returned HTTP 401".into(),
        }
        .into();
        assert_eq!(err.rejection_code(), Some(&RejectionCode::TokenExpired));

        let err: AuthError = GatewayError::Cancelled.into();
        assert!(matches!(err, AuthError::Cancelled));

        let err: AuthError = GatewayError::Transport("timed out".into()).into();
        assert!(matches!(err, AuthError::Transport(_)));
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("a@b.c", "email").is_ok());
        assert!(matches!(
            require_non_empty("", "email"),
            Err(AuthError::InvalidArgument(_))
        ));
        assert!(matches!(
            require_non_empty("   ", "password"),
            Err(AuthError::InvalidArgument(_))
        ));
    }
}
