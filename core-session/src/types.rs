use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The credential flow that produced a [`SessionState`].
///
/// Stored on every session so callers can tell how the account was last
/// authenticated. Maps one-to-one onto the backend's provider identifier
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthKind {
    /// Email and password credential.
    EmailPassword,
    /// Anonymous account, no credential attached.
    Anonymous,
    /// Google OAuth.
    Google,
    /// Facebook OAuth.
    Facebook,
    /// Twitter OAuth (token + secret flow).
    Twitter,
    /// GitHub OAuth.
    Github,
    /// SMS phone verification.
    Phone,
    /// Backend-minted custom token.
    CustomToken,
}

impl AuthKind {
    /// The backend's provider identifier for this kind.
    pub fn provider_id(&self) -> &'static str {
        match self {
            AuthKind::EmailPassword => "password",
            AuthKind::Anonymous => "anonymous",
            AuthKind::Google => "google.com",
            AuthKind::Facebook => "facebook.com",
            AuthKind::Twitter => "twitter.com",
            AuthKind::Github => "github.com",
            AuthKind::Phone => "phone",
            AuthKind::CustomToken => "custom",
        }
    }

    /// Parse a backend provider identifier.
    pub fn from_provider_id(id: &str) -> Option<Self> {
        match id {
            "password" => Some(AuthKind::EmailPassword),
            "anonymous" => Some(AuthKind::Anonymous),
            "google.com" => Some(AuthKind::Google),
            "facebook.com" => Some(AuthKind::Facebook),
            "twitter.com" => Some(AuthKind::Twitter),
            "github.com" => Some(AuthKind::Github),
            "phone" => Some(AuthKind::Phone),
            "custom" => Some(AuthKind::CustomToken),
            _ => None,
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_id())
    }
}

/// Third-party providers usable with the generic OAuth sign-in and link
/// operations.
///
/// A closed enum rather than a string: an unsupported provider is
/// unrepresentable, so it can never cost a backend round-trip. Twitter's
/// two-part token flow has its own dedicated operation but shares this
/// provider identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OAuthProvider {
    Google,
    Facebook,
    Twitter,
    Github,
}

impl OAuthProvider {
    /// The backend's provider identifier.
    pub fn provider_id(&self) -> &'static str {
        AuthKind::from(*self).provider_id()
    }
}

impl From<OAuthProvider> for AuthKind {
    fn from(provider: OAuthProvider) -> Self {
        match provider {
            OAuthProvider::Google => AuthKind::Google,
            OAuthProvider::Facebook => AuthKind::Facebook,
            OAuthProvider::Twitter => AuthKind::Twitter,
            OAuthProvider::Github => AuthKind::Github,
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_id())
    }
}

/// One authenticated session: tokens, expiry and identity claims.
///
/// Immutable by replacement: refresh, link, unlink and profile updates all
/// yield a new `SessionState` rather than mutating fields in place, so
/// tokens and expiry can never be observed mismatched. `local_id` is stable
/// for the lifetime of the underlying account.
///
/// # Security
///
/// The `Debug` implementation redacts both tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Short-lived bearer credential. Non-empty after any successful issuing
    /// operation.
    pub id_token: String,
    /// Long-lived credential used solely to obtain a new ID token. Not
    /// single-use.
    pub refresh_token: String,
    /// Absolute expiry, computed from the backend-reported lifetime at the
    /// moment the response was mapped. Never caller-supplied.
    pub expires_at: DateTime<Utc>,
    /// Stable per-account user identifier.
    pub local_id: String,
    /// Account email, absent for anonymous and phone-only accounts.
    pub email: Option<String>,
    /// Display name, if set.
    pub display_name: Option<String>,
    /// Profile photo URL, if set.
    pub photo_url: Option<String>,
    /// The credential flow that produced this session instance.
    pub kind: AuthKind,
}

impl SessionState {
    /// Whether the ID token is expired, or will be within `skew_seconds`.
    ///
    /// Pure predicate: callers own refresh scheduling, the core runs no
    /// background timer.
    pub fn is_expired(&self, skew_seconds: i64) -> bool {
        Utc::now() >= self.expires_at - Duration::seconds(skew_seconds)
    }

    /// Time remaining until expiry, or `None` if already expired.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        let now = Utc::now();
        if now >= self.expires_at {
            None
        } else {
            Some(self.expires_at - now)
        }
    }

    /// Fill profile fields absent from a fresh token exchange with the
    /// values from a prior session for the same account. Fields the backend
    /// did return take precedence.
    pub(crate) fn carrying_profile_from(mut self, prior: &SessionState) -> Self {
        if self.email.is_none() {
            self.email = prior.email.clone();
        }
        if self.display_name.is_none() {
            self.display_name = prior.display_name.clone();
        }
        if self.photo_url.is_none() {
            self.photo_url = prior.photo_url.clone();
        }
        self
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("local_id", &self.local_id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("photo_url", &self.photo_url)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Read-only profile snapshot from the user-lookup operation.
///
/// Does not replace a caller's [`SessionState`]; it carries no tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub local_id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub phone_number: Option<String>,
    /// Provider identifiers currently attached to the account.
    pub providers: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Point-in-time answer to "which providers are attached to this email".
///
/// Backend-authoritative and never cached by the core: a link or unlink
/// elsewhere (another device) can invalidate it at any moment, so callers
/// must re-query rather than locally mutate a previously returned set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedProviderSet {
    registered: bool,
    providers: Vec<String>,
}

impl LinkedProviderSet {
    pub(crate) fn new(registered: bool, providers: Vec<String>) -> Self {
        Self {
            registered,
            providers,
        }
    }

    /// Whether any account exists for the queried email.
    pub fn registered(&self) -> bool {
        self.registered
    }

    /// The raw provider identifiers as reported by the backend.
    pub fn provider_ids(&self) -> &[String] {
        &self.providers
    }

    /// Whether the given credential kind is attached.
    pub fn contains(&self, kind: AuthKind) -> bool {
        self.providers.iter().any(|p| p == kind.provider_id())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Single-use ticket binding a sent SMS code to its confirmation.
///
/// Deliberately not `Clone`: confirmation consumes the ticket by value, so
/// replaying a `session_info` through the public API is a compile error
/// rather than a runtime bug. The backend owns the ticket's validity window;
/// no expiry is enforced client-side.
pub struct VerificationSession {
    session_info: String,
}

impl VerificationSession {
    pub(crate) fn new(session_info: String) -> Self {
        Self { session_info }
    }

    pub(crate) fn into_session_info(self) -> String {
        self.session_info
    }
}

impl fmt::Debug for VerificationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationSession")
            .field("session_info", &"[REDACTED]")
            .finish()
    }
}
