//! Session lifecycle orchestration.
//!
//! [`SessionLifecycleManager`] produces and keeps valid a [`SessionState`]:
//! account creation, every sign-in variant, refresh, password and profile
//! mutation, verification dispatch, lookup and deletion. Each operation is
//! one gateway round-trip plus response mapping, with no client-side retry or
//! background timers. Expiry scheduling belongs to the caller, driven by
//! the pure [`SessionState::is_expired`] predicate.
//!
//! Concurrent refreshes on one refresh token are legal and deliberately not
//! deduplicated: refresh tokens are not single-use, every exchange succeeds
//! independently, and the caller's own state pointer is last-write-wins.

use crate::error::{require_non_empty, AuthError, Result};
use crate::events::{EventBus, SessionEvent};
use crate::types::{AuthKind, OAuthProvider, SessionState, UserRecord};
use crate::wire;
use gateway_traits::{BackendGateway, Operation};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Orchestrates creation, refresh and mutation of [`SessionState`] values.
///
/// Holds no mutable state: every operation returns a fresh value the caller
/// owns, which makes the manager safe under arbitrary concurrent use.
///
/// # Example
///
/// ```ignore
/// use core_session::{EventBus, SessionLifecycleManager};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(gateway: Arc<dyn gateway_traits::BackendGateway>) -> core_session::Result<()> {
/// let manager = SessionLifecycleManager::new(gateway, EventBus::default());
/// let cancel = CancellationToken::new();
/// let session = manager.sign_in_with_email("a@example.com", "hunter2", &cancel).await?;
/// let renewed = manager.refresh(&session, &cancel).await?;
/// assert_eq!(session.local_id, renewed.local_id);
/// # Ok(())
/// # }
/// ```
pub struct SessionLifecycleManager {
    gateway: Arc<dyn BackendGateway>,
    events: EventBus,
}

impl SessionLifecycleManager {
    pub fn new(gateway: Arc<dyn BackendGateway>, events: EventBus) -> Self {
        Self { gateway, events }
    }

    /// The bus this manager publishes [`SessionEvent`]s on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    async fn invoke(
        &self,
        op: Operation,
        payload: Value,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        self.gateway
            .invoke(op, payload, cancel)
            .await
            .map_err(AuthError::from)
    }

    async fn session_call(
        &self,
        op: Operation,
        payload: Value,
        kind: AuthKind,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        let response = self.invoke(op, payload, cancel).await?;
        wire::decode::<wire::SessionPayload>(response)?.into_session(kind)
    }

    /// Create an email/password account.
    ///
    /// A non-empty `display_name` is applied as a profile-update follow-up
    /// and its failure propagates. The verification email, when requested,
    /// is best-effort only: account creation is the primary effect and has
    /// already succeeded, so a dispatch failure is logged and published as
    /// a recoverable [`SessionEvent::Failure`] without failing the call.
    #[instrument(skip_all)]
    pub async fn create_user_with_email(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
        send_verification: bool,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        require_non_empty(email, "email")?;
        require_non_empty(password, "password")?;

        let body = wire::encode(&wire::SignUpRequest {
            email: Some(email),
            password: Some(password),
            return_secure_token: true,
        })?;
        let mut session = self
            .session_call(Operation::SignUp, body, AuthKind::EmailPassword, cancel)
            .await?;

        if let Some(name) = display_name.filter(|n| !n.trim().is_empty()) {
            let token = session.id_token.clone();
            let updated = self
                .update_profile_with_token(&token, Some(name), None, cancel)
                .await?;
            session = SessionState {
                kind: AuthKind::EmailPassword,
                ..updated
            }
            .carrying_profile_from(&session);
        }

        if send_verification {
            if let Err(err) = self.send_email_verification(&session.id_token, cancel).await {
                warn!(error = %err, "verification email dispatch failed after sign-up");
                let _ = self.events.emit(SessionEvent::Failure {
                    message: format!("verification email dispatch failed: {err}"),
                    recoverable: true,
                });
            }
        }

        info!(local_id = %session.local_id, "account created");
        let _ = self.events.emit(SessionEvent::SignedIn {
            local_id: session.local_id.clone(),
            kind: session.kind,
        });
        Ok(session)
    }

    /// Create an anonymous account. Profile fields are absent.
    #[instrument(skip_all)]
    pub async fn sign_in_anonymously(&self, cancel: &CancellationToken) -> Result<SessionState> {
        let body = wire::encode(&wire::SignUpRequest {
            email: None,
            password: None,
            return_secure_token: true,
        })?;
        let session = self
            .session_call(Operation::SignInAnonymous, body, AuthKind::Anonymous, cancel)
            .await?;
        let _ = self.events.emit(SessionEvent::SignedIn {
            local_id: session.local_id.clone(),
            kind: session.kind,
        });
        Ok(session)
    }

    #[instrument(skip_all)]
    pub async fn sign_in_with_email(
        &self,
        email: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        require_non_empty(email, "email")?;
        require_non_empty(password, "password")?;

        let body = wire::encode(&wire::SignInPasswordRequest {
            email,
            password,
            return_secure_token: true,
        })?;
        let session = self
            .session_call(
                Operation::SignInPassword,
                body,
                AuthKind::EmailPassword,
                cancel,
            )
            .await?;
        let _ = self.events.emit(SessionEvent::SignedIn {
            local_id: session.local_id.clone(),
            kind: session.kind,
        });
        Ok(session)
    }

    /// Sign in with a third-party OAuth access token.
    #[instrument(skip_all, fields(provider = %provider))]
    pub async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        access_token: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        require_non_empty(access_token, "access token")?;

        let body = wire::encode(&wire::SignInIdpRequest {
            id_token: None,
            post_body: format!(
                "access_token={access_token}&providerId={}",
                provider.provider_id()
            ),
            request_uri: wire::LOCAL_REQUEST_URI,
            return_secure_token: true,
            return_idp_credential: true,
        })?;
        let session = self
            .session_call(Operation::SignInOauth, body, provider.into(), cancel)
            .await?;
        let _ = self.events.emit(SessionEvent::SignedIn {
            local_id: session.local_id.clone(),
            kind: session.kind,
        });
        Ok(session)
    }

    /// Twitter's flow is two-part (access token + secret), so it is a
    /// distinct operation rather than a shape of the generic OAuth path.
    #[instrument(skip_all)]
    pub async fn sign_in_with_twitter(
        &self,
        access_token: &str,
        token_secret: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        require_non_empty(access_token, "access token")?;
        require_non_empty(token_secret, "token secret")?;

        let body = wire::encode(&wire::SignInIdpRequest {
            id_token: None,
            post_body: format!(
                "access_token={access_token}&oauth_token_secret={token_secret}&providerId=twitter.com"
            ),
            request_uri: wire::LOCAL_REQUEST_URI,
            return_secure_token: true,
            return_idp_credential: true,
        })?;
        let session = self
            .session_call(Operation::SignInOauth, body, AuthKind::Twitter, cancel)
            .await?;
        let _ = self.events.emit(SessionEvent::SignedIn {
            local_id: session.local_id.clone(),
            kind: session.kind,
        });
        Ok(session)
    }

    /// Exchange a backend-minted custom token for a session.
    #[instrument(skip_all)]
    pub async fn sign_in_with_custom_token(
        &self,
        custom_token: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        require_non_empty(custom_token, "custom token")?;

        let body = wire::encode(&wire::SignInCustomTokenRequest {
            token: custom_token,
            return_secure_token: true,
        })?;
        let session = self
            .session_call(
                Operation::SignInCustomToken,
                body,
                AuthKind::CustomToken,
                cancel,
            )
            .await?;
        let _ = self.events.emit(SessionEvent::SignedIn {
            local_id: session.local_id.clone(),
            kind: session.kind,
        });
        Ok(session)
    }

    /// Exchange the session's refresh token for a new ID token.
    ///
    /// Returns a wholly new [`SessionState`]: same `local_id` and `kind`,
    /// later expiry, profile fields carried over from `session` except
    /// where the response updates them. The prior value stays untouched and
    /// usable until the caller replaces it.
    #[instrument(skip_all, fields(local_id = %session.local_id))]
    pub async fn refresh(
        &self,
        session: &SessionState,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        let body = wire::encode(&wire::RefreshRequest::new(&session.refresh_token))?;
        let response = self.invoke(Operation::RefreshToken, body, cancel).await?;
        let payload: wire::RefreshPayload = wire::decode(response)?;

        let expires_at = wire::expiry_from_lifetime(&payload.expires_in)?;
        let next = SessionState {
            id_token: payload.id_token,
            refresh_token: payload.refresh_token,
            expires_at,
            local_id: payload
                .user_id
                .unwrap_or_else(|| session.local_id.clone()),
            email: None,
            display_name: None,
            photo_url: None,
            kind: session.kind,
        }
        .carrying_profile_from(session);

        info!(local_id = %next.local_id, "session refreshed");
        let _ = self.events.emit(SessionEvent::Refreshed {
            local_id: next.local_id.clone(),
            expires_at,
        });
        Ok(next)
    }

    /// Token-keyed primitive for password change. The session-accepting
    /// [`change_password`](Self::change_password) wrapper is preferred when
    /// the full prior state is at hand.
    #[instrument(skip_all)]
    pub async fn change_password_with_token(
        &self,
        id_token: &str,
        new_password: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        require_non_empty(id_token, "id token")?;
        require_non_empty(new_password, "new password")?;

        let mut request = wire::AccountUpdateRequest::for_token(id_token);
        request.password = Some(new_password);
        let body = wire::encode(&request)?;

        let response = self.invoke(Operation::ChangePassword, body, cancel).await?;
        let payload: wire::SessionPayload = wire::decode(response)?;
        let kind = payload.kind_hint().unwrap_or(AuthKind::EmailPassword);
        let session = payload.into_session(kind)?;

        let _ = self.events.emit(SessionEvent::PasswordChanged {
            local_id: session.local_id.clone(),
        });
        Ok(session)
    }

    pub async fn change_password(
        &self,
        session: &SessionState,
        new_password: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        let next = self
            .change_password_with_token(&session.id_token, new_password, cancel)
            .await?;
        Ok(SessionState {
            kind: session.kind,
            ..next
        }
        .carrying_profile_from(session))
    }

    /// Token-keyed primitive for profile mutation. `Some(value)` sets an
    /// attribute; `None` (or an empty string) deletes it, so the result's
    /// absent fields are authoritative, not merely unreturned.
    #[instrument(skip_all)]
    pub async fn update_profile_with_token(
        &self,
        id_token: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        require_non_empty(id_token, "id token")?;

        let mut request = wire::AccountUpdateRequest::for_token(id_token);
        let mut deletions = Vec::new();
        match display_name.filter(|v| !v.trim().is_empty()) {
            Some(name) => request.display_name = Some(name),
            None => deletions.push("DISPLAY_NAME"),
        }
        match photo_url.filter(|v| !v.trim().is_empty()) {
            Some(url) => request.photo_url = Some(url),
            None => deletions.push("PHOTO_URL"),
        }
        if !deletions.is_empty() {
            request.delete_attribute = Some(deletions);
        }
        let body = wire::encode(&request)?;

        let response = self.invoke(Operation::UpdateProfile, body, cancel).await?;
        let payload: wire::SessionPayload = wire::decode(response)?;
        let kind = payload.kind_hint().unwrap_or(AuthKind::EmailPassword);
        let session = payload.into_session(kind)?;

        let _ = self.events.emit(SessionEvent::ProfileUpdated {
            local_id: session.local_id.clone(),
        });
        Ok(session)
    }

    pub async fn update_profile(
        &self,
        session: &SessionState,
        display_name: Option<&str>,
        photo_url: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        let mut next = self
            .update_profile_with_token(&session.id_token, display_name, photo_url, cancel)
            .await?;
        next.kind = session.kind;
        // Only email is carried over: absent display name / photo URL mean
        // the attribute was deleted, not omitted.
        if next.email.is_none() {
            next.email = session.email.clone();
        }
        Ok(next)
    }

    #[instrument(skip_all)]
    pub async fn send_password_reset_email(
        &self,
        email: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require_non_empty(email, "email")?;

        let body = wire::encode(&wire::OobRequest {
            request_type: wire::OOB_PASSWORD_RESET,
            email: Some(email),
            id_token: None,
        })?;
        self.invoke(Operation::SendPasswordReset, body, cancel)
            .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn send_email_verification(
        &self,
        id_token: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require_non_empty(id_token, "id token")?;

        let body = wire::encode(&wire::OobRequest {
            request_type: wire::OOB_VERIFY_EMAIL,
            email: None,
            id_token: Some(id_token),
        })?;
        self.invoke(Operation::SendEmailVerification, body, cancel)
            .await?;
        Ok(())
    }

    /// Read-only profile snapshot. Does not replace the caller's session.
    #[instrument(skip_all)]
    pub async fn get_user(
        &self,
        id_token: &str,
        cancel: &CancellationToken,
    ) -> Result<UserRecord> {
        require_non_empty(id_token, "id token")?;

        let body = wire::encode(&wire::LookupRequest { id_token })?;
        let response = self.invoke(Operation::GetUser, body, cancel).await?;
        let payload: wire::LookupPayload = wire::decode(response)?;
        payload
            .users
            .into_iter()
            .next()
            .map(wire::AccountInfo::into_record)
            .ok_or_else(|| {
                AuthError::MalformedResponse("backend returned no user for token".to_string())
            })
    }

    /// Delete the remote account. Irreversible.
    ///
    /// Outstanding [`SessionState`] values referencing the account are not
    /// tracked or invalidated here; discarding them is the caller's
    /// responsibility.
    #[instrument(skip_all)]
    pub async fn delete_user(&self, id_token: &str, cancel: &CancellationToken) -> Result<()> {
        require_non_empty(id_token, "id token")?;

        let body = wire::encode(&wire::DeleteAccountRequest { id_token })?;
        self.invoke(Operation::DeleteUser, body, cancel).await?;

        info!("account deleted");
        let _ = self.events.emit(SessionEvent::AccountDeleted);
        Ok(())
    }
}
