//! Provider linking and unlinking.
//!
//! [`ProviderLinkCoordinator`] attaches additional credentials to an
//! existing account, detaches them, and answers which providers an email
//! address is registered with. Linking is keyed by the account's ID token;
//! the linked credential becomes one more way to sign in to the same
//! `local_id`.

use crate::error::{require_non_empty, AuthError, Result};
use crate::events::{EventBus, SessionEvent};
use crate::types::{AuthKind, LinkedProviderSet, OAuthProvider, SessionState};
use crate::wire;
use gateway_traits::{BackendGateway, Operation};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

pub struct ProviderLinkCoordinator {
    gateway: Arc<dyn BackendGateway>,
    events: EventBus,
}

impl ProviderLinkCoordinator {
    pub fn new(gateway: Arc<dyn BackendGateway>, events: EventBus) -> Self {
        Self { gateway, events }
    }

    /// Attach an email/password credential to the account behind `id_token`.
    ///
    /// The returned state keeps the caller's notion of how the session was
    /// originally established; only the account's provider set changes.
    #[instrument(skip_all)]
    pub async fn link_with_email_token(
        &self,
        id_token: &str,
        email: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        require_non_empty(id_token, "id token")?;
        require_non_empty(email, "email")?;
        require_non_empty(password, "password")?;

        let mut request = wire::AccountUpdateRequest::for_token(id_token);
        request.email = Some(email);
        request.password = Some(password);
        let body = wire::encode(&request)?;

        let response = self
            .gateway
            .invoke(Operation::LinkEmail, body, cancel)
            .await
            .map_err(AuthError::from)?;
        let session = wire::decode::<wire::SessionPayload>(response)?
            .into_session(AuthKind::EmailPassword)?;

        info!(local_id = %session.local_id, "email credential linked");
        let _ = self.events.emit(SessionEvent::ProviderLinked {
            local_id: session.local_id.clone(),
            kind: AuthKind::EmailPassword,
        });
        Ok(session)
    }

    pub async fn link_with_email(
        &self,
        session: &SessionState,
        email: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        let next = self
            .link_with_email_token(&session.id_token, email, password, cancel)
            .await?;
        Ok(SessionState {
            kind: session.kind,
            ..next
        }
        .carrying_profile_from(session))
    }

    /// Attach an OAuth credential to the account behind `id_token`. The
    /// request shape matches OAuth sign-in with the ID token added, which
    /// turns the assertion into a link.
    #[instrument(skip_all, fields(provider = %provider))]
    pub async fn link_with_oauth_token(
        &self,
        id_token: &str,
        provider: OAuthProvider,
        access_token: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        require_non_empty(id_token, "id token")?;
        require_non_empty(access_token, "access token")?;

        let body = wire::encode(&wire::SignInIdpRequest {
            id_token: Some(id_token),
            post_body: format!(
                "access_token={access_token}&providerId={}",
                provider.provider_id()
            ),
            request_uri: wire::LOCAL_REQUEST_URI,
            return_secure_token: true,
            return_idp_credential: true,
        })?;

        let response = self
            .gateway
            .invoke(Operation::LinkOauth, body, cancel)
            .await
            .map_err(AuthError::from)?;
        let kind: AuthKind = provider.into();
        let session = wire::decode::<wire::SessionPayload>(response)?.into_session(kind)?;

        info!(local_id = %session.local_id, "oauth credential linked");
        let _ = self.events.emit(SessionEvent::ProviderLinked {
            local_id: session.local_id.clone(),
            kind,
        });
        Ok(session)
    }

    pub async fn link_with_oauth(
        &self,
        session: &SessionState,
        provider: OAuthProvider,
        access_token: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        let next = self
            .link_with_oauth_token(&session.id_token, provider, access_token, cancel)
            .await?;
        Ok(SessionState {
            kind: session.kind,
            ..next
        }
        .carrying_profile_from(session))
    }

    /// Detach a provider from the account behind `id_token`.
    ///
    /// Detaching the last remaining provider is refused by the backend; the
    /// rejection surfaces as [`RejectionCode::LastProvider`] and is distinct
    /// from an "unknown provider" rejection.
    ///
    /// [`RejectionCode::LastProvider`]: crate::error::RejectionCode::LastProvider
    #[instrument(skip_all, fields(provider = %kind))]
    pub async fn unlink_with_token(
        &self,
        id_token: &str,
        kind: AuthKind,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        self.unlink_inner(id_token, kind, AuthKind::EmailPassword, cancel)
            .await
    }

    async fn unlink_inner(
        &self,
        id_token: &str,
        kind: AuthKind,
        fallback: AuthKind,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        require_non_empty(id_token, "id token")?;

        let mut request = wire::AccountUpdateRequest::for_token(id_token);
        request.delete_provider = Some(vec![kind.provider_id()]);
        let body = wire::encode(&request)?;

        let response = self
            .gateway
            .invoke(Operation::Unlink, body, cancel)
            .await
            .map_err(AuthError::from)?;
        // The backend's remaining-provider list is the best account of what
        // the session is now; `fallback` covers responses that omit it.
        let payload: wire::SessionPayload = wire::decode(response)?;
        let remaining = payload.kind_hint().unwrap_or(fallback);
        let session = payload.into_session(remaining)?;

        info!(local_id = %session.local_id, "provider unlinked");
        let _ = self.events.emit(SessionEvent::ProviderUnlinked {
            local_id: session.local_id.clone(),
            kind,
        });
        Ok(session)
    }

    pub async fn unlink(
        &self,
        session: &SessionState,
        kind: AuthKind,
        cancel: &CancellationToken,
    ) -> Result<SessionState> {
        let next = self
            .unlink_inner(&session.id_token, kind, session.kind, cancel)
            .await?;
        // When the session's own provider was detached, the kind reported by
        // the backend's remaining list is the honest one to keep.
        if session.kind == kind {
            return Ok(next.carrying_profile_from(session));
        }
        Ok(SessionState {
            kind: session.kind,
            ..next
        }
        .carrying_profile_from(session))
    }

    /// Which providers an email address is registered with. Requires no
    /// session.
    #[instrument(skip_all)]
    pub async fn get_linked_accounts(
        &self,
        email: &str,
        cancel: &CancellationToken,
    ) -> Result<LinkedProviderSet> {
        require_non_empty(email, "email")?;

        let body = wire::encode(&wire::CreateAuthUriRequest {
            identifier: email,
            continue_uri: wire::LOCAL_REQUEST_URI,
        })?;
        let response = self
            .gateway
            .invoke(Operation::GetLinkedAccounts, body, cancel)
            .await
            .map_err(AuthError::from)?;
        let payload: wire::AuthUriPayload = wire::decode(response)?;
        Ok(LinkedProviderSet::new(
            payload.registered,
            payload.all_providers,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_traits::GatewayError;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedGateway {
        responses: Mutex<VecDeque<gateway_traits::Result<Value>>>,
        calls: Mutex<Vec<(Operation, Value)>>,
    }

    impl ScriptedGateway {
        fn new(responses: Vec<gateway_traits::Result<Value>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(Operation, Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl BackendGateway for ScriptedGateway {
        async fn invoke(
            &self,
            op: Operation,
            payload: Value,
            _cancel: &CancellationToken,
        ) -> gateway_traits::Result<Value> {
            self.calls.lock().unwrap().push((op, payload));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected gateway call")
        }
    }

    fn coordinator(gateway: Arc<dyn BackendGateway>) -> ProviderLinkCoordinator {
        ProviderLinkCoordinator::new(gateway, EventBus::default())
    }

    fn session_json(local_id: &str) -> Value {
        json!({
            "idToken": format!("id-{local_id}"),
            "refreshToken": format!("refresh-{local_id}"),
            "expiresIn": "3600",
            "localId": local_id,
        })
    }

    fn anonymous_session() -> SessionState {
        SessionState {
            id_token: "anon-id".into(),
            refresh_token: "anon-refresh".into(),
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(3600),
            local_id: "user-1".into(),
            email: None,
            display_name: None,
            photo_url: None,
            kind: AuthKind::Anonymous,
        }
    }

    #[tokio::test]
    async fn test_link_email_sends_credentials_with_token() {
        let gateway = ScriptedGateway::new(vec![Ok(session_json("user-1"))]);
        let c = coordinator(gateway.clone());
        let mut events = c.events.subscribe();

        let session = anonymous_session();
        let next = c
            .link_with_email(&session, "a@example.com", "hunter2", &CancellationToken::new())
            .await
            .unwrap();

        let calls = gateway.calls();
        assert_eq!(calls[0].0, Operation::LinkEmail);
        assert_eq!(calls[0].1["idToken"], "anon-id");
        assert_eq!(calls[0].1["email"], "a@example.com");
        assert_eq!(calls[0].1["password"], "hunter2");

        // The session keeps its original kind; the event reports the link.
        assert_eq!(next.kind, AuthKind::Anonymous);
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::ProviderLinked {
                kind: AuthKind::EmailPassword,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_link_oauth_includes_id_token_in_assertion() {
        let gateway = ScriptedGateway::new(vec![Ok(session_json("user-1"))]);
        let c = coordinator(gateway.clone());

        c.link_with_oauth_token(
            "id-1",
            OAuthProvider::Google,
            "google-access",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let calls = gateway.calls();
        assert_eq!(calls[0].0, Operation::LinkOauth);
        assert_eq!(calls[0].1["idToken"], "id-1");
        let post_body = calls[0].1["postBody"].as_str().unwrap();
        assert!(post_body.contains("access_token=google-access"));
        assert!(post_body.contains("providerId=google.com"));
    }

    #[tokio::test]
    async fn test_unlink_sends_delete_provider() {
        let mut response = session_json("user-1");
        response["providerUserInfo"] = json!([{"providerId": "password"}]);
        let gateway = ScriptedGateway::new(vec![Ok(response)]);
        let c = coordinator(gateway.clone());

        let next = c
            .unlink_with_token("id-1", AuthKind::Google, &CancellationToken::new())
            .await
            .unwrap();

        let calls = gateway.calls();
        assert_eq!(calls[0].0, Operation::Unlink);
        assert_eq!(calls[0].1["deleteProvider"], json!(["google.com"]));
        assert_eq!(next.kind, AuthKind::EmailPassword);
    }

    #[tokio::test]
    async fn test_unlink_without_provider_list_keeps_prior_kind() {
        // Response omits providerUserInfo; the prior session's kind must win
        // over a blanket email/password default.
        let gateway = ScriptedGateway::new(vec![Ok(session_json("user-1"))]);
        let c = coordinator(gateway);
        let prior = SessionState {
            kind: AuthKind::Google,
            ..anonymous_session()
        };

        let next = c
            .unlink(&prior, AuthKind::Google, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(next.kind, AuthKind::Google);
    }

    #[tokio::test]
    async fn test_unlink_last_provider_is_distinct_rejection() {
        let gateway = ScriptedGateway::new(vec![Err(GatewayError::Rejection {
            code: "LAST_PROVIDER".into(),
            message: "backend returned HTTP 400".into(),
        })]);
        let c = coordinator(gateway);

        let err = c
            .unlink_with_token("id-1", AuthKind::EmailPassword, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.rejection_code(),
            Some(&crate::error::RejectionCode::LastProvider)
        );
    }

    #[tokio::test]
    async fn test_get_linked_accounts_maps_provider_set() {
        let gateway = ScriptedGateway::new(vec![Ok(json!({
            "registered": true,
            "allProviders": ["password", "google.com"]
        }))]);
        let c = coordinator(gateway.clone());

        let set = c
            .get_linked_accounts("a@example.com", &CancellationToken::new())
            .await
            .unwrap();
        assert!(set.registered());
        assert!(set.contains(AuthKind::EmailPassword));
        assert!(set.contains(AuthKind::Google));
        assert!(!set.contains(AuthKind::Github));

        let calls = gateway.calls();
        assert_eq!(calls[0].0, Operation::GetLinkedAccounts);
        assert_eq!(calls[0].1["identifier"], "a@example.com");
    }

    #[tokio::test]
    async fn test_unknown_email_is_unregistered_not_an_error() {
        let gateway = ScriptedGateway::new(vec![Ok(json!({}))]);
        let c = coordinator(gateway);

        let set = c
            .get_linked_accounts("nobody@example.com", &CancellationToken::new())
            .await
            .unwrap();
        assert!(!set.registered());
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_validation_fails_before_any_gateway_call() {
        let gateway = ScriptedGateway::new(vec![]);
        let c = coordinator(gateway.clone());
        let cancel = CancellationToken::new();

        let err = c
            .link_with_email_token("", "a@example.com", "pw", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidArgument(_)));
        let err = c.get_linked_accounts("", &cancel).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidArgument(_)));

        assert!(gateway.calls().is_empty());
    }
}
