//! Wire payload types for the identity backend.
//!
//! Requests serialize to the opaque JSON the gateway forwards; responses
//! decode the backend's success payloads and map them into the core's
//! domain types. The identity endpoints speak camelCase with the token
//! lifetime as a string of seconds; the refresh (secure-token) endpoint
//! speaks snake_case. Expiry is normalized to an absolute instant the
//! moment a response is mapped, so a delay between receipt and processing
//! can never skew it.

use crate::error::{AuthError, Result};
use crate::types::{AuthKind, SessionState, UserRecord};
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder continue/request URI for flows where the backend requires
/// one but the client has no browser redirect.
pub(crate) const LOCAL_REQUEST_URI: &str = "http://localhost";

pub(crate) fn encode<T: Serialize>(request: &T) -> Result<Value> {
    serde_json::to_value(request)
        .map_err(|e| AuthError::Internal(format!("failed to encode request payload: {e}")))
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| AuthError::MalformedResponse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Account creation. With credentials absent this creates an anonymous
/// account.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignUpRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
    pub return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignInPasswordRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

/// OAuth assertion sign-in and link. `post_body` carries the provider
/// credential form-encoded; with `id_token` present the assertion links to
/// that account instead of signing in.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignInIdpRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<&'a str>,
    pub post_body: String,
    pub request_uri: &'static str,
    pub return_secure_token: bool,
    pub return_idp_credential: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignInCustomTokenRequest<'a> {
    pub token: &'a str,
    pub return_secure_token: bool,
}

/// The refresh exchange. The token endpoint takes this form-encoded; field
/// names are snake_case on the wire.
#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub grant_type: &'static str,
    pub refresh_token: &'a str,
}

impl<'a> RefreshRequest<'a> {
    pub fn new(refresh_token: &'a str) -> Self {
        Self {
            grant_type: "refresh_token",
            refresh_token,
        }
    }
}

/// Account mutation request multiplexed by the backend's update endpoint:
/// password change, profile update, email/password link and provider unlink
/// are all shapes of this.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountUpdateRequest<'a> {
    pub id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_provider: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_attribute: Option<Vec<&'static str>>,
    pub return_secure_token: bool,
}

impl<'a> AccountUpdateRequest<'a> {
    pub fn for_token(id_token: &'a str) -> Self {
        Self {
            id_token,
            email: None,
            password: None,
            display_name: None,
            photo_url: None,
            delete_provider: None,
            delete_attribute: None,
            return_secure_token: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateAuthUriRequest<'a> {
    pub identifier: &'a str,
    pub continue_uri: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LookupRequest<'a> {
    pub id_token: &'a str,
}

/// Out-of-band email dispatch: password reset (keyed by email) or address
/// verification (keyed by ID token).
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OobRequest<'a> {
    pub request_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<&'a str>,
}

pub(crate) const OOB_PASSWORD_RESET: &str = "PASSWORD_RESET";
pub(crate) const OOB_VERIFY_EMAIL: &str = "VERIFY_EMAIL";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteAccountRequest<'a> {
    pub id_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendPhoneCodeRequest<'a> {
    pub phone_number: &'a str,
    pub recaptcha_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfirmPhoneCodeRequest<'a> {
    pub session_info: &'a str,
    pub code: &'a str,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProviderUserInfo {
    pub provider_id: String,
}

/// Token-bearing success payload of the identity endpoints.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionPayload {
    pub id_token: String,
    pub refresh_token: String,
    /// Token lifetime in seconds, as a decimal string on the wire.
    pub expires_in: String,
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub provider_user_info: Vec<ProviderUserInfo>,
}

impl SessionPayload {
    /// The credential kind suggested by the response's own provider list,
    /// when the caller has no better hint.
    pub fn kind_hint(&self) -> Option<AuthKind> {
        self.provider_user_info
            .iter()
            .find_map(|info| AuthKind::from_provider_id(&info.provider_id))
    }

    /// Map into a [`SessionState`], normalizing the relative lifetime to an
    /// absolute expiry now.
    pub fn into_session(self, kind: AuthKind) -> Result<SessionState> {
        let expires_at = expiry_from_lifetime(&self.expires_in)?;
        Ok(SessionState {
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            expires_at,
            local_id: self.local_id,
            email: self.email,
            display_name: self.display_name,
            photo_url: self.photo_url,
            kind,
        })
    }
}

/// Success payload of the refresh (secure-token) endpoint. Snake_case on
/// the wire, unlike the identity endpoints.
#[derive(Deserialize)]
pub(crate) struct RefreshPayload {
    pub id_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds, decimal string.
    pub expires_in: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

pub(crate) fn expiry_from_lifetime(seconds: &str) -> Result<DateTime<Utc>> {
    let seconds: i64 = seconds.parse().map_err(|_| {
        AuthError::MalformedResponse(format!("unparseable token lifetime: {seconds:?}"))
    })?;
    Ok(Utc::now() + chrono::Duration::seconds(seconds))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthUriPayload {
    #[serde(default)]
    pub all_providers: Vec<String>,
    #[serde(default)]
    pub registered: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountInfo {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub provider_user_info: Vec<ProviderUserInfo>,
    /// Milliseconds since epoch, as a string.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_login_at: Option<String>,
}

impl AccountInfo {
    pub fn into_record(self) -> UserRecord {
        UserRecord {
            local_id: self.local_id,
            email: self.email,
            email_verified: self.email_verified,
            display_name: self.display_name,
            photo_url: self.photo_url,
            phone_number: self.phone_number,
            providers: self
                .provider_user_info
                .into_iter()
                .map(|info| info.provider_id)
                .collect(),
            created_at: parse_epoch_millis(self.created_at.as_deref()),
            last_login_at: parse_epoch_millis(self.last_login_at.as_deref()),
        }
    }
}

fn parse_epoch_millis(value: Option<&str>) -> Option<DateTime<Utc>> {
    let millis: i64 = value?.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

#[derive(Deserialize)]
pub(crate) struct LookupPayload {
    pub users: Vec<AccountInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PhoneCodePayload {
    pub session_info: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_payload_maps_and_normalizes_expiry() {
        let before = Utc::now();
        let payload: SessionPayload = decode(json!({
            "idToken": "id-1",
            "refreshToken": "refresh-1",
            "expiresIn": "3600",
            "localId": "user-1",
            "email": "a@example.com"
        }))
        .unwrap();
        let session = payload.into_session(AuthKind::EmailPassword).unwrap();
        assert_eq!(session.local_id, "user-1");
        assert_eq!(session.email.as_deref(), Some("a@example.com"));
        assert!(session.expires_at > before + chrono::Duration::seconds(3590));
        assert!(session.expires_at <= Utc::now() + chrono::Duration::seconds(3600));
    }

    #[test]
    fn test_session_payload_rejects_bad_lifetime() {
        let payload: SessionPayload = decode(json!({
            "idToken": "id-1",
            "refreshToken": "refresh-1",
            "expiresIn": "soon",
            "localId": "user-1"
        }))
        .unwrap();
        let err = payload.into_session(AuthKind::Anonymous).unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
    }

    #[test]
    fn test_kind_hint_from_provider_list() {
        let payload: SessionPayload = decode(json!({
            "idToken": "t",
            "refreshToken": "r",
            "expiresIn": "3600",
            "localId": "u",
            "providerUserInfo": [{"providerId": "google.com"}]
        }))
        .unwrap();
        assert_eq!(payload.kind_hint(), Some(AuthKind::Google));
    }

    #[test]
    fn test_refresh_payload_is_snake_case() {
        let payload: RefreshPayload = decode(json!({
            "id_token": "new-id",
            "refresh_token": "new-refresh",
            "expires_in": "3600",
            "user_id": "user-1"
        }))
        .unwrap();
        assert_eq!(payload.id_token, "new-id");
        assert_eq!(payload.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_lookup_maps_account_record() {
        let payload: LookupPayload = decode(json!({
            "users": [{
                "localId": "user-1",
                "email": "a@example.com",
                "emailVerified": true,
                "phoneNumber": "+15550001111",
                "providerUserInfo": [
                    {"providerId": "password"},
                    {"providerId": "phone"}
                ],
                "createdAt": "1700000000000",
                "lastLoginAt": "1700000100000"
            }]
        }))
        .unwrap();
        let record = payload.users.into_iter().next().unwrap().into_record();
        assert_eq!(record.local_id, "user-1");
        assert!(record.email_verified);
        assert_eq!(record.providers, vec!["password", "phone"]);
        assert_eq!(
            record.created_at.unwrap().timestamp_millis(),
            1_700_000_000_000
        );
    }

    #[test]
    fn test_auth_uri_payload_defaults() {
        let payload: AuthUriPayload = decode(json!({})).unwrap();
        assert!(!payload.registered);
        assert!(payload.all_providers.is_empty());
    }

    #[test]
    fn test_sign_up_request_omits_absent_credentials() {
        let body = encode(&SignUpRequest {
            email: None,
            password: None,
            return_secure_token: true,
        })
        .unwrap();
        assert_eq!(body, json!({"returnSecureToken": true}));
    }

    #[test]
    fn test_account_update_request_shapes() {
        let mut request = AccountUpdateRequest::for_token("id-1");
        request.delete_provider = Some(vec!["google.com"]);
        let body = encode(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "idToken": "id-1",
                "deleteProvider": ["google.com"],
                "returnSecureToken": true
            })
        );
    }

    #[test]
    fn test_refresh_request_grant_type() {
        let body = encode(&RefreshRequest::new("refresh-1")).unwrap();
        assert_eq!(
            body,
            json!({"grant_type": "refresh_token", "refresh_token": "refresh-1"})
        );
    }
}
