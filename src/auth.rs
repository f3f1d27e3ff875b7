//! Verification of the `x-integration-app-token` header sent with webhooks.
//!
//! The token is an HS256 JWT signed with the workspace secret.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::schemas::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_HEADER: &str = "x-integration-app-token";

const UNKNOWN_USER: &str = "unknown";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing x-integration-app-token header")]
    MissingToken,

    #[error("webhook secret is not configured")]
    MissingSecret,

    #[error("malformed token")]
    Malformed,

    #[error("unsupported token algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("invalid token signature")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,
}

#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
}

/// Claims carried by a verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    /// Workspace key.
    pub iss: Option<String>,
    /// Legacy user id.
    pub sub: Option<String>,
    pub id: Option<String>,
    pub fields: Option<Value>,
}

impl TokenClaims {
    /// The acting user: `id`, then `sub`, then `"unknown"`.
    pub fn user_id(&self) -> String {
        self.id
            .clone()
            .or_else(|| self.sub.clone())
            .unwrap_or_else(|| UNKNOWN_USER.to_string())
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, AuthError> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| AuthError::Malformed)
}

/// Claims may carry ids as strings or numbers.
fn claim_text(claims: &Value, key: &str) -> Option<String> {
    match claims.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Checks algorithm, signature and the optional `exp`/`nbf` claims.
pub fn verify_token(token: &str, secret: &str, now: i64) -> Result<TokenClaims, AuthError> {
    let token = token.trim();
    let Some((signing_input, signature)) = token.rsplit_once('.') else {
        return Err(AuthError::Malformed);
    };
    let Some((header, payload)) = signing_input.split_once('.') else {
        return Err(AuthError::Malformed);
    };
    if payload.contains('.') {
        return Err(AuthError::Malformed);
    }

    let header: TokenHeader =
        serde_json::from_slice(&decode_segment(header)?).map_err(|_| AuthError::Malformed)?;
    if header.alg != "HS256" {
        return Err(AuthError::UnsupportedAlgorithm(header.alg));
    }

    let signature = decode_segment(signature)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::BadSignature)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::BadSignature)?;

    let claims: Value =
        serde_json::from_slice(&decode_segment(payload)?).map_err(|_| AuthError::Malformed)?;

    if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
        if now >= exp {
            return Err(AuthError::Expired);
        }
    }
    if let Some(nbf) = claims.get("nbf").and_then(Value::as_i64) {
        if now < nbf {
            return Err(AuthError::NotYetValid);
        }
    }

    Ok(TokenClaims {
        iss: claim_text(&claims, "iss"),
        sub: claim_text(&claims, "sub"),
        id: claim_text(&claims, "id"),
        fields: claims.get("fields").cloned(),
    })
}

/// Extractor for webhook routes. Rejects with 401 before the body is read.
#[derive(Debug, Clone)]
pub struct IntegrationToken(pub TokenClaims);

#[async_trait]
impl FromRequestParts<AppState> for IntegrationToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(secret) = state.settings.workspace_secret.as_deref() else {
            warn!("Rejecting webhook: no workspace secret configured");
            return Err(AuthError::MissingSecret.into());
        };

        let token = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        match verify_token(token, secret, Utc::now().timestamp()) {
            Ok(claims) => {
                debug!("Webhook token verified for user {}", claims.user_id());
                Ok(IntegrationToken(claims))
            }
            Err(e) => {
                warn!("Rejecting webhook token: {}", e);
                Err(e.into())
            }
        }
    }
}

/// Signs `claims` the way the integration platform does. Used by tests to
/// produce valid tokens.
#[cfg(test)]
pub fn sign_token(claims: &Value, secret: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{header}.{payload}");

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{signing_input}.{signature}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "workspace-secret";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_valid_token_yields_claims() {
        let token = sign_token(&json!({"iss": "ws-key", "id": "user-1", "sub": "legacy"}), SECRET);
        let claims = verify_token(&token, SECRET, NOW).unwrap();
        assert_eq!(claims.iss.as_deref(), Some("ws-key"));
        assert_eq!(claims.user_id(), "user-1");
    }

    #[test]
    fn test_user_id_falls_back_to_sub_then_unknown() {
        let token = sign_token(&json!({"sub": 42}), SECRET);
        assert_eq!(verify_token(&token, SECRET, NOW).unwrap().user_id(), "42");

        let token = sign_token(&json!({"iss": "ws-key"}), SECRET);
        assert_eq!(verify_token(&token, SECRET, NOW).unwrap().user_id(), "unknown");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = sign_token(&json!({"id": "user-1"}), "other-secret");
        assert_eq!(verify_token(&token, SECRET, NOW), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let token = sign_token(&json!({"id": "user-1"}), SECRET);
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(json!({"id": "admin"}).to_string());
        parts[1] = &forged;
        assert_eq!(verify_token(&parts.join("."), SECRET, NOW), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_time_claims() {
        let expired = sign_token(&json!({"id": "u", "exp": NOW - 1}), SECRET);
        assert_eq!(verify_token(&expired, SECRET, NOW), Err(AuthError::Expired));

        let early = sign_token(&json!({"id": "u", "nbf": NOW + 60}), SECRET);
        assert_eq!(verify_token(&early, SECRET, NOW), Err(AuthError::NotYetValid));

        let valid = sign_token(&json!({"id": "u", "exp": NOW + 60, "nbf": NOW - 60}), SECRET);
        assert!(verify_token(&valid, SECRET, NOW).is_ok());
    }

    #[test]
    fn test_other_algorithms_and_garbage() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"id":"u"}"#);
        assert_eq!(
            verify_token(&format!("{header}.{payload}."), SECRET, NOW),
            Err(AuthError::UnsupportedAlgorithm("none".to_string()))
        );
        assert_eq!(verify_token("not-a-jwt", SECRET, NOW), Err(AuthError::Malformed));
    }
}
