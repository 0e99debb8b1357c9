//! Caller identity as asserted by the access proxy in front of the server.
//!
//! The proxy authenticates the browser and forwards the email in a header.
//! When only the signed assertion is forwarded, the `email` claim of its
//! payload is used instead; verifying the signature is the proxy's job.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use quiz_core::model::UserEmail;
use serde::Deserialize;
use services::ACCESS_EMAIL_HEADER;
use tracing::debug;

use crate::error::AppError;

pub const ACCESS_ASSERTION_HEADER: &str = "cf-access-jwt-assertion";

/// Extractor for the authenticated user; rejects with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserEmail);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = asserted_email(&parts.headers).ok_or(AppError::Unauthenticated)?;
        Ok(Self(UserEmail::parse(&raw)?))
    }
}

#[derive(Deserialize)]
struct AccessClaims {
    email: Option<String>,
}

fn asserted_email(headers: &HeaderMap) -> Option<String> {
    let direct = headers
        .get(ACCESS_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(email) = direct {
        return Some(email.to_owned());
    }

    let token = headers.get(ACCESS_ASSERTION_HEADER)?.to_str().ok()?;
    let email = email_claim(token);
    if email.is_none() {
        debug!("access assertion carried no usable email claim");
    }
    email
}

fn email_claim(token: &str) -> Option<String> {
    let payload = token.trim().split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: AccessClaims = serde_json::from_slice(&bytes).ok()?;
    claims.email.filter(|e| !e.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn assertion(payload: &str) -> String {
        format!("e30.{}.c2ln", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn header_wins_over_assertion() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_EMAIL_HEADER, HeaderValue::from_static(" a@example.com "));
        headers.insert(
            ACCESS_ASSERTION_HEADER,
            HeaderValue::from_str(&assertion(r#"{"email":"b@example.com"}"#)).unwrap(),
        );
        assert_eq!(asserted_email(&headers).as_deref(), Some("a@example.com"));
    }

    #[test]
    fn assertion_payload_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCESS_ASSERTION_HEADER,
            HeaderValue::from_str(&assertion(r#"{"email":"b@example.com","sub":"x"}"#)).unwrap(),
        );
        assert_eq!(asserted_email(&headers).as_deref(), Some("b@example.com"));
    }

    #[test]
    fn unusable_assertions_yield_nothing() {
        assert_eq!(email_claim("not-a-jwt"), None);
        assert_eq!(email_claim(&assertion(r#"{"sub":"x"}"#)), None);
        assert_eq!(email_claim(&assertion("42")), None);
        assert_eq!(asserted_email(&HeaderMap::new()), None);
    }
}
