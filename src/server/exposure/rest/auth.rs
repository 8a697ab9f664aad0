//! Request identity extractors
//!
//! Actors authenticate with `Authorization: Bearer <jwt>`. The CRUD layer
//! acts as operator by presenting the configured `x-operator-key`; an
//! operator is never derived from a token.

use crate::core::auth::{Caller, Identity};
use crate::core::error::{AuthError, CourierError};
use crate::server::host::ServerHost;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use std::sync::Arc;

pub const OPERATOR_KEY_HEADER: &str = "x-operator-key";

/// A verified token-bearing actor
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

/// An actor or the operator
#[derive(Debug, Clone)]
pub struct AuthCaller(pub Caller);

impl FromRequestParts<Arc<ServerHost>> for Authenticated {
    type Rejection = CourierError;

    async fn from_request_parts(
        parts: &mut Parts,
        host: &Arc<ServerHost>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::Unauthenticated)?;
        let identity = host.verifier.verify(token).await?;
        Ok(Authenticated(identity))
    }
}

impl FromRequestParts<Arc<ServerHost>> for AuthCaller {
    type Rejection = CourierError;

    async fn from_request_parts(
        parts: &mut Parts,
        host: &Arc<ServerHost>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(key) = parts
            .headers
            .get(OPERATOR_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if host.is_operator_key(key) {
                return Ok(AuthCaller(Caller::Operator));
            }
            return Err(AuthError::Forbidden {
                message: "invalid operator key".to_string(),
            }
            .into());
        }

        let Authenticated(identity) = Authenticated::from_request_parts(parts, host).await?;
        Ok(AuthCaller(Caller::Actor(identity)))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
