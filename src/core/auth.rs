//! Identity for connections and mutation callers
//!
//! Tokens are opaque to the rest of the crate: a [`TokenVerifier`] exchanges
//! one for an [`Identity`] `{actor_id, role, expires_at}`. The bundled
//! [`JwtVerifier`] accepts HS256 tokens with `userId` / `role` claims.

use crate::core::error::AuthError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of actor behind a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Customer app; legacy login tokens carry role `USER`
    #[serde(alias = "USER")]
    Customer,
    /// Restaurant / store dashboard
    Restaurant,
    /// Rider app
    Rider,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Customer, Role::Restaurant, Role::Rider];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Restaurant => "RESTAURANT",
            Role::Rider => "RIDER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified actor identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub actor_id: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Who is triggering a state-changing operation
#[derive(Debug, Clone)]
pub enum Caller {
    /// A token-bearing actor
    Actor(Identity),

    /// The in-process CRUD layer acting on its own authority.
    /// Never derived from a token.
    Operator,
}

impl Caller {
    pub fn actor_id(&self) -> Option<&str> {
        match self {
            Caller::Actor(identity) => Some(&identity.actor_id),
            Caller::Operator => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Caller::Actor(identity) => Some(identity.role),
            Caller::Operator => None,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Caller::Operator)
    }

    /// True when the caller is the given actor in the given role
    pub fn is(&self, role: Role, actor_id: &str) -> bool {
        match self {
            Caller::Actor(identity) => identity.role == role && identity.actor_id == actor_id,
            Caller::Operator => false,
        }
    }
}

/// Exchanges an opaque token for an identity
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// JWT claims as issued by the login mutations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 JWT verifier
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token for an actor.
    ///
    /// Token issuance belongs to the login flow; this is kept for tooling and tests.
    pub fn issue(&self, actor_id: &str, role: Role, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            user_id: actor_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken {
                    message: e.to_string(),
                },
            })?;

        let expires_at = Utc
            .timestamp_opt(data.claims.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidToken {
                message: format!("bad exp claim {}", data.claims.exp),
            })?;

        if data.claims.user_id.is_empty() {
            return Err(AuthError::InvalidToken {
                message: "empty userId claim".to_string(),
            });
        }

        Ok(Identity {
            actor_id: data.claims.user_id,
            role: data.claims.role,
            expires_at,
        })
    }
}
