//! Bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying the caller's identity claims plus `iat` and
//! `exp`. Nothing is stored server-side; a token stops working only when it
//! expires.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::db::{Role, User};

/// Identifier reported for callers without a valid token.
///
/// Real user ids start at 1 and only grow, so this can never name an account.
pub const ANONYMOUS_ID: i64 = -1;

/// Identity embedded in every issued token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub sex: String,
}

impl From<&User> for IdentityClaims {
    fn from(user: &User) -> Self {
        Self {
            id: user.uid,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role_enum(),
            sex: user.sex.clone(),
        }
    }
}

/// On-the-wire JWT payload
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    #[serde(flatten)]
    identity: IdentityClaims,
    /// Issued at (Unix timestamp)
    iat: i64,
    /// Expiration (Unix timestamp)
    exp: i64,
}

/// Outcome of checking a presented token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Signature and expiry checked out
    Valid(IdentityClaims),
    /// Missing, malformed, tampered or expired token
    Anonymous,
}

impl Verification {
    /// Caller id, or [`ANONYMOUS_ID`] when the token did not verify
    pub fn id(&self) -> i64 {
        match self {
            Verification::Valid(claims) => claims.id,
            Verification::Anonymous => ANONYMOUS_ID,
        }
    }

    pub fn claims(&self) -> Option<&IdentityClaims> {
        match self {
            Verification::Valid(claims) => Some(claims),
            Verification::Anonymous => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid(_))
    }
}

/// Signs and checks tokens with one process-wide secret
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(&auth.resolve_secret(), auth.token_ttl())
    }

    /// Sign `claims` into a token valid for the configured lifetime
    pub fn issue(&self, claims: &IdentityClaims) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(claims, Utc::now())
    }

    fn issue_at(
        &self,
        claims: &IdentityClaims,
        issued_at: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let payload = TokenClaims {
            identity: claims.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
    }

    /// Check a presented token.
    ///
    /// Every failure collapses to [`Verification::Anonymous`]; a bad token is an
    /// ordinary outcome for public requests, not an error.
    pub fn verify(&self, token: &str) -> Verification {
        let token = token.trim();
        if token.is_empty() {
            return Verification::Anonymous;
        }

        match decode::<TokenClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => Verification::Valid(data.claims.identity),
            Err(e) => {
                tracing::debug!(error = %e, "Token rejected");
                Verification::Anonymous
            }
        }
    }
}
