//! Authorization decisions.
//!
//! Every privileged handler runs its request through [`authorize`] before it
//! touches storage. The policy only inspects the verification outcome and the
//! ownership fields the caller already loaded; it never writes anything.
//!
//! Which roles each operation accepts:
//!
//! | Operation                                   | Accepted                      |
//! |---------------------------------------------|-------------------------------|
//! | newPost, newComment, like, user edit        | any valid token               |
//! | editPost, deletePost                        | owner (`Post.author`)         |
//! | deleteComment                               | owner (`Comment.sender`)      |
//! | user verify                                 | owner (the `uid` presented)   |
//! | everything under `/admin`                   | `ADMIN` only (not `SYSTEM`)   |
//!
//! Deleting a `SYSTEM` account is refused regardless of who asks.

use thiserror::Error;

use super::token::{IdentityClaims, Verification};
use crate::db::{Role, User};

/// Roles accepted by the moderation surface
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzErrorKind {
    /// No valid token was presented
    Unauthenticated,
    /// Valid token, but wrong role or not the owner
    Forbidden,
    /// The referenced resource does not exist
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthzError {
    pub kind: AuthzErrorKind,
    pub message: String,
}

impl AuthzError {
    pub fn new(kind: AuthzErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(AuthzErrorKind::Unauthenticated, "invalid or missing token")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(AuthzErrorKind::Forbidden, message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(AuthzErrorKind::NotFound, format!("{} not found", what))
    }
}

/// What a caller must satisfy
#[derive(Debug, Clone, Copy)]
pub enum Requirement<'a> {
    /// Any valid token
    Authenticated,
    /// Caller's role must be one of these
    Role(&'a [Role]),
    /// Caller must be the user with this id
    Owner(i64),
}

/// Decide whether the verified caller meets `requirement`.
///
/// On success the caller's claims are returned so handlers never have to look
/// at an unverified identity.
pub fn authorize<'v>(
    verification: &'v Verification,
    requirement: Requirement<'_>,
) -> Result<&'v IdentityClaims, AuthzError> {
    let claims = match verification {
        Verification::Valid(claims) => claims,
        Verification::Anonymous => {
            tracing::debug!("Denied anonymous caller");
            return Err(AuthzError::unauthenticated());
        }
    };

    match requirement {
        Requirement::Authenticated => Ok(claims),
        Requirement::Role(accepted) => {
            if accepted.contains(&claims.role) {
                Ok(claims)
            } else {
                tracing::debug!(uid = claims.id, role = %claims.role, "Denied by role");
                Err(AuthzError::forbidden("not permitted"))
            }
        }
        Requirement::Owner(owner) => {
            if claims.id == owner {
                Ok(claims)
            } else {
                tracing::debug!(uid = claims.id, owner = owner, "Denied non-owner");
                Err(AuthzError::forbidden("not permitted"))
            }
        }
    }
}

/// Turn a lookup result into a not-found denial
pub fn require_found<T>(resource: Option<T>, what: &str) -> Result<T, AuthzError> {
    resource.ok_or_else(|| AuthzError::not_found(what))
}

/// The account behind a valid token must still exist.
///
/// Tokens outlive account deletion, so a missing row means the identity is
/// gone and the caller is treated as unauthenticated.
pub fn require_account(account: Option<User>) -> Result<User, AuthzError> {
    account.ok_or_else(|| {
        tracing::debug!("Denied token of a deleted account");
        AuthzError::unauthenticated()
    })
}

/// Refuse to delete reserved `SYSTEM` accounts
pub fn protect_system_account(target: &User) -> Result<(), AuthzError> {
    if target.role_enum() == Role::System {
        return Err(AuthzError::forbidden("system accounts cannot be deleted"));
    }
    Ok(())
}
