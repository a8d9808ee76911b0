//! Identity and authorization: token handling plus the role/ownership policy.

pub mod policy;
pub mod token;

pub use policy::{
    authorize, protect_system_account, require_account, require_found, AuthzError, AuthzErrorKind,
    Requirement, ADMIN_ONLY,
};
pub use token::{IdentityClaims, TokenService, Verification, ANONYMOUS_ID};
