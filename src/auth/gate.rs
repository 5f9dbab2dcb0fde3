//! Role-based authorization over verified token claims.
//!
//! A caller passes the gate iff `realm_access.roles` decodes to a list of
//! strings that contains the required role. A payload without that structure is
//! an authentication problem (401); a well-formed role list without the role is
//! an authorization problem (403).

use thiserror::Error;

use super::claims::Claims;
use super::verifier::VerifiedToken;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("token does not carry realm_access.roles")]
    MissingClaims,

    #[error("role '{role}' not granted")]
    RoleNotPresent { role: String },
}

/// Check the decoded claims of `token` for `required_role`
pub fn authorize_role(token: &VerifiedToken, required_role: &str) -> Result<Claims, AuthzError> {
    let claims = Claims::from_payload(token.payload()).map_err(|e| {
        tracing::debug!("Claims did not decode: {}", e);
        AuthzError::MissingClaims
    })?;

    check_role(&claims, required_role)?;
    Ok(claims)
}

pub fn check_role(claims: &Claims, required_role: &str) -> Result<(), AuthzError> {
    let roles = claims.realm_roles().ok_or(AuthzError::MissingClaims)?;

    if roles.iter().any(|role| role == required_role) {
        Ok(())
    } else {
        Err(AuthzError::RoleNotPresent {
            role: required_role.to_string(),
        })
    }
}
