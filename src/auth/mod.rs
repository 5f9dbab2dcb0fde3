//! Identity: token verification, typed claims and the role gate.

pub mod basic;
pub mod claims;
pub mod gate;
pub mod verifier;

pub use claims::{Claims, RealmAccess};
pub use gate::{authorize_role, AuthzError};
pub use verifier::{OidcVerifier, TokenVerifier, VerifiedToken, VerifyError};
