//! Identity gate: turns the opaque token presented by a client into an
//! [`AuthorizedIdentity`] that every other service requires.

use std::fmt;
use std::sync::Arc;

use axum::http::HeaderMap;

use crate::error::ServiceError;

/// Header carrying the opaque authenticated identifier issued by the external
/// identity collaborator.
pub const IDENTITY_HEADER: &str = "x-identity-token";

const MAX_IDENTITY_LENGTH: usize = 128;

/// An identity that passed the gate. Other components accept only this type,
/// so unauthenticated callers can never reach the queue or a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthorizedIdentity(String);

impl AuthorizedIdentity {
    /// Borrow the underlying opaque identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the gate output, yielding the raw identifier for persistence.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AuthorizedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Abstraction over the external identity provider.
///
/// The default implementation only sanity-checks the token shape; a real
/// deployment plugs in a verifier that talks to its auth backend.
pub trait IdentityVerifier: Send + Sync {
    /// Validate a raw token and return the identity it authenticates.
    fn verify(&self, raw: &str) -> Result<AuthorizedIdentity, ServiceError>;
}

/// Verifier accepting any well-formed opaque token.
#[derive(Debug, Default)]
pub struct OpaqueTokenVerifier;

impl IdentityVerifier for OpaqueTokenVerifier {
    fn verify(&self, raw: &str) -> Result<AuthorizedIdentity, ServiceError> {
        let token = raw.trim();

        if token.is_empty() {
            return Err(ServiceError::Unauthenticated("empty identity token".into()));
        }

        if token.len() > MAX_IDENTITY_LENGTH {
            return Err(ServiceError::Unauthenticated(format!(
                "identity token exceeds {MAX_IDENTITY_LENGTH} characters"
            )));
        }

        if !token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@'))
        {
            return Err(ServiceError::Unauthenticated(
                "identity token contains unexpected characters".into(),
            ));
        }

        Ok(AuthorizedIdentity(token.to_string()))
    }
}

/// Shared verifier handle stored in the application state.
pub type SharedVerifier = Arc<dyn IdentityVerifier>;

/// Run the identity gate against the request headers.
pub fn authorize(
    verifier: &dyn IdentityVerifier,
    headers: &HeaderMap,
) -> Result<AuthorizedIdentity, ServiceError> {
    let raw = headers
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ServiceError::Unauthenticated(format!("missing `{IDENTITY_HEADER}` header"))
        })?;

    verifier.verify(raw)
}
