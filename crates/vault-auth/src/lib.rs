//! JWT bearer-token issuance and verification.
//!
//! Tokens are HS256, carrying the claims `{id, username, role, iat, exp, iss}`.
//! Verification is two-step: first the signature and expiry (delegated to
//! `jsonwebtoken`), then a password-changed-at check — a token issued before
//! the account's last password change is rejected even if it has not yet
//! expired, so a stolen-but-unexpired token is invalidated by a password
//! reset.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use vault_core::domain::Role;
use vault_core::error::VaultError;

/// The token issuer claim, asserted on encode and checked on decode.
pub const ISSUER: &str = "secure-file-upload";

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub id: String,
    /// The username at time of issuance (display convenience, not authoritative).
    pub username: String,
    /// The user's role at time of issuance.
    pub role: Role,
    /// Issued-at, seconds since the epoch.
    pub iat: u64,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
    /// Issuer; always [`ISSUER`].
    pub iss: String,
}

/// Issue a signed bearer token for `id`/`username`/`role`, valid for `ttl_secs`
/// starting at `now_secs`.
pub fn issue_token(
    secret: &[u8],
    id: &str,
    username: &str,
    role: Role,
    now_secs: u64,
    ttl_secs: u64,
) -> Result<String, VaultError> {
    let claims = Claims {
        id: id.to_string(),
        username: username.to_string(),
        role,
        iat: now_secs,
        exp: now_secs + ttl_secs,
        iss: ISSUER.to_string(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| VaultError::validation(format!("failed to issue token: {e}")))
}

/// Verify a bearer token's signature, expiry, and issuer.
///
/// This alone does not account for password rotation; callers must also call
/// [`check_not_superseded`] against the account's `password_changed_at_secs`.
pub fn verify_token(secret: &[u8], token: &str) -> Result<Claims, VaultError> {
    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);
    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|_| VaultError::AuthFailure)
}

/// Reject a token issued before the account's last password change.
///
/// A password change should invalidate every bearer token minted before it,
/// even ones that have not yet expired; this is the check that enforces that.
pub fn check_not_superseded(
    claims: &Claims,
    password_changed_at_secs: u64,
) -> Result<(), VaultError> {
    if claims.iat < password_changed_at_secs {
        return Err(VaultError::AuthFailure);
    }
    Ok(())
}

/// Verify a token's signature, expiry, issuer, and that it postdates the
/// account's last password change, in one call.
pub fn verify_current(
    secret: &[u8],
    token: &str,
    password_changed_at_secs: u64,
) -> Result<Claims, VaultError> {
    let claims = verify_token(secret, token)?;
    check_not_superseded(&claims, password_changed_at_secs)?;
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-not-for-production";

    #[test]
    fn issue_then_verify_round_trips() {
        let token = issue_token(SECRET, "u1", "alice", Role::User, 1_000, 3_600).unwrap();
        let claims = verify_token(SECRET, &token).unwrap();
        assert_eq!(claims.id, "u1");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn expired_token_fails() {
        let token = issue_token(SECRET, "u1", "alice", Role::User, 0, 10).unwrap();
        // jsonwebtoken checks exp against current wall-clock time, and any
        // token minted at epoch 0 with a 10s TTL is long past expiry.
        assert!(verify_token(SECRET, &token).is_err());
    }

    #[test]
    fn wrong_secret_fails() {
        let token = issue_token(SECRET, "u1", "alice", Role::User, 1_000, 3_600).unwrap();
        assert!(verify_token(b"wrong-secret", &token).is_err());
    }

    #[test]
    fn token_issued_before_password_change_is_rejected() {
        let token = issue_token(SECRET, "u1", "alice", Role::User, 1_000, 3_600).unwrap();
        let claims = verify_token(SECRET, &token).unwrap();
        assert!(check_not_superseded(&claims, 1_000).is_ok());
        assert!(check_not_superseded(&claims, 1_001).is_err());
    }

    #[test]
    fn verify_current_combines_both_checks() {
        let token = issue_token(SECRET, "u1", "alice", Role::User, 1_000, 3_600).unwrap();
        assert!(verify_current(SECRET, &token, 999).is_ok());
        assert!(verify_current(SECRET, &token, 1_500).is_err());
    }
}
