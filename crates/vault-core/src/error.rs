//! The closed error taxonomy shared by every core component.
//!
//! Each variant carries its own HTTP disposition via [`VaultError::status_code`]
//! and a caller-visible message via [`VaultError::public_message`]; the
//! transport layer (out of scope for this crate) is expected to map the
//! former to a status line and the latter to the `message` field of the
//! envelope described in the API contract.

use thiserror::Error;

/// Closed sum of every error a core operation can return.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A request failed field validation (400).
    #[error("{0}")]
    Validation(String),
    /// Credentials were missing, malformed, or did not verify (401).
    #[error("authentication failed")]
    AuthFailure,
    /// The account is locked out after repeated failed logins (423).
    #[error("account is locked")]
    AccountLocked,
    /// The caller is authenticated but not authorized for this resource (403).
    #[error("forbidden")]
    Forbidden,
    /// The requested resource does not exist, or is hidden by soft-delete (404).
    #[error("not found")]
    NotFound,
    /// A uniqueness constraint was violated (400/409).
    #[error("{0}")]
    AlreadyExists(String),
    /// The request would push the account's storage-used over its limit (400).
    #[error("storage quota exceeded")]
    QuotaExceeded,
    /// The share token is absent, expired, exhausted, or revoked (410).
    #[error("share is no longer valid")]
    ShareExpired,
    /// The caller exceeded the request rate limit (429).
    #[error("rate limited")]
    RateLimited,
    /// Stored ciphertext failed authentication or its checksum no longer matches (500).
    #[error("integrity check failed")]
    IntegrityFailure,
    /// A metadata record references a blob that is not present on disk.
    ///
    /// Surfaced as 404 on the owner-download path (no blob behind this
    /// record) and as 500 when the engine itself could not find a blob it
    /// just wrote.
    #[error("blob is missing")]
    MissingBlob,
    /// Encryption, decryption, or key derivation failed for a reason other
    /// than a tag/checksum mismatch (500, generic message only).
    #[error("cryptographic operation failed")]
    CryptoFailure,
    /// Anything else: logged in full, surfaced to the caller as a generic 500.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

/// HTTP status code a transport layer should map each variant to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u16);

impl VaultError {
    /// The HTTP status code this error maps to.
    ///
    /// `MissingBlob` is contextual: the engine resolves it to 404 or 500
    /// depending on whether the caller is reading their own record (missing
    /// blob behind a live record is a 404) or the engine itself expected the
    /// blob to exist right after writing it (a 500). Callers needing the
    /// contextual variant should match on `VaultError::MissingBlob` directly
    /// rather than relying on this default.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode(match self {
            Self::Validation(_) => 400,
            Self::AuthFailure => 401,
            Self::AccountLocked => 423,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::AlreadyExists(_) => 400,
            Self::QuotaExceeded => 400,
            Self::ShareExpired => 410,
            Self::RateLimited => 429,
            Self::IntegrityFailure => 500,
            Self::MissingBlob => 404,
            Self::CryptoFailure | Self::Internal(_) => 500,
        })
    }

    /// The message that is safe to return to the caller verbatim.
    ///
    /// Operational errors (validation, auth, quota, share state) carry their
    /// real message. Errors that could leak implementation detail
    /// (`IntegrityFailure`, `CryptoFailure`, `Internal`) are flattened to a
    /// generic string; the real detail still lives behind `tracing::error!`
    /// at the call site.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::IntegrityFailure | Self::CryptoFailure | Self::Internal(_) => {
                "an internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Construct a validation error from a `Display`-able reason.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Construct an already-exists error naming the conflicting field.
    pub fn already_exists(field: impl Into<String>) -> Self {
        Self::AlreadyExists(field.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_failure_message_is_generic() {
        let e = VaultError::IntegrityFailure;
        assert_eq!(e.public_message(), "an internal error occurred");
        assert_eq!(e.status_code().0, 500);
    }

    #[test]
    fn validation_message_passes_through() {
        let e = VaultError::validation("username must be 3-30 characters");
        assert_eq!(e.public_message(), "username must be 3-30 characters");
        assert_eq!(e.status_code().0, 400);
    }

    #[test]
    fn account_locked_maps_to_423() {
        assert_eq!(VaultError::AccountLocked.status_code().0, 423);
    }
}
