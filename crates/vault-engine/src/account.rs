//! Registration, login, password change, and account deactivation.

use metadata_store::{MetadataStore, User};
use quota::{AccountLock, StorageQuota};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use vault_core::domain::Role;
use vault_core::error::VaultError;
use vault_core::validation::{validate_email, validate_password, validate_username, DEFAULT_STORAGE_LIMIT_BYTES};

use crate::VaultEngine;

/// Input to [`VaultEngine::register`].
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    /// Desired username.
    pub username: String,
    /// Desired email.
    pub email: String,
    /// Plaintext password (validated, then hashed; never stored raw).
    pub password: String,
}

/// The outcome of a successful login: the account's sanitized view plus the
/// instant to stamp on any bearer token the caller issues from it.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    /// The authenticated account.
    pub user: metadata_store::SanitizedUser,
    /// The user's role, for token claims.
    pub role: Role,
    /// The account id, for token claims.
    pub id: Uuid,
}

impl<S: MetadataStore> VaultEngine<S> {
    /// Register a new account. Generates the user's file-encryption key
    /// before first persistence, per the data model's lifecycle note.
    #[instrument(skip(self, input))]
    pub fn register(
        &self,
        input: RegisterInput,
        now_ms: u64,
    ) -> Result<metadata_store::SanitizedUser, VaultError> {
        validate_username(&input.username)?;
        let email = validate_email(&input.email)?;
        validate_password(&input.password)?;

        let user = User {
            id: Uuid::new_v4(),
            username: input.username,
            email,
            password_hash: vault_crypto::password_hash(&input.password)
                .map_err(|_| VaultError::CryptoFailure)?,
            user_key: vault_crypto::generate_user_key(),
            role: Role::User,
            active: true,
            quota: StorageQuota::new(DEFAULT_STORAGE_LIMIT_BYTES),
            lock: AccountLock::new(),
            last_login_ms: None,
            password_changed_at_ms: now_ms,
            created_at_ms: now_ms,
        };
        let created = self.metadata.create_user(user)?;
        tracing::info!(user_id = %created.id, "account registered");
        Ok(created.sanitized())
    }

    /// Authenticate by email and password. Checks the account lock before
    /// verifying, and records the outcome (failure or success) on the
    /// stored [`User`] itself, so the lock state machine has one writer.
    #[instrument(skip(self, password))]
    pub fn login(&self, email: &str, password: &str, now_ms: u64) -> Result<LoginOutcome, VaultError> {
        let mut user = self
            .metadata
            .get_user_by_email(email)?
            .filter(|u| u.active)
            .ok_or(VaultError::AuthFailure)?;

        user.lock.check(now_ms)?;

        let verified = vault_crypto::password_verify(password, &user.password_hash)
            .map_err(|_| VaultError::CryptoFailure)?;
        if !verified {
            user.lock.record_failure(now_ms);
            self.metadata.update_user(user)?;
            return Err(VaultError::AuthFailure);
        }

        user.lock.record_success();
        user.last_login_ms = Some(now_ms);
        let updated = self.metadata.update_user(user)?;
        tracing::info!(user_id = %updated.id, "login succeeded");
        Ok(LoginOutcome { id: updated.id, role: updated.role, user: updated.sanitized() })
    }

    /// Change a user's password, bumping `password_changed_at_ms` so every
    /// bearer token minted before this instant is rejected on next use.
    #[instrument(skip(self, current_password, new_password))]
    pub fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        now_ms: u64,
    ) -> Result<(), VaultError> {
        let mut user = self.metadata.get_user(user_id)?.filter(|u| u.active).ok_or(VaultError::NotFound)?;
        let verified = vault_crypto::password_verify(current_password, &user.password_hash)
            .map_err(|_| VaultError::CryptoFailure)?;
        if !verified {
            return Err(VaultError::AuthFailure);
        }
        validate_password(new_password)?;
        user.password_hash =
            vault_crypto::password_hash(new_password).map_err(|_| VaultError::CryptoFailure)?;
        user.password_changed_at_ms = now_ms;
        self.metadata.update_user(user)?;
        tracing::info!(user_id = %user_id, "password changed");
        Ok(())
    }

    /// Deactivate an account. Files and blobs are left in place; this only
    /// flips the active flag, per the data model's "deactivated, not
    /// destroyed" lifecycle note.
    #[instrument(skip(self))]
    pub fn deactivate_account(&self, user_id: Uuid) -> Result<(), VaultError> {
        let mut user = self.metadata.get_user(user_id)?.ok_or(VaultError::NotFound)?;
        user.active = false;
        self.metadata.update_user(user)?;
        Ok(())
    }
}
