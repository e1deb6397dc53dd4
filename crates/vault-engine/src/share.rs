//! Anonymous, token-bearing share links: create, revoke, and consume.

use metadata_store::{MetadataStore, ShareToken};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use vault_core::domain::AccessAction;
use vault_core::error::VaultError;

use crate::download::{DownloadedFile, Disposition};
use crate::VaultEngine;

const SECONDS_PER_DAY: u64 = 86_400;
const DEFAULT_EXPIRES_IN_DAYS: u32 = 7;

/// Input to [`VaultEngine::create_share`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShareCreateInput {
    /// Days until expiry; `None` defaults to [`DEFAULT_EXPIRES_IN_DAYS`].
    pub expires_in_days: Option<u32>,
    /// Optional download cap.
    pub max_downloads: Option<u32>,
    /// Optional share password, recorded as a hash.
    pub password: Option<String>,
}

/// The outcome of creating a share.
#[derive(Debug, Clone, Serialize)]
pub struct ShareCreateOutcome {
    /// The full, caller-facing share URL.
    pub share_url: String,
    /// The raw token, hex-encoded.
    pub share_token: String,
    /// Milliseconds since the epoch at which the share stops being valid.
    pub expires_at_ms: u64,
    /// The configured download cap, if any.
    pub max_downloads: Option<u32>,
    /// Whether a password is required to consume this share.
    pub has_password: bool,
}

/// The result of consuming a share token.
#[derive(Debug, Clone)]
pub enum ShareConsumeOutcome {
    /// The share is password-protected and no password (or the wrong one
    /// implicitly re-asked) was supplied; this is a handshake step, not a
    /// failure.
    RequiresPassword,
    /// The share was valid and a password (if any) matched: here are the bytes.
    Downloaded(DownloadedFile),
}

impl<S: MetadataStore> VaultEngine<S> {
    /// Create (or replace) a share on an owned file. Replacing a share
    /// resets `download_count` to zero, per the state machine in the data model.
    #[instrument(skip(self, input))]
    pub fn create_share(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        input: ShareCreateInput,
        now_ms: u64,
        origin: &str,
    ) -> Result<ShareCreateOutcome, VaultError> {
        let mut record = self.owned_file(owner_id, file_id, false)?;
        let days = u64::from(input.expires_in_days.unwrap_or(DEFAULT_EXPIRES_IN_DAYS));
        let expires_at_ms = now_ms + days * SECONDS_PER_DAY * 1000;
        let password_hash = input
            .password
            .as_deref()
            .map(vault_crypto::password_hash)
            .transpose()
            .map_err(|_| VaultError::CryptoFailure)?;

        let share = ShareToken {
            token: vault_crypto::generate_share_token(),
            expires_at_ms,
            max_downloads: input.max_downloads,
            password_hash,
            download_count: 0,
            created_at_ms: now_ms,
        };

        let outcome = ShareCreateOutcome {
            share_url: format!("{origin}/api/files/shared/{}", share.token),
            share_token: share.token.clone(),
            expires_at_ms: share.expires_at_ms,
            max_downloads: share.max_downloads,
            has_password: share.password_hash.is_some(),
        };

        record.share = Some(share);
        record.access_log.push(now_ms, AccessAction::Share, owner_id.to_string());
        self.metadata.update_file(record)?;
        Ok(outcome)
    }

    /// Clear an owned file's share, atomically.
    #[instrument(skip(self))]
    pub fn revoke_share(&self, owner_id: Uuid, file_id: Uuid) -> Result<(), VaultError> {
        let mut record = self.owned_file(owner_id, file_id, false)?;
        record.share = None;
        self.metadata.update_file(record)?;
        Ok(())
    }

    /// Consume a share token anonymously. Runs the same integrity gate as an
    /// owner download and uses the owner's key, since the server — not the
    /// anonymous caller — holds key material.
    #[instrument(skip(self, password))]
    pub fn consume_share(
        &self,
        token: &str,
        password: Option<&str>,
        now_ms: u64,
    ) -> Result<ShareConsumeOutcome, VaultError> {
        let mut record = self.metadata.find_by_share_token(token)?.ok_or(VaultError::NotFound)?;
        let share = record.share.clone().ok_or(VaultError::NotFound)?;

        if !share.is_valid(now_ms) {
            return Err(VaultError::ShareExpired);
        }

        if let Some(hash) = &share.password_hash {
            match password {
                None => return Ok(ShareConsumeOutcome::RequiresPassword),
                Some(pw) => {
                    let ok = vault_crypto::password_verify(pw, hash)
                        .map_err(|_| VaultError::CryptoFailure)?;
                    if !ok {
                        return Err(VaultError::AuthFailure);
                    }
                }
            }
        }

        let user = self.metadata.get_user(record.owner_id)?.ok_or(VaultError::NotFound)?;
        let plaintext = self.load_and_verify(&record, &user.user_key)?;

        let mut share = share;
        share.download_count += 1;
        let token_prefix: String = share.token.chars().take(8).collect();
        record.share = Some(share);
        record.access_log.push(now_ms, AccessAction::Download, format!("share:{token_prefix}"));
        record.downloads_total += 1;
        self.metadata.update_file(record.clone())?;

        Ok(ShareConsumeOutcome::Downloaded(DownloadedFile {
            bytes: plaintext,
            mime: record.mime,
            original_name: record.original_name,
            plaintext_size: record.plaintext_size,
            disposition: Disposition::Attachment,
        }))
    }
}
