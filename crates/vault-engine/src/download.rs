//! Download and preview: load, decrypt, verify integrity, and account for
//! the access.

use metadata_store::MetadataStore;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::{error, instrument};
use uuid::Uuid;
use vault_core::domain::AccessAction;
use vault_core::error::VaultError;

use crate::VaultEngine;

/// Whether a download's bytes should be offered for save (`attachment`) or
/// rendered in place (`inline`, previews only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// `Content-Disposition: attachment`.
    Attachment,
    /// `Content-Disposition: inline`.
    Inline,
}

/// Decrypted bytes plus the header-shape contract a transport layer needs to
/// emit them.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Decrypted plaintext.
    pub bytes: Vec<u8>,
    /// Declared MIME type, for `Content-Type`.
    pub mime: String,
    /// Sanitized original filename, for `Content-Disposition`.
    pub original_name: String,
    /// Plaintext length, for `Content-Length`.
    pub plaintext_size: u64,
    /// Attachment vs. inline.
    pub disposition: Disposition,
}

impl DownloadedFile {
    /// The `Content-Disposition` header value for this download.
    #[must_use]
    pub fn content_disposition_header(&self) -> String {
        let kind = match self.disposition {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        };
        let encoded = utf8_percent_encode(&self.original_name, NON_ALPHANUMERIC);
        format!("{kind}; filename=\"{encoded}\"")
    }
}

impl<S: MetadataStore> VaultEngine<S> {
    /// Download an owned, non-deleted file's decrypted bytes.
    ///
    /// Verifies `SHA-256(plaintext) == stored plaintext checksum` before
    /// returning bytes; a mismatch (or a GCM tag failure surfaced from the
    /// blob store) is [`VaultError::IntegrityFailure`] and leaves the blob
    /// and record untouched for forensic inspection, per the failure
    /// semantics in the design notes.
    #[instrument(skip(self))]
    pub fn download(&self, owner_id: Uuid, file_id: Uuid, now_ms: u64) -> Result<DownloadedFile, VaultError> {
        let mut record = self.owned_file(owner_id, file_id, false)?;
        let user = self.metadata.get_user(owner_id)?.ok_or(VaultError::NotFound)?;

        let plaintext = self.load_and_verify(&record, &user.user_key)?;

        record.access_log.push(now_ms, AccessAction::Download, owner_id.to_string());
        record.downloads_total += 1;
        self.metadata.update_file(record.clone())?;

        Ok(DownloadedFile {
            bytes: plaintext,
            mime: record.mime,
            original_name: record.original_name,
            plaintext_size: record.plaintext_size,
            disposition: Disposition::Attachment,
        })
    }

    /// Preview a file: same integrity gate as [`Self::download`], restricted
    /// to `image/*` MIME and served inline with a short cache lifetime.
    #[instrument(skip(self))]
    pub fn preview(&self, owner_id: Uuid, file_id: Uuid, now_ms: u64) -> Result<DownloadedFile, VaultError> {
        let mut record = self.owned_file(owner_id, file_id, false)?;
        if !record.mime.starts_with("image/") {
            return Err(VaultError::validation("preview is only available for images"));
        }
        let user = self.metadata.get_user(owner_id)?.ok_or(VaultError::NotFound)?;
        let plaintext = self.load_and_verify(&record, &user.user_key)?;

        record.access_log.push(now_ms, AccessAction::View, owner_id.to_string());
        self.metadata.update_file(record.clone())?;

        Ok(DownloadedFile {
            bytes: plaintext,
            mime: record.mime,
            original_name: record.original_name,
            plaintext_size: record.plaintext_size,
            disposition: Disposition::Inline,
        })
    }

    pub(crate) fn load_and_verify(
        &self,
        record: &metadata_store::FileRecord,
        user_key: &vault_crypto::UserKey,
    ) -> Result<Vec<u8>, VaultError> {
        let owner_dir = record.owner_id.to_string();
        let blob_id = record.blob_id();
        let plaintext = self
            .blobs
            .open_for_read(&owner_dir, &blob_id, &record.ext, user_key)
            .map_err(|e| {
                if matches!(e, blob_store::Error::NotFound) {
                    VaultError::MissingBlob
                } else if e.is_integrity_failure() {
                    error!(file_id = %record.id, "download: GCM tag verification failed");
                    VaultError::IntegrityFailure
                } else {
                    VaultError::CryptoFailure
                }
            })?;

        if vault_crypto::hash(&plaintext) != record.plaintext_checksum {
            error!(file_id = %record.id, "download: plaintext checksum mismatch");
            return Err(VaultError::IntegrityFailure);
        }
        Ok(plaintext)
    }
}
