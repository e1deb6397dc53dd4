//! Batch upload: stage, encrypt, checksum, and commit each file, then settle
//! quota once for the whole batch.

use metadata_store::{FileRecord, MetadataStore};
use serde::Serialize;
use tracing::{instrument, warn};
use uuid::Uuid;
use vault_core::domain::Category;
use vault_core::error::VaultError;
use vault_core::validation::{
    is_allowed_mime, normalize_description, normalize_folder, normalize_tags, sanitize_filename,
    validate_batch_size, validate_file_size,
};

use crate::VaultEngine;

/// One file offered to [`VaultEngine::upload`].
#[derive(Debug, Clone)]
pub struct UploadInput {
    /// Client-declared original filename.
    pub name: String,
    /// Client-declared MIME type.
    pub mime: String,
    /// Plaintext bytes.
    pub bytes: Vec<u8>,
}

/// A successfully committed file from a batch upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadItemResult {
    /// The new file's id.
    pub id: Uuid,
    /// Sanitized original filename.
    pub name: String,
    /// Plaintext size in bytes.
    pub plaintext_size: u64,
    /// Declared MIME type.
    pub mime: String,
    /// Derived category.
    pub category: Category,
    /// Milliseconds since the epoch at which the record was created.
    pub created_at_ms: u64,
}

/// A per-file failure from a batch upload, keyed by the offered name so a
/// caller can correlate it back to the request slot.
#[derive(Debug, Clone, Serialize)]
pub struct UploadItemError {
    /// The offered filename.
    pub name: String,
    /// A caller-safe message.
    pub message: String,
}

/// The result of a batch upload: committed files plus per-file errors.
/// Never rolls back: a partial batch is the normal outcome of an error in one
/// slot, not a reason to undo the others.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadOutcome {
    /// Files that were staged, encrypted, and committed successfully.
    pub files: Vec<UploadItemResult>,
    /// Per-file failures.
    pub errors: Vec<UploadItemError>,
}

impl<S: MetadataStore> VaultEngine<S> {
    /// Upload a batch of files for `owner_id`, placing them in `folder` with
    /// `tags` and `description` applied to every file in the batch.
    ///
    /// The quota precondition is checked once against the sum of declared
    /// sizes before any byte is persisted: a batch either entirely fits or is
    /// refused outright. Once admitted, each file is processed independently;
    /// a failure partway through removes only that file's staged blob and
    /// continues with the rest.
    #[instrument(skip(self, inputs))]
    pub fn upload(
        &self,
        owner_id: Uuid,
        inputs: Vec<UploadInput>,
        folder: &str,
        tags: &[String],
        description: &str,
        now_ms: u64,
    ) -> Result<UploadOutcome, VaultError> {
        validate_batch_size(inputs.len())?;
        for item in &inputs {
            validate_file_size(item.bytes.len() as u64)?;
            if !is_allowed_mime(&item.mime) {
                return Err(VaultError::validation(format!(
                    "mime type {} is not in the allow-list",
                    item.mime
                )));
            }
        }

        let mut user = self.metadata.get_user(owner_id)?.filter(|u| u.active).ok_or(VaultError::NotFound)?;
        let total: u64 = inputs.iter().map(|i| i.bytes.len() as u64).sum();
        if !user.quota.has_capacity(total) {
            return Err(VaultError::QuotaExceeded);
        }

        let folder = normalize_folder(folder);
        let tags = normalize_tags(tags);
        let description = normalize_description(description);
        let owner_dir = owner_id.to_string();

        let mut outcome = UploadOutcome::default();
        let mut committed_bytes: u64 = 0;

        for item in inputs {
            let sanitized_name = sanitize_filename(&item.name);
            let ext = extension_of(&sanitized_name);
            let blob_id = Uuid::new_v4();
            let blob_id_str = blob_id.to_string();

            let staged = self.blobs.stage(&owner_dir, &blob_id_str, &ext, &item.bytes, &user.user_key);
            let write_outcome = match staged {
                Ok(o) => o,
                Err(e) => {
                    warn!(name = %sanitized_name, error = %e, "upload: stage failed");
                    outcome.errors.push(UploadItemError { name: sanitized_name, message: e.to_string() });
                    continue;
                }
            };

            let ciphertext_checksum = match vault_crypto::file_checksum(
                &self.blobs.blob_path(&owner_dir, &blob_id_str, &ext),
            ) {
                Ok(sum) => sum,
                Err(_) => {
                    let _ = self.blobs.remove(&owner_dir, &blob_id_str, &ext);
                    outcome.errors.push(UploadItemError {
                        name: sanitized_name,
                        message: "failed to checksum stored file".to_string(),
                    });
                    continue;
                }
            };

            let record = FileRecord {
                id: blob_id,
                owner_id,
                original_name: sanitized_name.clone(),
                ext: ext.clone(),
                mime: item.mime.clone(),
                plaintext_size: item.bytes.len() as u64,
                ciphertext_size: write_outcome.ciphertext_len,
                plaintext_checksum: write_outcome.plaintext_checksum,
                ciphertext_checksum,
                folder: folder.clone(),
                tags: tags.clone(),
                description: description.clone(),
                is_deleted: false,
                deleted_at_ms: None,
                share: None,
                access_log: access_log::AccessLog::new(),
                downloads_total: 0,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            };

            match self.metadata.create_file(record) {
                Ok(created) => {
                    committed_bytes += created.plaintext_size;
                    outcome.files.push(UploadItemResult {
                        id: created.id,
                        name: created.original_name,
                        plaintext_size: created.plaintext_size,
                        mime: created.mime,
                        category: created.category(),
                        created_at_ms: created.created_at_ms,
                    });
                }
                Err(e) => {
                    let _ = self.blobs.remove(&owner_dir, &blob_id_str, &ext);
                    outcome.errors.push(UploadItemError { name: sanitized_name, message: e.to_string() });
                }
            }
        }

        if committed_bytes > 0 {
            user.quota = user.quota.charge(committed_bytes)?;
            self.metadata.update_user(user)?;
            self.metrics.add_charged(committed_bytes);
        }

        Ok(outcome)
    }
}

fn extension_of(sanitized_name: &str) -> String {
    match sanitized_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!(".{ext}"),
        _ => String::new(),
    }
}
