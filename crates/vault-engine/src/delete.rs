//! Soft-delete, restore, permanent delete, bulk delete, and empty-trash.

use metadata_store::{FileQuery, MetadataStore};
use serde::Serialize;
use tracing::{instrument, warn};
use uuid::Uuid;
use vault_core::error::VaultError;

use crate::VaultEngine;

/// Per-id outcome of a [`VaultEngine::bulk_delete`] call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkDeleteOutcome {
    /// Ids successfully deleted (soft or permanent, per the request).
    pub deleted: Vec<Uuid>,
    /// Ids that failed, with a caller-safe message each.
    pub errors: Vec<(Uuid, String)>,
    /// Total plaintext bytes refunded across permanently-deleted ids.
    pub refunded_bytes: u64,
}

impl<S: MetadataStore> VaultEngine<S> {
    /// Soft-delete an owned file: hides it from default queries without
    /// touching its blob or refunding quota. Idempotent.
    #[instrument(skip(self))]
    pub fn soft_delete(&self, owner_id: Uuid, file_id: Uuid, now_ms: u64) -> Result<(), VaultError> {
        let mut record = self.owned_file(owner_id, file_id, true)?;
        if !record.is_deleted {
            record.is_deleted = true;
            record.deleted_at_ms = Some(now_ms);
            self.metadata.update_file(record)?;
        }
        Ok(())
    }

    /// Restore a soft-deleted file to the default view. Idempotent.
    #[instrument(skip(self))]
    pub fn restore(&self, owner_id: Uuid, file_id: Uuid) -> Result<(), VaultError> {
        let mut record = self.owned_file(owner_id, file_id, true)?;
        if record.is_deleted {
            record.is_deleted = false;
            record.deleted_at_ms = None;
            self.metadata.update_file(record)?;
        }
        Ok(())
    }

    /// Permanently delete a file: removes the blob (a missing blob is not an
    /// error), refunds quota by its plaintext size, and removes the record.
    #[instrument(skip(self))]
    pub fn permanent_delete(&self, owner_id: Uuid, file_id: Uuid) -> Result<(), VaultError> {
        let record = self.owned_file(owner_id, file_id, true)?;
        self.purge(owner_id, &record)
    }

    fn purge(&self, owner_id: Uuid, record: &metadata_store::FileRecord) -> Result<(), VaultError> {
        let owner_dir = owner_id.to_string();
        if let Err(e) = self.blobs.remove(&owner_dir, &record.blob_id(), &record.ext) {
            warn!(file_id = %record.id, error = %e, "permanent delete: blob removal failed, proceeding anyway");
        }
        let mut user = self.metadata.get_user(owner_id)?.ok_or(VaultError::NotFound)?;
        user.quota = user.quota.refund(record.plaintext_size);
        self.metadata.update_user(user)?;
        self.metadata.delete_file_record(owner_id, record.id)?;
        self.metrics.add_refunded(record.plaintext_size);
        Ok(())
    }

    /// Delete up to 100 ids, soft or permanent per `permanent`. Per-id
    /// failures are collected; the batch never aborts on first error.
    #[instrument(skip(self, file_ids))]
    pub fn bulk_delete(
        &self,
        owner_id: Uuid,
        file_ids: &[Uuid],
        permanent: bool,
        now_ms: u64,
    ) -> Result<BulkDeleteOutcome, VaultError> {
        vault_core::validation::validate_bulk_delete_count(file_ids.len())?;
        let mut outcome = BulkDeleteOutcome::default();
        for &id in file_ids {
            let result = if permanent {
                self.owned_file(owner_id, id, true).and_then(|record| {
                    let bytes = record.plaintext_size;
                    self.purge(owner_id, &record).map(|()| bytes)
                })
            } else {
                self.soft_delete(owner_id, id, now_ms).map(|()| 0)
            };
            match result {
                Ok(bytes) => {
                    outcome.deleted.push(id);
                    outcome.refunded_bytes += bytes;
                }
                Err(e) => outcome.errors.push((id, e.public_message())),
            }
        }
        Ok(outcome)
    }

    /// Permanently delete every soft-deleted file owned by `owner_id`,
    /// refunding quota by the sum of bytes purged.
    #[instrument(skip(self))]
    pub fn empty_trash(&self, owner_id: Uuid) -> Result<u64, VaultError> {
        let trashed = self.metadata.list_files_full(&FileQuery::trash(owner_id))?;
        let mut refunded = 0u64;
        for record in &trashed {
            self.purge(owner_id, record)?;
            refunded += record.plaintext_size;
        }
        Ok(refunded)
    }
}
