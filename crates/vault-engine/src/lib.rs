//! The file lifecycle engine: the orchestrator that ties the crypto layer,
//! blob store, metadata store, and quota/account manager into upload,
//! download, share, and trash operations under one error and accounting
//! model.
//!
//! Every operation here is a single request-scoped call with no
//! cross-request fan-out; the metadata store and the filesystem are the only
//! shared mutable state. Callers (an HTTP layer, a CLI, a test) supply an
//! already-authenticated `owner_id` — token verification lives in
//! `vault-auth` and is not this crate's concern.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod account;
mod delete;
mod download;
mod files;
mod share;
mod upload;

#[cfg(test)]
mod tests;

pub use account::{LoginOutcome, RegisterInput};
pub use delete::BulkDeleteOutcome;
pub use download::{Disposition, DownloadedFile};
pub use files::{MoveOutcome, Stats, StatsCategory, UpdateInput};
pub use share::{ShareConsumeOutcome, ShareCreateInput, ShareCreateOutcome};
pub use upload::{UploadInput, UploadItemResult, UploadOutcome};

use std::sync::Arc;

use blob_store::BlobStore;
use metadata_store::MetadataStore;
use telemetry::StorageMetrics;
use vault_core::error::VaultError;

/// The orchestrator. Generic over the metadata store implementation so a
/// caller can swap an in-memory store for a real database-backed one
/// without touching this crate.
pub struct VaultEngine<S: MetadataStore> {
    metadata: Arc<S>,
    blobs: BlobStore,
    metrics: StorageMetrics,
}

impl<S: MetadataStore> Clone for VaultEngine<S> {
    fn clone(&self) -> Self {
        Self {
            metadata: Arc::clone(&self.metadata),
            blobs: self.blobs.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: MetadataStore> VaultEngine<S> {
    /// Build an engine over an already-constructed metadata store and blob store.
    pub fn new(metadata: Arc<S>, blobs: BlobStore) -> Self {
        Self { metadata, blobs, metrics: StorageMetrics::new() }
    }

    /// The storage-accounting counters this engine has recorded so far.
    #[must_use]
    pub fn metrics(&self) -> &StorageMetrics {
        &self.metrics
    }

    fn owned_file(
        &self,
        owner_id: uuid::Uuid,
        file_id: uuid::Uuid,
        include_deleted: bool,
    ) -> Result<metadata_store::FileRecord, VaultError> {
        self.metadata
            .get_file(owner_id, file_id, include_deleted)?
            .ok_or(VaultError::NotFound)
    }
}
