//! List, get, update, move, folders, and stats: the read/write surface over
//! file metadata that does not touch blob bytes.

use std::collections::BTreeMap;

use metadata_store::{FilePage, FileQuery, MetadataStore, SanitizedFileRecord};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use vault_core::domain::{AccessAction, Category};
use vault_core::error::VaultError;
use vault_core::validation::{normalize_description, normalize_folder, normalize_tags, sanitize_filename};

use crate::VaultEngine;

/// Mutable fields accepted by [`VaultEngine::update`]. Every field is
/// optional; absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInput {
    /// New original filename, sanitized before storing.
    pub original_name: Option<String>,
    /// New folder, normalized before storing.
    pub folder: Option<String>,
    /// New tag list, truncated before storing.
    pub tags: Option<Vec<String>>,
    /// New description, truncated before storing.
    pub description: Option<String>,
}

/// The outcome of a [`VaultEngine::move_files`] call.
#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    /// Ids successfully moved.
    pub moved: Vec<Uuid>,
    /// Ids that could not be moved (not owned, or not found).
    pub skipped: Vec<Uuid>,
}

/// Per-category rollup within [`Stats`].
#[derive(Debug, Clone, Serialize)]
pub struct StatsCategory {
    /// The category.
    pub category: Category,
    /// Number of files in this category.
    pub count: u64,
    /// Total plaintext bytes in this category.
    pub total_bytes: u64,
}

/// Aggregate storage statistics for one user's non-deleted files.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    /// Total non-deleted file count.
    pub total_files: u64,
    /// Total plaintext bytes across non-deleted files.
    pub total_bytes: u64,
    /// Per-category rollups, one entry per [`Category::all`] member.
    pub by_category: Vec<StatsCategory>,
    /// The five most recently created files, newest first.
    pub most_recent: Vec<SanitizedFileRecord>,
    /// The five files with the highest total download count.
    pub most_downloaded: Vec<SanitizedFileRecord>,
}

impl<S: MetadataStore> VaultEngine<S> {
    /// Run a query against `owner_id`'s files, returning a sanitized page.
    /// The filtered-read convention lives in [`FileQuery`] itself; this
    /// method does not need to remember to exclude soft-deleted records.
    pub fn list_files(&self, query: &FileQuery) -> Result<FilePage, VaultError> {
        self.metadata.list_files(query)
    }

    /// Fetch one owned, non-deleted file's sanitized record.
    pub fn get_file(&self, owner_id: Uuid, file_id: Uuid) -> Result<SanitizedFileRecord, VaultError> {
        Ok(self.owned_file(owner_id, file_id, false)?.sanitized())
    }

    /// Apply a partial update to an owned file. Immutable fields (owner,
    /// sizes, checksums, blob id, MIME) cannot be reached through
    /// [`UpdateInput`] at all.
    #[instrument(skip(self, input))]
    pub fn update(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        input: UpdateInput,
        now_ms: u64,
    ) -> Result<SanitizedFileRecord, VaultError> {
        let mut record = self.owned_file(owner_id, file_id, false)?;
        if let Some(name) = input.original_name {
            record.original_name = sanitize_filename(&name);
        }
        if let Some(folder) = input.folder {
            record.folder = normalize_folder(&folder);
        }
        if let Some(tags) = input.tags {
            record.tags = normalize_tags(&tags);
        }
        if let Some(description) = input.description {
            record.description = normalize_description(&description);
        }
        record.access_log.push(now_ms, AccessAction::Update, owner_id.to_string());
        record.updated_at_ms = now_ms;
        let updated = self.metadata.update_file(record)?;
        Ok(updated.sanitized())
    }

    /// Atomically set `folder` on every id in `file_ids` that `owner_id`
    /// actually owns; ids that are missing or not owned are reported as
    /// skipped rather than failing the whole call.
    #[instrument(skip(self, file_ids))]
    pub fn move_files(
        &self,
        owner_id: Uuid,
        file_ids: &[Uuid],
        target_folder: &str,
        now_ms: u64,
    ) -> Result<MoveOutcome, VaultError> {
        let folder = normalize_folder(target_folder);
        let mut outcome = MoveOutcome { moved: Vec::new(), skipped: Vec::new() };
        for &id in file_ids {
            match self.metadata.get_file(owner_id, id, false)? {
                Some(mut record) => {
                    record.folder = folder.clone();
                    record.updated_at_ms = now_ms;
                    self.metadata.update_file(record)?;
                    outcome.moved.push(id);
                }
                None => outcome.skipped.push(id),
            }
        }
        Ok(outcome)
    }

    /// The distinct folder strings across a user's non-deleted files, each
    /// paired with its file count.
    pub fn folders(&self, owner_id: Uuid) -> Result<BTreeMap<String, u64>, VaultError> {
        self.metadata.folders(owner_id)
    }

    /// Aggregate stats over a user's non-deleted files.
    pub fn stats(&self, owner_id: Uuid) -> Result<Stats, VaultError> {
        let records = self.metadata.list_files_full(&FileQuery::new(owner_id))?;

        let total_files = records.len() as u64;
        let total_bytes: u64 = records.iter().map(|r| r.plaintext_size).sum();

        let by_category = Category::all()
            .into_iter()
            .map(|category| {
                let matching: Vec<_> = records.iter().filter(|r| r.category() == category).collect();
                StatsCategory {
                    category,
                    count: matching.len() as u64,
                    total_bytes: matching.iter().map(|r| r.plaintext_size).sum(),
                }
            })
            .collect();

        let mut by_created = records.clone();
        by_created.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        let most_recent = by_created.into_iter().take(5).map(|r| r.sanitized()).collect();

        let mut by_downloads = records;
        by_downloads.sort_by(|a, b| b.downloads_total.cmp(&a.downloads_total));
        let most_downloaded = by_downloads.into_iter().take(5).map(|r| r.sanitized()).collect();

        Ok(Stats { total_files, total_bytes, by_category, most_recent, most_downloaded })
    }
}
