//! Durable records for users, files, and share tokens, with the invariants
//! that tie a blob on disk to an authoritative record.
//!
//! The [`MetadataStore`] trait is the contract; [`InMemoryMetadataStore`] is
//! a reference implementation useful for tests and single-process
//! deployments. A production implementation backing this trait with a real
//! database is expected to provide the indexes named on [`MetadataStore`]'s
//! documentation, but every behavioral guarantee — in particular the
//! filtered-read convention below — must hold regardless of backend.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod in_memory;

pub use in_memory::InMemoryMetadataStore;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use access_log::AccessLog;
use quota::{AccountLock, StorageQuota};
use vault_core::domain::{Category, Role};
use vault_core::error::VaultError;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Globally unique id.
    pub id: Uuid,
    /// Unique username.
    pub username: String,
    /// Unique, lowercased email.
    pub email: String,
    /// Memory-hard password verifier. Never returned by read queries that
    /// feed the HTTP layer; present here because this crate's job is
    /// storage, not redaction — callers building a public view must drop it.
    pub password_hash: String,
    /// The user's long-lived 32-byte file-encryption key.
    pub user_key: [u8; 32],
    /// Authorization role.
    pub role: Role,
    /// `false` once the account has been deleted (deactivated, not destroyed).
    pub active: bool,
    /// Storage accounting.
    pub quota: StorageQuota,
    /// Failed-login/lockout state.
    pub lock: AccountLock,
    /// Milliseconds since the epoch of the last successful login, if any.
    pub last_login_ms: Option<u64>,
    /// Milliseconds since the epoch at which the password was last changed.
    /// Bearer tokens issued before this instant are rejected.
    pub password_changed_at_ms: u64,
    /// Milliseconds since the epoch at which the account was created.
    pub created_at_ms: u64,
}

impl User {
    /// A sanitized view safe to return to the owner: drops the password
    /// hash and the raw file-encryption key.
    #[must_use]
    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            active: self.active,
            storage_used_bytes: self.quota.used_bytes,
            storage_limit_bytes: self.quota.limit_bytes,
            last_login_ms: self.last_login_ms,
            created_at_ms: self.created_at_ms,
        }
    }
}

/// The public, storage-private-free view of a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedUser {
    /// Id.
    pub id: Uuid,
    /// Username.
    pub username: String,
    /// Lowercased email.
    pub email: String,
    /// Role.
    pub role: Role,
    /// Active flag.
    pub active: bool,
    /// Bytes currently used.
    pub storage_used_bytes: u64,
    /// Storage ceiling in bytes.
    pub storage_limit_bytes: u64,
    /// Last successful login, if any.
    pub last_login_ms: Option<u64>,
    /// Account creation time.
    pub created_at_ms: u64,
}

/// A share sub-record attached to a [`FileRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareToken {
    /// 32 random bytes, hex-encoded.
    pub token: String,
    /// Milliseconds since the epoch at which the share stops being valid.
    pub expires_at_ms: u64,
    /// Optional download cap.
    pub max_downloads: Option<u32>,
    /// Optional password verifier, same hash algorithm as user passwords.
    pub password_hash: Option<String>,
    /// Downloads consumed so far.
    pub download_count: u32,
    /// Milliseconds since the epoch at which the share was created.
    pub created_at_ms: u64,
}

impl ShareToken {
    /// A share is valid iff it has not passed its expiry and, if a download
    /// cap is set, has not reached it.
    #[must_use]
    pub fn is_valid(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
            && self.max_downloads.is_none_or(|max| self.download_count < max)
    }
}

/// A file owned by exactly one user, with its on-disk coordinates, display
/// metadata, optional share sub-record, and bounded access log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Globally unique id; doubles as the blob id used as the on-disk
    /// filename, since both must be globally unique and generated together
    /// at upload time.
    pub id: Uuid,
    /// The owning user.
    pub owner_id: Uuid,
    /// Sanitized original filename.
    pub original_name: String,
    /// Original extension (including the leading dot, if any), kept only as
    /// a hint for sysadmins browsing the store — never trusted for MIME.
    pub ext: String,
    /// Declared MIME type.
    pub mime: String,
    /// Plaintext size in bytes.
    pub plaintext_size: u64,
    /// On-disk container size in bytes.
    pub ciphertext_size: u64,
    /// SHA-256 of the plaintext.
    pub plaintext_checksum: String,
    /// SHA-256 of the on-disk container.
    pub ciphertext_checksum: String,
    /// Logical folder path, rooted at `/`.
    pub folder: String,
    /// Up to 20 tags of up to 50 characters each.
    pub tags: Vec<String>,
    /// Up to 500 characters.
    pub description: String,
    /// Soft-delete flag.
    pub is_deleted: bool,
    /// Milliseconds since the epoch at which the file was soft-deleted.
    pub deleted_at_ms: Option<u64>,
    /// The active share, if any.
    pub share: Option<ShareToken>,
    /// Bounded ring of the most recent accesses.
    pub access_log: AccessLog,
    /// Total successful downloads (direct or via a share token), unbounded
    /// and never evicted, unlike `access_log`'s ring.
    pub downloads_total: u64,
    /// Milliseconds since the epoch at which the record was created.
    pub created_at_ms: u64,
    /// Milliseconds since the epoch at which the record was last updated.
    pub updated_at_ms: u64,
}

impl FileRecord {
    /// The filesystem blob id: this record's [`Self::id`], stringified.
    #[must_use]
    pub fn blob_id(&self) -> String {
        self.id.to_string()
    }

    /// The derived [`Category`] of this file, from its original filename.
    #[must_use]
    pub fn category(&self) -> Category {
        Category::from_filename(&self.original_name)
    }

    /// A sanitized view safe to return over the list/get API: drops the
    /// absolute storage path (never stored on this struct in the first
    /// place — it is always recomputed from `owner_id`/`blob_id`/`ext`) and
    /// the access log.
    #[must_use]
    pub fn sanitized(&self) -> SanitizedFileRecord {
        SanitizedFileRecord {
            id: self.id,
            original_name: self.original_name.clone(),
            mime: self.mime.clone(),
            category: self.category(),
            plaintext_size: self.plaintext_size,
            folder: self.folder.clone(),
            tags: self.tags.clone(),
            description: self.description.clone(),
            has_share: self.share.is_some(),
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
        }
    }
}

/// The public view of a [`FileRecord`]: no storage path, no access log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedFileRecord {
    /// Id.
    pub id: Uuid,
    /// Original filename.
    pub original_name: String,
    /// Declared MIME type.
    pub mime: String,
    /// Derived category.
    pub category: Category,
    /// Plaintext size in bytes.
    pub plaintext_size: u64,
    /// Logical folder.
    pub folder: String,
    /// Tags.
    pub tags: Vec<String>,
    /// Description.
    pub description: String,
    /// Whether a share is currently attached (not whether it is valid).
    pub has_share: bool,
    /// Creation time.
    pub created_at_ms: u64,
    /// Last-updated time.
    pub updated_at_ms: u64,
}

/// Sort order for [`FileQuery`] results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Newest first (the default).
    #[default]
    CreatedAtDesc,
    /// Oldest first.
    CreatedAtAsc,
    /// Largest first.
    SizeDesc,
    /// Smallest first.
    SizeAsc,
    /// A-Z by original filename.
    NameAsc,
    /// Z-A by original filename.
    NameDesc,
}

impl SortKey {
    /// Parse a sort field from the HTTP API's `sort` query parameter:
    /// `createdAt`/`size`/`name`, optionally prefixed with `-` for
    /// descending. Unrecognized input falls back to the default.
    #[must_use]
    pub fn parse(field: &str) -> Self {
        let (desc, name) =
            field.strip_prefix('-').map_or((false, field), |rest| (true, rest));
        match (name, desc) {
            ("createdAt", false) => Self::CreatedAtAsc,
            ("createdAt", true) => Self::CreatedAtDesc,
            ("size", false) => Self::SizeAsc,
            ("size", true) => Self::SizeDesc,
            ("name", false) => Self::NameAsc,
            ("name", true) => Self::NameDesc,
            _ => Self::default(),
        }
    }
}

/// A query against a user's files. The filtered-read convention is baked in
/// here rather than left to callers: [`FileQuery::new`] always excludes
/// soft-deleted records, and the only way to see them is [`FileQuery::trash`].
#[derive(Debug, Clone)]
pub struct FileQuery {
    /// The owning user to scope the query to.
    pub owner_id: Uuid,
    include_deleted: bool,
    only_deleted: bool,
    /// Optional folder filter (exact match).
    pub folder: Option<String>,
    /// Optional category filter.
    pub category: Option<Category>,
    /// Optional full-text search over name/tags/description.
    pub search: Option<String>,
    /// Sort order.
    pub sort: SortKey,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl FileQuery {
    /// A default query: non-deleted records only, newest-first, page 1 at
    /// the default page size.
    #[must_use]
    pub fn new(owner_id: Uuid) -> Self {
        Self {
            owner_id,
            include_deleted: false,
            only_deleted: false,
            folder: None,
            category: None,
            search: None,
            sort: SortKey::default(),
            page: 1,
            limit: vault_core::validation::DEFAULT_PAGE_LIMIT,
        }
    }

    /// The trash view: only soft-deleted records.
    #[must_use]
    pub fn trash(owner_id: Uuid) -> Self {
        Self { include_deleted: true, only_deleted: true, ..Self::new(owner_id) }
    }

    /// `true` if this query should return soft-deleted records.
    #[must_use]
    pub fn includes_deleted(&self) -> bool {
        self.include_deleted
    }

    /// `true` if this query should return *only* soft-deleted records.
    #[must_use]
    pub fn only_deleted(&self) -> bool {
        self.only_deleted
    }
}

/// A page of [`SanitizedFileRecord`]s plus the pagination envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePage {
    /// The records on this page.
    pub records: Vec<SanitizedFileRecord>,
    /// 1-based page number returned.
    pub page: u32,
    /// Page size used.
    pub limit: u32,
    /// Total matching records across all pages.
    pub total: u64,
    /// Total number of pages.
    pub pages: u32,
}

/// The metadata store contract.
///
/// Required indexes for a production backend: unique(username),
/// unique(email), unique(blob-id), unique(share-token) sparse,
/// composite(owner, created-at desc), composite(owner, folder),
/// composite(is-deleted, deleted-at), and a full-text index over
/// (original-name, tags, description). [`InMemoryMetadataStore`] does not
/// need real indexes to satisfy the *behavior* those indexes exist for, but
/// a backend with real record volume does.
pub trait MetadataStore: Send + Sync {
    /// Insert a new user. Fails with [`VaultError::already_exists`] on a
    /// duplicate username or email.
    fn create_user(&self, user: User) -> Result<User, VaultError>;
    /// Look up a user by id, active or not.
    fn get_user(&self, id: Uuid) -> Result<Option<User>, VaultError>;
    /// Look up a user by username.
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, VaultError>;
    /// Look up a user by lowercased email.
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>, VaultError>;
    /// Replace a user record by id.
    fn update_user(&self, user: User) -> Result<User, VaultError>;

    /// Insert a new file record. Fails with [`VaultError::already_exists`]
    /// on a duplicate (owner, blob-id) pair (should not occur in practice,
    /// since ids are generated fresh, but the uniqueness constraint is load
    /// bearing against a buggy caller).
    fn create_file(&self, file: FileRecord) -> Result<FileRecord, VaultError>;
    /// Fetch one file by id, scoped to `owner_id`. Hidden if soft-deleted
    /// unless `include_deleted` is set.
    fn get_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<FileRecord>, VaultError>;
    /// Replace a file record in place.
    fn update_file(&self, file: FileRecord) -> Result<FileRecord, VaultError>;
    /// Remove a file record entirely (the metadata side of permanent delete).
    fn delete_file_record(&self, owner_id: Uuid, id: Uuid) -> Result<(), VaultError>;
    /// Run a [`FileQuery`], returning a [`FilePage`] of sanitized records.
    fn list_files(&self, query: &FileQuery) -> Result<FilePage, VaultError>;
    /// Full (unsanitized) records matching a query, for internal use by
    /// operations that need the blob id and access log (bulk delete, empty
    /// trash). Respects the same filtered-read convention as `list_files`.
    fn list_files_full(&self, query: &FileQuery) -> Result<Vec<FileRecord>, VaultError>;
    /// Look up the file a share token currently belongs to, across all
    /// users, regardless of soft-delete state (a share consumer is
    /// unauthenticated and has no owner scope to filter by).
    fn find_by_share_token(&self, token: &str) -> Result<Option<FileRecord>, VaultError>;
    /// The distinct folder strings across a user's non-deleted files, each
    /// paired with its file count.
    fn folders(&self, owner_id: Uuid) -> Result<BTreeMap<String, u64>, VaultError>;
}
