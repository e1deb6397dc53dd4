//! Blob Store: per-user encrypted file bytes on the local filesystem.
//!
//! Overview
//! - Layout: `<root>/<user-id>/<blob-id><ext>.encrypted`, one subdirectory per
//!   user so a whole account's bytes can be walked or removed as a unit.
//! - No content addressing, no deduplication, no compression: two concurrent
//!   uploads of identical plaintext produce two distinct blobs with distinct
//!   ids, because the container format embeds a fresh random salt and IV on
//!   every call to [`vault_crypto::encrypt`].
//! - Atomicity & durability: write the container to a temp file in the same
//!   directory, `fsync`, atomic rename over the final path, then `fsync` the
//!   directory so a crash never leaves a half-written blob visible under its
//!   real name.
//! - Fail-closed: any I/O or AEAD integrity failure aborts the operation and
//!   never leaves a partially-written file at the final path.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::any::Any;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use vault_crypto::{CryptoError, UserKey};

/// Error type for blob store operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Underlying filesystem failure.
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// Encryption, decryption, or integrity verification failed.
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),
    /// No blob exists at the requested path.
    #[error("blob not found")]
    NotFound,
    /// A blob already exists where a new one was expected.
    #[error("blob already exists")]
    AlreadyExists,
}

impl Error {
    /// True when the embedded AEAD tag failed to verify (tamper or corruption).
    #[must_use]
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::IntegrityFailure))
    }
}

/// Optional observability hooks. No-ops by default; a binary wiring
/// `tracing`/OpenTelemetry in can register a global observer at startup.
pub trait BlobStoreObserver: Send + Sync {
    /// Plaintext bytes accepted by a write operation.
    fn put_bytes(&self, _n: u64) {}
    /// Plaintext bytes returned by a read operation.
    fn get_bytes(&self, _n: u64) {}
    /// A blob was removed.
    fn remove_count(&self, _n: u64) {}
    /// Start an optional span; dropping the returned guard ends it.
    fn span(&self, _name: &'static str) -> BlobSpan {
        BlobSpan::noop()
    }
}

/// Guard object for an optional span; holds a type-erased guard that exits on drop.
pub struct BlobSpan {
    _guard: Option<Box<dyn Any + 'static>>,
}

impl BlobSpan {
    /// A guard that does nothing on drop.
    #[must_use]
    pub fn noop() -> Self {
        Self { _guard: None }
    }

    /// Wrap an arbitrary guard object so dropping this drops it.
    pub fn from_guard<G: 'static>(guard: G) -> Self {
        Self { _guard: Some(Box::new(guard)) }
    }
}

struct NoopObserver;
impl BlobStoreObserver for NoopObserver {}

static NOOP_OBSERVER: NoopObserver = NoopObserver;
static OBSERVER: OnceLock<&'static dyn BlobStoreObserver> = OnceLock::new();

/// Register a global observer for blob store metrics/spans. Safe to call at
/// most once; later calls are ignored.
pub fn set_observer(observer: &'static dyn BlobStoreObserver) {
    let _ = OBSERVER.set(observer);
}

fn observer() -> &'static dyn BlobStoreObserver {
    OBSERVER.get().copied().unwrap_or(&NOOP_OBSERVER)
}

/// The result of a successful write: useful for populating a file record
/// without re-reading the blob back off disk.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// Size of the encrypted container written to disk.
    pub ciphertext_len: u64,
    /// SHA-256 of the plaintext that was encrypted.
    pub plaintext_checksum: String,
}

/// Per-user encrypted blob storage rooted at a single directory.
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open (creating if absent) a blob store rooted at `root`.
    pub fn new(root: PathBuf) -> Result<Self, Error> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory this store is rooted at.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join(user_id)
    }

    /// Path for a blob, per the fixed `<root>/<user-id>/<blob-id><ext>.encrypted` layout.
    #[must_use]
    pub fn blob_path(&self, user_id: &str, blob_id: &str, ext: &str) -> PathBuf {
        self.user_dir(user_id).join(format!("{blob_id}{ext}.encrypted"))
    }

    /// `true` if a blob exists at the given coordinates.
    #[must_use]
    pub fn exists(&self, user_id: &str, blob_id: &str, ext: &str) -> bool {
        self.blob_path(user_id, blob_id, ext).exists()
    }

    fn atomic_write(&self, final_path: &Path, container: &[u8]) -> Result<(), Error> {
        let dir = final_path.parent().expect("blob path always has a parent");
        fs::create_dir_all(dir)?;
        let tmp_path = dir.join(format!(
            ".{}.tmp",
            final_path.file_name().and_then(|n| n.to_str()).unwrap_or("blob")
        ));
        {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(container)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, final_path)?;
        if let Ok(dirf) = fs::File::open(dir) {
            let _ = dirf.sync_all();
        }
        Ok(())
    }

    /// Stage a brand-new blob. Fails with [`Error::AlreadyExists`] if one is
    /// already present at these coordinates.
    pub fn stage(
        &self,
        user_id: &str,
        blob_id: &str,
        ext: &str,
        plaintext: &[u8],
        user_key: &UserKey,
    ) -> Result<WriteOutcome, Error> {
        let _span = observer().span("blob.stage");
        let path = self.blob_path(user_id, blob_id, ext);
        if path.exists() {
            return Err(Error::AlreadyExists);
        }
        self.write_container(&path, plaintext, user_key)
    }

    /// Overwrite the contents of an existing blob in place. Fails with
    /// [`Error::NotFound`] if no blob exists at these coordinates.
    pub fn replace_contents(
        &self,
        user_id: &str,
        blob_id: &str,
        ext: &str,
        plaintext: &[u8],
        user_key: &UserKey,
    ) -> Result<WriteOutcome, Error> {
        let _span = observer().span("blob.replace");
        let path = self.blob_path(user_id, blob_id, ext);
        if !path.exists() {
            return Err(Error::NotFound);
        }
        self.write_container(&path, plaintext, user_key)
    }

    fn write_container(
        &self,
        path: &Path,
        plaintext: &[u8],
        user_key: &UserKey,
    ) -> Result<WriteOutcome, Error> {
        let checksum = vault_crypto::hash(plaintext);
        let container = vault_crypto::encrypt(plaintext, user_key)?;
        let ciphertext_len = container.len() as u64;
        self.atomic_write(path, &container)?;
        observer().put_bytes(plaintext.len() as u64);
        Ok(WriteOutcome { ciphertext_len, plaintext_checksum: checksum })
    }

    /// Read and decrypt a blob's full plaintext contents.
    pub fn open_for_read(
        &self,
        user_id: &str,
        blob_id: &str,
        ext: &str,
        user_key: &UserKey,
    ) -> Result<Vec<u8>, Error> {
        let _span = observer().span("blob.read");
        let path = self.blob_path(user_id, blob_id, ext);
        let container = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound),
            Err(e) => return Err(Error::Io(e)),
        };
        let plaintext = vault_crypto::decrypt(&container, user_key)?;
        observer().get_bytes(plaintext.len() as u64);
        Ok(plaintext)
    }

    /// Permanently remove a blob. Idempotent: removing an already-absent
    /// blob is not an error, since permanent delete is the terminal state
    /// either way.
    pub fn remove(&self, user_id: &str, blob_id: &str, ext: &str) -> Result<(), Error> {
        let _span = observer().span("blob.remove");
        let path = self.blob_path(user_id, blob_id, ext);
        match fs::remove_file(&path) {
            Ok(()) => {
                observer().remove_count(1);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// List the blob ids currently on disk for one user, for quota
    /// reconciliation and orphan garbage collection.
    pub fn list_user_blob_ids(&self, user_id: &str) -> Result<Vec<String>, Error> {
        let dir = self.user_dir(user_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stripped) = name.strip_suffix(".encrypted") {
                    ids.push(stripped.to_string());
                }
            }
        }
        Ok(ids)
    }

    /// List every user subdirectory present under the store root, for a
    /// full orphan sweep across all accounts.
    pub fn list_user_ids(&self) -> Result<Vec<String>, Error> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        Ok(ids)
    }
}
