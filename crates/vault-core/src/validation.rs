//! Field-validation rules mirrored client- and server-side, server-authoritative.
//!
//! These are pure functions: no I/O, no knowledge of the metadata store. The
//! lifecycle engine calls them before touching the blob store or metadata
//! store so that a rejected request never stages a blob.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::VaultError;

/// Maximum plaintext size accepted for a single uploaded file.
pub const MAX_FILE_SIZE_BYTES: u64 = 150 * 1024 * 1024;
/// Maximum number of files accepted in a single upload request.
pub const MAX_UPLOAD_BATCH: usize = 10;
/// Maximum number of ids accepted in a single bulk-delete request.
pub const MAX_BULK_DELETE: usize = 100;
/// Maximum length of a sanitized original filename.
pub const MAX_FILENAME_LEN: usize = 255;
/// Maximum length of a folder path string.
pub const MAX_FOLDER_LEN: usize = 500;
/// Maximum number of tags per file.
pub const MAX_TAGS: usize = 20;
/// Maximum length of a single tag.
pub const MAX_TAG_LEN: usize = 50;
/// Maximum length of a file description.
pub const MAX_DESCRIPTION_LEN: usize = 500;
/// Default per-user storage limit in bytes (1 GiB).
pub const DEFAULT_STORAGE_LIMIT_BYTES: u64 = 1024 * 1024 * 1024;
/// Default pagination page size.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
/// Maximum access-log entries retained per file (bounded ring).
pub const MAX_ACCESS_LOG_ENTRIES: usize = 100;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());
// Practical RFC-5322 subset: one '@', no whitespace, a dot somewhere in the domain.
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static PATH_HOSTILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[/\\<>:"|?*]"#).unwrap());

/// MIME allow-list families accepted on upload, matched by prefix or exact value.
const ALLOWED_MIME_PREFIXES: &[&str] = &["image/", "video/", "audio/", "text/"];
const ALLOWED_MIME_EXACT: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/zip",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
    "application/x-tar",
    "application/gzip",
    "application/json",
    "application/xml",
    "application/octet-stream",
];

/// Validate a username: 3-30 chars, `^[A-Za-z0-9_]+$`.
pub fn validate_username(username: &str) -> Result<(), VaultError> {
    if username.len() < 3 || username.len() > 30 {
        return Err(VaultError::validation("username must be 3-30 characters"));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(VaultError::validation(
            "username may only contain letters, digits, and underscores",
        ));
    }
    Ok(())
}

/// Validate an email against a practical RFC-5322 subset. Returns the
/// lowercased form used as the stored unique key.
pub fn validate_email(email: &str) -> Result<String, VaultError> {
    if !EMAIL_RE.is_match(email) {
        return Err(VaultError::validation("email is not a valid address"));
    }
    Ok(email.to_ascii_lowercase())
}

/// Validate a password: >= 8 chars, at least one of each class
/// {lowercase, uppercase, digit, one of `@$!%*?&`}.
pub fn validate_password(password: &str) -> Result<(), VaultError> {
    if password.len() < 8 {
        return Err(VaultError::validation("password must be at least 8 characters"));
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| "@$!%*?&".contains(c));
    if !(has_lower && has_upper && has_digit && has_special) {
        return Err(VaultError::validation(
            "password must contain a lowercase letter, an uppercase letter, a digit, and one of @$!%*?&",
        ));
    }
    Ok(())
}

/// Sanitize an original filename: strip path separators and shell-hostile
/// characters, then clamp to [`MAX_FILENAME_LEN`].
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced = PATH_HOSTILE_RE.replace_all(name, "_").into_owned();
    let trimmed = replaced.trim();
    if trimmed.chars().count() > MAX_FILENAME_LEN {
        trimmed.chars().take(MAX_FILENAME_LEN).collect()
    } else {
        trimmed.to_string()
    }
}

/// Normalize a folder path: ensure a leading `/`, clamp to [`MAX_FOLDER_LEN`].
#[must_use]
pub fn normalize_folder(folder: &str) -> String {
    let prefixed = if folder.starts_with('/') { folder.to_string() } else { format!("/{folder}") };
    if prefixed.chars().count() > MAX_FOLDER_LEN {
        prefixed.chars().take(MAX_FOLDER_LEN).collect()
    } else {
        prefixed
    }
}

/// Truncate and cap a tag list to [`MAX_TAGS`] entries of [`MAX_TAG_LEN`] chars each.
#[must_use]
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .take(MAX_TAGS)
        .map(|t| {
            if t.chars().count() > MAX_TAG_LEN {
                t.chars().take(MAX_TAG_LEN).collect()
            } else {
                t.clone()
            }
        })
        .collect()
}

/// Truncate a description to [`MAX_DESCRIPTION_LEN`] chars.
#[must_use]
pub fn normalize_description(description: &str) -> String {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        description.chars().take(MAX_DESCRIPTION_LEN).collect()
    } else {
        description.to_string()
    }
}

/// Check a declared MIME type against the upload allow-list.
#[must_use]
pub fn is_allowed_mime(mime: &str) -> bool {
    ALLOWED_MIME_EXACT.contains(&mime) || ALLOWED_MIME_PREFIXES.iter().any(|p| mime.starts_with(p))
}

/// Validate a single file's declared size against the per-file cap.
pub fn validate_file_size(size: u64) -> Result<(), VaultError> {
    if size > MAX_FILE_SIZE_BYTES {
        return Err(VaultError::validation(format!(
            "file exceeds the maximum size of {MAX_FILE_SIZE_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Validate a batch size against [`MAX_UPLOAD_BATCH`].
pub fn validate_batch_size(count: usize) -> Result<(), VaultError> {
    if count == 0 {
        return Err(VaultError::validation("at least one file is required"));
    }
    if count > MAX_UPLOAD_BATCH {
        return Err(VaultError::validation(format!(
            "batch of {count} files exceeds the maximum of {MAX_UPLOAD_BATCH}"
        )));
    }
    Ok(())
}

/// Validate a bulk-delete id count against [`MAX_BULK_DELETE`].
pub fn validate_bulk_delete_count(count: usize) -> Result<(), VaultError> {
    if count > MAX_BULK_DELETE {
        return Err(VaultError::validation(format!(
            "bulk delete of {count} ids exceeds the maximum of {MAX_BULK_DELETE}"
        )));
    }
    Ok(())
}
