//! Domain enums shared by the metadata store, quota manager, and lifecycle engine.

use serde::{Deserialize, Serialize};

/// A user's role. Only used for authorization decisions the engine itself
/// makes (e.g. admin-only endpoints); role assignment is a metadata concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// An ordinary account, scoped to its own files.
    User,
    /// An account with cross-user administrative privileges.
    Admin,
}

/// The derived file category, computed from a filename's extension.
///
/// Categories are never stored; they are recomputed on read from the
/// original filename so that a future rule change applies retroactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// `image/*`-family extensions.
    Image,
    /// Common office/document formats.
    Document,
    /// Common video container/codec extensions.
    Video,
    /// Common audio extensions.
    Audio,
    /// Archive/compression extensions.
    Archive,
    /// Anything not recognized above.
    Other,
}

impl Category {
    /// Derive a category from a filename by its extension, case-insensitively.
    #[must_use]
    pub fn from_filename(name: &str) -> Self {
        let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" | "bmp" | "tiff" | "ico" => {
                Self::Image
            }
            "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "txt" | "rtf" | "odt"
            | "md" | "csv" => Self::Document,
            "mp4" | "avi" | "mov" | "mkv" | "webm" | "flv" | "wmv" | "m4v" => Self::Video,
            "mp3" | "wav" | "ogg" | "flac" | "aac" | "m4a" | "wma" => Self::Audio,
            "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" => Self::Archive,
            _ => Self::Other,
        }
    }

    /// All variants, in the stable order used for stats aggregation.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [Self::Image, Self::Document, Self::Video, Self::Audio, Self::Archive, Self::Other]
    }
}

/// An action recorded in a file's bounded access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessAction {
    /// The record's metadata was viewed (get/list).
    View,
    /// The file's bytes were downloaded (owner or share consume).
    Download,
    /// A share was created for this file.
    Share,
    /// Mutable metadata fields were changed.
    Update,
    /// The file was soft- or permanently deleted.
    Delete,
}
