//! Bounded per-file access log, and a JSONL audit sink for security events.
//!
//! Every [`vault_core::domain::AccessAction`] taken against a file record
//! appends to an [`AccessLog`] that never grows past
//! [`vault_core::validation::MAX_ACCESS_LOG_ENTRIES`] entries — the oldest
//! entry is evicted to make room for a new one, so a file that's viewed
//! thousands of times keeps a bounded tail of recent activity rather than an
//! unbounded history. Account-level security events (lockouts, share
//! revocation) are not file-scoped and go to the separate append-only
//! [`SecurityAuditLog`] instead.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vault_core::domain::AccessAction;
use vault_core::validation::MAX_ACCESS_LOG_ENTRIES;

/// A single entry in a file's bounded access log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// Milliseconds since the epoch at which the action occurred.
    pub ts_ms: u64,
    /// The action taken.
    pub action: AccessAction,
    /// The id of the user (or `"share:<token-prefix>"` for a share consumer)
    /// that took the action.
    pub actor: String,
}

/// A fixed-capacity ring of the most recent [`AccessLogEntry`] values for one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessLog {
    entries: VecDeque<AccessLogEntry>,
}

impl AccessLog {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    /// Record an action, evicting the oldest entry if already at capacity.
    pub fn push(&mut self, ts_ms: u64, action: AccessAction, actor: impl Into<String>) {
        if self.entries.len() >= MAX_ACCESS_LOG_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(AccessLogEntry { ts_ms, action, actor: actor.into() });
    }

    /// Entries oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &AccessLogEntry> {
        self.entries.iter()
    }

    /// Number of entries currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no actions have ever been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors from the security audit log.
#[derive(Debug, Error)]
pub enum AuditLogError {
    /// Underlying filesystem failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// A record failed to serialize or an existing line failed to parse.
    #[error("serialize: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Account-level events worth a durable audit trail independent of any one
/// file's bounded access log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SecurityEvent {
    /// A login attempt failed.
    LoginFailed {
        /// The user id, if the username resolved to one.
        user_id: Option<String>,
    },
    /// An account crossed the failed-login threshold and locked.
    AccountLocked {
        /// The locked user id.
        user_id: String,
    },
    /// A password was changed, invalidating tokens issued before `changed_at_ms`.
    PasswordChanged {
        /// The user id whose password changed.
        user_id: String,
    },
    /// A share token was revoked.
    ShareRevoked {
        /// The file id the share belonged to.
        file_id: String,
    },
    /// A file was permanently deleted (irreversible).
    FilePermanentlyDeleted {
        /// The user id that owned the file.
        user_id: String,
        /// The deleted file id.
        file_id: String,
    },
}

/// A single line in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Monotonic id assigned on append.
    pub id: u64,
    /// Milliseconds since the epoch.
    pub ts_ms: u64,
    /// The event that occurred.
    pub event: SecurityEvent,
}

/// An append-only JSONL sink for [`SecurityEvent`]s.
#[derive(Debug, Clone)]
pub struct SecurityAuditLog {
    path: String,
}

impl SecurityAuditLog {
    /// Create or open a log at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AuditLogError> {
        let p = path.as_ref();
        if !p.exists() {
            OpenOptions::new().create(true).write(true).truncate(true).open(p)?;
        }
        Ok(Self { path: p.to_string_lossy().into_owned() })
    }

    /// Append one event, returning the id assigned.
    pub fn append(&self, id: u64, ts_ms: u64, event: SecurityEvent) -> Result<u64, AuditLogError> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        let record = AuditRecord { id, ts_ms, event };
        let line = serde_json::to_string(&record)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(id)
    }

    /// Read every record currently on disk, oldest first.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>, AuditLogError> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_log_evicts_oldest_past_capacity() {
        let mut log = AccessLog::new();
        for i in 0..MAX_ACCESS_LOG_ENTRIES + 10 {
            log.push(i as u64, AccessAction::View, "user-1");
        }
        assert_eq!(log.len(), MAX_ACCESS_LOG_ENTRIES);
        let first = log.iter().next().unwrap();
        assert_eq!(first.ts_ms, 10);
    }

    #[test]
    fn access_log_preserves_order() {
        let mut log = AccessLog::new();
        log.push(1, AccessAction::View, "a");
        log.push(2, AccessAction::Download, "a");
        let ts: Vec<u64> = log.iter().map(|e| e.ts_ms).collect();
        assert_eq!(ts, vec![1, 2]);
    }

    #[test]
    fn audit_log_round_trips() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let log = SecurityAuditLog::open(tmp.path()).unwrap();
        log.append(1, 100, SecurityEvent::LoginFailed { user_id: Some("u1".into()) }).unwrap();
        log.append(2, 200, SecurityEvent::AccountLocked { user_id: "u1".into() }).unwrap();
        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[1].event, SecurityEvent::AccountLocked { .. }));
    }
}
