//! Per-user storage accounting and the account-lock state machine.
//!
//! Both pieces are plain data plus pure transitions: the caller (the
//! metadata store's `User` record, in practice) owns persistence, and this
//! crate owns the arithmetic and the lockout rule so neither drifts from the
//! other across call sites.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use vault_core::error::VaultError;

/// Failed logins allowed before an account locks.
pub const MAX_FAILED_LOGINS: u32 = 5;
/// Lockout duration once [`MAX_FAILED_LOGINS`] is reached.
pub const LOCK_DURATION_MS: u64 = 2 * 60 * 60 * 1000;

/// Storage accounting for one user: bytes used against a fixed limit.
///
/// `used_bytes` is monotonic in intent (it only grows as uploads land) and
/// is refunded only on permanent delete, never on soft-delete; it is clamped
/// at zero on refund so a refund race can never underflow into a huge
/// unsigned value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StorageQuota {
    /// Bytes currently charged against this account.
    pub used_bytes: u64,
    /// The account's storage ceiling.
    pub limit_bytes: u64,
}

impl StorageQuota {
    /// A fresh quota at `limit_bytes` with nothing used yet.
    #[must_use]
    pub const fn new(limit_bytes: u64) -> Self {
        Self { used_bytes: 0, limit_bytes }
    }

    /// `true` if charging `additional` more bytes would stay within the limit.
    #[must_use]
    pub fn has_capacity(&self, additional: u64) -> bool {
        self.used_bytes.saturating_add(additional) <= self.limit_bytes
    }

    /// Charge `additional` bytes, failing with [`VaultError::QuotaExceeded`]
    /// if doing so would exceed the limit. On success, returns the updated quota.
    pub fn charge(&self, additional: u64) -> Result<Self, VaultError> {
        if !self.has_capacity(additional) {
            return Err(VaultError::QuotaExceeded);
        }
        Ok(Self { used_bytes: self.used_bytes + additional, limit_bytes: self.limit_bytes })
    }

    /// Refund `amount` bytes on permanent delete, clamped at zero.
    #[must_use]
    pub fn refund(&self, amount: u64) -> Self {
        Self { used_bytes: self.used_bytes.saturating_sub(amount), limit_bytes: self.limit_bytes }
    }

    /// Fraction of the limit currently in use, in `[0.0, +inf)`.
    #[must_use]
    pub fn fraction_used(&self) -> f64 {
        if self.limit_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.limit_bytes as f64
    }
}

/// The account-lock state machine: tracks consecutive failed logins and, once
/// the threshold is reached, a lock expiry timestamp.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AccountLock {
    /// Consecutive failed login attempts since the last success.
    pub failed_logins: u32,
    /// Milliseconds since the epoch at which the lock lifts, if locked.
    pub locked_until_ms: Option<u64>,
}

impl AccountLock {
    /// A fresh, unlocked state.
    #[must_use]
    pub const fn new() -> Self {
        Self { failed_logins: 0, locked_until_ms: None }
    }

    /// `true` if the account is currently locked as of `now_ms`.
    ///
    /// A lock whose expiry has passed is treated as not-locked here, but the
    /// counter/timestamp themselves are only cleared by [`Self::record_success`]
    /// or the next [`Self::record_failure`] — read-only checks do not mutate state.
    #[must_use]
    pub fn is_locked(&self, now_ms: u64) -> bool {
        self.locked_until_ms.is_some_and(|until| now_ms < until)
    }

    /// Fail to authenticate once. Callers must call [`Self::check`] first and
    /// skip this call entirely while locked — a failed attempt against an
    /// already-locked account does not advance the counter. If a previous
    /// lock has since expired, the counter resets to 1 rather than continuing
    /// to climb from where it left off; otherwise it increments, and crossing
    /// [`MAX_FAILED_LOGINS`] sets a new lock expiry [`LOCK_DURATION_MS`] out
    /// from `now_ms`.
    pub fn record_failure(&mut self, now_ms: u64) {
        if let Some(until) = self.locked_until_ms {
            if now_ms >= until {
                self.failed_logins = 0;
                self.locked_until_ms = None;
            }
        }
        self.failed_logins = self.failed_logins.saturating_add(1);
        if self.failed_logins >= MAX_FAILED_LOGINS {
            self.locked_until_ms = Some(now_ms + LOCK_DURATION_MS);
        }
    }

    /// Reset to the unlocked state after a successful authentication.
    pub fn record_success(&mut self) {
        self.failed_logins = 0;
        self.locked_until_ms = None;
    }

    /// Verify the account is not locked as of `now_ms`, returning
    /// [`VaultError::AccountLocked`] otherwise.
    pub fn check(&self, now_ms: u64) -> Result<(), VaultError> {
        if self.is_locked(now_ms) {
            return Err(VaultError::AccountLocked);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_within_limit_succeeds() {
        let q = StorageQuota::new(1000);
        let q = q.charge(400).unwrap();
        assert_eq!(q.used_bytes, 400);
        assert!(q.has_capacity(600));
        assert!(!q.has_capacity(601));
    }

    #[test]
    fn charge_over_limit_fails() {
        let q = StorageQuota::new(1000);
        let err = q.charge(1001).unwrap_err();
        assert!(matches!(err, VaultError::QuotaExceeded));
    }

    #[test]
    fn refund_clamps_at_zero() {
        let q = StorageQuota::new(1000);
        let q = q.refund(50);
        assert_eq!(q.used_bytes, 0);
    }

    #[test]
    fn refund_only_reduces_used_not_limit() {
        let q = StorageQuota::new(1000).charge(800).unwrap();
        let q = q.refund(300);
        assert_eq!(q.used_bytes, 500);
        assert_eq!(q.limit_bytes, 1000);
    }

    #[test]
    fn five_failures_lock_for_two_hours() {
        let mut lock = AccountLock::new();
        for _ in 0..4 {
            lock.record_failure(0);
        }
        assert!(!lock.is_locked(0));
        lock.record_failure(0);
        assert!(lock.is_locked(0));
        assert_eq!(lock.locked_until_ms, Some(LOCK_DURATION_MS));
        assert!(!lock.is_locked(LOCK_DURATION_MS));
    }

    #[test]
    fn failure_after_lock_expiry_resets_counter_to_one() {
        let mut lock = AccountLock::new();
        for _ in 0..5 {
            lock.record_failure(0);
        }
        assert_eq!(lock.locked_until_ms, Some(LOCK_DURATION_MS));
        // The lock has expired; the next failure starts a fresh count at 1,
        // not a sixth increment of the old streak.
        lock.record_failure(LOCK_DURATION_MS);
        assert_eq!(lock.failed_logins, 1);
        assert!(!lock.is_locked(LOCK_DURATION_MS));
    }

    #[test]
    fn success_resets_lock_state() {
        let mut lock = AccountLock::new();
        for _ in 0..5 {
            lock.record_failure(0);
        }
        assert!(lock.is_locked(0));
        lock.record_success();
        assert!(!lock.is_locked(0));
        assert_eq!(lock.failed_logins, 0);
    }

    #[test]
    fn check_surfaces_account_locked_error() {
        let mut lock = AccountLock::new();
        for _ in 0..5 {
            lock.record_failure(1_000);
        }
        assert!(matches!(lock.check(1_000), Err(VaultError::AccountLocked)));
        assert!(lock.check(1_000 + LOCK_DURATION_MS).is_ok());
    }
}
