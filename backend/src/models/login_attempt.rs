//! Per-identifier failed-login bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoginAttemptRecord {
    /// Normalized login identifier (trimmed, lower-cased email).
    pub identifier: String,
    #[sqlx(try_from = "i32")]
    pub failure_count: u32,
    /// Set only while the identifier is locked out.
    pub locked_until: Option<DateTime<Utc>>,
}

impl LoginAttemptRecord {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            failure_count: 0,
            locked_until: None,
        }
    }

    /// Locked when `locked_until` lies strictly in the future.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if until > now)
    }

    /// A lock that was set and whose window has passed.
    pub fn lock_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if until <= now)
    }

    /// Applies one failure observed at `now`. A lapsed lock restarts the count.
    pub fn register_failure(
        &mut self,
        now: DateTime<Utc>,
        max_attempts: u32,
        lock_until: DateTime<Utc>,
    ) {
        if self.lock_expired_at(now) {
            self.failure_count = 0;
            self.locked_until = None;
        }
        self.failure_count = self.failure_count.saturating_add(1);
        if self.failure_count >= max_attempts && self.locked_until.is_none() {
            self.locked_until = Some(lock_until);
        }
    }
}
