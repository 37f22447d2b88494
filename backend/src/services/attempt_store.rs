//! Storage for failed-login bookkeeping.
//!
//! Every operation is a single atomic step: the in-memory store mutates under
//! one short critical section, the PostgreSQL store issues one statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::Instrument;

use crate::models::login_attempt::LoginAttemptRecord;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn get(&self, identifier: &str) -> anyhow::Result<Option<LoginAttemptRecord>>;

    /// Counts one failure and sets `locked_until = lock_until` once the count
    /// reaches `max_attempts`. A lock that lapsed before `now` restarts at 1.
    async fn record_failure(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
        lock_until: DateTime<Utc>,
    ) -> anyhow::Result<LoginAttemptRecord>;

    /// Deletes the record. Returns whether one existed.
    async fn clear(&self, identifier: &str) -> anyhow::Result<bool>;

    /// Deletes the record only if its lock has lapsed at `now`.
    async fn clear_expired(&self, identifier: &str, now: DateTime<Utc>) -> anyhow::Result<bool>;
}

#[derive(Debug, Default)]
pub struct InMemoryAttemptStore {
    records: Mutex<HashMap<String, LoginAttemptRecord>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records<R>(&self, f: impl FnOnce(&mut HashMap<String, LoginAttemptRecord>) -> R) -> R {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut records)
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn get(&self, identifier: &str) -> anyhow::Result<Option<LoginAttemptRecord>> {
        Ok(self.with_records(|records| records.get(identifier).cloned()))
    }

    async fn record_failure(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
        lock_until: DateTime<Utc>,
    ) -> anyhow::Result<LoginAttemptRecord> {
        Ok(self.with_records(|records| {
            let record = records
                .entry(identifier.to_string())
                .or_insert_with(|| LoginAttemptRecord::new(identifier));
            record.register_failure(now, max_attempts, lock_until);
            record.clone()
        }))
    }

    async fn clear(&self, identifier: &str) -> anyhow::Result<bool> {
        Ok(self.with_records(|records| records.remove(identifier).is_some()))
    }

    async fn clear_expired(&self, identifier: &str, now: DateTime<Utc>) -> anyhow::Result<bool> {
        Ok(self.with_records(|records| {
            let expired = records
                .get(identifier)
                .is_some_and(|record| record.lock_expired_at(now));
            if expired {
                records.remove(identifier);
            }
            expired
        }))
    }
}

pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn get(&self, identifier: &str) -> anyhow::Result<Option<LoginAttemptRecord>> {
        let record = sqlx::query_as::<_, LoginAttemptRecord>(
            "SELECT identifier, failure_count, locked_until FROM login_attempts WHERE identifier = $1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .instrument(tracing::debug_span!("pg_attempt_get", identifier))
        .await?;
        Ok(record)
    }

    async fn record_failure(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
        lock_until: DateTime<Utc>,
    ) -> anyhow::Result<LoginAttemptRecord> {
        let max_attempts = i32::try_from(max_attempts).unwrap_or(i32::MAX);
        let record = sqlx::query_as::<_, LoginAttemptRecord>(
            r#"
            INSERT INTO login_attempts (identifier, failure_count, locked_until, updated_at)
            VALUES (
                $1,
                1,
                CASE WHEN 1 >= $3::INT THEN $4::TIMESTAMPTZ ELSE NULL END,
                $2::TIMESTAMPTZ
            )
            ON CONFLICT (identifier) DO UPDATE SET
                failure_count = CASE
                    WHEN login_attempts.locked_until <= $2::TIMESTAMPTZ THEN 1
                    ELSE login_attempts.failure_count + 1
                END,
                locked_until = CASE
                    WHEN login_attempts.locked_until <= $2::TIMESTAMPTZ THEN
                        CASE WHEN 1 >= $3::INT THEN $4::TIMESTAMPTZ ELSE NULL END
                    WHEN login_attempts.locked_until IS NOT NULL THEN login_attempts.locked_until
                    WHEN login_attempts.failure_count + 1 >= $3::INT THEN $4::TIMESTAMPTZ
                    ELSE NULL
                END,
                updated_at = $2::TIMESTAMPTZ
            RETURNING identifier, failure_count, locked_until
            "#,
        )
        .bind(identifier)
        .bind(now)
        .bind(max_attempts)
        .bind(lock_until)
        .fetch_one(&self.pool)
        .instrument(tracing::debug_span!("pg_attempt_record_failure", identifier))
        .await?;
        Ok(record)
    }

    async fn clear(&self, identifier: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE identifier = $1")
            .bind(identifier)
            .execute(&self.pool)
            .instrument(tracing::debug_span!("pg_attempt_clear", identifier))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_expired(&self, identifier: &str, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "DELETE FROM login_attempts WHERE identifier = $1 AND locked_until <= $2",
        )
        .bind(identifier)
        .bind(now)
        .execute(&self.pool)
        .instrument(tracing::debug_span!("pg_attempt_clear_expired", identifier))
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
