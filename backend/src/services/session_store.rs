//! Storage for issued sessions, keyed by the SHA-256 digest of their token.
//!
//! A subject holds at most one session: `put` replaces whatever the subject
//! had before. Expiry is checked by the caller on every `get`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::Instrument;

use crate::models::session::{Session, VerifiedSubject};
use crate::models::user::UserRole;
use crate::types::UserId;
use crate::utils::token::token_digest;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, session: &Session) -> anyhow::Result<()>;
    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>>;
    async fn remove(&self, token: &str) -> anyhow::Result<bool>;
    async fn remove_for_subject(&self, subject_id: UserId) -> anyhow::Result<u64>;
}

#[derive(Debug, Default)]
struct SessionIndex {
    by_digest: HashMap<String, Session>,
    digest_by_subject: HashMap<UserId, String>,
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    index: Mutex<SessionIndex>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_index<R>(&self, f: impl FnOnce(&mut SessionIndex) -> R) -> R {
        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut index)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, session: &Session) -> anyhow::Result<()> {
        let digest = token_digest(&session.token);
        self.with_index(|index| {
            if let Some(previous) = index
                .digest_by_subject
                .insert(session.subject.id, digest.clone())
            {
                index.by_digest.remove(&previous);
            }
            index.by_digest.insert(digest, session.clone());
        });
        Ok(())
    }

    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let digest = token_digest(token);
        Ok(self.with_index(|index| index.by_digest.get(&digest).cloned()))
    }

    async fn remove(&self, token: &str) -> anyhow::Result<bool> {
        let digest = token_digest(token);
        Ok(self.with_index(|index| match index.by_digest.remove(&digest) {
            Some(session) => {
                if index.digest_by_subject.get(&session.subject.id) == Some(&digest) {
                    index.digest_by_subject.remove(&session.subject.id);
                }
                true
            }
            None => false,
        }))
    }

    async fn remove_for_subject(&self, subject_id: UserId) -> anyhow::Result<u64> {
        Ok(self.with_index(|index| {
            match index.digest_by_subject.remove(&subject_id) {
                Some(digest) => u64::from(index.by_digest.remove(&digest).is_some()),
                None => 0,
            }
        }))
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    user_id: UserId,
    email: String,
    display_name: String,
    #[sqlx(try_from = "String")]
    role: UserRole,
    active: bool,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self, token: &str) -> Session {
        Session {
            token: token.to_string(),
            subject: VerifiedSubject {
                id: self.user_id,
                email: self.email,
                display_name: self.display_name,
                role: self.role,
                active: self.active,
            },
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        }
    }
}

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn put(&self, session: &Session) -> anyhow::Result<()> {
        let subject = &session.subject;
        sqlx::query(
            r#"
            INSERT INTO sessions
                (token_digest, user_id, email, display_name, role, active, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO UPDATE SET
                token_digest = EXCLUDED.token_digest,
                email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                role = EXCLUDED.role,
                active = EXCLUDED.active,
                issued_at = EXCLUDED.issued_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(token_digest(&session.token))
        .bind(subject.id)
        .bind(&subject.email)
        .bind(&subject.display_name)
        .bind(subject.role.as_str())
        .bind(subject.active)
        .bind(session.issued_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .instrument(tracing::debug_span!("pg_session_put", user_id = %subject.id))
        .await?;
        Ok(())
    }

    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT user_id, email, display_name, role, active, issued_at, expires_at
            FROM sessions
            WHERE token_digest = $1
            "#,
        )
        .bind(token_digest(token))
        .fetch_optional(&self.pool)
        .instrument(tracing::debug_span!("pg_session_get"))
        .await?;
        Ok(row.map(|row| row.into_session(token)))
    }

    async fn remove(&self, token: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_digest = $1")
            .bind(token_digest(token))
            .execute(&self.pool)
            .instrument(tracing::debug_span!("pg_session_remove"))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_for_subject(&self, subject_id: UserId) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(subject_id)
            .execute(&self.pool)
            .instrument(tracing::debug_span!("pg_session_remove_for_subject", user_id = %subject_id))
            .await?;
        Ok(result.rows_affected())
    }
}
