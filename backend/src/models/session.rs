//! Authenticated subjects and the sessions issued to them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::models::user::UserRole;
use crate::types::UserId;
use crate::utils::token::generate_session_token;

/// The identity a credential check vouches for. Carries no secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VerifiedSubject {
    #[schema(value_type = String)]
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    #[schema(value_type = String)]
    pub role: UserRole,
    pub active: bool,
}

/// A time-boxed bearer session.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer token. Only its digest leaves the process.
    pub token: String,
    pub subject: VerifiedSubject,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Mints a fresh session for `subject` valid for `ttl` from `now`.
    pub fn issue(subject: VerifiedSubject, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token: generate_session_token(),
            subject,
            issued_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Sessions stay valid up to and including `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("subject", &self.subject)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Body returned by a successful login.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: VerifiedSubject,
}

impl From<Session> for LoginResponse {
    fn from(session: Session) -> Self {
        LoginResponse {
            token: session.token,
            token_type: "Bearer".to_string(),
            expires_at: session.expires_at,
            user: session.subject,
        }
    }
}
