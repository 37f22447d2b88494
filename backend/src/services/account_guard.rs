//! Login throttling and session issuance.
//!
//! The guard tracks failed attempts per normalized identifier, refuses every
//! attempt while an identifier is locked, and mints a time-boxed session when
//! the credential verifier vouches for a subject.
//!
//! Per identifier:
//!
//! ```text
//! CLEAR --failure--> ACCUMULATING --failure x max_attempts--> LOCKED
//!   ^                    |                                      |
//!   +------success-------+<------- lock elapsed / admin clear --+
//! ```
//!
//! Bookkeeping is advisory. A store that cannot be read or written is logged
//! and the decision proceeds as if the store were empty (fail open).

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use crate::error::AuthError;
use crate::models::login_attempt::LoginAttemptRecord;
use crate::models::session::Session;
use crate::services::attempt_store::AttemptStore;
use crate::services::credentials::CredentialVerifier;
use crate::services::session_store::SessionStore;
use crate::types::UserId;
use crate::utils::time::{seconds_until, Clock, SystemClock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPolicy {
    /// Failures that trigger a lock.
    pub max_attempts: u32,
    pub lockout_duration: Duration,
    pub session_ttl: Duration,
    /// Upper bound on a single credential check.
    pub verify_timeout: StdDuration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration: Duration::minutes(15),
            session_ttl: Duration::hours(24),
            verify_timeout: StdDuration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked { remaining_seconds: u64 },
}

impl LockState {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Locked { .. })
    }
}

/// Attempt records are keyed by the trimmed, lower-cased identifier.
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

pub struct AccountGuard {
    attempts: Arc<dyn AttemptStore>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    policy: GuardPolicy,
}

impl AccountGuard {
    pub fn new(
        attempts: Arc<dyn AttemptStore>,
        sessions: Arc<dyn SessionStore>,
        policy: GuardPolicy,
    ) -> Self {
        Self {
            attempts,
            sessions,
            clock: Arc::new(SystemClock),
            policy,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    /// Reports whether `identifier` is locked, clearing a lapsed lock first.
    pub async fn check_locked(&self, identifier: &str) -> LockState {
        let identifier = normalize_identifier(identifier);
        let now = self.clock.now();

        let record = match self.attempts.get(&identifier).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(identifier = %identifier, error = ?err, "Attempt store read failed; treating as unlocked");
                return LockState::Unlocked;
            }
        };

        match record {
            Some(record) if record.is_locked_at(now) => {
                let until = record.locked_until.unwrap_or(now);
                LockState::Locked {
                    remaining_seconds: seconds_until(now, until),
                }
            }
            Some(record) if record.lock_expired_at(now) => {
                match self.attempts.clear_expired(&identifier, now).await {
                    Ok(true) => tracing::info!(identifier = %identifier, "Lockout expired; attempts reset"),
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!(identifier = %identifier, error = ?err, "Failed to clear expired lockout")
                    }
                }
                LockState::Unlocked
            }
            _ => LockState::Unlocked,
        }
    }

    /// Counts one failed attempt and locks the identifier at the threshold.
    pub async fn record_failure(&self, identifier: &str) {
        let identifier = normalize_identifier(identifier);
        let now = self.clock.now();
        let lock_until = now
            .checked_add_signed(self.policy.lockout_duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        match self
            .attempts
            .record_failure(&identifier, now, self.policy.max_attempts, lock_until)
            .await
        {
            Ok(record) if record.locked_until.is_some() => {
                tracing::warn!(
                    identifier = %identifier,
                    failures = record.failure_count,
                    locked_until = ?record.locked_until,
                    "Account locked after repeated failed logins"
                );
            }
            Ok(record) => {
                tracing::info!(identifier = %identifier, failures = record.failure_count, "Failed login recorded");
            }
            Err(err) => {
                tracing::warn!(identifier = %identifier, error = ?err, "Failed to record login failure");
            }
        }
    }

    /// Forgets every failure recorded for `identifier`.
    pub async fn record_success(&self, identifier: &str) {
        let identifier = normalize_identifier(identifier);
        if let Err(err) = self.attempts.clear(&identifier).await {
            tracing::warn!(identifier = %identifier, error = ?err, "Failed to reset login attempts");
        }
    }

    /// Runs one login attempt end to end.
    ///
    /// Errors from the verifier (or a verifier that outlives the timeout) are
    /// reported as [`AuthError::VerificationUnavailable`] and never counted as
    /// a failure.
    pub async fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
        verifier: &dyn CredentialVerifier,
    ) -> Result<Session, AuthError> {
        let identifier = normalize_identifier(identifier);

        if let LockState::Locked { remaining_seconds } = self.check_locked(&identifier).await {
            tracing::info!(identifier = %identifier, remaining_seconds, "Login refused: account locked");
            return Err(AuthError::AccountLocked { remaining_seconds });
        }

        let verified = tokio::time::timeout(
            self.policy.verify_timeout,
            verifier.verify_credentials(&identifier, secret),
        )
        .await;

        let subject = match verified {
            Err(_) => {
                tracing::warn!(identifier = %identifier, timeout = ?self.policy.verify_timeout, "Credential verification timed out");
                return Err(AuthError::VerificationUnavailable);
            }
            Ok(Err(err)) => {
                tracing::warn!(identifier = %identifier, error = ?err, "Credential verification failed");
                return Err(AuthError::VerificationUnavailable);
            }
            Ok(Ok(Some(subject))) if subject.active => subject,
            Ok(Ok(_)) => {
                self.record_failure(&identifier).await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.record_success(&identifier).await;

        let session = Session::issue(subject, self.clock.now(), self.policy.session_ttl);
        if let Err(err) = self.sessions.put(&session).await {
            tracing::error!(user_id = %session.subject.id, error = ?err, "Failed to store session");
            return Err(AuthError::SessionUnavailable);
        }

        tracing::info!(user_id = %session.subject.id, expires_at = %session.expires_at, "Session issued");
        Ok(session)
    }

    pub async fn logout(&self, session: &Session) -> anyhow::Result<bool> {
        let removed = self.sessions.remove(&session.token).await?;
        tracing::info!(user_id = %session.subject.id, "Session closed");
        Ok(removed)
    }

    /// Resolves a bearer token. Expired sessions are dropped and read as absent.
    pub async fn current_session(&self, token: &str) -> Result<Option<Session>, AuthError> {
        let session = self.sessions.get(token).await.map_err(|err| {
            tracing::warn!(error = ?err, "Session store read failed");
            AuthError::SessionUnavailable
        })?;

        match session {
            Some(session) if session.is_expired_at(self.clock.now()) => {
                if let Err(err) = self.sessions.remove(token).await {
                    tracing::warn!(user_id = %session.subject.id, error = ?err, "Failed to drop expired session");
                }
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Lifts a lock (or partial count) ahead of time.
    pub async fn clear_lock(&self, identifier: &str) -> anyhow::Result<bool> {
        let identifier = normalize_identifier(identifier);
        let cleared = self.attempts.clear(&identifier).await?;
        if cleared {
            tracing::info!(identifier = %identifier, "Login attempts cleared by administrator");
        }
        Ok(cleared)
    }

    pub async fn attempt_record(
        &self,
        identifier: &str,
    ) -> anyhow::Result<Option<LoginAttemptRecord>> {
        self.attempts.get(&normalize_identifier(identifier)).await
    }

    /// Drops every session held by `subject_id`.
    pub async fn revoke_subject(&self, subject_id: UserId) -> anyhow::Result<u64> {
        let removed = self.sessions.remove_for_subject(subject_id).await?;
        if removed > 0 {
            tracing::info!(user_id = %subject_id, removed, "Sessions revoked");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::VerifiedSubject;
    use crate::models::user::UserRole;
    use crate::services::attempt_store::{InMemoryAttemptStore, MockAttemptStore};
    use crate::services::credentials::MockCredentialVerifier;
    use crate::services::session_store::InMemorySessionStore;
    use crate::utils::time::ManualClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    const PASSWORD: &str = "Passer123";

    struct FixedVerifier {
        accounts: HashMap<String, VerifiedSubject>,
    }

    impl FixedVerifier {
        fn new(subjects: &[(&str, bool)]) -> Self {
            let accounts = subjects
                .iter()
                .map(|(email, active)| {
                    (
                        email.to_string(),
                        VerifiedSubject {
                            id: UserId::new(),
                            email: email.to_string(),
                            display_name: email.to_string(),
                            role: UserRole::Controller,
                            active: *active,
                        },
                    )
                })
                .collect();
            Self { accounts }
        }
    }

    #[async_trait]
    impl CredentialVerifier for FixedVerifier {
        async fn verify_credentials(
            &self,
            identifier: &str,
            secret: &str,
        ) -> anyhow::Result<Option<VerifiedSubject>> {
            if secret != PASSWORD {
                return Ok(None);
            }
            Ok(self.accounts.get(identifier).cloned())
        }
    }

    struct SlowVerifier;

    #[async_trait]
    impl CredentialVerifier for SlowVerifier {
        async fn verify_credentials(
            &self,
            _identifier: &str,
            _secret: &str,
        ) -> anyhow::Result<Option<VerifiedSubject>> {
            tokio::time::sleep(StdDuration::from_secs(30)).await;
            Ok(None)
        }
    }

    struct Harness {
        guard: AccountGuard,
        clock: Arc<ManualClock>,
        attempts: Arc<InMemoryAttemptStore>,
        sessions: Arc<InMemorySessionStore>,
    }

    fn harness(policy: GuardPolicy) -> Harness {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
        ));
        let attempts = Arc::new(InMemoryAttemptStore::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let guard = AccountGuard::new(attempts.clone(), sessions.clone(), policy)
            .with_clock(clock.clone());
        Harness {
            guard,
            clock,
            attempts,
            sessions,
        }
    }

    async fn failure_count(h: &Harness, identifier: &str) -> u32 {
        h.attempts
            .get(identifier)
            .await
            .unwrap()
            .map(|r| r.failure_count)
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn locks_exactly_at_threshold() {
        let h = harness(GuardPolicy::default());
        for _ in 0..4 {
            h.guard.record_failure("a@x.com").await;
        }
        assert_eq!(h.guard.check_locked("a@x.com").await, LockState::Unlocked);

        h.guard.record_failure("a@x.com").await;
        assert_eq!(
            h.guard.check_locked("a@x.com").await,
            LockState::Locked {
                remaining_seconds: 900
            }
        );
    }

    #[tokio::test]
    async fn successful_login_resets_failures() {
        let h = harness(GuardPolicy::default());
        let verifier = FixedVerifier::new(&[("a@x.com", true)]);
        for _ in 0..3 {
            let err = h
                .guard
                .authenticate("a@x.com", "wrong", &verifier)
                .await
                .unwrap_err();
            assert_eq!(err, AuthError::InvalidCredentials);
        }
        assert_eq!(failure_count(&h, "a@x.com").await, 3);

        h.guard
            .authenticate("a@x.com", PASSWORD, &verifier)
            .await
            .unwrap();
        assert_eq!(failure_count(&h, "a@x.com").await, 0);
        assert!(h.attempts.get("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lapsed_lock_is_cleared_and_check_is_idempotent() {
        let h = harness(GuardPolicy::default());
        for _ in 0..5 {
            h.guard.record_failure("a@x.com").await;
        }
        h.clock.advance(Duration::seconds(900));

        assert_eq!(h.guard.check_locked("a@x.com").await, LockState::Unlocked);
        assert!(h.attempts.get("a@x.com").await.unwrap().is_none());
        assert_eq!(h.guard.check_locked("a@x.com").await, LockState::Unlocked);
    }

    #[tokio::test]
    async fn unknown_identifier_and_wrong_secret_are_indistinguishable() {
        let h = harness(GuardPolicy::default());
        let verifier = FixedVerifier::new(&[("a@x.com", true)]);

        let unknown = h
            .guard
            .authenticate("ghost@x.com", PASSWORD, &verifier)
            .await
            .unwrap_err();
        let wrong = h
            .guard
            .authenticate("a@x.com", "nope", &verifier)
            .await
            .unwrap_err();
        assert_eq!(unknown, wrong);
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(failure_count(&h, "ghost@x.com").await, 1);
        assert_eq!(failure_count(&h, "a@x.com").await, 1);
    }

    #[tokio::test]
    async fn inactive_account_is_rejected_as_invalid_credentials() {
        let h = harness(GuardPolicy::default());
        let verifier = FixedVerifier::new(&[("off@x.com", false)]);
        let err = h
            .guard
            .authenticate("off@x.com", PASSWORD, &verifier)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(failure_count(&h, "off@x.com").await, 1);
    }

    #[tokio::test]
    async fn lockout_scenario_with_recovery_after_window() {
        let h = harness(GuardPolicy::default());
        let verifier = FixedVerifier::new(&[("a@x.com", true)]);

        for _ in 0..5 {
            let err = h
                .guard
                .authenticate("a@x.com", "wrong", &verifier)
                .await
                .unwrap_err();
            assert_eq!(err, AuthError::InvalidCredentials);
        }

        let err = h
            .guard
            .authenticate("a@x.com", PASSWORD, &verifier)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::AccountLocked {
                remaining_seconds: 900
            }
        );

        h.clock.advance(Duration::seconds(901));
        let session = h
            .guard
            .authenticate("a@x.com", PASSWORD, &verifier)
            .await
            .unwrap();
        assert_eq!(session.issued_at, h.clock.now());
        assert_eq!((session.expires_at - h.clock.now()).num_seconds(), 86_400);
    }

    #[tokio::test]
    async fn locked_account_never_reaches_the_verifier() {
        let h = harness(GuardPolicy::default());
        for _ in 0..5 {
            h.guard.record_failure("a@x.com").await;
        }
        let mut verifier = MockCredentialVerifier::new();
        verifier.expect_verify_credentials().times(0);

        let err = h
            .guard
            .authenticate("a@x.com", PASSWORD, &verifier)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { .. }));
        assert_eq!(failure_count(&h, "a@x.com").await, 5);
    }

    #[tokio::test]
    async fn success_between_failures_restarts_the_count() {
        let h = harness(GuardPolicy::default());
        let verifier = FixedVerifier::new(&[("b@x.com", true)]);

        h.guard
            .authenticate("b@x.com", "wrong", &verifier)
            .await
            .unwrap_err();
        h.guard
            .authenticate("b@x.com", PASSWORD, &verifier)
            .await
            .unwrap();
        assert_eq!(h.guard.check_locked("b@x.com").await, LockState::Unlocked);

        h.guard
            .authenticate("b@x.com", "wrong", &verifier)
            .await
            .unwrap_err();
        assert_eq!(failure_count(&h, "b@x.com").await, 1);
    }

    #[tokio::test]
    async fn verifier_errors_are_not_counted() {
        let h = harness(GuardPolicy::default());
        h.guard.record_failure("a@x.com").await;

        let mut verifier = MockCredentialVerifier::new();
        verifier
            .expect_verify_credentials()
            .returning(|_, _| Err(anyhow::anyhow!("connection refused")));

        let err = h
            .guard
            .authenticate("a@x.com", PASSWORD, &verifier)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::VerificationUnavailable);
        assert_eq!(failure_count(&h, "a@x.com").await, 1);
    }

    #[tokio::test]
    async fn slow_verifier_times_out_without_counting() {
        let h = harness(GuardPolicy {
            verify_timeout: StdDuration::from_millis(20),
            ..GuardPolicy::default()
        });
        let err = h
            .guard
            .authenticate("a@x.com", PASSWORD, &SlowVerifier)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::VerificationUnavailable);
        assert_eq!(failure_count(&h, "a@x.com").await, 0);
    }

    #[tokio::test]
    async fn identifiers_are_normalized() {
        let h = harness(GuardPolicy::default());
        h.guard.record_failure("  A@X.com ").await;
        h.guard.record_failure("a@x.com").await;
        assert_eq!(failure_count(&h, "a@x.com").await, 2);
        let record = h.guard.attempt_record("A@x.COM").await.unwrap().unwrap();
        assert_eq!(record.failure_count, 2);
    }

    #[tokio::test]
    async fn new_login_replaces_previous_session() {
        let h = harness(GuardPolicy::default());
        let verifier = FixedVerifier::new(&[("a@x.com", true)]);

        let first = h
            .guard
            .authenticate("a@x.com", PASSWORD, &verifier)
            .await
            .unwrap();
        let second = h
            .guard
            .authenticate("a@x.com", PASSWORD, &verifier)
            .await
            .unwrap();
        assert_ne!(first.token, second.token);
        assert!(h.guard.current_session(&first.token).await.unwrap().is_none());
        assert!(h.guard.current_session(&second.token).await.unwrap().is_some());

        assert!(h.guard.logout(&second).await.unwrap());
        assert!(h.guard.current_session(&second.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_resolves_to_none_and_is_dropped() {
        let h = harness(GuardPolicy::default());
        let verifier = FixedVerifier::new(&[("a@x.com", true)]);
        let session = h
            .guard
            .authenticate("a@x.com", PASSWORD, &verifier)
            .await
            .unwrap();

        h.clock.advance(Duration::hours(24));
        assert!(h.guard.current_session(&session.token).await.unwrap().is_some());

        h.clock.advance(Duration::seconds(1));
        assert!(h.guard.current_session(&session.token).await.unwrap().is_none());
        assert!(h.sessions.get(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn admin_clear_unlocks_immediately() {
        let h = harness(GuardPolicy::default());
        for _ in 0..5 {
            h.guard.record_failure("a@x.com").await;
        }
        assert!(h.guard.check_locked("a@x.com").await.is_locked());
        assert!(h.guard.clear_lock("A@x.com").await.unwrap());
        assert_eq!(h.guard.check_locked("a@x.com").await, LockState::Unlocked);
        assert!(!h.guard.clear_lock("a@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn revoke_subject_drops_its_session() {
        let h = harness(GuardPolicy::default());
        let verifier = FixedVerifier::new(&[("a@x.com", true)]);
        let session = h
            .guard
            .authenticate("a@x.com", PASSWORD, &verifier)
            .await
            .unwrap();
        assert_eq!(h.guard.revoke_subject(session.subject.id).await.unwrap(), 1);
        assert!(h.guard.current_session(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failing_attempt_store_fails_open() {
        let mut attempts = MockAttemptStore::new();
        attempts
            .expect_get()
            .returning(|_| Err(anyhow::anyhow!("store down")));
        attempts
            .expect_clear()
            .returning(|_| Err(anyhow::anyhow!("store down")));
        let guard = AccountGuard::new(
            Arc::new(attempts),
            Arc::new(InMemorySessionStore::new()),
            GuardPolicy::default(),
        );
        let verifier = FixedVerifier::new(&[("a@x.com", true)]);

        assert_eq!(guard.check_locked("a@x.com").await, LockState::Unlocked);
        let session = guard
            .authenticate("a@x.com", PASSWORD, &verifier)
            .await
            .unwrap();
        assert_eq!(session.subject.email, "a@x.com");
    }

    #[tokio::test]
    async fn failing_record_failure_still_reports_invalid_credentials() {
        let mut attempts = MockAttemptStore::new();
        attempts.expect_get().returning(|_| Ok(None));
        attempts
            .expect_record_failure()
            .times(1)
            .returning(|_, _, _, _| Err(anyhow::anyhow!("store down")));
        let guard = AccountGuard::new(
            Arc::new(attempts),
            Arc::new(InMemorySessionStore::new()),
            GuardPolicy::default(),
        );
        let verifier = FixedVerifier::new(&[("a@x.com", true)]);

        let err = guard
            .authenticate("a@x.com", "wrong", &verifier)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn concurrent_failures_for_one_identifier_all_count() {
        let h = Arc::new(harness(GuardPolicy {
            max_attempts: 100,
            ..GuardPolicy::default()
        }));
        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let h = h.clone();
                tokio::spawn(async move { h.guard.record_failure("a@x.com").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(failure_count(&h, "a@x.com").await, 10);
    }

    struct DelayedVerifier {
        subject: VerifiedSubject,
        delay: StdDuration,
    }

    #[async_trait]
    impl CredentialVerifier for DelayedVerifier {
        async fn verify_credentials(
            &self,
            _identifier: &str,
            _secret: &str,
        ) -> anyhow::Result<Option<VerifiedSubject>> {
            tokio::time::sleep(self.delay).await;
            Ok(Some(self.subject.clone()))
        }
    }

    #[tokio::test]
    async fn abandoned_login_commits_no_bookkeeping() {
        let h = harness(GuardPolicy::default());
        h.guard.record_failure("a@x.com").await;
        let verifier = DelayedVerifier {
            subject: VerifiedSubject {
                id: UserId::new(),
                email: "a@x.com".into(),
                display_name: "A".into(),
                role: UserRole::Controller,
                active: true,
            },
            delay: StdDuration::from_millis(200),
        };

        let abandoned = tokio::time::timeout(
            StdDuration::from_millis(20),
            h.guard.authenticate("a@x.com", PASSWORD, &verifier),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(StdDuration::from_millis(300)).await;
        assert_eq!(failure_count(&h, "a@x.com").await, 1);
        assert_eq!(
            h.sessions
                .remove_for_subject(verifier.subject.id)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn oversized_lockout_duration_saturates_instead_of_overflowing() {
        let h = harness(GuardPolicy {
            max_attempts: 1,
            lockout_duration: Duration::days(1_000_000_000),
            ..GuardPolicy::default()
        });
        h.guard.record_failure("a@x.com").await;

        let record = h.attempts.get("a@x.com").await.unwrap().unwrap();
        assert_eq!(record.locked_until, Some(DateTime::<Utc>::MAX_UTC));
        assert!(h.guard.check_locked("a@x.com").await.is_locked());
    }
}
