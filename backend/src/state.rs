use sqlx::PgPool;
use std::sync::Arc;

use crate::config::{AttemptStoreKind, Config};
use crate::services::{
    AccountGuard, AttemptStore, CredentialVerifier, InMemoryAttemptStore, InMemorySessionStore,
    PgAttemptStore, PgSessionStore, SessionStore, UserStoreVerifier,
};
use crate::utils::time::{Clock, SystemClock};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub guard: Arc<AccountGuard>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Config,
        guard: Arc<AccountGuard>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            pool,
            config,
            guard,
            verifier,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wires the production collaborators selected by `config`.
    pub fn from_config(pool: PgPool, config: Config) -> Self {
        let (attempts, sessions): (Arc<dyn AttemptStore>, Arc<dyn SessionStore>) =
            match config.attempt_store {
                AttemptStoreKind::Postgres => (
                    Arc::new(PgAttemptStore::new(pool.clone())),
                    Arc::new(PgSessionStore::new(pool.clone())),
                ),
                AttemptStoreKind::Memory => (
                    Arc::new(InMemoryAttemptStore::new()),
                    Arc::new(InMemorySessionStore::new()),
                ),
            };
        let guard = Arc::new(AccountGuard::new(attempts, sessions, config.guard_policy()));
        let verifier = Arc::new(UserStoreVerifier::new(pool.clone()));
        Self::new(pool, config, guard, verifier)
    }
}
