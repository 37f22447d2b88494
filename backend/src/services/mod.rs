pub mod account_guard;
pub mod attempt_store;
pub mod bootstrap;
pub mod credentials;
pub mod session_store;

pub use account_guard::{AccountGuard, GuardPolicy, LockState};
pub use attempt_store::{AttemptStore, InMemoryAttemptStore, PgAttemptStore};
pub use credentials::{CredentialVerifier, UserStoreVerifier};
pub use session_store::{InMemorySessionStore, PgSessionStore, SessionStore};
