pub mod mission;
pub mod mission_records;
pub mod repository;
pub mod user;

pub use mission::MissionRepository;
pub use mission_records::{FindingRepository, RemarkRepository, SanctionRepository};
pub use repository::Repository;
pub use user::UserRepository;
