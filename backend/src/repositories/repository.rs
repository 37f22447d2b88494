//! Repository trait and common functionality
//!
//! This module defines the standard repository trait that the table-backed
//! repositories implement.

use crate::error::AppError;
use sqlx::PgPool;

/// Standard repository trait for database operations
#[allow(async_fn_in_trait)]
pub trait Repository<T> {
    /// Target table name.
    const TABLE: &'static str;
    /// Primary key type for the record.
    type Id;
    /// Find all records of type T
    async fn find_all(&self, db: &PgPool) -> Result<Vec<T>, AppError>;

    /// Find a single record by ID
    async fn find_by_id(&self, db: &PgPool, id: Self::Id) -> Result<T, AppError>;

    /// Create a new record
    async fn create(&self, db: &PgPool, item: &T) -> Result<T, AppError>;

    /// Update an existing record
    async fn update(&self, db: &PgPool, item: &T) -> Result<T, AppError>;

    /// Delete a record by ID
    async fn delete(&self, db: &PgPool, id: Self::Id) -> Result<(), AppError>;
}

/// Maps "no row affected" on delete to a 404 with the given entity name.
pub(crate) fn ensure_deleted(rows_affected: u64, entity: &str) -> Result<(), AppError> {
    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("{} not found", entity)));
    }
    Ok(())
}
