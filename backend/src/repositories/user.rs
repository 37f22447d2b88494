//! User repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::user::User;
use crate::repositories::repository::{ensure_deleted, Repository};
use crate::types::UserId;

const TABLE_NAME: &str = "users";
const SELECT_COLUMNS: &str = "id, email, name, role, is_active, department, phone, \
     password_hash, last_login, created_at, updated_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct UserRepository;

impl UserRepository {
    pub fn new() -> Self {
        Self
    }

    fn base_select_query() -> String {
        format!("SELECT {} FROM {}", SELECT_COLUMNS, TABLE_NAME)
    }

    /// Looks up a user by login email. `email` must already be normalized.
    pub async fn find_by_email(&self, db: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let query = format!("{} WHERE email = $1", Self::base_select_query());
        let row = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn count(&self, db: &PgPool) -> Result<i64, AppError> {
        let query = format!("SELECT COUNT(*) FROM {}", TABLE_NAME);
        let total = sqlx::query_scalar::<_, i64>(&query).fetch_one(db).await?;
        Ok(total)
    }

    pub async fn touch_last_login(
        &self,
        db: &PgPool,
        id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let query = format!("UPDATE {} SET last_login = $2 WHERE id = $1", TABLE_NAME);
        sqlx::query(&query).bind(id).bind(at).execute(db).await?;
        Ok(())
    }

    pub async fn update_password(
        &self,
        db: &PgPool,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let query = format!(
            "UPDATE {} SET password_hash = $2, updated_at = $3 WHERE id = $1",
            TABLE_NAME
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".into()));
        }
        Ok(())
    }
}

impl Repository<User> for UserRepository {
    const TABLE: &'static str = TABLE_NAME;
    type Id = UserId;

    async fn find_all(&self, db: &PgPool) -> Result<Vec<User>, AppError> {
        let query = format!("{} ORDER BY created_at ASC", Self::base_select_query());
        let rows = sqlx::query_as::<_, User>(&query).fetch_all(db).await?;
        Ok(rows)
    }

    async fn find_by_id(&self, db: &PgPool, id: UserId) -> Result<User, AppError> {
        let query = format!("{} WHERE id = $1", Self::base_select_query());
        let result = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        Ok(result)
    }

    async fn create(&self, db: &PgPool, item: &User) -> Result<User, AppError> {
        let query = format!(
            "INSERT INTO {} (id, email, name, role, is_active, department, phone, \
             password_hash, last_login, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, User>(&query)
            .bind(item.id)
            .bind(&item.email)
            .bind(&item.name)
            .bind(item.role.as_str())
            .bind(item.is_active)
            .bind(&item.department)
            .bind(&item.phone)
            .bind(&item.password_hash)
            .bind(item.last_login)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(db)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict("A user with this email already exists".into())
                }
                other => other.into(),
            })?;
        Ok(row)
    }

    async fn update(&self, db: &PgPool, item: &User) -> Result<User, AppError> {
        let query = format!(
            "UPDATE {} SET name = $2, role = $3, is_active = $4, department = $5, \
             phone = $6, updated_at = $7 WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, User>(&query)
            .bind(item.id)
            .bind(&item.name)
            .bind(item.role.as_str())
            .bind(item.is_active)
            .bind(&item.department)
            .bind(&item.phone)
            .bind(item.updated_at)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        Ok(row)
    }

    async fn delete(&self, db: &PgPool, id: UserId) -> Result<(), AppError> {
        let query = format!("DELETE FROM {} WHERE id = $1", TABLE_NAME);
        let result = sqlx::query(&query).bind(id).execute(db).await?;
        ensure_deleted(result.rows_affected(), "User")
    }
}
