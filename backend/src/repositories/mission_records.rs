//! Findings, remarks and sanctions recorded against a mission.

use sqlx::PgPool;

use crate::error::AppError;
use crate::models::finding::Finding;
use crate::models::remark::Remark;
use crate::models::sanction::Sanction;
use crate::types::MissionId;

const FINDING_COLUMNS: &str = "id, mission_id, kind, description, legal_reference, \
     recommendation, correction_delay_days, observed_on, created_at, updated_at";
const REMARK_COLUMNS: &str = "id, mission_id, content, created_at, updated_at";
const SANCTION_COLUMNS: &str =
    "id, mission_id, kind, description, amount, decision_date, created_at, updated_at";

/// Missing missions surface as a foreign-key violation on insert.
fn map_missing_mission(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            AppError::NotFound("Mission not found".into())
        }
        other => other.into(),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FindingRepository;

impl FindingRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_for_mission(
        &self,
        db: &PgPool,
        mission_id: MissionId,
    ) -> Result<Vec<Finding>, AppError> {
        let query = format!(
            "SELECT {} FROM findings WHERE mission_id = $1 ORDER BY created_at ASC, id ASC",
            FINDING_COLUMNS
        );
        let rows = sqlx::query_as::<_, Finding>(&query)
            .bind(mission_id)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn create(&self, db: &PgPool, item: &Finding) -> Result<Finding, AppError> {
        let query = format!(
            "INSERT INTO findings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {}",
            FINDING_COLUMNS, FINDING_COLUMNS
        );
        let row = sqlx::query_as::<_, Finding>(&query)
            .bind(item.id)
            .bind(item.mission_id)
            .bind(&item.kind)
            .bind(&item.description)
            .bind(&item.legal_reference)
            .bind(&item.recommendation)
            .bind(item.correction_delay_days)
            .bind(item.observed_on)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(db)
            .await
            .map_err(map_missing_mission)?;
        Ok(row)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RemarkRepository;

impl RemarkRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_for_mission(
        &self,
        db: &PgPool,
        mission_id: MissionId,
    ) -> Result<Vec<Remark>, AppError> {
        let query = format!(
            "SELECT {} FROM remarks WHERE mission_id = $1 ORDER BY created_at ASC, id ASC",
            REMARK_COLUMNS
        );
        let rows = sqlx::query_as::<_, Remark>(&query)
            .bind(mission_id)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn create(&self, db: &PgPool, item: &Remark) -> Result<Remark, AppError> {
        let query = format!(
            "INSERT INTO remarks ({}) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            REMARK_COLUMNS, REMARK_COLUMNS
        );
        let row = sqlx::query_as::<_, Remark>(&query)
            .bind(item.id)
            .bind(item.mission_id)
            .bind(&item.content)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(db)
            .await
            .map_err(map_missing_mission)?;
        Ok(row)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SanctionRepository;

impl SanctionRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_for_mission(
        &self,
        db: &PgPool,
        mission_id: MissionId,
    ) -> Result<Vec<Sanction>, AppError> {
        let query = format!(
            "SELECT {} FROM sanctions WHERE mission_id = $1 ORDER BY created_at ASC, id ASC",
            SANCTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, Sanction>(&query)
            .bind(mission_id)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn create(&self, db: &PgPool, item: &Sanction) -> Result<Sanction, AppError> {
        let query = format!(
            "INSERT INTO sanctions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            SANCTION_COLUMNS, SANCTION_COLUMNS
        );
        let row = sqlx::query_as::<_, Sanction>(&query)
            .bind(item.id)
            .bind(item.mission_id)
            .bind(&item.kind)
            .bind(&item.description)
            .bind(item.amount)
            .bind(item.decision_date)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(db)
            .await
            .map_err(map_missing_mission)?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_columns_start_with_id_and_mission() {
        for columns in [FINDING_COLUMNS, REMARK_COLUMNS, SANCTION_COLUMNS] {
            assert!(columns.starts_with("id, mission_id"));
            assert!(columns.ends_with("created_at, updated_at"));
        }
    }
}
