//! Mission repository.
//!
//! Provides CRUD operations for missions plus the dashboard counts and the
//! automatic status transitions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::mission::{
    Mission, MissionListQuery, MissionStatistics, MissionStatus, StatusAdvanceReport,
};
use crate::repositories::repository::{ensure_deleted, Repository};
use crate::types::MissionId;

const TABLE_NAME: &str = "missions";
const SELECT_COLUMNS: &str = "id, reference, title, description, mission_type, organization, \
     address, start_date, end_date, status, control_reason, decision_number, decision_date, \
     team_members, objectives, assigned_to, created_by, ignore_auto_status_change, \
     created_at, updated_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct MissionRepository;

impl MissionRepository {
    pub fn new() -> Self {
        Self
    }

    fn base_select_query() -> String {
        format!("SELECT {} FROM {}", SELECT_COLUMNS, TABLE_NAME)
    }

    /// One page of missions, newest first, optionally filtered by status.
    pub async fn list(
        &self,
        db: &PgPool,
        filter: &MissionListQuery,
    ) -> Result<(Vec<Mission>, i64), AppError> {
        let page = filter.pagination();
        let status = filter.status.map(|s| s.as_str());

        let query = format!(
            "{} WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, Mission>(&query)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(db)
            .await?;

        let count_query = format!(
            "SELECT COUNT(*) FROM {} WHERE ($1::TEXT IS NULL OR status = $1)",
            TABLE_NAME
        );
        let total = sqlx::query_scalar::<_, i64>(&count_query)
            .bind(status)
            .fetch_one(db)
            .await?;

        Ok((rows, total))
    }

    pub async fn statistics(&self, db: &PgPool) -> Result<MissionStatistics, AppError> {
        let query = format!(
            "SELECT status, COUNT(*) FROM {} GROUP BY status",
            TABLE_NAME
        );
        let rows = sqlx::query_as::<_, (String, i64)>(&query)
            .fetch_all(db)
            .await?;

        let mut stats = MissionStatistics::default();
        for (raw, count) in rows {
            match raw.parse::<MissionStatus>() {
                Ok(status) => stats.add(status, count),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping missions with unknown status");
                    stats.total += count;
                }
            }
        }
        Ok(stats)
    }

    /// Moves due missions forward: planned ones that have started become
    /// in progress, in-progress ones that have ended become completed.
    pub async fn advance_statuses(
        &self,
        db: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<StatusAdvanceReport, AppError> {
        let today = now.date_naive();
        let mut tx = db.begin().await?;

        let start_query = format!(
            "UPDATE {} SET status = $1, updated_at = $4 \
             WHERE status = $2 AND start_date <= $3 AND NOT ignore_auto_status_change",
            TABLE_NAME
        );
        let started = sqlx::query(&start_query)
            .bind(MissionStatus::InProgress.as_str())
            .bind(MissionStatus::Planned.as_str())
            .bind(today)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        // Runs after the start step, so a mission whose whole window has
        // passed goes straight through to completed in one pass.
        let complete_query = format!(
            "UPDATE {} SET status = $1, updated_at = $4 \
             WHERE status = $2 AND end_date <= $3 AND NOT ignore_auto_status_change",
            TABLE_NAME
        );
        let completed = sqlx::query(&complete_query)
            .bind(MissionStatus::Completed.as_str())
            .bind(MissionStatus::InProgress.as_str())
            .bind(today)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(StatusAdvanceReport {
            started,
            completed,
            updated: started + completed,
        })
    }

    pub async fn exists(&self, db: &PgPool, id: MissionId) -> Result<bool, AppError> {
        let query = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", TABLE_NAME);
        let exists = sqlx::query_scalar::<_, bool>(&query)
            .bind(id)
            .fetch_one(db)
            .await?;
        Ok(exists)
    }
}

fn map_reference_conflict(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("A mission with this reference already exists".into())
        }
        other => other.into(),
    }
}

impl Repository<Mission> for MissionRepository {
    const TABLE: &'static str = TABLE_NAME;
    type Id = MissionId;

    async fn find_all(&self, db: &PgPool) -> Result<Vec<Mission>, AppError> {
        let query = format!("{} ORDER BY created_at DESC", Self::base_select_query());
        let rows = sqlx::query_as::<_, Mission>(&query).fetch_all(db).await?;
        Ok(rows)
    }

    async fn find_by_id(&self, db: &PgPool, id: MissionId) -> Result<Mission, AppError> {
        let query = format!("{} WHERE id = $1", Self::base_select_query());
        let result = sqlx::query_as::<_, Mission>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Mission not found".into()))?;
        Ok(result)
    }

    async fn create(&self, db: &PgPool, item: &Mission) -> Result<Mission, AppError> {
        let query = format!(
            "INSERT INTO {} ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, Mission>(&query)
            .bind(item.id)
            .bind(&item.reference)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.mission_type.as_str())
            .bind(&item.organization)
            .bind(&item.address)
            .bind(item.start_date)
            .bind(item.end_date)
            .bind(item.status.as_str())
            .bind(item.control_reason.as_str())
            .bind(&item.decision_number)
            .bind(item.decision_date)
            .bind(&item.team_members)
            .bind(&item.objectives)
            .bind(item.assigned_to)
            .bind(item.created_by)
            .bind(item.ignore_auto_status_change)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(db)
            .await
            .map_err(map_reference_conflict)?;
        Ok(row)
    }

    async fn update(&self, db: &PgPool, item: &Mission) -> Result<Mission, AppError> {
        let query = format!(
            "UPDATE {} SET reference = $2, title = $3, description = $4, mission_type = $5, \
             organization = $6, address = $7, start_date = $8, end_date = $9, status = $10, \
             control_reason = $11, decision_number = $12, decision_date = $13, \
             team_members = $14, objectives = $15, assigned_to = $16, \
             ignore_auto_status_change = $17, updated_at = $18 \
             WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, Mission>(&query)
            .bind(item.id)
            .bind(&item.reference)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.mission_type.as_str())
            .bind(&item.organization)
            .bind(&item.address)
            .bind(item.start_date)
            .bind(item.end_date)
            .bind(item.status.as_str())
            .bind(item.control_reason.as_str())
            .bind(&item.decision_number)
            .bind(item.decision_date)
            .bind(&item.team_members)
            .bind(&item.objectives)
            .bind(item.assigned_to)
            .bind(item.ignore_auto_status_change)
            .bind(item.updated_at)
            .fetch_optional(db)
            .await
            .map_err(map_reference_conflict)?
            .ok_or_else(|| AppError::NotFound("Mission not found".into()))?;
        Ok(row)
    }

    /// Findings, remarks and sanctions go with the mission (ON DELETE CASCADE).
    async fn delete(&self, db: &PgPool, id: MissionId) -> Result<(), AppError> {
        let query = format!("DELETE FROM {} WHERE id = $1", TABLE_NAME);
        let result = sqlx::query(&query).bind(id).execute(db).await?;
        ensure_deleted(result.rows_affected(), "Mission")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_columns_cover_every_mission_field() {
        for column in [
            "reference",
            "mission_type",
            "control_reason",
            "team_members",
            "objectives",
            "ignore_auto_status_change",
        ] {
            assert!(SELECT_COLUMNS.contains(column), "missing {column}");
        }
        assert_eq!(SELECT_COLUMNS.split(',').count(), 20);
    }
}
