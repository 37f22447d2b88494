//! Sanctions pronounced at the end of a mission.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{MissionId, SanctionId};
use crate::validation::{rules, Violations};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Sanction {
    #[schema(value_type = String)]
    pub id: SanctionId,
    #[schema(value_type = String)]
    pub mission_id: MissionId,
    /// Kind of measure (warning, formal notice, fine...).
    pub kind: String,
    pub description: String,
    /// Fine amount in FCFA, when the sanction is pecuniary.
    pub amount: Option<i64>,
    pub decision_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSanction {
    #[validate(length(min = 1, max = 100))]
    pub kind: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
    pub amount: Option<i64>,
    pub decision_date: Option<NaiveDate>,
}

impl CreateSanction {
    pub fn check_rules(&self, today: NaiveDate) -> Violations {
        let mut violations = Violations::new();
        violations.check("kind", rules::validate_required(&self.kind));
        violations.check("description", rules::validate_required(&self.description));
        if let Some(amount) = self.amount {
            violations.check("amount", rules::validate_amount(amount));
        }
        if let Some(decision_date) = self.decision_date {
            violations.check(
                "decision_date",
                rules::validate_not_in_future(decision_date, today),
            );
        }
        violations
    }

    pub fn into_sanction(self, mission_id: MissionId) -> Sanction {
        let now = Utc::now();
        Sanction {
            id: SanctionId::new(),
            mission_id,
            kind: self.kind.trim().to_string(),
            description: self.description,
            amount: self.amount,
            decision_date: self.decision_date,
            created_at: now,
            updated_at: now,
        }
    }
}
