//! Non-conformities observed during a mission.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{FindingId, MissionId};
use crate::validation::{rules, Violations};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Finding {
    #[schema(value_type = String)]
    pub id: FindingId,
    #[schema(value_type = String)]
    pub mission_id: MissionId,
    /// Category of the non-conformity (free text, e.g. "Sécurité").
    pub kind: String,
    pub description: String,
    /// Article of law the finding refers to.
    pub legal_reference: Option<String>,
    pub recommendation: Option<String>,
    /// Days granted to the organization to correct the finding.
    pub correction_delay_days: Option<i32>,
    pub observed_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateFinding {
    #[validate(length(min = 1, max = 100))]
    pub kind: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
    #[validate(length(max = 200))]
    pub legal_reference: Option<String>,
    #[validate(length(max = 5000))]
    pub recommendation: Option<String>,
    pub correction_delay_days: Option<i32>,
    pub observed_on: Option<NaiveDate>,
}

impl CreateFinding {
    pub fn check_rules(&self, today: NaiveDate) -> Violations {
        let mut violations = Violations::new();
        violations.check("kind", rules::validate_required(&self.kind));
        violations.check("description", rules::validate_required(&self.description));
        if let Some(days) = self.correction_delay_days {
            violations.check("correction_delay_days", rules::validate_correction_delay(days));
        }
        if let Some(observed_on) = self.observed_on {
            violations.check("observed_on", rules::validate_not_in_future(observed_on, today));
        }
        violations
    }

    pub fn into_finding(self, mission_id: MissionId) -> Finding {
        let now = Utc::now();
        Finding {
            id: FindingId::new(),
            mission_id,
            kind: self.kind.trim().to_string(),
            description: self.description,
            legal_reference: self.legal_reference.filter(|r| !r.trim().is_empty()),
            recommendation: self.recommendation.filter(|r| !r.trim().is_empty()),
            correction_delay_days: self.correction_delay_days,
            observed_on: self.observed_on,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_correction_delay_is_rejected() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let payload = CreateFinding {
            kind: "Sécurité".into(),
            description: "Mots de passe partagés".into(),
            legal_reference: Some("Art. 71".into()),
            recommendation: None,
            correction_delay_days: Some(-3),
            observed_on: Some(today),
        };
        let violations = payload.check_rules(today);
        assert_eq!(
            violations.messages(),
            ["correction_delay_days: correction_delay_out_of_range"]
        );
    }

    #[test]
    fn blank_optional_text_is_dropped() {
        let payload = CreateFinding {
            kind: " Information ".into(),
            description: "Mentions absentes".into(),
            legal_reference: Some("  ".into()),
            recommendation: Some("Afficher les mentions".into()),
            correction_delay_days: Some(30),
            observed_on: None,
        };
        let finding = payload.into_finding(MissionId::new());
        assert_eq!(finding.kind, "Information");
        assert!(finding.legal_reference.is_none());
        assert_eq!(finding.recommendation.as_deref(), Some("Afficher les mentions"));
    }
}
