//! Free-form notes attached to a mission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{MissionId, RemarkId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Remark {
    #[schema(value_type = String)]
    pub id: RemarkId,
    #[schema(value_type = String)]
    pub mission_id: MissionId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateRemark {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

impl CreateRemark {
    pub fn into_remark(self, mission_id: MissionId) -> Remark {
        let now = Utc::now();
        Remark {
            id: RemarkId::new(),
            mission_id,
            content: self.content.trim().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
