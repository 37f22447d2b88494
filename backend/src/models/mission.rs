//! Control missions and their request payloads.

use chrono::{DateTime, NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::finding::Finding;
use crate::models::remark::Remark;
use crate::models::sanction::Sanction;
use crate::types::{MissionId, UserId};
use crate::validation::{rules, Violations};

text_enum! {
    /// How the control is carried out.
    MissionType {
        OnSite => "Contrôle sur place",
        OnDocuments => "Contrôle sur pièces",
        Online => "Contrôle en ligne",
    }
}

text_enum! {
    /// Lifecycle of a mission.
    MissionStatus {
        Planned => "PLANIFIEE",
        InProgress => "EN_COURS",
        Completed => "TERMINEE",
        Cancelled => "ANNULEE",
        AwaitingResponse => "ATTENTE_REPONSE",
    }
}

text_enum! {
    /// Why the control was opened.
    ControlReason {
        Complaint => "Suite a une plainte",
        PlenaryDecision => "Decision de la session pleniere",
        AnnualProgramme => "Programme annuel",
        Other => "Autres",
    }
}

impl Default for MissionStatus {
    fn default() -> Self {
        MissionStatus::Planned
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Mission {
    #[schema(value_type = String)]
    pub id: MissionId,
    pub reference: String,
    pub title: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    #[schema(value_type = String)]
    pub mission_type: MissionType,
    pub organization: String,
    pub address: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[sqlx(try_from = "String")]
    #[schema(value_type = String)]
    pub status: MissionStatus,
    #[sqlx(try_from = "String")]
    #[schema(value_type = String)]
    pub control_reason: ControlReason,
    pub decision_number: Option<String>,
    pub decision_date: Option<NaiveDate>,
    pub team_members: Vec<String>,
    pub objectives: Vec<String>,
    #[schema(value_type = Option<String>)]
    pub assigned_to: Option<UserId>,
    #[schema(value_type = Option<String>)]
    pub created_by: Option<UserId>,
    /// Excludes the mission from automatic status transitions.
    pub ignore_auto_status_change: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    /// Status the scheduler would move this mission to on `today`, if any.
    pub fn scheduled_transition(&self, today: NaiveDate) -> Option<MissionStatus> {
        if self.ignore_auto_status_change {
            return None;
        }
        match self.status {
            MissionStatus::Planned if self.start_date <= today => Some(MissionStatus::InProgress),
            MissionStatus::InProgress if self.end_date <= today => Some(MissionStatus::Completed),
            _ => None,
        }
    }
}

/// A mission together with everything recorded against it.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MissionDetail {
    #[serde(flatten)]
    pub mission: Mission,
    pub findings: Vec<Finding>,
    pub remarks: Vec<Remark>,
    pub sanctions: Vec<Sanction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateMission {
    /// Generated as `MIS-<digits>-<suffix>` when omitted.
    #[serde(default)]
    pub reference: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
    #[schema(value_type = String)]
    pub mission_type: MissionType,
    #[validate(length(min = 1, max = 200))]
    pub organization: String,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub status: Option<MissionStatus>,
    #[schema(value_type = String)]
    pub control_reason: ControlReason,
    #[validate(length(max = 100))]
    pub decision_number: Option<String>,
    pub decision_date: Option<NaiveDate>,
    #[serde(default)]
    pub team_members: Vec<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub ignore_auto_status_change: bool,
}

impl CreateMission {
    /// Cross-field rules the derive cannot express.
    pub fn check_rules(&self, today: NaiveDate) -> Violations {
        let mut violations = Violations::new();
        if let Some(reference) = &self.reference {
            violations.check("reference", rules::validate_reference(reference));
        }
        violations.check("title", rules::validate_required(&self.title));
        violations.check("description", rules::validate_required(&self.description));
        violations.check("organization", rules::validate_required(&self.organization));
        violations.check("address", rules::validate_required(&self.address));
        violations.check(
            "end_date",
            rules::validate_date_range(self.start_date, self.end_date),
        );
        if let Some(decision_date) = self.decision_date {
            violations.check(
                "decision_date",
                rules::validate_not_in_future(decision_date, today),
            );
        }
        violations.check("team_members", rules::validate_entries(&self.team_members));
        violations.check("objectives", rules::validate_entries(&self.objectives));
        violations
    }

    /// Builds the mission to insert, stamping creator and timestamps.
    pub fn into_mission(self, created_by: UserId, now: DateTime<Utc>) -> Mission {
        let reference = self
            .reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| generate_reference(now));
        Mission {
            id: MissionId::new(),
            reference,
            title: self.title.trim().to_string(),
            description: self.description,
            mission_type: self.mission_type,
            organization: self.organization.trim().to_string(),
            address: self.address,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status.unwrap_or_default(),
            control_reason: self.control_reason,
            decision_number: self.decision_number.filter(|n| !n.trim().is_empty()),
            decision_date: self.decision_date,
            team_members: self.team_members,
            objectives: self.objectives,
            assigned_to: self.assigned_to,
            created_by: Some(created_by),
            ignore_auto_status_change: self.ignore_auto_status_change,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateMission {
    pub reference: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub mission_type: Option<MissionType>,
    #[validate(length(min = 1, max = 200))]
    pub organization: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub address: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub status: Option<MissionStatus>,
    #[schema(value_type = Option<String>)]
    pub control_reason: Option<ControlReason>,
    #[validate(length(max = 100))]
    pub decision_number: Option<String>,
    pub decision_date: Option<NaiveDate>,
    pub team_members: Option<Vec<String>>,
    pub objectives: Option<Vec<String>>,
    #[schema(value_type = Option<String>)]
    pub assigned_to: Option<UserId>,
    pub ignore_auto_status_change: Option<bool>,
}

impl UpdateMission {
    /// Merges the provided fields into `mission`.
    pub fn apply_to(self, mission: &mut Mission, now: DateTime<Utc>) {
        if let Some(reference) = self.reference {
            mission.reference = reference.trim().to_string();
        }
        if let Some(title) = self.title {
            mission.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            mission.description = description;
        }
        if let Some(mission_type) = self.mission_type {
            mission.mission_type = mission_type;
        }
        if let Some(organization) = self.organization {
            mission.organization = organization.trim().to_string();
        }
        if let Some(address) = self.address {
            mission.address = address;
        }
        if let Some(start_date) = self.start_date {
            mission.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            mission.end_date = end_date;
        }
        if let Some(status) = self.status {
            mission.status = status;
        }
        if let Some(control_reason) = self.control_reason {
            mission.control_reason = control_reason;
        }
        if let Some(decision_number) = self.decision_number {
            mission.decision_number = Some(decision_number).filter(|n| !n.trim().is_empty());
        }
        if let Some(decision_date) = self.decision_date {
            mission.decision_date = Some(decision_date);
        }
        if let Some(team_members) = self.team_members {
            mission.team_members = team_members;
        }
        if let Some(objectives) = self.objectives {
            mission.objectives = objectives;
        }
        if let Some(assigned_to) = self.assigned_to {
            mission.assigned_to = Some(assigned_to);
        }
        if let Some(flag) = self.ignore_auto_status_change {
            mission.ignore_auto_status_change = flag;
        }
        mission.updated_at = now;
    }
}

/// Rules that must hold for a mission after an update has been merged.
pub fn check_mission_rules(mission: &Mission, today: NaiveDate) -> Violations {
    let mut violations = Violations::new();
    violations.check("reference", rules::validate_reference(&mission.reference));
    violations.check("title", rules::validate_required(&mission.title));
    violations.check("description", rules::validate_required(&mission.description));
    violations.check("organization", rules::validate_required(&mission.organization));
    violations.check("address", rules::validate_required(&mission.address));
    violations.check(
        "end_date",
        rules::validate_date_range(mission.start_date, mission.end_date),
    );
    if let Some(decision_date) = mission.decision_date {
        violations.check(
            "decision_date",
            rules::validate_not_in_future(decision_date, today),
        );
    }
    violations.check("team_members", rules::validate_entries(&mission.team_members));
    violations.check("objectives", rules::validate_entries(&mission.objectives));
    violations
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct MissionListQuery {
    /// Only return missions in this status.
    #[param(value_type = Option<String>)]
    pub status: Option<MissionStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl MissionListQuery {
    pub fn pagination(&self) -> crate::models::PaginationQuery {
        crate::models::PaginationQuery {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Mission counts for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MissionStatistics {
    pub total: i64,
    pub planned: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub awaiting_response: i64,
}

impl MissionStatistics {
    pub fn add(&mut self, status: MissionStatus, count: i64) {
        self.total += count;
        match status {
            MissionStatus::Planned => self.planned += count,
            MissionStatus::InProgress => self.in_progress += count,
            MissionStatus::Completed => self.completed += count,
            MissionStatus::Cancelled => self.cancelled += count,
            MissionStatus::AwaitingResponse => self.awaiting_response += count,
        }
    }
}

/// Outcome of one pass of automatic status transitions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct StatusAdvanceReport {
    pub started: u64,
    pub completed: u64,
    pub updated: u64,
}

fn generate_reference(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().rem_euclid(1_000_000);
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(3)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!("MIS-{:06}-{}", millis, suffix)
}
