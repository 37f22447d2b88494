//! Mission endpoints. Reading is open to every signed-in user; writes are
//! gated by the caller's role permissions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use crate::{
    error::AppError,
    models::{
        finding::{CreateFinding, Finding},
        mission::{
            check_mission_rules, CreateMission, Mission, MissionDetail, MissionListQuery,
            MissionStatistics, StatusAdvanceReport, UpdateMission,
        },
        remark::{CreateRemark, Remark},
        sanction::{CreateSanction, Sanction},
        session::Session,
        user::Permissions,
        PaginatedResponse,
    },
    repositories::{
        FindingRepository, MissionRepository, RemarkRepository, Repository, SanctionRepository,
    },
    state::AppState,
    types::MissionId,
    utils::time::Clock,
    validation::{rules::validate_required, validate_payload, Violations},
};

fn require(
    session: &Session,
    allowed: impl Fn(&Permissions) -> bool,
    action: &str,
) -> Result<(), AppError> {
    if allowed(&session.subject.role.permissions()) {
        return Ok(());
    }
    tracing::warn!(user_id = %session.subject.id, role = %session.subject.role, action, "Mission action refused");
    Err(AppError::Forbidden(format!(
        "Your role does not allow you to {}",
        action
    )))
}

pub async fn list_missions(
    State(state): State<AppState>,
    Query(query): Query<MissionListQuery>,
) -> Result<Json<PaginatedResponse<Mission>>, AppError> {
    let page = query.pagination();
    let (missions, total) = MissionRepository::new().list(&state.pool, &query).await?;
    Ok(Json(PaginatedResponse::new(
        missions,
        total,
        page.limit(),
        page.offset(),
    )))
}

pub async fn get_mission(
    State(state): State<AppState>,
    Path(id): Path<MissionId>,
) -> Result<Json<MissionDetail>, AppError> {
    let mission = MissionRepository::new().find_by_id(&state.pool, id).await?;
    let findings = FindingRepository::new().list_for_mission(&state.pool, id).await?;
    let remarks = RemarkRepository::new().list_for_mission(&state.pool, id).await?;
    let sanctions = SanctionRepository::new().list_for_mission(&state.pool, id).await?;
    Ok(Json(MissionDetail {
        mission,
        findings,
        remarks,
        sanctions,
    }))
}

pub async fn create_mission(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<CreateMission>,
) -> Result<(StatusCode, Json<Mission>), AppError> {
    require(&session, |p| p.can_create_missions, "create missions")?;
    let rules = payload.check_rules(state.clock.today());
    validate_payload(&payload, rules)?;

    let mission = payload.into_mission(session.subject.id, state.clock.now());
    let created = MissionRepository::new().create(&state.pool, &mission).await?;
    tracing::info!(
        mission_id = %created.id,
        reference = %created.reference,
        created_by = %session.subject.id,
        "Mission created"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_mission(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<MissionId>,
    Json(payload): Json<UpdateMission>,
) -> Result<Json<Mission>, AppError> {
    require(&session, |p| p.can_edit_missions, "edit missions")?;
    validate_payload(&payload, Violations::new())?;

    let repo = MissionRepository::new();
    let mut mission = repo.find_by_id(&state.pool, id).await?;
    payload.apply_to(&mut mission, state.clock.now());
    check_mission_rules(&mission, state.clock.today()).into_result()?;

    let updated = repo.update(&state.pool, &mission).await?;
    tracing::info!(mission_id = %updated.id, status = %updated.status, updated_by = %session.subject.id, "Mission updated");
    Ok(Json(updated))
}

pub async fn delete_mission(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<MissionId>,
) -> Result<StatusCode, AppError> {
    require(&session, |p| p.can_delete_missions, "delete missions")?;
    MissionRepository::new().delete(&state.pool, id).await?;
    tracing::info!(mission_id = %id, deleted_by = %session.subject.id, "Mission deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn statistics(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<MissionStatistics>, AppError> {
    require(&session, |p| p.can_view_reports, "view reports")?;
    Ok(Json(MissionRepository::new().statistics(&state.pool).await?))
}

pub async fn advance_statuses(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<StatusAdvanceReport>, AppError> {
    require(&session, |p| p.can_edit_missions, "update mission statuses")?;
    let report = MissionRepository::new()
        .advance_statuses(&state.pool, state.clock.now())
        .await?;
    tracing::info!(
        started = report.started,
        completed = report.completed,
        "Mission statuses advanced"
    );
    Ok(Json(report))
}

async fn ensure_mission(state: &AppState, id: MissionId) -> Result<(), AppError> {
    if MissionRepository::new().exists(&state.pool, id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound("Mission not found".into()))
    }
}

pub async fn list_findings(
    State(state): State<AppState>,
    Path(id): Path<MissionId>,
) -> Result<Json<Vec<Finding>>, AppError> {
    ensure_mission(&state, id).await?;
    Ok(Json(FindingRepository::new().list_for_mission(&state.pool, id).await?))
}

pub async fn add_finding(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<MissionId>,
    Json(payload): Json<CreateFinding>,
) -> Result<(StatusCode, Json<Finding>), AppError> {
    require(&session, |p| p.can_edit_missions, "record findings")?;
    let rules = payload.check_rules(state.clock.today());
    validate_payload(&payload, rules)?;

    let created = FindingRepository::new()
        .create(&state.pool, &payload.into_finding(id))
        .await?;
    tracing::info!(mission_id = %id, finding_id = %created.id, "Finding recorded");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_remarks(
    State(state): State<AppState>,
    Path(id): Path<MissionId>,
) -> Result<Json<Vec<Remark>>, AppError> {
    ensure_mission(&state, id).await?;
    Ok(Json(RemarkRepository::new().list_for_mission(&state.pool, id).await?))
}

pub async fn add_remark(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<MissionId>,
    Json(payload): Json<CreateRemark>,
) -> Result<(StatusCode, Json<Remark>), AppError> {
    require(&session, |p| p.can_edit_missions, "add remarks")?;
    let mut rules = Violations::new();
    rules.check("content", validate_required(&payload.content));
    validate_payload(&payload, rules)?;

    let created = RemarkRepository::new()
        .create(&state.pool, &payload.into_remark(id))
        .await?;
    tracing::info!(mission_id = %id, remark_id = %created.id, "Remark added");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_sanctions(
    State(state): State<AppState>,
    Path(id): Path<MissionId>,
) -> Result<Json<Vec<Sanction>>, AppError> {
    ensure_mission(&state, id).await?;
    Ok(Json(SanctionRepository::new().list_for_mission(&state.pool, id).await?))
}

pub async fn add_sanction(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<MissionId>,
    Json(payload): Json<CreateSanction>,
) -> Result<(StatusCode, Json<Sanction>), AppError> {
    require(&session, |p| p.can_edit_missions, "record sanctions")?;
    let rules = payload.check_rules(state.clock.today());
    validate_payload(&payload, rules)?;

    let created = SanctionRepository::new()
        .create(&state.pool, &payload.into_sanction(id))
        .await?;
    tracing::info!(mission_id = %id, sanction_id = %created.id, "Sanction recorded");
    Ok((StatusCode::CREATED, Json(created)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::VerifiedSubject;
    use crate::models::user::UserRole;
    use crate::types::UserId;
    use chrono::{Duration, Utc};

    fn session(role: UserRole) -> Session {
        Session::issue(
            VerifiedSubject {
                id: UserId::new(),
                email: "x@cdp.sn".into(),
                display_name: "X".into(),
                role,
                active: true,
            },
            Utc::now(),
            Duration::hours(1),
        )
    }

    #[test]
    fn require_follows_role_permissions() {
        assert!(require(&session(UserRole::Controller), |p| p.can_create_missions, "create").is_ok());
        assert!(require(&session(UserRole::Supervisor), |p| p.can_delete_missions, "delete").is_err());
        assert!(require(&session(UserRole::Admin), |p| p.can_delete_missions, "delete").is_ok());
        match require(&session(UserRole::Viewer), |p| p.can_edit_missions, "edit missions") {
            Err(AppError::Forbidden(msg)) => assert!(msg.contains("edit missions")),
            other => panic!("unexpected: {:?}", other.is_ok()),
        }
        assert!(require(&session(UserRole::Controller), |p| p.can_view_reports, "view reports").is_err());
        assert!(require(&session(UserRole::Viewer), |p| p.can_view_reports, "view reports").is_ok());
    }
}
