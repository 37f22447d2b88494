#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    error::ErrorResponse,
    handlers::{auth::MeResponse, users::LockoutStatus},
    models::{
        finding::{CreateFinding, Finding},
        mission::{
            CreateMission, Mission, MissionDetail, MissionListQuery, MissionStatistics,
            StatusAdvanceReport, UpdateMission,
        },
        remark::{CreateRemark, Remark},
        sanction::{CreateSanction, Sanction},
        session::{LoginResponse, VerifiedSubject},
        user::{
            ChangePasswordRequest, CreateUser, LoginRequest, Permissions, RoleDescription,
            UpdateUser, UserResponse,
        },
        PaginatedResponse,
    },
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        login_doc,
        logout_doc,
        me_doc,
        change_password_doc,
        roles_doc,
        list_missions_doc,
        create_mission_doc,
        get_mission_doc,
        update_mission_doc,
        delete_mission_doc,
        mission_statistics_doc,
        advance_statuses_doc,
        list_findings_doc,
        add_finding_doc,
        list_remarks_doc,
        add_remark_doc,
        list_sanctions_doc,
        add_sanction_doc,
        list_users_doc,
        create_user_doc,
        get_user_doc,
        update_user_doc,
        delete_user_doc,
        get_lockout_doc,
        clear_lockout_doc
    ),
    components(
        schemas(
            ErrorResponse,
            // auth
            LoginRequest,
            LoginResponse,
            ChangePasswordRequest,
            MeResponse,
            VerifiedSubject,
            Permissions,
            RoleDescription,
            // users
            CreateUser,
            UpdateUser,
            UserResponse,
            LockoutStatus,
            // missions
            Mission,
            MissionDetail,
            CreateMission,
            UpdateMission,
            MissionStatistics,
            StatusAdvanceReport,
            PaginatedResponse<Mission>,
            Finding,
            CreateFinding,
            Remark,
            CreateRemark,
            Sanction,
            CreateSanction
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Auth", description = "Sign-in, sessions and password management"),
        (name = "Missions", description = "Control missions and their records"),
        (name = "Users", description = "Administrator account and lockout management")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("opaque".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
        (status = 423, description = "Account temporarily locked", body = ErrorResponse),
        (status = 429, description = "Too many requests from this address"),
        (status = 503, description = "Verification or session storage unavailable", body = ErrorResponse)
    ),
    tag = "Auth",
    security(())
)]
fn login_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Session revoked", body = serde_json::Value)),
    tag = "Auth"
)]
fn logout_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current session", body = MeResponse),
        (status = 401, description = "Missing or expired session", body = ErrorResponse)
    ),
    tag = "Auth"
)]
fn me_doc() {}

#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed, sessions revoked", body = serde_json::Value),
        (status = 400, description = "Current password incorrect or new password rejected", body = ErrorResponse),
        (status = 423, description = "Too many wrong current passwords", body = ErrorResponse)
    ),
    tag = "Auth"
)]
fn change_password_doc() {}

#[utoipa::path(
    get,
    path = "/api/roles",
    responses((status = 200, body = [RoleDescription])),
    tag = "Auth",
    security(())
)]
fn roles_doc() {}

#[utoipa::path(
    get,
    path = "/api/missions",
    params(MissionListQuery),
    responses((status = 200, body = PaginatedResponse<Mission>)),
    tag = "Missions"
)]
fn list_missions_doc() {}

#[utoipa::path(
    post,
    path = "/api/missions",
    request_body = CreateMission,
    responses(
        (status = 201, body = Mission),
        (status = 400, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 409, description = "Reference already used", body = ErrorResponse)
    ),
    tag = "Missions"
)]
fn create_mission_doc() {}

#[utoipa::path(
    get,
    path = "/api/missions/{id}",
    params(("id" = String, Path, description = "Mission id")),
    responses((status = 200, body = MissionDetail), (status = 404, body = ErrorResponse)),
    tag = "Missions"
)]
fn get_mission_doc() {}

#[utoipa::path(
    put,
    path = "/api/missions/{id}",
    params(("id" = String, Path, description = "Mission id")),
    request_body = UpdateMission,
    responses((status = 200, body = Mission), (status = 400, body = ErrorResponse)),
    tag = "Missions"
)]
fn update_mission_doc() {}

#[utoipa::path(
    delete,
    path = "/api/missions/{id}",
    params(("id" = String, Path, description = "Mission id")),
    responses((status = 204, description = "Mission and its records deleted")),
    tag = "Missions"
)]
fn delete_mission_doc() {}

#[utoipa::path(
    get,
    path = "/api/missions/statistics",
    responses(
        (status = 200, body = MissionStatistics),
        (status = 403, body = ErrorResponse)
    ),
    tag = "Missions"
)]
fn mission_statistics_doc() {}

#[utoipa::path(
    post,
    path = "/api/missions/advance-statuses",
    responses((status = 200, body = StatusAdvanceReport)),
    tag = "Missions"
)]
fn advance_statuses_doc() {}

#[utoipa::path(
    get,
    path = "/api/missions/{id}/findings",
    params(("id" = String, Path, description = "Mission id")),
    responses((status = 200, body = [Finding])),
    tag = "Missions"
)]
fn list_findings_doc() {}

#[utoipa::path(
    post,
    path = "/api/missions/{id}/findings",
    params(("id" = String, Path, description = "Mission id")),
    request_body = CreateFinding,
    responses((status = 201, body = Finding)),
    tag = "Missions"
)]
fn add_finding_doc() {}

#[utoipa::path(
    get,
    path = "/api/missions/{id}/remarks",
    params(("id" = String, Path, description = "Mission id")),
    responses((status = 200, body = [Remark])),
    tag = "Missions"
)]
fn list_remarks_doc() {}

#[utoipa::path(
    post,
    path = "/api/missions/{id}/remarks",
    params(("id" = String, Path, description = "Mission id")),
    request_body = CreateRemark,
    responses((status = 201, body = Remark)),
    tag = "Missions"
)]
fn add_remark_doc() {}

#[utoipa::path(
    get,
    path = "/api/missions/{id}/sanctions",
    params(("id" = String, Path, description = "Mission id")),
    responses((status = 200, body = [Sanction])),
    tag = "Missions"
)]
fn list_sanctions_doc() {}

#[utoipa::path(
    post,
    path = "/api/missions/{id}/sanctions",
    params(("id" = String, Path, description = "Mission id")),
    request_body = CreateSanction,
    responses((status = 201, body = Sanction)),
    tag = "Missions"
)]
fn add_sanction_doc() {}

#[utoipa::path(
    get,
    path = "/api/users",
    responses((status = 200, body = [UserResponse]), (status = 403, body = ErrorResponse)),
    tag = "Users"
)]
fn list_users_doc() {}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses((status = 201, body = UserResponse), (status = 409, body = ErrorResponse)),
    tag = "Users"
)]
fn create_user_doc() {}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses((status = 200, body = UserResponse)),
    tag = "Users"
)]
fn get_user_doc() {}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUser,
    responses((status = 200, body = UserResponse)),
    tag = "Users"
)]
fn update_user_doc() {}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses((status = 204, description = "User deleted")),
    tag = "Users"
)]
fn delete_user_doc() {}

#[utoipa::path(
    get,
    path = "/api/users/lockouts/{email}",
    params(("email" = String, Path, description = "Account email")),
    responses((status = 200, body = LockoutStatus)),
    tag = "Users"
)]
fn get_lockout_doc() {}

#[utoipa::path(
    delete,
    path = "/api/users/lockouts/{email}",
    params(("email" = String, Path, description = "Account email")),
    responses((status = 200, description = "Whether a record was removed", body = serde_json::Value)),
    tag = "Users"
)]
fn clear_lockout_doc() {}
