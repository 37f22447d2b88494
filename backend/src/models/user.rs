//! Models that represent users, authentication payloads, and role metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::session::VerifiedSubject;
use crate::types::UserId;

text_enum! {
    /// Supported user roles stored in the database.
    UserRole {
        /// Full access, including user management and deletions.
        Admin => "admin",
        /// Creates, edits and manages missions but cannot delete them.
        Supervisor => "supervisor",
        /// Creates and edits missions.
        Controller => "controller",
        /// Read-only access to missions and reports.
        Viewer => "viewer",
        /// Basic read access.
        User => "user",
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}

impl UserRole {
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Admin => "Administrateur",
            UserRole::Supervisor => "Superviseur",
            UserRole::Controller => "Contrôleur",
            UserRole::Viewer => "Lecteur",
            UserRole::User => "Utilisateur",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            UserRole::Admin => "Accès complet à toutes les fonctionnalités",
            UserRole::Supervisor => {
                "Peut créer, éditer et gérer les missions, mais pas supprimer"
            }
            UserRole::Controller => "Peut créer et éditer ses propres missions",
            UserRole::Viewer => "Peut seulement consulter les missions et rapports",
            UserRole::User => "Accès limité aux fonctionnalités de base",
        }
    }

    pub fn permissions(&self) -> Permissions {
        match self {
            UserRole::Admin => Permissions {
                can_create_missions: true,
                can_edit_missions: true,
                can_delete_missions: true,
                can_manage_users: true,
                can_view_reports: true,
            },
            UserRole::Supervisor => Permissions {
                can_create_missions: true,
                can_edit_missions: true,
                can_delete_missions: false,
                can_manage_users: false,
                can_view_reports: true,
            },
            UserRole::Controller => Permissions {
                can_create_missions: true,
                can_edit_missions: true,
                can_delete_missions: false,
                can_manage_users: false,
                can_view_reports: false,
            },
            UserRole::Viewer => Permissions {
                can_view_reports: true,
                ..Permissions::default()
            },
            UserRole::User => Permissions::default(),
        }
    }
}

/// What a role may do. Reading missions is open to every authenticated user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Permissions {
    pub can_create_missions: bool,
    pub can_edit_missions: bool,
    pub can_delete_missions: bool,
    pub can_manage_users: bool,
    pub can_view_reports: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// Database representation of a user account.
pub struct User {
    #[schema(value_type = String)]
    pub id: UserId,
    /// Login identifier, stored lower-cased.
    pub email: String,
    /// Display name.
    pub name: String,
    #[sqlx(try_from = "String")]
    #[schema(value_type = String)]
    pub role: UserRole,
    /// Inactive accounts cannot log in.
    pub is_active: bool,
    pub department: String,
    pub phone: String,
    /// Argon2id PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Constructs a new active user with freshly generated identifiers.
    pub fn new(
        email: &str,
        name: String,
        role: UserRole,
        password_hash: String,
        department: String,
        phone: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email: normalize_email(email),
            name,
            role,
            is_active: true,
            department,
            phone,
            password_hash,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` when the user holds the `Admin` role.
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    /// The session-safe view of this account.
    pub fn to_subject(&self) -> VerifiedSubject {
        VerifiedSubject {
            id: self.id,
            email: self.email.clone(),
            display_name: self.name.clone(),
            role: self.role,
            active: self.is_active,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
/// Payload for creating a new user account.
pub struct CreateUser {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[schema(value_type = String)]
    pub role: UserRole,
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 120))]
    pub department: Option<String>,
    #[serde(default)]
    #[validate(length(max = 40))]
    pub phone: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
/// Payload for updating portions of an existing user.
pub struct UpdateUser {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[schema(value_type = Option<String>)]
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    #[validate(length(max = 120))]
    pub department: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
}

impl UpdateUser {
    /// Applies the provided fields. Returns `true` when access-relevant fields
    /// (role or activation) changed.
    pub fn apply_to(self, user: &mut User) -> bool {
        let mut access_changed = false;
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(role) = self.role {
            access_changed |= role != user.role;
            user.role = role;
        }
        if let Some(is_active) = self.is_active {
            access_changed |= is_active != user.is_active;
            user.is_active = is_active;
        }
        if let Some(department) = self.department {
            user.department = department;
        }
        if let Some(phone) = self.phone {
            user.phone = phone;
        }
        user.updated_at = Utc::now();
        access_changed
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Credentials submitted by a user attempting to authenticate.
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Payload submitted when a user requests to change their password.
pub struct ChangePasswordRequest {
    /// Existing password that will be verified before applying the change.
    pub current_password: String,
    /// Replacement password that will be stored if verification succeeds.
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Public-facing representation of a user returned by the API.
pub struct UserResponse {
    #[schema(value_type = String)]
    pub id: UserId,
    pub email: String,
    pub name: String,
    #[schema(value_type = String)]
    pub role: UserRole,
    pub permissions: Permissions,
    pub is_active: bool,
    pub department: String,
    pub phone: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            permissions: user.role.permissions(),
            is_active: user.is_active,
            department: user.department,
            phone: user.phone,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// One entry of the role catalogue.
pub struct RoleDescription {
    #[schema(value_type = String)]
    pub value: UserRole,
    pub label: String,
    pub description: String,
    pub permissions: Permissions,
}

impl From<UserRole> for RoleDescription {
    fn from(role: UserRole) -> Self {
        RoleDescription {
            value: role,
            label: role.label().to_string(),
            description: role.description().to_string(),
            permissions: role.permissions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample_user(role: UserRole) -> User {
        User::new(
            "  Inspecteur@CDP.sn ",
            "Awa Diop".to_string(),
            role,
            "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            "Contrôle".to_string(),
            String::new(),
        )
    }

    #[test]
    fn user_role_serde_accepts_and_emits_snake_case() {
        let s: UserRole = serde_json::from_str("\"supervisor\"").unwrap();
        let a: UserRole = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(s, UserRole::Supervisor);
        assert_eq!(a, UserRole::Admin);
        assert!(serde_json::from_str::<UserRole>("\"root\"").is_err());

        let value = serde_json::to_value(UserRole::Controller).unwrap();
        assert_eq!(value, Value::String("controller".into()));
    }

    #[test]
    fn role_permissions_follow_role_catalogue() {
        let admin = UserRole::Admin.permissions();
        assert!(admin.can_delete_missions && admin.can_manage_users);

        let supervisor = UserRole::Supervisor.permissions();
        assert!(supervisor.can_create_missions && supervisor.can_edit_missions);
        assert!(!supervisor.can_delete_missions);
        assert!(!supervisor.can_manage_users);

        let controller = UserRole::Controller.permissions();
        assert!(controller.can_create_missions && controller.can_edit_missions);
        assert!(!controller.can_delete_missions);

        let viewer = UserRole::Viewer.permissions();
        assert!(viewer.can_view_reports);
        assert!(!viewer.can_create_missions && !viewer.can_edit_missions);

        assert_eq!(UserRole::User.permissions(), Permissions::default());
    }

    #[test]
    fn new_user_normalizes_email() {
        let user = sample_user(UserRole::Controller);
        assert_eq!(user.email, "inspecteur@cdp.sn");
        assert!(user.is_active);
        assert!(user.last_login.is_none());
    }

    #[test]
    fn serialized_user_never_contains_password_hash() {
        let user = sample_user(UserRole::Admin);
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());

        let response = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(response.get("password_hash").is_none());
        assert_eq!(response["role"], "admin");
        assert_eq!(response["permissions"]["can_manage_users"], true);
    }

    #[test]
    fn update_user_reports_access_changes() {
        let mut user = sample_user(UserRole::Viewer);
        let changed = UpdateUser {
            name: Some("Awa Diop Ndiaye".into()),
            ..UpdateUser::default()
        }
        .apply_to(&mut user);
        assert!(!changed);
        assert_eq!(user.name, "Awa Diop Ndiaye");

        let changed = UpdateUser {
            role: Some(UserRole::Supervisor),
            ..UpdateUser::default()
        }
        .apply_to(&mut user);
        assert!(changed);

        let changed = UpdateUser {
            is_active: Some(false),
            ..UpdateUser::default()
        }
        .apply_to(&mut user);
        assert!(changed);
        assert!(!user.is_active);
    }

    #[test]
    fn subject_carries_no_secret_material() {
        let user = sample_user(UserRole::Controller);
        let subject = user.to_subject();
        let value = serde_json::to_value(&subject).unwrap();
        assert_eq!(value["email"], "inspecteur@cdp.sn");
        assert!(!value.to_string().contains("argon2"));
    }
}
