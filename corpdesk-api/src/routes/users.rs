/// User management endpoints
///
/// Listing, creation and deletion need level 2 or above. A level-2 caller
/// only sees and manages level-3 users. Reads outside the caller's scope
/// answer 404.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
    routes::double_option,
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use corpdesk_shared::{
    auth::{authorization::can_manage_target, middleware::AuthContext, password},
    models::{
        login_history::LoginHistory,
        pagination::{search_term, Page, PageParams},
        role::{Level, Role},
        user::{employee_id_satisfied, CreateUser, UpdateUser, User, UserFilter, UserScope, UserView},
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters"))]
    pub username: String,

    pub password: String,

    #[serde(default)]
    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,

    #[serde(default)]
    pub role: Role,

    #[validate(length(max = 15, message = "Phone number is too long"))]
    pub phone_number: Option<String>,

    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,

    #[validate(length(max = 20))]
    pub employee_id: Option<String>,

    #[validate(length(max = 100))]
    pub department: Option<String>,

    pub hire_date: Option<NaiveDate>,

    #[validate(range(min = 0, message = "Salary cannot be negative"))]
    pub salary_cents: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,

    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[validate(length(max = 150))]
    pub last_name: Option<String>,

    pub role: Option<Role>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 15, message = "Phone number is too long"))]
    pub phone_number: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub date_of_birth: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 20))]
    pub employee_id: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100))]
    pub department: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub hire_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "double_option")]
    pub salary_cents: Option<Option<i64>>,

    pub is_active: Option<bool>,
    pub is_active_employee: Option<bool>,
}

impl From<UpdateUserRequest> for UpdateUser {
    fn from(req: UpdateUserRequest) -> Self {
        UpdateUser {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            role: req.role,
            phone_number: req.phone_number,
            address: req.address,
            date_of_birth: req.date_of_birth,
            employee_id: req.employee_id.map(blank_to_none),
            department: req.department,
            hire_date: req.hire_date,
            salary_cents: req.salary_cents,
            is_active: req.is_active,
            is_active_employee: req.is_active_employee,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginHistoryQuery {
    pub user_id: Option<Uuid>,
}

/// Trims an employee ID; blank values are stored as NULL so they never
/// collide on the unique index
fn blank_to_none(employee_id: Option<String>) -> Option<String> {
    employee_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

/// Allowed characters: letters, digits and `@ . + - _`
fn valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

fn scope_for(auth: &AuthContext) -> UserScope {
    match auth.level() {
        Level::Executive => UserScope::All,
        level => UserScope::Below(level),
    }
}

/// Self, everyone for level 1, level-3 users for level 2
fn can_view(auth: &AuthContext, target: &User) -> bool {
    auth.is_self(target.id)
        || match auth.level() {
            Level::Executive => true,
            Level::Management => target.level() == Level::Staff,
            Level::Staff => false,
        }
}

fn view_for(auth: &AuthContext, user: &User) -> UserView {
    user.view(auth.is_self(user.id) || auth.can_view_financial_data())
}

fn negative_salary(salary: Option<i64>) -> ApiResult<()> {
    if salary.is_some_and(|s| s < 0) {
        return Err(ApiError::invalid_field("salary_cents", "Salary cannot be negative"));
    }
    Ok(())
}

/// Lists users in the caller's scope
///
/// # Endpoint
///
/// ```text
/// GET /v1/users?search=&role=&department=&is_active=&limit=&offset=
/// ```
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(filter): ApiQuery<UserFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<UserView>>> {
    auth.require_user_management()?;

    let (users, total) = User::list(&state.db, &filter, scope_for(&auth), &page).await?;
    let users: Vec<UserView> = users.iter().map(|u| view_for(&auth, u)).collect();

    Ok(Json(Page::new(users, total, &page)))
}

/// Searches users by username, names, email and employee id
///
/// ```text
/// GET /v1/users/search?search=smith&role=employee
/// ```
///
/// `q` is accepted in place of `search`.
pub async fn search_users(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(filter): ApiQuery<UserFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<UserView>>> {
    auth.require_user_management()?;

    if search_term(&filter.search).is_none() {
        return Err(ApiError::invalid_field("search", "Search query is required"));
    }

    let (users, total) = User::list(&state.db, &filter, scope_for(&auth), &page).await?;
    let users: Vec<UserView> = users.iter().map(|u| view_for(&auth, u)).collect();

    Ok(Json(Page::new(users, total, &page)))
}

/// Creates a user
///
/// # Errors
///
/// - `400 Bad Request`: Invalid fields, weak password, missing employee id
/// - `403 Forbidden`: Target role not below the caller's level, or salary
///   set without financial access
/// - `409 Conflict`: Username or employee id taken
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    auth.require_user_management()?;
    req.validate()?;

    let username = req.username.trim().to_string();
    if !valid_username(&username) {
        return Err(ApiError::invalid_field(
            "username",
            "Username may contain only letters, digits and @/./+/-/_",
        ));
    }

    if !can_manage_target(auth.level(), req.role) {
        return Err(ApiError::Forbidden(format!(
            "You cannot create users with the {} role",
            req.role.display_name()
        )));
    }
    if req.salary_cents.is_some() {
        auth.require_financial_access()?;
    }

    let employee_id = blank_to_none(req.employee_id);
    if !employee_id_satisfied(req.role, employee_id.as_deref()) {
        return Err(ApiError::invalid_field(
            "employee_id",
            format!("Employee ID is required for the {} role", req.role.display_name()),
        ));
    }

    let email = req.email.unwrap_or_default();
    let attributes = [
        username.as_str(),
        req.first_name.as_str(),
        req.last_name.as_str(),
        email.as_str(),
    ];
    password::validate_password_policy(&req.password, &attributes)
        .map_err(|e| ApiError::password_policy("password", e))?;
    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            username,
            email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            role: req.role,
            phone_number: req.phone_number,
            address: req.address,
            date_of_birth: req.date_of_birth,
            employee_id,
            department: req.department,
            hire_date: req.hire_date,
            salary_cents: req.salary_cents,
        },
    )
    .await?;

    tracing::info!(
        user_id = %user.id,
        role = %user.role,
        created_by = %auth.user_id,
        "User created"
    );

    Ok((StatusCode::CREATED, Json(view_for(&auth, &user))))
}

/// Reads a user in the caller's scope
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<UserView>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .filter(|u| can_view(&auth, u))
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(view_for(&auth, &user)))
}

/// Partially updates a user
///
/// Users may edit their own profile fields. Changing role, employment data,
/// salary or activation needs a caller who manages the target (and, for a
/// new role, that role too). Nobody changes their own role or deactivates
/// themselves.
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<UserView>> {
    req.validate()?;

    let target = User::find_by_id(&state.db, id)
        .await?
        .filter(|u| can_view(&auth, u))
        .ok_or_else(|| ApiError::not_found("User"))?;

    let update = UpdateUser::from(req);

    if auth.is_self(target.id) {
        if update.role.is_some_and(|r| r != target.role) || update.is_active == Some(false) {
            return Err(ApiError::Forbidden(
                "You cannot change your own role or deactivate your own account".to_string(),
            ));
        }
        if update.touches_restricted_fields() {
            auth.require_level(Level::Executive)?;
        }
    } else {
        if !can_manage_target(auth.level(), target.role) {
            return Err(ApiError::Forbidden(
                "You cannot modify users at or above your own level".to_string(),
            ));
        }
        if let Some(role) = update.role {
            if !can_manage_target(auth.level(), role) {
                return Err(ApiError::Forbidden(format!(
                    "You cannot assign the {} role",
                    role.display_name()
                )));
            }
        }
    }

    if let Some(salary) = update.salary_cents {
        auth.require_financial_access()?;
        negative_salary(salary)?;
    }

    let role = update.role.unwrap_or(target.role);
    let employee_id = match &update.employee_id {
        Some(new) => new.as_deref(),
        None => target.employee_id.as_deref(),
    };
    if !employee_id_satisfied(role, employee_id) {
        return Err(ApiError::invalid_field(
            "employee_id",
            format!("Employee ID is required for the {} role", role.display_name()),
        ));
    }

    let role_changed = update.role.is_some_and(|r| r != target.role);
    let user = User::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if role_changed {
        tracing::info!(
            user_id = %user.id,
            from = %target.role,
            to = %user.role,
            changed_by = %auth.user_id,
            "User role changed"
        );
    } else {
        tracing::debug!(user_id = %user.id, "User updated");
    }

    Ok(Json(view_for(&auth, &user)))
}

/// Deletes a user the caller manages
///
/// # Errors
///
/// - `403 Forbidden`: Deleting yourself, or a user at or above your level
/// - `404 Not Found`: Unknown or out-of-scope user
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require_user_management()?;

    if auth.is_self(id) {
        return Err(ApiError::Forbidden(
            "You cannot delete your own account".to_string(),
        ));
    }

    let target = User::find_by_id(&state.db, id)
        .await?
        .filter(|u| can_view(&auth, u))
        .ok_or_else(|| ApiError::not_found("User"))?;

    if !can_manage_target(auth.level(), target.role) {
        return Err(ApiError::Forbidden(
            "You cannot delete users at or above your own level".to_string(),
        ));
    }

    if !User::delete(&state.db, id).await? {
        return Err(ApiError::not_found("User"));
    }

    tracing::info!(user_id = %id, deleted_by = %auth.user_id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Login history, newest first
///
/// Level-3 callers always get their own history. Others may filter by
/// `user_id`.
pub async fn login_history(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(query): ApiQuery<LoginHistoryQuery>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<LoginHistory>>> {
    let user_id = match auth.visibility().owner() {
        Some(own) => Some(own),
        None => query.user_id,
    };

    let (entries, total) = LoginHistory::list(&state.db, user_id, &page).await?;

    Ok(Json(Page::new(entries, total, &page)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ctx(role: Role) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            username: "caller".to_string(),
            role,
        }
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "target".to_string(),
            email: String::new(),
            password_hash: "hash".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            role,
            phone_number: None,
            address: None,
            date_of_birth: None,
            employee_id: None,
            department: None,
            hire_date: None,
            salary_cents: Some(400_000),
            is_active: true,
            is_active_employee: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn test_blank_employee_id_clears_on_update() {
        let req: UpdateUserRequest = serde_json::from_str(r#"{"employee_id": "   "}"#).unwrap();
        assert_eq!(UpdateUser::from(req).employee_id, Some(None));

        let req: UpdateUserRequest =
            serde_json::from_str(r#"{"employee_id": " EMP-0042 "}"#).unwrap();
        assert_eq!(
            UpdateUser::from(req).employee_id,
            Some(Some("EMP-0042".to_string()))
        );

        let req: UpdateUserRequest = serde_json::from_str(r#"{"first_name": "Ada"}"#).unwrap();
        assert_eq!(UpdateUser::from(req).employee_id, None);
    }

    #[test]
    fn test_valid_username() {
        assert!(valid_username("employee1"));
        assert!(valid_username("j.doe+work@corp"));
        assert!(!valid_username("has space"));
        assert!(!valid_username(""));
    }

    #[test]
    fn test_scope_for_levels() {
        assert_eq!(scope_for(&ctx(Role::Superadmin)), UserScope::All);
        assert_eq!(
            scope_for(&ctx(Role::Admin)),
            UserScope::Below(Level::Management)
        );
    }

    #[test]
    fn test_can_view() {
        let admin = ctx(Role::Admin);
        assert!(can_view(&admin, &user(Role::Employee)));
        assert!(!can_view(&admin, &user(Role::Accountant)));
        assert!(can_view(&ctx(Role::Superadmin), &user(Role::Accountant)));
        assert!(!can_view(&ctx(Role::Employee), &user(Role::Employee)));

        let employee = ctx(Role::Employee);
        let mut me = user(Role::Employee);
        me.id = employee.user_id;
        assert!(can_view(&employee, &me));
    }

    #[test]
    fn test_salary_only_for_self_or_financial() {
        let target = user(Role::Employee);

        assert!(view_for(&ctx(Role::Admin), &target).salary_cents.is_none());
        assert_eq!(
            view_for(&ctx(Role::Accountant), &target).salary_cents,
            Some(400_000)
        );
    }

    #[test]
    fn test_update_request_distinguishes_null() {
        let req: UpdateUserRequest =
            serde_json::from_str(r#"{"department": null, "first_name": "Ann"}"#).unwrap();
        let update = UpdateUser::from(req);

        assert_eq!(update.department, Some(None));
        assert_eq!(update.phone_number, None);
        assert!(update.touches_restricted_fields());
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"username": "jdoe", "password": "x", "email": "not-an-email"}"#,
        )
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }
}
