/// Department endpoints, all restricted to level 2 and above

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
    routes::double_option,
};
use axum::{extract::State, http::StatusCode, Json};
use corpdesk_shared::{
    auth::middleware::AuthContext,
    models::{
        department::{CreateDepartment, Department, UpdateDepartment},
        pagination::{Page, PageParams},
        role::Level,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDepartmentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub head_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDepartmentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub head_id: Option<Option<Uuid>>,
}

pub async fn list_departments(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<Department>>> {
    auth.require_level(Level::Management)?;

    let (departments, total) = Department::list(&state.db, &page).await?;

    Ok(Json(Page::new(departments, total, &page)))
}

/// Creates a department
///
/// # Errors
///
/// - `409 Conflict`: Name taken or unknown head
pub async fn create_department(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreateDepartmentRequest>,
) -> ApiResult<(StatusCode, Json<Department>)> {
    auth.require_level(Level::Management)?;
    req.validate()?;

    let department = Department::create(
        &state.db,
        CreateDepartment {
            name: req.name.trim().to_string(),
            description: req.description,
            head_id: req.head_id,
        },
    )
    .await?;

    tracing::info!(department_id = %department.id, name = %department.name, "Department created");

    Ok((StatusCode::CREATED, Json(department)))
}

pub async fn get_department(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Department>> {
    auth.require_level(Level::Management)?;

    let department = Department::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Department"))?;

    Ok(Json(department))
}

pub async fn update_department(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateDepartmentRequest>,
) -> ApiResult<Json<Department>> {
    auth.require_level(Level::Management)?;
    req.validate()?;

    let department = Department::update(
        &state.db,
        id,
        UpdateDepartment {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description,
            head_id: req.head_id,
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Department"))?;

    Ok(Json(department))
}

pub async fn delete_department(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require_level(Level::Management)?;

    if !Department::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Department"));
    }

    tracing::info!(department_id = %id, deleted_by = %auth.user_id, "Department deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_rejected() {
        let req: CreateDepartmentRequest = serde_json::from_str(r#"{"name": ""}"#).unwrap();
        assert!(req.validate().is_err());

        let req: CreateDepartmentRequest =
            serde_json::from_str(r#"{"name": "Engineering"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.description.is_empty());
    }

    #[test]
    fn test_update_can_clear_head() {
        let req: UpdateDepartmentRequest = serde_json::from_str(r#"{"head_id": null}"#).unwrap();
        assert_eq!(req.head_id, Some(None));
        assert!(req.name.is_none());
    }
}
