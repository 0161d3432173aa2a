/// Project endpoints
///
/// Every user may list and read projects; level-3 users only see projects
/// they are on the team of or are the client for. Writes need level 2.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use corpdesk_shared::models::{
    pagination::{Page, PageParams},
    project::{CreateProject, Priority, Project, ProjectFilter, ProjectStatus, ProjectView, UpdateProject},
    role::Level,
    validation,
};
use corpdesk_shared::auth::middleware::AuthContext;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: ProjectStatus,

    #[serde(default)]
    pub priority: Priority,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub budget_cents: i64,

    #[serde(default)]
    #[validate(range(min = 0, message = "Actual cost cannot be negative"))]
    pub actual_cost_cents: i64,

    pub client_id: Uuid,

    #[serde(default)]
    pub team: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<Priority>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub budget_cents: Option<i64>,

    #[validate(range(min = 0, message = "Actual cost cannot be negative"))]
    pub actual_cost_cents: Option<i64>,

    pub client_id: Option<Uuid>,

    /// Replaces the whole team when present
    pub team: Option<Vec<Uuid>>,
}

fn check_dates(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    validation::date_range(&mut errors, start, end, "end_date");
    validation::finish(errors)
}

/// Lists projects visible to the caller
///
/// ```text
/// GET /v1/projects?status=&priority=&search=&limit=&offset=
/// ```
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(filter): ApiQuery<ProjectFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<ProjectView>>> {
    let (projects, total) =
        Project::list(&state.db, &filter, auth.visibility().owner(), &page).await?;

    Ok(Json(Page::new(projects, total, &page).map(ProjectView::from)))
}

/// Creates a project managed by the caller
///
/// # Errors
///
/// - `400 Bad Request`: End date before start date, negative amounts
/// - `403 Forbidden`: Caller below level 2
/// - `409 Conflict`: Unknown client or team member
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectView>)> {
    auth.require_level(Level::Management)?;
    req.validate()?;
    check_dates(req.start_date, req.end_date)?;

    let project = Project::create(
        &state.db,
        CreateProject {
            name: req.name.trim().to_string(),
            description: req.description,
            status: req.status,
            priority: req.priority,
            start_date: req.start_date,
            end_date: req.end_date,
            budget_cents: req.budget_cents,
            actual_cost_cents: req.actual_cost_cents,
            manager_id: auth.user_id,
            client_id: req.client_id,
            team: req.team,
        },
    )
    .await?;

    tracing::info!(project_id = %project.id, manager_id = %auth.user_id, "Project created");

    Ok((StatusCode::CREATED, Json(ProjectView::from(project))))
}

pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ProjectView>> {
    let project = Project::find(&state.db, id, auth.visibility().owner())
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    Ok(Json(ProjectView::from(project)))
}

/// Partially updates a project
///
/// The date range is checked against the stored dates when only one side
/// changes.
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectView>> {
    auth.require_level(Level::Management)?;
    req.validate()?;

    if req.start_date.is_some() || req.end_date.is_some() {
        let current = Project::find(&state.db, id, None)
            .await?
            .ok_or_else(|| ApiError::not_found("Project"))?;
        check_dates(
            req.start_date.unwrap_or(current.start_date),
            req.end_date.unwrap_or(current.end_date),
        )?;
    }

    let project = Project::update(
        &state.db,
        id,
        UpdateProject {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description,
            status: req.status,
            priority: req.priority,
            start_date: req.start_date,
            end_date: req.end_date,
            budget_cents: req.budget_cents,
            actual_cost_cents: req.actual_cost_cents,
            client_id: req.client_id,
            team: req.team,
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Project"))?;

    Ok(Json(ProjectView::from(project)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require_level(Level::Management)?;

    if !Project::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Project"));
    }

    tracing::info!(project_id = %id, deleted_by = %auth.user_id, "Project deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_check_dates() {
        assert!(check_dates(date("2025-01-01"), date("2025-01-01")).is_ok());

        let errors = check_dates(date("2025-02-01"), date("2025-01-01")).unwrap_err();
        assert!(errors.field_errors().contains_key("end_date"));
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateProjectRequest = serde_json::from_str(&format!(
            r#"{{"name": "Website", "start_date": "2025-01-01", "end_date": "2025-06-30",
                "budget_cents": 1000000, "client_id": "{}"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();

        assert_eq!(req.status, ProjectStatus::Planning);
        assert_eq!(req.priority, Priority::Medium);
        assert!(req.team.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_negative_budget_rejected() {
        let req = UpdateProjectRequest {
            budget_cents: Some(-1),
            ..Default::default()
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("budget_cents"));
    }

    #[test]
    fn test_unknown_status_rejected() {
        let parsed = serde_json::from_str::<UpdateProjectRequest>(r#"{"status": "archived"}"#);
        assert!(parsed.is_err());
    }
}
