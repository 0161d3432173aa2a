/// Task endpoints
///
/// Level-3 users see only tasks assigned to them and may move those tasks
/// along (status and actual hours). Everything else needs level 2.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use corpdesk_shared::{
    auth::middleware::AuthContext,
    models::{
        pagination::{Page, PageParams},
        project::{Priority, Project},
        role::Level,
        task::{CreateTask, Task, TaskFilter, TaskStatus, TaskView, UpdateTask},
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    pub project_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: Priority,

    pub assigned_to: Uuid,

    pub due_date: DateTime<Utc>,

    #[serde(default)]
    #[validate(range(min = 0.0, message = "Hours cannot be negative"))]
    pub estimated_hours: f64,

    #[serde(default)]
    #[validate(range(min = 0.0, message = "Hours cannot be negative"))]
    pub actual_hours: f64,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    pub project_id: Option<Uuid>,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,

    #[validate(range(min = 0.0, message = "Hours cannot be negative"))]
    pub estimated_hours: Option<f64>,

    #[validate(range(min = 0.0, message = "Hours cannot be negative"))]
    pub actual_hours: Option<f64>,
}

impl From<UpdateTaskRequest> for UpdateTask {
    fn from(req: UpdateTaskRequest) -> Self {
        UpdateTask {
            project_id: req.project_id,
            title: req.title.map(|t| t.trim().to_string()),
            description: req.description,
            status: req.status,
            priority: req.priority,
            assigned_to: req.assigned_to,
            due_date: req.due_date,
            estimated_hours: req.estimated_hours,
            actual_hours: req.actual_hours,
        }
    }
}

async fn ensure_project(state: &AppState, project_id: Uuid) -> ApiResult<()> {
    if !Project::exists(&state.db, project_id).await? {
        return Err(ApiError::invalid_field("project_id", "Project does not exist"));
    }
    Ok(())
}

/// Lists tasks visible to the caller, earliest due first
///
/// ```text
/// GET /v1/tasks?project=&status=&priority=&limit=&offset=
/// ```
pub async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(filter): ApiQuery<TaskFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<TaskView>>> {
    let (tasks, total) = Task::list(&state.db, &filter, auth.visibility().owner(), &page).await?;

    Ok(Json(Page::new(tasks, total, &page).map(TaskView::from)))
}

/// Creates a task on a project
///
/// # Errors
///
/// - `400 Bad Request`: Unknown project, due date not in the future
/// - `403 Forbidden`: Caller below level 2
/// - `409 Conflict`: Unknown assignee
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskView>)> {
    auth.require_level(Level::Management)?;
    req.validate()?;

    if req.due_date <= Utc::now() {
        return Err(ApiError::invalid_field("due_date", "Due date must be in the future"));
    }
    ensure_project(&state, req.project_id).await?;

    let task = Task::create(
        &state.db,
        CreateTask {
            project_id: req.project_id,
            title: req.title.trim().to_string(),
            description: req.description,
            status: req.status,
            priority: req.priority,
            assigned_to: req.assigned_to,
            created_by: auth.user_id,
            due_date: req.due_date,
            estimated_hours: req.estimated_hours,
            actual_hours: req.actual_hours,
        },
    )
    .await?;

    tracing::info!(
        task_id = %task.id,
        project_id = %task.project_id,
        assigned_to = %task.assigned_to,
        "Task created"
    );

    Ok((StatusCode::CREATED, Json(TaskView::from(task))))
}

pub async fn get_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<TaskView>> {
    let task = Task::find(&state.db, id, auth.visibility().owner())
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    Ok(Json(TaskView::from(task)))
}

/// Partially updates a task
///
/// Assignees below level 2 may only change `status` and `actual_hours`.
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<TaskView>> {
    req.validate()?;

    let current = Task::find(&state.db, id, auth.visibility().owner())
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    let update = UpdateTask::from(req);
    if !auth.has_permission(Level::Management) && !update.is_progress_only() {
        return Err(ApiError::Forbidden(
            "Assignees may only update status and actual_hours".to_string(),
        ));
    }
    if let Some(project_id) = update.project_id {
        ensure_project(&state, project_id).await?;
    }

    let completed = update.status.is_some_and(|s| s.is_completed()) && !current.status.is_completed();

    let task = Task::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    if completed {
        tracing::info!(task_id = %task.id, user_id = %auth.user_id, "Task completed");
    }

    Ok(Json(TaskView::from(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require_level(Level::Management)?;

    if !Task::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Task"));
    }

    tracing::info!(task_id = %id, deleted_by = %auth.user_id, "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignee_update_is_progress_only() {
        let req: UpdateTaskRequest =
            serde_json::from_str(r#"{"status": "review", "actual_hours": 3.5}"#).unwrap();
        assert!(UpdateTask::from(req).is_progress_only());

        let req: UpdateTaskRequest =
            serde_json::from_str(r#"{"status": "review", "title": "Renamed"}"#).unwrap();
        assert!(!UpdateTask::from(req).is_progress_only());
    }

    #[test]
    fn test_negative_hours_rejected() {
        let req = UpdateTaskRequest {
            actual_hours: Some(-1.0),
            ..Default::default()
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("actual_hours"));
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateTaskRequest = serde_json::from_str(&format!(
            r#"{{"project_id": "{}", "title": "Wireframes", "assigned_to": "{}",
                "due_date": "2030-01-01T09:00:00Z"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        ))
        .unwrap();

        assert_eq!(req.status, TaskStatus::Todo);
        assert_eq!(req.priority, Priority::Medium);
        assert_eq!(req.estimated_hours, 0.0);
        assert!(req.validate().is_ok());
    }
}
