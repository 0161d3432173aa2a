/// Task model and database operations
///
/// Tasks belong to a project and are assigned to a single user.
/// `completed_at` is maintained here: it is stamped when the status becomes
/// `completed` and cleared when it leaves `completed`.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'review', 'completed');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     title VARCHAR(200) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     status task_status NOT NULL DEFAULT 'todo',
///     priority priority NOT NULL DEFAULT 'medium',
///     assigned_to UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     due_date TIMESTAMPTZ NOT NULL,
///     completed_at TIMESTAMPTZ,
///     estimated_hours DOUBLE PRECISION NOT NULL DEFAULT 0,
///     actual_hours DOUBLE PRECISION NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::pagination::PageParams;
use super::project::{percentage, Priority};

const TASK_SELECT: &str = r#"
    SELECT t.id, t.project_id, p.name AS project_name, t.title, t.description, t.status,
           t.priority, t.assigned_to, t.created_by, t.due_date, t.completed_at,
           t.estimated_hours, t.actual_hours, t.created_at, t.updated_at
    FROM tasks t
    JOIN projects p ON p.id = t.project_id
"#;

/// Task workflow status
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Completed,
}

impl TaskStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Review => "Under Review",
            TaskStatus::Completed => "Completed",
        }
    }

    /// Checks if this is a terminal state
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

/// Task row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub project_name: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assigned_to: Uuid,
    pub created_by: Uuid,
    pub due_date: DateTime<Utc>,
    /// Set while status is `completed`
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Serialized task, with derived fields
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub status_display: &'static str,
    pub priority_display: &'static str,
    pub is_overdue: bool,
    pub progress_percentage: f64,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            status_display: task.status.display_name(),
            priority_display: task.priority.display_name(),
            is_overdue: task.is_overdue_at(Utc::now()),
            progress_percentage: task.progress_percentage(),
            task,
        }
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assigned_to: Uuid,
    pub created_by: Uuid,
    pub due_date: DateTime<Utc>,
    pub estimated_hours: f64,
    pub actual_hours: f64,
}

/// Input for updating a task
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub project_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
}

impl UpdateTask {
    /// True when only `status` and/or `actual_hours` are set, the fields an
    /// assignee may change on their own task
    pub fn is_progress_only(&self) -> bool {
        self.project_id.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.assigned_to.is_none()
            && self.due_date.is_none()
            && self.estimated_hours.is_none()
    }
}

/// Task list filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub project: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
}

impl Task {
    /// Past due and not completed
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.due_date < now && !self.status.is_completed()
    }

    /// Actual over estimated hours, as a percentage with two decimals
    pub fn progress_percentage(&self) -> f64 {
        percentage(self.actual_hours, self.estimated_hours)
    }

    /// Creates a task
    ///
    /// # Errors
    ///
    /// Returns a foreign key violation if the project or assignee doesn't exist
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO tasks (
                project_id, title, description, status, priority, assigned_to,
                created_by, due_date, completed_at, estimated_hours, actual_hours
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                    CASE WHEN $9 THEN NOW() ELSE NULL END, $10, $11)
            RETURNING id
            "#,
        )
        .bind(data.project_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.assigned_to)
        .bind(data.created_by)
        .bind(data.due_date)
        .bind(data.status.is_completed())
        .bind(data.estimated_hours)
        .bind(data.actual_hours)
        .fetch_one(pool)
        .await?;

        Self::find(pool, id, None)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Finds a task, restricted to `assignee` when given
    pub async fn find(
        pool: &PgPool,
        id: Uuid,
        assignee: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(TASK_SELECT);
        qb.push(" WHERE t.id = ").push_bind(id);
        if let Some(user_id) = assignee {
            qb.push(" AND t.assigned_to = ").push_bind(user_id);
        }

        qb.build_query_as::<Task>().fetch_optional(pool).await
    }

    /// Updates a task, maintaining `completed_at` when the status changes
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(project_id) = data.project_id {
            qb.push(", project_id = ").push_bind(project_id);
        }
        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
            if status.is_completed() {
                qb.push(", completed_at = COALESCE(completed_at, NOW())");
            } else {
                qb.push(", completed_at = NULL");
            }
        }
        if let Some(priority) = data.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(assigned_to) = data.assigned_to {
            qb.push(", assigned_to = ").push_bind(assigned_to);
        }
        if let Some(due_date) = data.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }
        if let Some(estimated_hours) = data.estimated_hours {
            qb.push(", estimated_hours = ").push_bind(estimated_hours);
        }
        if let Some(actual_hours) = data.actual_hours {
            qb.push(", actual_hours = ").push_bind(actual_hours);
        }
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Self::find(pool, id, None).await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter, assignee: Option<Uuid>) {
        qb.push(" WHERE TRUE");

        if let Some(user_id) = assignee {
            qb.push(" AND t.assigned_to = ").push_bind(user_id);
        }
        if let Some(project_id) = filter.project {
            qb.push(" AND t.project_id = ").push_bind(project_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND t.status = ").push_bind(status);
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND t.priority = ").push_bind(priority);
        }
    }

    /// Lists tasks ordered by due date, restricted to `assignee` when given
    pub async fn list(
        pool: &PgPool,
        filter: &TaskFilter,
        assignee: Option<Uuid>,
        page: &PageParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks t");
        Self::push_filters(&mut count, filter, assignee);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(TASK_SELECT);
        Self::push_filters(&mut qb, filter, assignee);
        qb.push(" ORDER BY t.due_date, t.created_at LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let tasks = qb.build_query_as::<Task>().fetch_all(pool).await?;

        Ok((tasks, total))
    }

    /// Counts tasks assigned to a user: (all, still pending)
    pub async fn count_assigned(pool: &PgPool, user_id: Uuid) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status IN ('todo', 'in_progress'))
            FROM tasks
            WHERE assigned_to = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Counts pending tasks assigned to level-3 users
    pub async fn count_pending_for_staff(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM tasks t
            JOIN users u ON u.id = t.assigned_to
            WHERE u.level = 3 AND t.status IN ('todo', 'in_progress')
            "#,
        )
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_task(status: TaskStatus, due_in: Duration) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            project_name: "Website".to_string(),
            title: "Landing page".to_string(),
            description: String::new(),
            status,
            priority: Priority::Medium,
            assigned_to: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            due_date: now + due_in,
            completed_at: None,
            estimated_hours: 8.0,
            actual_hours: 3.0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_overdue_requires_past_due_and_not_completed() {
        let now = Utc::now();

        assert!(sample_task(TaskStatus::Todo, Duration::days(-1)).is_overdue_at(now));
        assert!(sample_task(TaskStatus::Review, Duration::hours(-2)).is_overdue_at(now));
        assert!(!sample_task(TaskStatus::Completed, Duration::days(-1)).is_overdue_at(now));
        assert!(!sample_task(TaskStatus::Todo, Duration::days(1)).is_overdue_at(now));
    }

    #[test]
    fn test_progress_percentage() {
        let task = sample_task(TaskStatus::InProgress, Duration::days(1));
        assert_eq!(task.progress_percentage(), 37.5);

        let mut unestimated = task.clone();
        unestimated.estimated_hours = 0.0;
        assert_eq!(unestimated.progress_percentage(), 0.0);
    }

    #[test]
    fn test_progress_only_update() {
        let update = UpdateTask {
            status: Some(TaskStatus::Review),
            actual_hours: Some(4.5),
            ..Default::default()
        };
        assert!(update.is_progress_only());

        let update = UpdateTask {
            status: Some(TaskStatus::Review),
            assigned_to: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(!update.is_progress_only());
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
