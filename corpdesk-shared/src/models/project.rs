/// Project model and database operations
///
/// A project has a manager, a client and a team (`project_members`). Creating
/// or updating a project together with its team is a single transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_status AS ENUM ('planning', 'in_progress', 'on_hold', 'completed', 'cancelled');
/// CREATE TYPE priority AS ENUM ('low', 'medium', 'high', 'urgent');
///
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(200) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     status project_status NOT NULL DEFAULT 'planning',
///     priority priority NOT NULL DEFAULT 'medium',
///     start_date DATE NOT NULL,
///     end_date DATE NOT NULL,
///     budget_cents BIGINT NOT NULL,
///     actual_cost_cents BIGINT NOT NULL DEFAULT 0,
///     manager_id UUID NOT NULL REFERENCES users(id),
///     client_id UUID NOT NULL REFERENCES users(id),
///     ...
/// );
///
/// CREATE TABLE project_members (
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     PRIMARY KEY (project_id, user_id)
/// );
/// ```
///
/// # Visibility
///
/// Queries that take `viewer: Option<Uuid>` return every project for `None`
/// and, for `Some(user)`, only projects where that user is on the team or is
/// the client.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::pagination::{contains_pattern, search_term, PageParams};

const PROJECT_SELECT: &str = r#"
    SELECT p.id, p.name, p.description, p.status, p.priority, p.start_date, p.end_date,
           p.budget_cents, p.actual_cost_cents, p.manager_id, p.client_id,
           ARRAY(
               SELECT m.user_id FROM project_members m
               WHERE m.project_id = p.id ORDER BY m.user_id
           ) AS team,
           (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id) AS task_count,
           (
               SELECT COUNT(*) FROM tasks t
               WHERE t.project_id = p.id AND t.status = 'completed'
           ) AS completed_task_count,
           p.created_at, p.updated_at
    FROM projects p
"#;

/// Project lifecycle status
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "Planning",
            ProjectStatus::InProgress => "In Progress",
            ProjectStatus::OnHold => "On Hold",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::Cancelled => "Cancelled",
        }
    }
}

/// Priority shared by projects and tasks
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn display_name(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }
}

/// Project row with its team and task counts
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub priority: Priority,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget_cents: i64,
    pub actual_cost_cents: i64,
    pub manager_id: Uuid,
    pub client_id: Uuid,
    /// Team member ids
    pub team: Vec<Uuid>,
    pub task_count: i64,
    pub completed_task_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Serialized project, with derived fields
#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub status_display: &'static str,
    pub priority_display: &'static str,
    pub progress_percentage: f64,
    pub is_over_budget: bool,
    pub team_count: usize,
}

impl From<Project> for ProjectView {
    fn from(project: Project) -> Self {
        Self {
            status_display: project.status.display_name(),
            priority_display: project.priority.display_name(),
            progress_percentage: project.progress_percentage(),
            is_over_budget: project.is_over_budget(),
            team_count: project.team.len(),
            project,
        }
    }
}

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub priority: Priority,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget_cents: i64,
    pub actual_cost_cents: i64,
    pub manager_id: Uuid,
    pub client_id: Uuid,
    pub team: Vec<Uuid>,
}

/// Input for updating a project
///
/// `team: Some(ids)` replaces the whole team.
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<Priority>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget_cents: Option<i64>,
    pub actual_cost_cents: Option<i64>,
    pub client_id: Option<Uuid>,
    pub team: Option<Vec<Uuid>>,
}

/// Project list filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub priority: Option<Priority>,
    /// Matches name or description
    pub search: Option<String>,
}

/// Rounds to two decimal places
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of `part` over `whole`, rounded to two decimals, 0 when
/// `whole` is 0
pub(crate) fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    round2(part / whole * 100.0)
}

fn dedup(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

impl Project {
    /// Completed tasks over all tasks, as a percentage with two decimals
    pub fn progress_percentage(&self) -> f64 {
        percentage(self.completed_task_count as f64, self.task_count as f64)
    }

    pub fn is_over_budget(&self) -> bool {
        self.actual_cost_cents > self.budget_cents
    }

    /// Creates a project and its team in one transaction
    ///
    /// # Errors
    ///
    /// Returns a foreign key violation if the client, manager or a team
    /// member does not exist. Nothing is written in that case.
    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO projects (
                name, description, status, priority, start_date, end_date,
                budget_cents, actual_cost_cents, manager_id, client_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(data.name)
        .bind(data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.budget_cents)
        .bind(data.actual_cost_cents)
        .bind(data.manager_id)
        .bind(data.client_id)
        .fetch_one(&mut *tx)
        .await?;

        let team = dedup(data.team);
        if !team.is_empty() {
            sqlx::query(
                "INSERT INTO project_members (project_id, user_id) SELECT $1, UNNEST($2::uuid[])",
            )
            .bind(id)
            .bind(team)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Self::find(pool, id, None)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Finds a project visible to `viewer` (see module docs)
    pub async fn find(
        pool: &PgPool,
        id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(PROJECT_SELECT);
        qb.push(" WHERE p.id = ").push_bind(id);
        Self::push_visibility(&mut qb, viewer);

        qb.build_query_as::<Project>().fetch_optional(pool).await
    }

    /// Updates a project, replacing the team when given, in one transaction
    ///
    /// # Returns
    ///
    /// The updated project, or None if it doesn't exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE projects SET updated_at = NOW()");
        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(priority) = data.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(start_date) = data.start_date {
            qb.push(", start_date = ").push_bind(start_date);
        }
        if let Some(end_date) = data.end_date {
            qb.push(", end_date = ").push_bind(end_date);
        }
        if let Some(budget_cents) = data.budget_cents {
            qb.push(", budget_cents = ").push_bind(budget_cents);
        }
        if let Some(actual_cost_cents) = data.actual_cost_cents {
            qb.push(", actual_cost_cents = ").push_bind(actual_cost_cents);
        }
        if let Some(client_id) = data.client_id {
            qb.push(", client_id = ").push_bind(client_id);
        }
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        if let Some(team) = data.team {
            sqlx::query("DELETE FROM project_members WHERE project_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            let team = dedup(team);
            if !team.is_empty() {
                sqlx::query(
                    "INSERT INTO project_members (project_id, user_id) SELECT $1, UNNEST($2::uuid[])",
                )
                .bind(id)
                .bind(team)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        Self::find(pool, id, None).await
    }

    /// Deletes a project. Tasks and memberships cascade; expenses keep their
    /// row with `project_id` cleared.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn push_visibility(qb: &mut QueryBuilder<'_, Postgres>, viewer: Option<Uuid>) {
        if let Some(user_id) = viewer {
            qb.push(" AND (p.client_id = ")
                .push_bind(user_id)
                .push(" OR EXISTS (SELECT 1 FROM project_members m WHERE m.project_id = p.id AND m.user_id = ")
                .push_bind(user_id)
                .push("))");
        }
    }

    fn push_filters(
        qb: &mut QueryBuilder<'_, Postgres>,
        filter: &ProjectFilter,
        viewer: Option<Uuid>,
    ) {
        qb.push(" WHERE TRUE");
        Self::push_visibility(qb, viewer);

        if let Some(status) = filter.status {
            qb.push(" AND p.status = ").push_bind(status);
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND p.priority = ").push_bind(priority);
        }
        if let Some(search) = search_term(&filter.search) {
            let pattern = contains_pattern(search);
            qb.push(" AND (p.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }

    /// Lists projects visible to `viewer`, newest first
    pub async fn list(
        pool: &PgPool,
        filter: &ProjectFilter,
        viewer: Option<Uuid>,
        page: &PageParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects p");
        Self::push_filters(&mut count, filter, viewer);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(PROJECT_SELECT);
        Self::push_filters(&mut qb, filter, viewer);
        qb.push(" ORDER BY p.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let projects = qb.build_query_as::<Project>().fetch_all(pool).await?;

        Ok((projects, total))
    }

    /// Counts all projects and those in progress
    pub async fn count_by_activity(pool: &PgPool) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'in_progress') FROM projects",
        )
        .fetch_one(pool)
        .await
    }

    /// Counts projects managed by a user
    pub async fn count_managed_by(pool: &PgPool, manager_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE manager_id = $1")
            .bind(manager_id)
            .fetch_one(pool)
            .await
    }

    /// Counts projects a user is a team member of
    pub async fn count_with_member(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM project_members WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Checks that a project exists
    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_project(task_count: i64, completed: i64) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Website".to_string(),
            description: String::new(),
            status: ProjectStatus::InProgress,
            priority: Priority::High,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            budget_cents: 1_000_000,
            actual_cost_cents: 250_000,
            manager_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            team: vec![Uuid::new_v4(), Uuid::new_v4()],
            task_count,
            completed_task_count: completed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_progress_without_tasks_is_zero() {
        assert_eq!(sample_project(0, 0).progress_percentage(), 0.0);
    }

    #[test]
    fn test_progress_rounds_to_two_decimals() {
        assert_eq!(sample_project(3, 1).progress_percentage(), 33.33);
        assert_eq!(sample_project(3, 2).progress_percentage(), 66.67);
        assert_eq!(sample_project(4, 4).progress_percentage(), 100.0);
    }

    #[test]
    fn test_over_budget() {
        let mut project = sample_project(0, 0);
        assert!(!project.is_over_budget());

        project.actual_cost_cents = project.budget_cents;
        assert!(!project.is_over_budget());

        project.actual_cost_cents += 1;
        assert!(project.is_over_budget());
    }

    #[test]
    fn test_view_serializes_derived_fields() {
        let view = ProjectView::from(sample_project(4, 1));
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["status_display"], "In Progress");
        assert_eq!(json["progress_percentage"], 25.0);
        assert_eq!(json["team_count"], 2);
        assert_eq!(json["is_over_budget"], false);
    }

    #[test]
    fn test_dedup_team() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let team = dedup(vec![a, b, a]);
        assert_eq!(team.len(), 2);
    }
}
