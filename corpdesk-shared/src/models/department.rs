/// Department model and database operations
///
/// Users reference departments by name (`users.department`), so the
/// employee count is a join on the name rather than a foreign key.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::pagination::PageParams;

const DEPARTMENT_SELECT: &str = r#"
    SELECT d.id, d.name, d.description, d.head_id, d.created_at,
           (SELECT COUNT(*) FROM users u WHERE u.department = d.name) AS employee_count
    FROM departments d
"#;

/// Organisational department
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Department {
    pub id: Uuid,

    /// Unique department name
    pub name: String,

    pub description: String,

    /// Department head (cleared if the user is deleted)
    pub head_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    /// Number of users assigned to this department
    pub employee_count: i64,
}

/// Input for creating a department
#[derive(Debug, Clone, Default)]
pub struct CreateDepartment {
    pub name: String,
    pub description: String,
    pub head_id: Option<Uuid>,
}

/// Input for updating a department
#[derive(Debug, Clone, Default)]
pub struct UpdateDepartment {
    pub name: Option<String>,
    pub description: Option<String>,
    pub head_id: Option<Option<Uuid>>,
}

impl Department {
    /// Creates a department
    ///
    /// # Errors
    ///
    /// Returns a unique violation if the name is taken, or a foreign key
    /// violation if `head_id` does not exist.
    pub async fn create(pool: &PgPool, data: CreateDepartment) -> Result<Self, sqlx::Error> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO departments (name, description, head_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(data.name)
        .bind(data.description)
        .bind(data.head_id)
        .fetch_one(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("{DEPARTMENT_SELECT} WHERE d.id = $1");

        sqlx::query_as::<_, Department>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Updates a department. Returns None if it doesn't exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateDepartment,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE departments SET id = id");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(head_id) = data.head_id {
            qb.push(", head_id = ").push_bind(head_id);
        }
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Self::find_by_id(pool, id).await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists departments ordered by name
    pub async fn list(
        pool: &PgPool,
        page: &PageParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM departments")
            .fetch_one(pool)
            .await?;

        let query = format!("{DEPARTMENT_SELECT} ORDER BY d.name LIMIT $1 OFFSET $2");
        let departments = sqlx::query_as::<_, Department>(&query)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok((departments, total))
    }
}
