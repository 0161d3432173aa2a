/// Expense claims
///
/// Same lifecycle as leave requests: `pending` until one approver decides,
/// editable by the submitter only while pending. Amounts are integer cents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::ValidationErrors;

use super::approval::{ApprovalStatus, Transition};
use super::pagination::PageParams;
use super::validation;

const EXPENSE_COLUMNS: &str = "id, title, description, category, amount_cents, date, \
     submitted_by, project_id, status, approved_by, approval_date, rejection_reason, \
     created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "expense_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    OfficeSupplies,
    Travel,
    Meals,
    Utilities,
    Rent,
    Equipment,
    Software,
    Marketing,
    Training,
    Other,
}

impl ExpenseCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            ExpenseCategory::OfficeSupplies => "Office Supplies",
            ExpenseCategory::Travel => "Travel",
            ExpenseCategory::Meals => "Meals",
            ExpenseCategory::Utilities => "Utilities",
            ExpenseCategory::Rent => "Rent",
            ExpenseCategory::Equipment => "Equipment",
            ExpenseCategory::Software => "Software",
            ExpenseCategory::Marketing => "Marketing",
            ExpenseCategory::Training => "Training",
            ExpenseCategory::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: ExpenseCategory,
    pub amount_cents: i64,
    pub date: NaiveDate,
    pub submitted_by: Uuid,
    pub project_id: Option<Uuid>,
    pub status: ApprovalStatus,
    pub approved_by: Option<Uuid>,
    pub approval_date: Option<DateTime<Utc>>,
    pub rejection_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpenseView {
    #[serde(flatten)]
    pub expense: Expense,
    pub category_display: &'static str,
    pub status_display: &'static str,
}

impl From<Expense> for ExpenseView {
    fn from(expense: Expense) -> Self {
        Self {
            category_display: expense.category.display_name(),
            status_display: expense.status.display_name(),
            expense,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateExpense {
    pub title: String,
    pub description: String,
    pub category: ExpenseCategory,
    pub amount_cents: i64,
    pub date: NaiveDate,
    pub submitted_by: Uuid,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateExpense {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<ExpenseCategory>,
    pub amount_cents: Option<i64>,
    pub date: Option<NaiveDate>,
    /// `Some(None)` detaches the expense from its project
    pub project_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseFilter {
    pub status: Option<ApprovalStatus>,
}

/// Checks that an expense is not dated after `today`
pub fn validate_date(date: NaiveDate, today: NaiveDate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    validation::not_in_future(&mut errors, date, today, "date");
    validation::finish(errors)
}

impl Expense {
    /// Creates an expense claim
    ///
    /// # Errors
    ///
    /// Returns a foreign key violation if `project_id` doesn't exist
    pub async fn create(pool: &PgPool, data: CreateExpense) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            r#"
            INSERT INTO expenses (
                title, description, category, amount_cents, date, submitted_by, project_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(data.title)
        .bind(data.description)
        .bind(data.category)
        .bind(data.amount_cents)
        .bind(data.date)
        .bind(data.submitted_by)
        .bind(data.project_id)
        .fetch_one(pool)
        .await
    }

    /// Finds an expense, restricted to `owner` when given
    pub async fn find(
        pool: &PgPool,
        id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = "
        ));
        qb.push_bind(id);
        if let Some(submitted_by) = owner {
            qb.push(" AND submitted_by = ").push_bind(submitted_by);
        }

        qb.build_query_as::<Expense>().fetch_optional(pool).await
    }

    /// Updates an expense that is still pending
    ///
    /// Returns `None` if the expense is missing or has already been decided.
    pub async fn update_pending(
        pool: &PgPool,
        id: Uuid,
        data: UpdateExpense,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE expenses SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(category) = data.category {
            qb.push(", category = ").push_bind(category);
        }
        if let Some(amount_cents) = data.amount_cents {
            qb.push(", amount_cents = ").push_bind(amount_cents);
        }
        if let Some(date) = data.date {
            qb.push(", date = ").push_bind(date);
        }
        if let Some(project_id) = data.project_id {
            qb.push(", project_id = ").push_bind(project_id);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND status = 'pending'");
        qb.push(format!(" RETURNING {EXPENSE_COLUMNS}"));

        qb.build_query_as::<Expense>().fetch_optional(pool).await
    }

    /// Applies an approval decision
    ///
    /// Returns `None` when the expense is no longer pending.
    pub async fn decide(
        pool: &PgPool,
        id: Uuid,
        approver: Uuid,
        transition: &Transition,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            r#"
            UPDATE expenses
            SET status = $2,
                approved_by = $3,
                approval_date = NOW(),
                rejection_reason = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(transition.target)
        .bind(approver)
        .bind(&transition.rejection_reason)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ExpenseFilter, owner: Option<Uuid>) {
        qb.push(" WHERE TRUE");

        if let Some(submitted_by) = owner {
            qb.push(" AND submitted_by = ").push_bind(submitted_by);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
    }

    /// Lists expenses, most recent date first
    pub async fn list(
        pool: &PgPool,
        filter: &ExpenseFilter,
        owner: Option<Uuid>,
        page: &PageParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM expenses");
        Self::push_filters(&mut count, filter, owner);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {EXPENSE_COLUMNS} FROM expenses"));
        Self::push_filters(&mut qb, filter, owner);
        qb.push(" ORDER BY date DESC, created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let expenses = qb.build_query_as::<Expense>().fetch_all(pool).await?;

        Ok((expenses, total))
    }

    /// Counts pending claims, restricted to `owner` when given
    pub async fn count_pending(pool: &PgPool, owner: Option<Uuid>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM expenses
            WHERE status = 'pending' AND ($1::uuid IS NULL OR submitted_by = $1)
            "#,
        )
        .bind(owner)
        .fetch_one(pool)
        .await
    }

    /// Sum of approved claims dated in the month containing `day`, in cents
    pub async fn approved_total_for_month(pool: &PgPool, day: NaiveDate) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM expenses
            WHERE status = 'approved'
              AND date_trunc('month', date) = date_trunc('month', $1::date)
            "#,
        )
        .bind(day)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_date_rejects_future() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();

        assert!(validate_date(today, today).is_ok());
        assert!(validate_date(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), today).is_ok());

        let errors = validate_date(NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(), today).unwrap_err();
        assert_eq!(errors.field_errors()["date"][0].code, "future_date");
    }

    #[test]
    fn test_category_names() {
        let json = serde_json::to_string(&ExpenseCategory::OfficeSupplies).unwrap();
        assert_eq!(json, "\"office_supplies\"");

        let parsed: ExpenseCategory = serde_json::from_str("\"software\"").unwrap();
        assert_eq!(parsed, ExpenseCategory::Software);
        assert_eq!(parsed.display_name(), "Software");
    }
}
