/// Leave requests
///
/// Requests start `pending` and are decided once through
/// [`LeaveRequest::decide`]. While pending, the requester may still edit or
/// withdraw them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::ValidationErrors;

use super::approval::{ApprovalStatus, Transition};
use super::pagination::PageParams;
use super::validation;

const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, start_date, end_date, reason, status, \
     approved_by, approval_date, rejection_reason, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "leave_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    Sick,
    Vacation,
    Personal,
    Maternity,
    Paternity,
    Emergency,
}

impl LeaveType {
    pub fn display_name(&self) -> &'static str {
        match self {
            LeaveType::Sick => "Sick Leave",
            LeaveType::Vacation => "Vacation",
            LeaveType::Personal => "Personal Leave",
            LeaveType::Maternity => "Maternity Leave",
            LeaveType::Paternity => "Paternity Leave",
            LeaveType::Emergency => "Emergency Leave",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LeaveRequest {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: ApprovalStatus,
    pub approved_by: Option<Uuid>,
    pub approval_date: Option<DateTime<Utc>>,
    pub rejection_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaveRequestView {
    #[serde(flatten)]
    pub request: LeaveRequest,
    pub leave_type_display: &'static str,
    pub status_display: &'static str,
    pub total_days: i64,
}

impl From<LeaveRequest> for LeaveRequestView {
    fn from(request: LeaveRequest) -> Self {
        Self {
            leave_type_display: request.leave_type.display_name(),
            status_display: request.status.display_name(),
            total_days: request.total_days(),
            request,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateLeaveRequest {
    pub employee_id: Uuid,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateLeaveRequest {
    pub leave_type: Option<LeaveType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaveRequestFilter {
    pub employee: Option<Uuid>,
    pub status: Option<ApprovalStatus>,
}

/// Checks a leave period: it may not start before `today` and may not end
/// before it starts
pub fn validate_period(
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    validation::not_in_past(&mut errors, start, today, "start_date");
    validation::date_range(&mut errors, start, end, "end_date");
    validation::finish(errors)
}

impl LeaveRequest {
    /// Days covered, counting both ends
    pub fn total_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub async fn create(pool: &PgPool, data: CreateLeaveRequest) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, LeaveRequest>(&format!(
            r#"
            INSERT INTO leave_requests (employee_id, leave_type, start_date, end_date, reason)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {LEAVE_COLUMNS}
            "#
        ))
        .bind(data.employee_id)
        .bind(data.leave_type)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.reason)
        .fetch_one(pool)
        .await
    }

    /// Finds a request, restricted to `owner` when given
    pub async fn find(
        pool: &PgPool,
        id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = "
        ));
        qb.push_bind(id);
        if let Some(employee_id) = owner {
            qb.push(" AND employee_id = ").push_bind(employee_id);
        }

        qb.build_query_as::<LeaveRequest>().fetch_optional(pool).await
    }

    /// Updates a request that is still pending
    ///
    /// Returns `None` if the request is missing or has already been decided.
    pub async fn update_pending(
        pool: &PgPool,
        id: Uuid,
        data: UpdateLeaveRequest,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb =
            QueryBuilder::<Postgres>::new("UPDATE leave_requests SET updated_at = NOW()");

        if let Some(leave_type) = data.leave_type {
            qb.push(", leave_type = ").push_bind(leave_type);
        }
        if let Some(start_date) = data.start_date {
            qb.push(", start_date = ").push_bind(start_date);
        }
        if let Some(end_date) = data.end_date {
            qb.push(", end_date = ").push_bind(end_date);
        }
        if let Some(reason) = data.reason {
            qb.push(", reason = ").push_bind(reason);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND status = 'pending'");
        qb.push(format!(" RETURNING {LEAVE_COLUMNS}"));

        qb.build_query_as::<LeaveRequest>().fetch_optional(pool).await
    }

    /// Applies an approval decision
    ///
    /// Single conditional update: returns `None` when the request is no
    /// longer pending, so only one of several concurrent deciders wins.
    pub async fn decide(
        pool: &PgPool,
        id: Uuid,
        approver: Uuid,
        transition: &Transition,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LeaveRequest>(&format!(
            r#"
            UPDATE leave_requests
            SET status = $2,
                approved_by = $3,
                approval_date = NOW(),
                rejection_reason = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {LEAVE_COLUMNS}
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
        let result = sqlx::query("DELETE FROM leave_requests WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn push_filters(
        qb: &mut QueryBuilder<'_, Postgres>,
        filter: &LeaveRequestFilter,
        owner: Option<Uuid>,
    ) {
        qb.push(" WHERE TRUE");

        if let Some(employee_id) = owner.or(filter.employee) {
            qb.push(" AND employee_id = ").push_bind(employee_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
    }

    /// Lists requests, newest first
    pub async fn list(
        pool: &PgPool,
        filter: &LeaveRequestFilter,
        owner: Option<Uuid>,
        page: &PageParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM leave_requests");
        Self::push_filters(&mut count, filter, owner);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {LEAVE_COLUMNS} FROM leave_requests"));
        Self::push_filters(&mut qb, filter, owner);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let requests = qb.build_query_as::<LeaveRequest>().fetch_all(pool).await?;

        Ok((requests, total))
    }

    /// Counts pending requests, restricted to `owner` when given
    pub async fn count_pending(pool: &PgPool, owner: Option<Uuid>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM leave_requests
            WHERE status = 'pending' AND ($1::uuid IS NULL OR employee_id = $1)
            "#,
        )
        .bind(owner)
        .fetch_one(pool)
        .await
    }

    /// Pending requests filed by level-3 users
    pub async fn count_pending_for_staff(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM leave_requests l
            JOIN users u ON u.id = l.employee_id
            WHERE u.level = 3 AND l.status = 'pending'
            "#,
        )
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn request(start: NaiveDate, end: NaiveDate) -> LeaveRequest {
        let now = Utc::now();
        LeaveRequest {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            leave_type: LeaveType::Vacation,
            start_date: start,
            end_date: end,
            reason: "Family trip".to_string(),
            status: ApprovalStatus::Pending,
            approved_by: None,
            approval_date: None,
            rejection_reason: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_total_days_counts_both_ends() {
        assert_eq!(request(date(6, 2), date(6, 2)).total_days(), 1);
        assert_eq!(request(date(6, 2), date(6, 6)).total_days(), 5);
        assert_eq!(request(date(2, 27), date(3, 2)).total_days(), 4);
    }

    #[test]
    fn test_validate_period() {
        let today = date(6, 1);

        assert!(validate_period(date(6, 1), date(6, 1), today).is_ok());
        assert!(validate_period(date(6, 3), date(6, 10), today).is_ok());

        let errors = validate_period(date(5, 30), date(6, 2), today).unwrap_err();
        assert!(errors.field_errors().contains_key("start_date"));

        let errors = validate_period(date(6, 5), date(6, 4), today).unwrap_err();
        assert!(errors.field_errors().contains_key("end_date"));
        assert!(!errors.field_errors().contains_key("start_date"));
    }

    #[test]
    fn test_view_serializes_derived_fields() {
        let view = LeaveRequestView::from(request(date(6, 2), date(6, 4)));
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["total_days"], 3);
        assert_eq!(json["leave_type"], "vacation");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["status_display"], "Pending");
    }
}
