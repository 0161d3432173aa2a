/// Attendance records
///
/// One row per (employee, date), enforced by a unique constraint. The
/// "mark today" flow is an `INSERT ... ON CONFLICT DO UPDATE` so repeated
/// check-ins on the same day update the existing row.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::pagination::PageParams;
use super::project::round2;

const ATTENDANCE_COLUMNS: &str = "id, employee_id, date, status, check_in_time, check_out_time, \
     break_minutes, notes, created_at, updated_at";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "attendance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Late,
    HalfDay,
    SickLeave,
    Vacation,
}

impl AttendanceStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::HalfDay => "Half Day",
            AttendanceStatus::SickLeave => "Sick Leave",
            AttendanceStatus::Vacation => "Vacation",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Attendance {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub break_minutes: Option<i32>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceView {
    #[serde(flatten)]
    pub attendance: Attendance,
    pub status_display: &'static str,
    pub work_hours: f64,
}

impl From<Attendance> for AttendanceView {
    fn from(attendance: Attendance) -> Self {
        Self {
            status_display: attendance.status.display_name(),
            work_hours: attendance.work_hours(),
            attendance,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateAttendance {
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub break_minutes: Option<i32>,
    pub notes: String,
}

/// Partial update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateAttendance {
    pub status: Option<AttendanceStatus>,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub break_minutes: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceFilter {
    pub employee: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

impl Attendance {
    /// Hours between check-in and check-out minus breaks, rounded to two
    /// decimals
    ///
    /// Zero when either time is missing. Never negative.
    pub fn work_hours(&self) -> f64 {
        let (Some(check_in), Some(check_out)) = (self.check_in_time, self.check_out_time) else {
            return 0.0;
        };

        let minutes = (check_out - check_in).num_minutes()
            - i64::from(self.break_minutes.unwrap_or(0));
        if minutes <= 0 {
            return 0.0;
        }

        round2(minutes as f64 / 60.0)
    }

    /// Creates a record
    ///
    /// # Errors
    ///
    /// Returns a unique violation if the employee already has a record for
    /// that date
    pub async fn create(pool: &PgPool, data: CreateAttendance) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Attendance>(&format!(
            r#"
            INSERT INTO attendance (
                employee_id, date, status, check_in_time, check_out_time, break_minutes, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ATTENDANCE_COLUMNS}
            "#
        ))
        .bind(data.employee_id)
        .bind(data.date)
        .bind(data.status)
        .bind(data.check_in_time)
        .bind(data.check_out_time)
        .bind(data.break_minutes)
        .bind(data.notes)
        .fetch_one(pool)
        .await
    }

    /// Creates or updates the employee's record for `date`
    ///
    /// A new row takes `present` and empty notes unless given. An existing
    /// row keeps every column the update leaves as `None`.
    pub async fn mark(
        pool: &PgPool,
        employee_id: Uuid,
        date: NaiveDate,
        data: UpdateAttendance,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Attendance>(&format!(
            r#"
            INSERT INTO attendance (
                employee_id, date, status, check_in_time, check_out_time, break_minutes, notes
            )
            VALUES ($1, $2, COALESCE($3, 'present'::attendance_status), $4, $5, $6,
                    COALESCE($7, ''))
            ON CONFLICT (employee_id, date) DO UPDATE SET
                status = COALESCE($3, attendance.status),
                check_in_time = COALESCE($4, attendance.check_in_time),
                check_out_time = COALESCE($5, attendance.check_out_time),
                break_minutes = COALESCE($6, attendance.break_minutes),
                notes = COALESCE($7, attendance.notes),
                updated_at = NOW()
            RETURNING {ATTENDANCE_COLUMNS}
            "#
        ))
        .bind(employee_id)
        .bind(date)
        .bind(data.status)
        .bind(data.check_in_time)
        .bind(data.check_out_time)
        .bind(data.break_minutes)
        .bind(data.notes)
        .fetch_one(pool)
        .await
    }

    /// The employee's record for `date`, if one exists
    pub async fn find_for_day(
        pool: &PgPool,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = $1 AND date = $2"
        ))
        .bind(employee_id)
        .bind(date)
        .fetch_optional(pool)
        .await
    }

    /// Finds a record, restricted to `owner` when given
    pub async fn find(
        pool: &PgPool,
        id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = "
        ));
        qb.push_bind(id);
        if let Some(employee_id) = owner {
            qb.push(" AND employee_id = ").push_bind(employee_id);
        }

        qb.build_query_as::<Attendance>().fetch_optional(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateAttendance,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE attendance SET updated_at = NOW()");

        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(check_in_time) = data.check_in_time {
            qb.push(", check_in_time = ").push_bind(check_in_time);
        }
        if let Some(check_out_time) = data.check_out_time {
            qb.push(", check_out_time = ").push_bind(check_out_time);
        }
        if let Some(break_minutes) = data.break_minutes {
            qb.push(", break_minutes = ").push_bind(break_minutes);
        }
        if let Some(notes) = data.notes {
            qb.push(", notes = ").push_bind(notes);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {ATTENDANCE_COLUMNS}"));

        qb.build_query_as::<Attendance>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn push_filters(
        qb: &mut QueryBuilder<'_, Postgres>,
        filter: &AttendanceFilter,
        owner: Option<Uuid>,
    ) {
        qb.push(" WHERE TRUE");

        // The owner restriction wins over any employee filter
        if let Some(employee_id) = owner.or(filter.employee) {
            qb.push(" AND employee_id = ").push_bind(employee_id);
        }
        if let Some(date) = filter.date {
            qb.push(" AND date = ").push_bind(date);
        }
    }

    /// Lists records, newest day first
    pub async fn list(
        pool: &PgPool,
        filter: &AttendanceFilter,
        owner: Option<Uuid>,
        page: &PageParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM attendance");
        Self::push_filters(&mut count, filter, owner);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance"));
        Self::push_filters(&mut qb, filter, owner);
        qb.push(" ORDER BY date DESC, created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let records = qb.build_query_as::<Attendance>().fetch_all(pool).await?;

        Ok((records, total))
    }

    /// Counts employees marked present or late on `date`
    pub async fn count_present_on(pool: &PgPool, date: NaiveDate) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance WHERE date = $1 AND status IN ('present', 'late')",
        )
        .bind(date)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(check_in: Option<(u32, u32)>, check_out: Option<(u32, u32)>, break_minutes: Option<i32>) -> Attendance {
        let now = Utc::now();
        Attendance {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            date: now.date_naive(),
            status: AttendanceStatus::Present,
            check_in_time: check_in.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
            check_out_time: check_out.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
            break_minutes,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_work_hours_subtracts_break() {
        assert_eq!(record(Some((9, 0)), Some((17, 30)), Some(30)).work_hours(), 8.0);
        assert_eq!(record(Some((9, 0)), Some((17, 0)), None).work_hours(), 8.0);
        assert_eq!(record(Some((9, 0)), Some((9, 20)), None).work_hours(), 0.33);
    }

    #[test]
    fn test_work_hours_missing_times() {
        assert_eq!(record(Some((9, 0)), None, None).work_hours(), 0.0);
        assert_eq!(record(None, Some((17, 0)), None).work_hours(), 0.0);
        assert_eq!(record(None, None, Some(15)).work_hours(), 0.0);
    }

    #[test]
    fn test_work_hours_never_negative() {
        assert_eq!(record(Some((17, 0)), Some((9, 0)), None).work_hours(), 0.0);
        assert_eq!(record(Some((9, 0)), Some((10, 0)), Some(90)).work_hours(), 0.0);
    }

    #[test]
    fn test_status_names() {
        let json = serde_json::to_string(&AttendanceStatus::HalfDay).unwrap();
        assert_eq!(json, "\"half_day\"");
        assert_eq!(AttendanceStatus::SickLeave.display_name(), "Sick Leave");
    }
}
