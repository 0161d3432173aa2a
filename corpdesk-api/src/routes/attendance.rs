/// Attendance endpoints
///
/// One record per employee and day. Level-3 users see and edit only their
/// own records; level 2 and above see everyone's.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
    routes::{optional_json, today},
};
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use chrono::{NaiveDate, NaiveTime};
use corpdesk_shared::{
    auth::middleware::AuthContext,
    models::{
        attendance::{
            Attendance, AttendanceFilter, AttendanceStatus, AttendanceView, CreateAttendance,
            UpdateAttendance,
        },
        pagination::{Page, PageParams},
        role::Level,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAttendanceRequest {
    /// Defaults to the caller. Level 2 and above may record for others.
    pub employee_id: Option<Uuid>,

    pub date: NaiveDate,

    #[serde(default)]
    pub status: AttendanceStatus,

    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,

    #[validate(range(min = 0, max = 1440, message = "Break must be 0-1440 minutes"))]
    pub break_minutes: Option<i32>,

    #[serde(default)]
    pub notes: String,
}

/// Body of PATCH and of `mark-today`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateAttendanceRequest {
    pub status: Option<AttendanceStatus>,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,

    #[validate(range(min = 0, max = 1440, message = "Break must be 0-1440 minutes"))]
    pub break_minutes: Option<i32>,

    pub notes: Option<String>,
}

impl UpdateAttendanceRequest {
    /// Checks the times this request would leave on `stored`
    fn check_against(&self, stored: Option<&Attendance>) -> ApiResult<()> {
        check_times(
            self.check_in_time.or(stored.and_then(|r| r.check_in_time)),
            self.check_out_time.or(stored.and_then(|r| r.check_out_time)),
        )
    }
}

impl From<UpdateAttendanceRequest> for UpdateAttendance {
    fn from(req: UpdateAttendanceRequest) -> Self {
        UpdateAttendance {
            status: req.status,
            check_in_time: req.check_in_time,
            check_out_time: req.check_out_time,
            break_minutes: req.break_minutes,
            notes: req.notes,
        }
    }
}

fn check_times(check_in: Option<NaiveTime>, check_out: Option<NaiveTime>) -> ApiResult<()> {
    if let (Some(check_in), Some(check_out)) = (check_in, check_out) {
        if check_out < check_in {
            return Err(ApiError::invalid_field(
                "check_out_time",
                "Check-out time cannot be before check-in time",
            ));
        }
    }
    Ok(())
}

/// Lists attendance, newest day first
///
/// ```text
/// GET /v1/attendance?employee=&date=&limit=&offset=
/// ```
pub async fn list_attendance(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(filter): ApiQuery<AttendanceFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<AttendanceView>>> {
    let (records, total) =
        Attendance::list(&state.db, &filter, auth.visibility().owner(), &page).await?;

    Ok(Json(Page::new(records, total, &page).map(AttendanceView::from)))
}

/// Records attendance for a day
///
/// # Errors
///
/// - `403 Forbidden`: Recording for someone else below level 2
/// - `409 Conflict`: A record already exists for that employee and date
pub async fn create_attendance(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreateAttendanceRequest>,
) -> ApiResult<(StatusCode, Json<AttendanceView>)> {
    req.validate()?;
    check_times(req.check_in_time, req.check_out_time)?;

    let employee_id = req.employee_id.unwrap_or(auth.user_id);
    auth.require_owner_or_level(employee_id, Level::Management)?;

    let record = Attendance::create(
        &state.db,
        CreateAttendance {
            employee_id,
            date: req.date,
            status: req.status,
            check_in_time: req.check_in_time,
            check_out_time: req.check_out_time,
            break_minutes: req.break_minutes,
            notes: req.notes,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(AttendanceView::from(record))))
}

/// Creates or updates the caller's record for today
///
/// The body is optional. Omitted fields keep their stored values, and a new
/// record starts as `present`.
pub async fn mark_today(
    State(state): State<AppState>,
    auth: AuthContext,
    body: Bytes,
) -> ApiResult<Json<AttendanceView>> {
    let req: UpdateAttendanceRequest = optional_json(&body)?;
    req.validate()?;

    let date = today();
    let stored = Attendance::find_for_day(&state.db, auth.user_id, date).await?;
    req.check_against(stored.as_ref())?;

    let record = Attendance::mark(&state.db, auth.user_id, date, req.into()).await?;

    tracing::debug!(user_id = %auth.user_id, %date, status = ?record.status, "Attendance marked");

    Ok(Json(AttendanceView::from(record)))
}

pub async fn get_attendance(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<AttendanceView>> {
    let record = Attendance::find(&state.db, id, auth.visibility().owner())
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record"))?;

    Ok(Json(AttendanceView::from(record)))
}

pub async fn update_attendance(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateAttendanceRequest>,
) -> ApiResult<Json<AttendanceView>> {
    req.validate()?;

    let current = Attendance::find(&state.db, id, auth.visibility().owner())
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record"))?;
    auth.require_owner_or_level(current.employee_id, Level::Management)?;

    req.check_against(Some(&current))?;

    let record = Attendance::update(&state.db, id, req.into())
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record"))?;

    Ok(Json(AttendanceView::from(record)))
}

pub async fn delete_attendance(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let current = Attendance::find(&state.db, id, auth.visibility().owner())
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record"))?;
    auth.require_owner_or_level(current.employee_id, Level::Management)?;

    if !Attendance::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Attendance record"));
    }

    tracing::info!(attendance_id = %id, deleted_by = %auth.user_id, "Attendance record deleted");

    Ok(StatusCode::NO_CONTENT)
}
