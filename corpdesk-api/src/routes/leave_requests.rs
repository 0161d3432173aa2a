/// Leave request endpoints
///
/// Employees file and edit their own requests while they are pending.
/// Level 2 and above decide them through `POST /v1/leave-requests/:id/approve`.
///
/// # Approval
///
/// ```text
/// POST /v1/leave-requests/:id/approve
/// { "action": "approve" }
/// { "action": "reject", "rejection_reason": "Team is short-staffed" }
/// ```
///
/// Deciding a request that is no longer pending answers `409 Conflict`.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
    routes::{notifications::notify_decision, today},
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use corpdesk_shared::{
    auth::middleware::AuthContext,
    models::{
        approval::{ensure_pending, ApprovalDecision, ReasonPolicy, TransitionError},
        leave_request::{
            validate_period, CreateLeaveRequest, LeaveRequest, LeaveRequestFilter,
            LeaveRequestView, LeaveType, UpdateLeaveRequest,
        },
        pagination::{Page, PageParams},
        role::Level,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLeaveRequestBody {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateLeaveRequestBody {
    pub leave_type: Option<LeaveType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: Option<String>,
}

/// Loads a request the caller can see
async fn find_visible(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<LeaveRequest> {
    LeaveRequest::find(&state.db, id, auth.visibility().owner())
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request"))
}

/// Lists leave requests, newest first
///
/// ```text
/// GET /v1/leave-requests?employee=&status=&limit=&offset=
/// ```
pub async fn list_leave_requests(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(filter): ApiQuery<LeaveRequestFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<LeaveRequestView>>> {
    let (requests, total) =
        LeaveRequest::list(&state.db, &filter, auth.visibility().owner(), &page).await?;

    Ok(Json(Page::new(requests, total, &page).map(LeaveRequestView::from)))
}

/// Files a leave request for the caller
///
/// # Errors
///
/// - `400 Bad Request`: Start date in the past, end before start, blank reason
pub async fn create_leave_request(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreateLeaveRequestBody>,
) -> ApiResult<(StatusCode, Json<LeaveRequestView>)> {
    req.validate()?;
    validate_period(req.start_date, req.end_date, today())?;

    let request = LeaveRequest::create(
        &state.db,
        CreateLeaveRequest {
            employee_id: auth.user_id,
            leave_type: req.leave_type,
            start_date: req.start_date,
            end_date: req.end_date,
            reason: req.reason.trim().to_string(),
        },
    )
    .await?;

    tracing::info!(
        leave_request_id = %request.id,
        employee_id = %auth.user_id,
        days = request.total_days(),
        "Leave requested"
    );

    Ok((StatusCode::CREATED, Json(LeaveRequestView::from(request))))
}

pub async fn get_leave_request(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<LeaveRequestView>> {
    let request = find_visible(&state, &auth, id).await?;

    Ok(Json(LeaveRequestView::from(request)))
}

/// Edits the caller's own pending request
///
/// # Errors
///
/// - `403 Forbidden`: Not the requester
/// - `409 Conflict`: Already approved or rejected
pub async fn update_leave_request(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateLeaveRequestBody>,
) -> ApiResult<Json<LeaveRequestView>> {
    req.validate()?;

    let current = find_visible(&state, &auth, id).await?;
    if !auth.is_self(current.employee_id) {
        return Err(ApiError::Forbidden(
            "Only the requester can edit a leave request".to_string(),
        ));
    }
    ensure_pending(current.status)?;

    if req.start_date.is_some() || req.end_date.is_some() {
        validate_period(
            req.start_date.unwrap_or(current.start_date),
            req.end_date.unwrap_or(current.end_date),
            today(),
        )?;
    }

    let updated = LeaveRequest::update_pending(
        &state.db,
        id,
        UpdateLeaveRequest {
            leave_type: req.leave_type,
            start_date: req.start_date,
            end_date: req.end_date,
            reason: req.reason.map(|r| r.trim().to_string()),
        },
    )
    .await?;

    match updated {
        Some(request) => Ok(Json(LeaveRequestView::from(request))),
        // Decided between the read and the write
        None => Err(conflict_or_missing(&state, id).await),
    }
}

/// Deletes a request
///
/// Level 2 and above may delete any request. The requester may delete their
/// own while it is pending.
pub async fn delete_leave_request(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let current = find_visible(&state, &auth, id).await?;

    if !auth.has_permission(Level::Management) {
        ensure_pending(current.status)?;
    }

    if !LeaveRequest::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Leave request"));
    }

    tracing::info!(leave_request_id = %id, deleted_by = %auth.user_id, "Leave request deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Approves or rejects a pending request
///
/// # Errors
///
/// - `400 Bad Request`: Unknown action, or rejection without a reason
/// - `403 Forbidden`: Caller below level 2
/// - `404 Not Found`: Unknown request
/// - `409 Conflict`: Request no longer pending
pub async fn decide_leave_request(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(decision): ApiJson<ApprovalDecision>,
) -> ApiResult<Json<LeaveRequestView>> {
    auth.require_level(Level::Management)?;
    let transition = decision.resolve(ReasonPolicy::Required)?;

    let request = match LeaveRequest::decide(&state.db, id, auth.user_id, &transition).await? {
        Some(request) => request,
        None => return Err(conflict_or_missing(&state, id).await),
    };

    tracing::info!(
        leave_request_id = %request.id,
        employee_id = %request.employee_id,
        status = %request.status,
        approver = %auth.user_id,
        "Leave request decided"
    );

    let message = format!(
        "Your {} request from {} to {} has been {}.",
        request.leave_type.display_name(),
        request.start_date,
        request.end_date,
        request.status.as_str()
    );
    notify_decision(&state, request.employee_id, "Leave Request", request.status, message).await;

    Ok(Json(LeaveRequestView::from(request)))
}

/// 409 for a request that exists but is no longer pending, else 404
async fn conflict_or_missing(state: &AppState, id: Uuid) -> ApiError {
    match LeaveRequest::find(&state.db, id, None).await {
        Ok(Some(request)) => TransitionError::NotPending(request.status).into(),
        Ok(None) => ApiError::not_found("Leave request"),
        Err(e) => e.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requires_reason() {
        let req: CreateLeaveRequestBody = serde_json::from_str(
            r#"{"leave_type": "vacation", "start_date": "2030-07-01", "end_date": "2030-07-05", "reason": ""}"#,
        )
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("reason"));
    }

    #[test]
    fn test_unknown_leave_type_rejected() {
        let parsed = serde_json::from_str::<CreateLeaveRequestBody>(
            r#"{"leave_type": "sabbatical", "start_date": "2030-07-01", "end_date": "2030-07-05", "reason": "x"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_leave_rejection_needs_reason() {
        let decision = ApprovalDecision {
            action: "reject".to_string(),
            rejection_reason: Some("   ".to_string()),
        };
        assert!(matches!(
            decision.resolve(ReasonPolicy::Required),
            Err(TransitionError::ReasonRequired)
        ));
    }
}
