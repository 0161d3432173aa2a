/// Notification endpoints
///
/// Users only ever see their own notifications. `is_read` only moves from
/// false to true; there is no way to mark a notification unread.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
    routes::optional_json,
};
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use corpdesk_shared::{
    auth::middleware::AuthContext,
    models::{
        approval::ApprovalStatus,
        notification::{CreateNotification, Notification, NotificationFilter, NotificationType},
        pagination::{Page, PageParams},
        role::Level,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotificationRequest {
    pub recipient_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,

    #[serde(default)]
    pub notification_type: NotificationType,
}

/// PATCH body. Only `is_read` may change.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateNotificationRequest {
    pub is_read: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkAllReadRequest {
    /// Limits the update to these notifications
    #[serde(default)]
    pub notification_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub message: String,
    pub updated_count: u64,
}

/// Tells a requester their leave request or expense was decided
///
/// The decision is already committed, so a failure here is logged rather
/// than returned.
pub(crate) async fn notify_decision(
    state: &AppState,
    recipient_id: Uuid,
    subject: &str,
    status: ApprovalStatus,
    message: String,
) {
    let notification_type = match status {
        ApprovalStatus::Approved => NotificationType::Success,
        _ => NotificationType::Warning,
    };

    let result = Notification::create(
        &state.db,
        CreateNotification {
            recipient_id,
            title: format!("{} {}", subject, status.display_name()),
            message,
            notification_type,
        },
    )
    .await;

    if let Err(e) = result {
        tracing::warn!(error = %e, recipient_id = %recipient_id, "Failed to send decision notification");
    }
}

/// Lists the caller's notifications, newest first
///
/// ```text
/// GET /v1/notifications?is_read=false&limit=&offset=
/// ```
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(filter): ApiQuery<NotificationFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<Notification>>> {
    let (notifications, total) =
        Notification::list(&state.db, auth.user_id, &filter, &page).await?;

    Ok(Json(Page::new(notifications, total, &page)))
}

/// Sends a notification to any user
///
/// # Errors
///
/// - `403 Forbidden`: Caller below level 2
/// - `409 Conflict`: Unknown recipient
pub async fn create_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreateNotificationRequest>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    auth.require_level(Level::Management)?;
    req.validate()?;

    let notification = Notification::create(
        &state.db,
        CreateNotification {
            recipient_id: req.recipient_id,
            title: req.title.trim().to_string(),
            message: req.message,
            notification_type: req.notification_type,
        },
    )
    .await?;

    tracing::debug!(
        notification_id = %notification.id,
        recipient_id = %notification.recipient_id,
        sender = %auth.user_id,
        "Notification sent"
    );

    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn get_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Notification>> {
    let notification = Notification::find(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))?;

    Ok(Json(notification))
}

/// `PATCH` with `{ "is_read": true }`
///
/// # Errors
///
/// - `400 Bad Request`: `is_read: false` or any other field
pub async fn update_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateNotificationRequest>,
) -> ApiResult<Json<Notification>> {
    if !req.is_read {
        return Err(ApiError::invalid_field(
            "is_read",
            "A read notification cannot be marked unread",
        ));
    }

    mark(&state, &auth, id).await.map(Json)
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Notification>> {
    mark(&state, &auth, id).await.map(Json)
}

async fn mark(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<Notification> {
    Notification::mark_read(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))
}

/// Marks the caller's unread notifications read
///
/// Body is optional: `{ "notification_ids": [...] }` limits the update.
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthContext,
    body: Bytes,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let req: MarkAllReadRequest = optional_json(&body)?;

    let updated_count =
        Notification::mark_all_read(&state.db, auth.user_id, req.notification_ids.as_deref())
            .await?;

    Ok(Json(MarkAllReadResponse {
        message: format!("{} notifications marked as read", updated_count),
        updated_count,
    }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    if !Notification::delete(&state.db, id, auth.user_id).await? {
        return Err(ApiError::not_found("Notification"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_only_accepts_is_read() {
        assert!(serde_json::from_str::<UpdateNotificationRequest>(r#"{"is_read": true}"#).is_ok());
        assert!(serde_json::from_str::<UpdateNotificationRequest>(
            r#"{"is_read": true, "title": "edited"}"#
        )
        .is_err());
    }

    #[test]
    fn test_mark_all_read_body_is_optional() {
        let req: MarkAllReadRequest = optional_json(&Bytes::new()).unwrap();
        assert!(req.notification_ids.is_none());

        let id = Uuid::new_v4();
        let req: MarkAllReadRequest =
            optional_json(&Bytes::from(format!(r#"{{"notification_ids": ["{id}"]}}"#))).unwrap();
        assert_eq!(req.notification_ids, Some(vec![id]));
    }

    #[test]
    fn test_create_defaults_to_info() {
        let req: CreateNotificationRequest = serde_json::from_str(&format!(
            r#"{{"recipient_id": "{}", "title": "Hello", "message": "Welcome aboard"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert_eq!(req.notification_type, NotificationType::Info);
        assert!(req.validate().is_ok());
    }
}
