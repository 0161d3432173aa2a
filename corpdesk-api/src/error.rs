/// Error handling for the API server
///
/// Every handler returns [`ApiResult`]. Domain errors from the shared crate
/// convert into [`ApiError`] through `From`, so handlers propagate them with
/// `?` and the mapping to HTTP status codes lives in one place.
///
/// # Example
///
/// ```no_run
/// use corpdesk_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(found: bool) -> ApiResult<Json<Value>> {
///     if !found {
///         return Err(ApiError::not_found("Project"));
///     }
///     Ok(Json(json!({ "ok": true })))
/// }
/// ```

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use corpdesk_shared::{
    auth::{
        authorization::AuthzError,
        jwt::JwtError,
        middleware::AuthError,
        password::PasswordError,
    },
    models::{approval::TransitionError, payroll::PayrollError},
};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request (400)
    BadRequest(String),

    /// Missing, invalid or revoked credentials (401)
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    Forbidden(String),

    /// Missing or out-of-scope resource (404)
    NotFound(String),

    /// State conflict or unique violation (409)
    Conflict(String),

    /// Field-level validation failures (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500), logged and never shown to clients
    InternalError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Error body: `{ "error", "message", "details"? }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code such as `not_found`
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// `404` for `resource`, used for both missing and out-of-scope records
    pub fn not_found(resource: &str) -> Self {
        ApiError::NotFound(format!("{} not found", resource))
    }

    /// A single field-level failure
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }

    /// Password policy failures reported against `field`
    pub fn password_policy(field: &str, err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(violations) => ApiError::ValidationError(
                violations
                    .into_iter()
                    .map(|v| ValidationErrorDetail {
                        field: field.to_string(),
                        message: v.to_string(),
                    })
                    .collect(),
            ),
            other => other.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    let what = db_err.constraint().map(constraint_subject).unwrap_or("Record");
                    return ApiError::Conflict(format!("{} already exists", what));
                }
                if db_err.is_foreign_key_violation() {
                    return ApiError::Conflict(
                        "Referenced record does not exist or is still in use".to_string(),
                    );
                }
                if db_err.is_check_violation() {
                    return ApiError::BadRequest(format!(
                        "Value violates constraint {}",
                        db_err.constraint().unwrap_or("check")
                    ));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Human name for a unique constraint
fn constraint_subject(constraint: &str) -> &'static str {
    if constraint.contains("username") {
        "Username"
    } else if constraint.contains("employee_id") {
        "Employee ID"
    } else if constraint.contains("email") {
        "Email"
    } else if constraint.starts_with("attendance") {
        "Attendance for this date"
    } else if constraint.starts_with("payroll") {
        "Payroll for this period"
    } else if constraint.starts_with("departments") {
        "Department"
    } else {
        "Record"
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::DatabaseError(msg) => ApiError::InternalError(msg),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(_) => ApiError::password_policy("password", err),
            other => ApiError::InternalError(format!("Password operation failed: {}", other)),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Token creation failed: {}", msg))
            }
            other => ApiError::Unauthorized(format!("Invalid token: {}", other)),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotPending(_) => ApiError::Conflict(err.to_string()),
            TransitionError::ReasonRequired => {
                ApiError::invalid_field("rejection_reason", err.to_string())
            }
            TransitionError::UnknownAction(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<PayrollError> for ApiError {
    fn from(err: PayrollError) -> Self {
        match err {
            PayrollError::Invalid(errors) => errors.into(),
            PayrollError::Database(err) => err.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", error.code)),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// `Json` whose rejection is an [`ApiError`]
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejection is an [`ApiError`]
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `Path` whose rejection is an [`ApiError`]
#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use corpdesk_shared::{
        auth::password::PolicyViolation,
        models::{
            approval::ApprovalStatus,
            role::Level,
        },
    };

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        assert_eq!(ApiError::not_found("Task").to_string(), "Not found: Task not found");
    }

    #[tokio::test]
    async fn test_validation_error_body() {
        let err = ApiError::ValidationError(vec![
            ValidationErrorDetail {
                field: "end_date".to_string(),
                message: "End date cannot be before start date".to_string(),
            },
            ValidationErrorDetail {
                field: "amount_cents".to_string(),
                message: "Amount must be positive".to_string(),
            },
        ]);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");

        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["details"][0]["field"], "end_date");
    }

    #[tokio::test]
    async fn test_internal_error_is_not_leaked() {
        let (status, body) =
            body_json(ApiError::InternalError("password=hunter2 at db".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An internal error occurred");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_sqlx_row_not_found() {
        assert!(matches!(
            ApiError::from(sqlx::Error::RowNotFound),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(sqlx::Error::PoolTimedOut),
            ApiError::InternalError(_)
        ));
    }

    #[test]
    fn test_transition_errors() {
        let err: ApiError = TransitionError::NotPending(ApprovalStatus::Approved).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: ApiError = TransitionError::UnknownAction("maybe".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        match ApiError::from(TransitionError::ReasonRequired) {
            ApiError::ValidationError(details) => {
                assert_eq!(details[0].field, "rejection_reason");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_auth_errors() {
        assert_eq!(
            ApiError::from(AuthError::InvalidFormat("Expected Bearer token".to_string()))
                .status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::InactiveAccount).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthzError::InsufficientLevel {
                required: Level::Management,
                actual: Level::Staff,
            })
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::from(JwtError::Expired).status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_password_policy_details() {
        let err = ApiError::password_policy(
            "new_password",
            PasswordError::Weak(vec![PolicyViolation::TooShort, PolicyViolation::TooCommon]),
        );
        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details.len(), 2);
                assert!(details.iter().all(|d| d.field == "new_password"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let err: ApiError = PasswordError::HashError("boom".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validator_errors_are_field_keyed() {
        let mut errors = validator::ValidationErrors::new();
        corpdesk_shared::models::validation::add_error(
            &mut errors,
            "date",
            "future_date",
            "Date cannot be in the future",
        );

        match ApiError::from(errors) {
            ApiError::ValidationError(details) => {
                assert_eq!(
                    details,
                    vec![ValidationErrorDetail {
                        field: "date".to_string(),
                        message: "Date cannot be in the future".to_string(),
                    }]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
