/// API route handlers, one module per resource
///
/// - `health`: Liveness and database status
/// - `auth`: Tokens, logout, current user, password change
/// - `users`: User management, search and login history
/// - `departments`: Department CRUD
/// - `stats`: Dashboard and user statistics
/// - `projects`, `tasks`: Project tracking
/// - `attendance`, `leave_requests`, `expenses`, `payroll`: Workforce records
/// - `notifications`: Per-user notifications

pub mod attendance;
pub mod auth;
pub mod departments;
pub mod expenses;
pub mod health;
pub mod leave_requests;
pub mod notifications;
pub mod payroll;
pub mod projects;
pub mod stats;
pub mod tasks;
pub mod users;

use axum::body::Bytes;
use chrono::{NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use crate::error::{ApiError, ApiResult};

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Parses a JSON body that may be omitted entirely
pub(crate) fn optional_json<T>(body: &Bytes) -> ApiResult<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Failed to parse the request body as JSON: {}", e)))
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `{ "message": ... }`
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        head_id: Option<Option<u32>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.head_id, None);

        let null: Patch = serde_json::from_str(r#"{"head_id": null}"#).unwrap();
        assert_eq!(null.head_id, Some(None));

        let set: Patch = serde_json::from_str(r#"{"head_id": 7}"#).unwrap();
        assert_eq!(set.head_id, Some(Some(7)));
    }

    #[test]
    fn test_optional_json() {
        let empty: Patch = optional_json(&Bytes::from_static(b"  ")).unwrap();
        assert_eq!(empty.head_id, None);

        let parsed: Patch = optional_json(&Bytes::from_static(br#"{"head_id": 3}"#)).unwrap();
        assert_eq!(parsed.head_id, Some(Some(3)));

        assert!(matches!(
            optional_json::<Patch>(&Bytes::from_static(b"{oops")),
            Err(ApiError::BadRequest(_))
        ));
    }
}
