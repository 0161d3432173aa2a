/// Database models for Corpdesk
///
/// Each model owns its CRUD queries. List queries take an optional owner id:
/// `None` means the caller may see every record, `Some(id)` restricts the
/// result to records that belong to that user (see
/// [`crate::auth::authorization::Visibility`]).
///
/// # Models
///
/// - `role`: The closed role set and the role to level table
/// - `user`: User accounts
/// - `department`: Organisational departments
/// - `login_history`: One row per successful token issuance
/// - `revoked_token`: Refresh tokens revoked by logout
/// - `project`: Projects and their team membership
/// - `task`: Project tasks
/// - `attendance`: Daily attendance records
/// - `leave_request`: Leave requests (approval workflow)
/// - `expense`: Expense claims (approval workflow)
/// - `payroll`: Payroll records
/// - `notification`: In-app notifications
/// - `approval`: The `pending -> approved | rejected` state machine
/// - `pagination`: Limit/offset handling and list envelopes
/// - `validation`: Date checks reported as field errors
///
/// # Example
///
/// ```no_run
/// use corpdesk_shared::models::role::Role;
/// use corpdesk_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     username: "employee1".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: Role::Employee,
///     employee_id: Some("EMP001".to_string()),
///     ..Default::default()
/// }).await?;
/// assert_eq!(user.level().as_u8(), 3);
/// # Ok(())
/// # }
/// ```

pub mod approval;
pub mod attendance;
pub mod department;
pub mod expense;
pub mod leave_request;
pub mod login_history;
pub mod notification;
pub mod pagination;
pub mod payroll;
pub mod project;
pub mod revoked_token;
pub mod role;
pub mod task;
pub mod user;
pub mod validation;
