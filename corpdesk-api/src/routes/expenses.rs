/// Expense claim endpoints
///
/// Same lifecycle as leave requests: the submitter edits while pending and
/// level 2 decides. A rejection reason is optional here.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
    routes::{double_option, notifications::notify_decision, today},
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use corpdesk_shared::{
    auth::middleware::AuthContext,
    models::{
        approval::{ensure_pending, ApprovalDecision, ReasonPolicy, TransitionError},
        expense::{
            validate_date, CreateExpense, Expense, ExpenseCategory, ExpenseFilter, ExpenseView,
            UpdateExpense,
        },
        pagination::{Page, PageParams},
        role::Level,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub category: ExpenseCategory,

    #[validate(range(min = 1, message = "Amount must be greater than zero"))]
    pub amount_cents: i64,

    pub date: NaiveDate,

    pub project_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateExpenseRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,
    pub category: Option<ExpenseCategory>,

    #[validate(range(min = 1, message = "Amount must be greater than zero"))]
    pub amount_cents: Option<i64>,

    pub date: Option<NaiveDate>,

    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<Uuid>>,
}

async fn find_visible(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<Expense> {
    Expense::find(&state.db, id, auth.visibility().owner())
        .await?
        .ok_or_else(|| ApiError::not_found("Expense"))
}

/// 409 for an expense that exists but is no longer pending, else 404
async fn conflict_or_missing(state: &AppState, id: Uuid) -> ApiError {
    match Expense::find(&state.db, id, None).await {
        Ok(Some(expense)) => TransitionError::NotPending(expense.status).into(),
        Ok(None) => ApiError::not_found("Expense"),
        Err(e) => e.into(),
    }
}

/// Lists expenses, newest first
///
/// ```text
/// GET /v1/expenses?status=pending&limit=&offset=
/// ```
pub async fn list_expenses(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(filter): ApiQuery<ExpenseFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<ExpenseView>>> {
    let (expenses, total) =
        Expense::list(&state.db, &filter, auth.visibility().owner(), &page).await?;

    Ok(Json(Page::new(expenses, total, &page).map(ExpenseView::from)))
}

/// Submits an expense claim for the caller
///
/// # Errors
///
/// - `400 Bad Request`: Non-positive amount, date in the future
/// - `409 Conflict`: Unknown project
pub async fn create_expense(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreateExpenseRequest>,
) -> ApiResult<(StatusCode, Json<ExpenseView>)> {
    req.validate()?;
    validate_date(req.date, today())?;

    let expense = Expense::create(
        &state.db,
        CreateExpense {
            title: req.title.trim().to_string(),
            description: req.description,
            category: req.category,
            amount_cents: req.amount_cents,
            date: req.date,
            submitted_by: auth.user_id,
            project_id: req.project_id,
        },
    )
    .await?;

    tracing::info!(
        expense_id = %expense.id,
        submitted_by = %auth.user_id,
        amount_cents = expense.amount_cents,
        "Expense submitted"
    );

    Ok((StatusCode::CREATED, Json(ExpenseView::from(expense))))
}

pub async fn get_expense(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ExpenseView>> {
    let expense = find_visible(&state, &auth, id).await?;

    Ok(Json(ExpenseView::from(expense)))
}

/// Edits the caller's own pending expense
///
/// # Errors
///
/// - `403 Forbidden`: Not the submitter
/// - `409 Conflict`: Already approved or rejected
pub async fn update_expense(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateExpenseRequest>,
) -> ApiResult<Json<ExpenseView>> {
    req.validate()?;

    let current = find_visible(&state, &auth, id).await?;
    if !auth.is_self(current.submitted_by) {
        return Err(ApiError::Forbidden(
            "Only the submitter can edit an expense".to_string(),
        ));
    }
    ensure_pending(current.status)?;

    if let Some(date) = req.date {
        validate_date(date, today())?;
    }

    let updated = Expense::update_pending(
        &state.db,
        id,
        UpdateExpense {
            title: req.title.map(|t| t.trim().to_string()),
            description: req.description,
            category: req.category,
            amount_cents: req.amount_cents,
            date: req.date,
            project_id: req.project_id,
        },
    )
    .await?;

    match updated {
        Some(expense) => Ok(Json(ExpenseView::from(expense))),
        None => Err(conflict_or_missing(&state, id).await),
    }
}

/// Deletes an expense
///
/// Level 2 and above may delete any expense; the submitter only while it is
/// pending.
pub async fn delete_expense(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let current = find_visible(&state, &auth, id).await?;

    if !auth.has_permission(Level::Management) {
        ensure_pending(current.status)?;
    }

    if !Expense::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Expense"));
    }

    tracing::info!(expense_id = %id, deleted_by = %auth.user_id, "Expense deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Approves or rejects a pending expense
///
/// # Errors
///
/// - `400 Bad Request`: Unknown action
/// - `403 Forbidden`: Caller below level 2
/// - `404 Not Found`: Unknown expense
/// - `409 Conflict`: Expense no longer pending
pub async fn decide_expense(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(decision): ApiJson<ApprovalDecision>,
) -> ApiResult<Json<ExpenseView>> {
    auth.require_level(Level::Management)?;
    let transition = decision.resolve(ReasonPolicy::Optional)?;

    let expense = match Expense::decide(&state.db, id, auth.user_id, &transition).await? {
        Some(expense) => expense,
        None => return Err(conflict_or_missing(&state, id).await),
    };

    tracing::info!(
        expense_id = %expense.id,
        submitted_by = %expense.submitted_by,
        status = %expense.status,
        approver = %auth.user_id,
        "Expense decided"
    );

    let message = format!(
        "Your expense \"{}\" has been {}.",
        expense.title,
        expense.status.as_str()
    );
    notify_decision(&state, expense.submitted_by, "Expense", expense.status, message).await;

    Ok(Json(ExpenseView::from(expense)))
}
