/// Payroll endpoints
///
/// Restricted to financial viewers (superadmin and accountant). Any user may
/// read their own records through `GET /v1/payroll/my` or by id. Gross and
/// net pay are always computed from the components.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
    routes::double_option,
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use corpdesk_shared::{
    auth::middleware::AuthContext,
    models::{
        pagination::{Page, PageParams},
        payroll::{CreatePayroll, PayComponents, Payroll, PayrollFilter, UpdatePayroll},
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePayrollRequest {
    pub employee_id: Uuid,
    pub pay_period_start: NaiveDate,
    pub pay_period_end: NaiveDate,

    #[validate(range(min = 0))]
    pub basic_salary_cents: i64,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub allowances_cents: i64,

    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub overtime_hours: f64,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub overtime_rate_cents: i64,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub tax_deduction_cents: i64,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub insurance_deduction_cents: i64,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub other_deductions_cents: i64,

    #[serde(default)]
    pub is_paid: bool,

    pub payment_date: Option<NaiveDate>,
}

impl CreatePayrollRequest {
    fn components(&self) -> PayComponents {
        PayComponents {
            basic_salary_cents: self.basic_salary_cents,
            allowances_cents: self.allowances_cents,
            overtime_hours: self.overtime_hours,
            overtime_rate_cents: self.overtime_rate_cents,
            tax_deduction_cents: self.tax_deduction_cents,
            insurance_deduction_cents: self.insurance_deduction_cents,
            other_deductions_cents: self.other_deductions_cents,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePayrollRequest {
    pub pay_period_start: Option<NaiveDate>,
    pub pay_period_end: Option<NaiveDate>,

    #[validate(range(min = 0))]
    pub basic_salary_cents: Option<i64>,

    #[validate(range(min = 0))]
    pub allowances_cents: Option<i64>,

    #[validate(range(min = 0.0))]
    pub overtime_hours: Option<f64>,

    #[validate(range(min = 0))]
    pub overtime_rate_cents: Option<i64>,

    #[validate(range(min = 0))]
    pub tax_deduction_cents: Option<i64>,

    #[validate(range(min = 0))]
    pub insurance_deduction_cents: Option<i64>,

    #[validate(range(min = 0))]
    pub other_deductions_cents: Option<i64>,

    pub is_paid: Option<bool>,

    #[serde(default, deserialize_with = "double_option")]
    pub payment_date: Option<Option<NaiveDate>>,
}

impl From<UpdatePayrollRequest> for UpdatePayroll {
    fn from(req: UpdatePayrollRequest) -> Self {
        UpdatePayroll {
            pay_period_start: req.pay_period_start,
            pay_period_end: req.pay_period_end,
            basic_salary_cents: req.basic_salary_cents,
            allowances_cents: req.allowances_cents,
            overtime_hours: req.overtime_hours,
            overtime_rate_cents: req.overtime_rate_cents,
            tax_deduction_cents: req.tax_deduction_cents,
            insurance_deduction_cents: req.insurance_deduction_cents,
            other_deductions_cents: req.other_deductions_cents,
            is_paid: req.is_paid,
            payment_date: req.payment_date,
        }
    }
}

/// Lists payroll records, newest period first
///
/// ```text
/// GET /v1/payroll?employee=&month=2025-03&limit=&offset=
/// ```
pub async fn list_payroll(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(filter): ApiQuery<PayrollFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<Payroll>>> {
    auth.require_financial_access()?;
    let month = filter.month_range()?;

    let (records, total) = Payroll::list(&state.db, filter.employee, month, &page).await?;

    Ok(Json(Page::new(records, total, &page)))
}

/// The caller's own payslips
///
/// ```text
/// GET /v1/payroll/my?month=2025-03
/// ```
pub async fn my_payroll(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(filter): ApiQuery<PayrollFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<Payroll>>> {
    let month = filter.month_range()?;

    let (records, total) = Payroll::list(&state.db, Some(auth.user_id), month, &page).await?;

    Ok(Json(Page::new(records, total, &page)))
}

/// Creates a payroll record
///
/// # Errors
///
/// - `400 Bad Request`: Negative or overflowing amounts, period end before start
/// - `403 Forbidden`: Caller lacks financial access
/// - `409 Conflict`: Record already exists for the employee and period
pub async fn create_payroll(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreatePayrollRequest>,
) -> ApiResult<(StatusCode, Json<Payroll>)> {
    auth.require_financial_access()?;
    req.validate()?;

    let record = Payroll::create(
        &state.db,
        CreatePayroll {
            employee_id: req.employee_id,
            pay_period_start: req.pay_period_start,
            pay_period_end: req.pay_period_end,
            components: req.components(),
            is_paid: req.is_paid,
            payment_date: req.payment_date,
        },
    )
    .await?;

    tracing::info!(
        payroll_id = %record.id,
        employee_id = %record.employee_id,
        created_by = %auth.user_id,
        "Payroll record created"
    );

    Ok((StatusCode::CREATED, Json(record)))
}

/// Reads a record; non-financial callers only see their own
pub async fn get_payroll(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Payroll>> {
    let owner = if auth.can_view_financial_data() {
        None
    } else {
        Some(auth.user_id)
    };

    let record = Payroll::find(&state.db, id, owner)
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll record"))?;

    Ok(Json(record))
}

/// Partially updates a record and recomputes gross and net
pub async fn update_payroll(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePayrollRequest>,
) -> ApiResult<Json<Payroll>> {
    auth.require_financial_access()?;
    req.validate()?;

    let record = Payroll::update(&state.db, id, req.into())
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll record"))?;

    tracing::info!(payroll_id = %record.id, updated_by = %auth.user_id, "Payroll record updated");

    Ok(Json(record))
}

pub async fn delete_payroll(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require_financial_access()?;

    if !Payroll::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Payroll record"));
    }

    tracing::info!(payroll_id = %id, deleted_by = %auth.user_id, "Payroll record deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_components() {
        let req: CreatePayrollRequest = serde_json::from_str(&format!(
            r#"{{"employee_id": "{}", "pay_period_start": "2025-03-01",
                "pay_period_end": "2025-03-31", "basic_salary_cents": 500000,
                "allowances_cents": 20000, "overtime_hours": 2.5,
                "overtime_rate_cents": 4000, "tax_deduction_cents": 50000}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert!(req.validate().is_ok());

        assert_eq!(req.components().totals().unwrap(), (530_000, 480_000));
    }

    #[test]
    fn test_overflowing_salary_is_a_validation_error() {
        let req: CreatePayrollRequest = serde_json::from_str(&format!(
            r#"{{"employee_id": "{}", "pay_period_start": "2025-03-01",
                "pay_period_end": "2025-03-31", "basic_salary_cents": {},
                "allowances_cents": 1}}"#,
            Uuid::new_v4(),
            i64::MAX
        ))
        .unwrap();
        assert!(req.validate().is_ok());

        let err = ApiError::from(req.components().totals().unwrap_err());
        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details[0].field, "basic_salary_cents");
            }
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_amount_rejected() {
        let req = UpdatePayrollRequest {
            tax_deduction_cents: Some(-10),
            ..Default::default()
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("tax_deduction_cents"));
    }

    #[test]
    fn test_payment_date_can_be_cleared() {
        let req: UpdatePayrollRequest =
            serde_json::from_str(r#"{"is_paid": false, "payment_date": null}"#).unwrap();
        let update = UpdatePayroll::from(req);
        assert_eq!(update.payment_date, Some(None));
        assert_eq!(update.is_paid, Some(false));
    }
}
