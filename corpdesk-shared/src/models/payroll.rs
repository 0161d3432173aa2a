/// Payroll records
///
/// Gross and net salary are never accepted as input. They are computed from
/// the components on every write:
///
/// ```text
/// gross = basic + allowances + round(overtime_hours * overtime_rate)
/// net   = gross - tax - insurance - other deductions
/// ```

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::ValidationErrors;

use super::pagination::PageParams;
use super::validation;

const PAYROLL_COLUMNS: &str = "id, employee_id, pay_period_start, pay_period_end, \
     basic_salary_cents, allowances_cents, overtime_hours, overtime_rate_cents, \
     tax_deduction_cents, insurance_deduction_cents, other_deductions_cents, \
     gross_salary_cents, net_salary_cents, is_paid, payment_date, created_at, updated_at";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payroll {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub pay_period_start: NaiveDate,
    pub pay_period_end: NaiveDate,
    pub basic_salary_cents: i64,
    pub allowances_cents: i64,
    pub overtime_hours: f64,
    pub overtime_rate_cents: i64,
    pub tax_deduction_cents: i64,
    pub insurance_deduction_cents: i64,
    pub other_deductions_cents: i64,
    pub gross_salary_cents: i64,
    pub net_salary_cents: i64,
    pub is_paid: bool,
    pub payment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Salary components that gross and net are derived from
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PayComponents {
    pub basic_salary_cents: i64,
    pub allowances_cents: i64,
    pub overtime_hours: f64,
    pub overtime_rate_cents: i64,
    pub tax_deduction_cents: i64,
    pub insurance_deduction_cents: i64,
    pub other_deductions_cents: i64,
}

/// Largest amount `f64` represents exactly; overtime pay beyond it is refused
const MAX_EXACT_CENTS: f64 = 9_007_199_254_740_992.0;

impl PayComponents {
    /// `None` when the product is not a finite amount that fits in cents
    pub fn overtime_pay_cents(&self) -> Option<i64> {
        let pay = (self.overtime_hours * self.overtime_rate_cents as f64).round();
        if pay.is_finite() && pay.abs() <= MAX_EXACT_CENTS {
            Some(pay as i64)
        } else {
            None
        }
    }

    pub fn gross_cents(&self) -> Option<i64> {
        self.basic_salary_cents
            .checked_add(self.allowances_cents)?
            .checked_add(self.overtime_pay_cents()?)
    }

    pub fn total_deductions_cents(&self) -> Option<i64> {
        self.tax_deduction_cents
            .checked_add(self.insurance_deduction_cents)?
            .checked_add(self.other_deductions_cents)
    }

    pub fn net_cents(&self) -> Option<i64> {
        self.gross_cents()?.checked_sub(self.total_deductions_cents()?)
    }

    /// Gross and net, or a field-keyed error naming the sum that overflowed
    pub fn totals(&self) -> Result<(i64, i64), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.overtime_pay_cents().is_none() {
            validation::add_error(
                &mut errors,
                "overtime_hours",
                "amount_overflow",
                "Overtime pay is too large",
            );
        } else if self.gross_cents().is_none() {
            validation::add_error(
                &mut errors,
                "basic_salary_cents",
                "amount_overflow",
                "Gross salary is too large",
            );
        }
        if self.total_deductions_cents().is_none() {
            validation::add_error(
                &mut errors,
                "tax_deduction_cents",
                "amount_overflow",
                "Total deductions are too large",
            );
        }

        match (self.gross_cents(), self.net_cents()) {
            (Some(gross), Some(net)) if errors.is_empty() => Ok((gross, net)),
            _ => {
                if errors.is_empty() {
                    validation::add_error(
                        &mut errors,
                        "tax_deduction_cents",
                        "amount_overflow",
                        "Net salary is out of range",
                    );
                }
                Err(errors)
            }
        }
    }
}

/// Failures of payroll writes
#[derive(Debug, thiserror::Error)]
pub enum PayrollError {
    #[error("Invalid payroll data")]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct CreatePayroll {
    pub employee_id: Uuid,
    pub pay_period_start: NaiveDate,
    pub pay_period_end: NaiveDate,
    pub components: PayComponents,
    pub is_paid: bool,
    pub payment_date: Option<NaiveDate>,
}

/// Partial update; components left as `None` keep their stored value
#[derive(Debug, Clone, Default)]
pub struct UpdatePayroll {
    pub pay_period_start: Option<NaiveDate>,
    pub pay_period_end: Option<NaiveDate>,
    pub basic_salary_cents: Option<i64>,
    pub allowances_cents: Option<i64>,
    pub overtime_hours: Option<f64>,
    pub overtime_rate_cents: Option<i64>,
    pub tax_deduction_cents: Option<i64>,
    pub insurance_deduction_cents: Option<i64>,
    pub other_deductions_cents: Option<i64>,
    pub is_paid: Option<bool>,
    pub payment_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayrollFilter {
    pub employee: Option<Uuid>,
    /// `YYYY-MM`, matched against the start of the pay period
    pub month: Option<String>,
}

impl PayrollFilter {
    /// Half-open date range `[first day, first day of next month)` for the
    /// `month` filter
    pub fn month_range(&self) -> Result<Option<(NaiveDate, NaiveDate)>, ValidationErrors> {
        let Some(month) = self.month.as_deref().map(str::trim).filter(|m| !m.is_empty()) else {
            return Ok(None);
        };

        let range = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
            .ok()
            .and_then(|first| Some((first, first.checked_add_months(Months::new(1))?)));

        match range {
            Some(range) => Ok(Some(range)),
            None => {
                let mut errors = ValidationErrors::new();
                validation::add_error(&mut errors, "month", "month", "Expected a month as YYYY-MM");
                Err(errors)
            }
        }
    }
}

/// Checks that the pay period does not end before it starts
pub fn validate_period(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    validation::date_range(&mut errors, start, end, "pay_period_end");
    validation::finish(errors)
}

impl Payroll {
    pub fn components(&self) -> PayComponents {
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

    /// Creates a payroll record with computed gross and net
    ///
    /// # Errors
    ///
    /// Returns a unique violation if the employee already has a record for
    /// the same period, and [`PayrollError::Invalid`] when the period is
    /// inverted or an amount overflows
    pub async fn create(pool: &PgPool, data: CreatePayroll) -> Result<Self, PayrollError> {
        validate_period(data.pay_period_start, data.pay_period_end)?;
        let c = data.components;
        let (gross, net) = c.totals()?;

        let record = sqlx::query_as::<_, Payroll>(&format!(
            r#"
            INSERT INTO payroll (
                employee_id, pay_period_start, pay_period_end,
                basic_salary_cents, allowances_cents, overtime_hours, overtime_rate_cents,
                tax_deduction_cents, insurance_deduction_cents, other_deductions_cents,
                gross_salary_cents, net_salary_cents, is_paid, payment_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {PAYROLL_COLUMNS}
            "#
        ))
        .bind(data.employee_id)
        .bind(data.pay_period_start)
        .bind(data.pay_period_end)
        .bind(c.basic_salary_cents)
        .bind(c.allowances_cents)
        .bind(c.overtime_hours)
        .bind(c.overtime_rate_cents)
        .bind(c.tax_deduction_cents)
        .bind(c.insurance_deduction_cents)
        .bind(c.other_deductions_cents)
        .bind(gross)
        .bind(net)
        .bind(data.is_paid)
        .bind(data.payment_date)
        .fetch_one(pool)
        .await?;

        Ok(record)
    }

    /// Finds a record, restricted to `owner` when given
    pub async fn find(
        pool: &PgPool,
        id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PAYROLL_COLUMNS} FROM payroll WHERE id = "
        ));
        qb.push_bind(id);
        if let Some(employee_id) = owner {
            qb.push(" AND employee_id = ").push_bind(employee_id);
        }

        qb.build_query_as::<Payroll>().fetch_optional(pool).await
    }

    /// Merges the update into the stored record and recomputes gross and net
    ///
    /// The row is locked for the duration of the merge. The merged period and
    /// amounts are validated before anything is written.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdatePayroll,
    ) -> Result<Option<Self>, PayrollError> {
        let mut tx = pool.begin().await?;

        let current = sqlx::query_as::<_, Payroll>(&format!(
            "SELECT {PAYROLL_COLUMNS} FROM payroll WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        let c = PayComponents {
            basic_salary_cents: data.basic_salary_cents.unwrap_or(current.basic_salary_cents),
            allowances_cents: data.allowances_cents.unwrap_or(current.allowances_cents),
            overtime_hours: data.overtime_hours.unwrap_or(current.overtime_hours),
            overtime_rate_cents: data.overtime_rate_cents.unwrap_or(current.overtime_rate_cents),
            tax_deduction_cents: data.tax_deduction_cents.unwrap_or(current.tax_deduction_cents),
            insurance_deduction_cents: data
                .insurance_deduction_cents
                .unwrap_or(current.insurance_deduction_cents),
            other_deductions_cents: data
                .other_deductions_cents
                .unwrap_or(current.other_deductions_cents),
        };
        let period_start = data.pay_period_start.unwrap_or(current.pay_period_start);
        let period_end = data.pay_period_end.unwrap_or(current.pay_period_end);

        let totals = validate_period(period_start, period_end).and_then(|()| c.totals());
        let (gross, net) = match totals {
            Ok(totals) => totals,
            Err(errors) => {
                tx.rollback().await?;
                return Err(errors.into());
            }
        };

        let updated = sqlx::query_as::<_, Payroll>(&format!(
            r#"
            UPDATE payroll
            SET pay_period_start = $2,
                pay_period_end = $3,
                basic_salary_cents = $4,
                allowances_cents = $5,
                overtime_hours = $6,
                overtime_rate_cents = $7,
                tax_deduction_cents = $8,
                insurance_deduction_cents = $9,
                other_deductions_cents = $10,
                gross_salary_cents = $11,
                net_salary_cents = $12,
                is_paid = $13,
                payment_date = $14,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYROLL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(period_start)
        .bind(period_end)
        .bind(c.basic_salary_cents)
        .bind(c.allowances_cents)
        .bind(c.overtime_hours)
        .bind(c.overtime_rate_cents)
        .bind(c.tax_deduction_cents)
        .bind(c.insurance_deduction_cents)
        .bind(c.other_deductions_cents)
        .bind(gross)
        .bind(net)
        .bind(data.is_paid.unwrap_or(current.is_paid))
        .bind(data.payment_date.unwrap_or(current.payment_date))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(updated))
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM payroll WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn push_filters(
        qb: &mut QueryBuilder<'_, Postgres>,
        employee: Option<Uuid>,
        month: Option<(NaiveDate, NaiveDate)>,
    ) {
        qb.push(" WHERE TRUE");

        if let Some(employee_id) = employee {
            qb.push(" AND employee_id = ").push_bind(employee_id);
        }
        if let Some((first, next)) = month {
            qb.push(" AND pay_period_start >= ").push_bind(first);
            qb.push(" AND pay_period_start < ").push_bind(next);
        }
    }

    /// Lists records, latest period first
    ///
    /// `month` is the range produced by [`PayrollFilter::month_range`].
    pub async fn list(
        pool: &PgPool,
        employee: Option<Uuid>,
        month: Option<(NaiveDate, NaiveDate)>,
        page: &PageParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM payroll");
        Self::push_filters(&mut count, employee, month);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {PAYROLL_COLUMNS} FROM payroll"));
        Self::push_filters(&mut qb, employee, month);
        qb.push(" ORDER BY pay_period_start DESC, created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let records = qb.build_query_as::<Payroll>().fetch_all(pool).await?;

        Ok((records, total))
    }

    pub async fn count_unpaid(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM payroll WHERE NOT is_paid")
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components() -> PayComponents {
        PayComponents {
            basic_salary_cents: 500_000,
            allowances_cents: 25_000,
            overtime_hours: 4.5,
            overtime_rate_cents: 3_333,
            tax_deduction_cents: 80_000,
            insurance_deduction_cents: 12_000,
            other_deductions_cents: 3_000,
        }
    }

    #[test]
    fn test_gross_and_net() {
        let c = components();

        // 4.5 * 3333 = 14998.5, rounded half away from zero
        assert_eq!(c.overtime_pay_cents(), Some(14_999));
        assert_eq!(c.gross_cents(), Some(539_999));
        assert_eq!(c.total_deductions_cents(), Some(95_000));
        assert_eq!(c.net_cents(), Some(444_999));
        assert_eq!(c.totals().unwrap(), (539_999, 444_999));
    }

    #[test]
    fn test_no_overtime() {
        let c = PayComponents {
            basic_salary_cents: 300_000,
            ..Default::default()
        };
        assert_eq!(c.totals().unwrap(), (300_000, 300_000));
    }

    #[test]
    fn test_gross_overflow_is_a_field_error() {
        let c = PayComponents {
            basic_salary_cents: i64::MAX,
            allowances_cents: 1,
            ..Default::default()
        };
        assert_eq!(c.gross_cents(), None);

        let errors = c.totals().unwrap_err();
        assert!(errors.field_errors().contains_key("basic_salary_cents"));
    }

    #[test]
    fn test_deduction_overflow_is_a_field_error() {
        let c = PayComponents {
            basic_salary_cents: 100,
            tax_deduction_cents: i64::MAX,
            insurance_deduction_cents: i64::MAX,
            ..Default::default()
        };
        assert_eq!(c.total_deductions_cents(), None);

        let errors = c.totals().unwrap_err();
        assert!(errors.field_errors().contains_key("tax_deduction_cents"));
    }

    #[test]
    fn test_overtime_overflow_is_a_field_error() {
        let c = PayComponents {
            overtime_hours: 1e300,
            overtime_rate_cents: i64::MAX,
            ..Default::default()
        };
        assert_eq!(c.overtime_pay_cents(), None);

        let errors = c.totals().unwrap_err();
        assert!(errors.field_errors().contains_key("overtime_hours"));
    }

    #[test]
    fn test_month_range() {
        let filter = PayrollFilter {
            employee: None,
            month: Some("2025-12".to_string()),
        };
        let (first, next) = filter.month_range().unwrap().unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());

        assert_eq!(PayrollFilter::default().month_range().unwrap(), None);

        let filter = PayrollFilter {
            employee: None,
            month: Some("2025-13".to_string()),
        };
        let errors = filter.month_range().unwrap_err();
        assert!(errors.field_errors().contains_key("month"));
    }

    #[test]
    fn test_validate_period() {
        let start = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 5, 31).unwrap();

        assert!(validate_period(start, end).is_ok());
        assert!(validate_period(end, start).is_err());
    }
}
