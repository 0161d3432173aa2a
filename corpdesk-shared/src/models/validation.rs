/// Cross-field checks that `#[validate]` attributes can't express
///
/// Failures are reported as [`validator::ValidationErrors`] so they reach the
/// client in the same field-keyed shape as derive-based validation.

use std::borrow::Cow;

use chrono::NaiveDate;
use validator::{ValidationError, ValidationErrors};

/// Records a failure for `field`
pub fn add_error(
    errors: &mut ValidationErrors,
    field: &'static str,
    code: &'static str,
    message: &'static str,
) {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    errors.add(field, error);
}

/// `Ok` when no failure was recorded
pub fn finish(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that `end_field` is not before `start`
pub fn date_range(
    errors: &mut ValidationErrors,
    start: NaiveDate,
    end: NaiveDate,
    end_field: &'static str,
) {
    if end < start {
        add_error(
            errors,
            end_field,
            "date_range",
            "End date cannot be before start date",
        );
    }
}

/// Checks that `date` is today or later
pub fn not_in_past(
    errors: &mut ValidationErrors,
    date: NaiveDate,
    today: NaiveDate,
    field: &'static str,
) {
    if date < today {
        add_error(errors, field, "past_date", "Date cannot be in the past");
    }
}

/// Checks that `date` is today or earlier
pub fn not_in_future(
    errors: &mut ValidationErrors,
    date: NaiveDate,
    today: NaiveDate,
    field: &'static str,
) {
    if date > today {
        add_error(errors, field, "future_date", "Date cannot be in the future");
    }
}
