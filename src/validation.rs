use chrono::NaiveDate;
use snafu::{ensure, Snafu};

use crate::model::{Field, Submission};

#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum ValidationError {
    /// Statistics can only be recorded for days that already started
    #[snafu(display("date {date} cannot be a future date"))]
    InvalidDate { date: NaiveDate },

    /// Views, clicks and cost cannot go negative
    #[snafu(display("{field} must be at least 0, got {value}"))]
    InvalidNumber { field: Field, value: String },

    /// A running total no longer fits its type
    #[snafu(display("adding {value} would overflow the {field} total"))]
    Overflow { field: Field, value: String },
}

/// The server's local calendar date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn not_in_future(date: NaiveDate, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    ensure!(date <= today, InvalidDateSnafu { date });
    Ok(date)
}

/// Absent amounts are allowed, they are filled in or skipped later.
pub fn non_negative_count(field: Field, value: Option<i64>) -> Result<(), ValidationError> {
    match value {
        Some(value) if value < 0 => InvalidNumberSnafu {
            field,
            value: value.to_string(),
        }
        .fail(),
        _ => Ok(()),
    }
}

pub fn non_negative_amount(field: Field, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(value) if value.is_nan() || value < 0.0 => InvalidNumberSnafu {
            field,
            value: value.to_string(),
        }
        .fail(),
        _ => Ok(()),
    }
}

pub fn submission(submission: &Submission, today: NaiveDate) -> Result<(), ValidationError> {
    not_in_future(submission.date, today)?;
    non_negative_count(Field::Views, submission.views)?;
    non_negative_count(Field::Clicks, submission.clicks)?;
    non_negative_amount(Field::Cost, submission.cost)?;
    Ok(())
}
