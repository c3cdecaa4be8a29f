//! The operations offered to the HTTP layer. Every operation validates its input before the database is touched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::Snafu;
use tracing::instrument;

use crate::database::Database;
use crate::model::{Field, Statistic, Submission};
use crate::query::{Comparison, Filter, Order, Predicate, QueryError};
use crate::store::{self, StoreError};
use crate::validation::{self, ValidationError};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ServiceError {
    #[snafu(context(false), display("{source}"))]
    Invalid { source: ValidationError },

    #[snafu(context(false), display("{source}"))]
    Filter { source: QueryError },

    #[snafu(context(false), display("{source}"))]
    Store { source: StoreError },
}

/// What [submit] did with the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Created,
    Updated,
}

impl Outcome {
    pub fn message(self) -> &'static str {
        match self {
            Outcome::Created => "Statistic created",
            Outcome::Updated => "Statistic updated",
        }
    }
}

/// Record a day of activity, adding it onto the day's totals when that day already has a statistic.
#[instrument(skip(db))]
pub async fn submit(submission: Submission, db: &Database) -> Result<Outcome, ServiceError> {
    validation::submission(&submission, validation::today())?;

    if let Some(outcome) = merge(&submission, db).await? {
        return Ok(outcome);
    }

    insert(&submission, db).await
}

/// Insert a fresh statistic. Losing the race against another request for the same day turns this into a merge.
async fn insert(submission: &Submission, db: &Database) -> Result<Outcome, ServiceError> {
    let statistic = submission.to_statistic();

    match store::create(&statistic, db).await {
        Ok(created) => {
            tracing::info!(date = %created.date, "created statistic");
            Ok(Outcome::Created)
        }
        Err(StoreError::DuplicateDate { date, .. }) => {
            tracing::warn!(%date, "statistic was created concurrently, merging into it instead");
            let outcome = merge(submission, db).await?;
            let outcome = outcome.ok_or_else(|| {
                store::NotFoundSnafu {
                    target: date.to_string(),
                }
                .build()
            })?;
            Ok(outcome)
        }
        Err(error) => Err(error.into()),
    }
}

/// Add the submission onto the existing statistic for its date, if there is one.
///
/// The totals are checked for overflow against the stored statistic, then incremented in place by the store.
async fn merge(submission: &Submission, db: &Database) -> Result<Option<Outcome>, ServiceError> {
    let Some(mut existing) = store::find_by_date(submission.date, db).await? else {
        return Ok(None);
    };
    existing.accumulate(submission.views, submission.clicks, submission.cost)?;

    let updated = match store::increment(submission, db).await {
        Ok(updated) => updated,
        Err(StoreError::NotFound { .. }) => return Ok(None),
        Err(error) => return Err(error.into()),
    };

    tracing::info!(
        date = %updated.date,
        views = updated.views,
        clicks = updated.clicks,
        cost = updated.cost,
        "updated statistic"
    );
    Ok(Some(Outcome::Updated))
}

/// Statistics between `from` and `to`, both inclusive.
#[instrument(skip(db))]
pub async fn list(
    from: NaiveDate, to: NaiveDate, order_by: Option<&str>, db: &Database,
) -> Result<Vec<Statistic>, ServiceError> {
    let today = validation::today();
    validation::not_in_future(from, today)?;
    validation::not_in_future(to, today)?;

    let mut filter = Filter::new()
        .and(Predicate::new(Field::Date, Comparison::GreaterOrEqual, from))
        .and(Predicate::new(Field::Date, Comparison::LessOrEqual, to));

    if let Some(order_by) = order_by {
        filter = filter.order_by(order_by.parse::<Order>()?);
    }

    Ok(store::query(&filter, db).await?)
}

/// Statistics matching arbitrary `field[__op] = value` parameters.
#[instrument(skip(params, db))]
pub async fn search(
    params: Vec<(String, Value)>, order_by: Option<&str>, db: &Database,
) -> Result<Vec<Statistic>, ServiceError> {
    let filter = Filter::from_params(params, order_by)?;
    Ok(store::query(&filter, db).await?)
}

#[instrument(skip(db))]
pub async fn remove(date: NaiveDate, db: &Database) -> Result<Statistic, ServiceError> {
    Ok(store::delete_by_date(date, db).await?)
}

#[instrument(skip(db))]
pub async fn clear(db: &Database) -> Result<usize, ServiceError> {
    Ok(store::delete_all(db).await?)
}
