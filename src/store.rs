//! The statistics table.
//!
//! Uniqueness of `date` is enforced by the `statistics_date` index, not here: [create] reports a
//! [StoreError::DuplicateDate] whenever the index rejects the write, including when another request won a race for
//! the same day.

use chrono::NaiveDate;
use snafu::{Location, OptionExt, ResultExt, Snafu};
use tracing::instrument;

use crate::database::{self, Database, DatabaseQueryError, Sql, Table};
use crate::model::{Field, Statistic, Submission};
use crate::query::{Filter, Predicate};
use crate::Located;

const DATE_INDEX: &str = "statistics_date";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("a statistic for {date} already exists"))]
    DuplicateDate {
        date: NaiveDate,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("statistic `{target}` does not exist"))]
    NotFound {
        target: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to query the statistics: {source}"))]
    Query {
        source: DatabaseQueryError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to write the statistic: {source}"))]
    Write {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("the database did not return the written statistic"))]
    EmptyQuery {
        #[snafu(implicit)]
        location: Location,
    },
}

impl Located for StoreError {
    fn location(&self) -> Location {
        match self {
            StoreError::DuplicateDate { location, .. }
            | StoreError::NotFound { location, .. }
            | StoreError::Query { location, .. }
            | StoreError::Write { location, .. }
            | StoreError::EmptyQuery { location, .. } => *location,
        }
    }
}

#[instrument(skip(db), fields(date = %statistic.date))]
pub async fn create(statistic: &Statistic, db: &Database) -> Result<Statistic, StoreError> {
    let result = db.create(statistic.id.clone()).content(statistic).await;

    let created: Option<Statistic> = match result {
        Ok(created) => created,
        Err(source) if database::is_unique_violation(&source, DATE_INDEX) => {
            return DuplicateDateSnafu {
                date: statistic.date,
            }
            .fail();
        }
        Err(source) => return Err(source).context(WriteSnafu),
    };

    tracing::debug!(statistic = ?created, "inserted statistic to database");
    created.context(EmptyQuerySnafu)
}

pub async fn find_by_date(date: NaiveDate, db: &Database) -> Result<Option<Statistic>, StoreError> {
    let filter = Filter::new().and(Predicate::equal(Field::Date, date));
    let mut found = query(&filter, db).await?;
    Ok(found.pop())
}

#[instrument(skip_all, fields(filter = %describe(filter)))]
pub async fn query(filter: &Filter, db: &Database) -> Result<Vec<Statistic>, StoreError> {
    let statement = filter.to_select(Statistic::table());

    let mut bindings = db.sql(statement.text);
    for binding in statement.bindings {
        bindings = bindings.bind(binding);
    }

    let statistics: Vec<Statistic> = bindings.fetch_first().await.context(QuerySnafu)?;
    tracing::debug!(count = statistics.len(), "fetched statistics from database");
    Ok(statistics)
}

/// Overwrite the totals and metrics of an existing statistic. The date is never touched.
#[instrument(skip(db), fields(id = %statistic.id))]
pub async fn update(statistic: &Statistic, db: &Database) -> Result<Statistic, StoreError> {
    let query = format!(
        "UPDATE {} SET views = $views, clicks = $clicks, cost = $cost, \
         cost_per_click = $cost_per_click, cost_per_thousand_views = $cost_per_thousand_views \
         WHERE id = $id RETURN AFTER",
        Statistic::table()
    );

    let mut updated: Vec<Statistic> = db
        .sql(query)
        .bind(("id", &statistic.id))
        .bind(("views", statistic.views))
        .bind(("clicks", statistic.clicks))
        .bind(("cost", statistic.cost))
        .bind(("cost_per_click", statistic.cost_per_click))
        .bind(("cost_per_thousand_views", statistic.cost_per_thousand_views))
        .fetch_first()
        .await
        .context(QuerySnafu)?;

    tracing::debug!(statistic = ?updated, "updated statistic in database");
    updated.pop().context(NotFoundSnafu {
        target: statistic.id.to_string(),
    })
}

/// Add a submission onto the totals stored for its date and recompute the metrics from the new totals.
///
/// The read, the addition and the write happen inside one statement, so concurrent increments of the same day all
/// land. `SET` clauses apply in order, which lets the metrics see the incremented totals.
#[instrument(skip(db), fields(date = %submission.date))]
pub async fn increment(submission: &Submission, db: &Database) -> Result<Statistic, StoreError> {
    let query = format!(
        "UPDATE {} SET views += $views, clicks += $clicks, cost += $cost, \
         cost_per_click = IF cost != 0 AND clicks != 0 THEN cost / clicks ELSE NONE END, \
         cost_per_thousand_views = IF cost != 0 AND views != 0 THEN cost / views * 1000 ELSE NONE END \
         WHERE date = $date RETURN AFTER",
        Statistic::table()
    );

    let mut updated: Vec<Statistic> = db
        .sql(query)
        .bind(("date", submission.date))
        .bind(("views", submission.views.unwrap_or_default()))
        .bind(("clicks", submission.clicks.unwrap_or_default()))
        .bind(("cost", submission.cost.unwrap_or_default()))
        .fetch_first()
        .await
        .context(QuerySnafu)?;

    tracing::debug!(statistic = ?updated, "incremented statistic in database");
    updated.pop().context(NotFoundSnafu {
        target: submission.date.to_string(),
    })
}

/// Remove the statistic recorded for `date`.
#[instrument(skip(db))]
pub async fn delete_by_date(date: NaiveDate, db: &Database) -> Result<Statistic, StoreError> {
    let query = format!(
        "DELETE {} WHERE date = $date RETURN BEFORE",
        Statistic::table()
    );

    let mut deleted: Vec<Statistic> = db
        .sql(query)
        .bind(("date", date))
        .fetch_first()
        .await
        .context(QuerySnafu)?;

    deleted.pop().context(NotFoundSnafu {
        target: date.to_string(),
    })
}

/// Remove every statistic, returning how many were removed.
#[instrument(skip(db))]
pub async fn delete_all(db: &Database) -> Result<usize, StoreError> {
    let query = format!("DELETE {} RETURN BEFORE", Statistic::table());

    let deleted: Vec<Statistic> = db.sql(query).fetch_first().await.context(QuerySnafu)?;
    tracing::info!(count = deleted.len(), "deleted all statistics");
    Ok(deleted.len())
}

fn describe(filter: &Filter) -> String {
    let mut description = filter
        .predicates()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" AND ");

    if let Some(order) = filter.order() {
        description.push_str(&format!(" ORDER BY {} {}", order.field, order.sort.to_order()));
    }

    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseConfig;
    use crate::query::{Comparison, Order};

    async fn database() -> Database {
        Database::connect(&DatabaseConfig::default()).await.unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, day).unwrap()
    }

    #[tokio::test]
    async fn create_and_find_by_date() {
        let db = database().await;
        let statistic = Statistic::new(date(30), 1000, 100, 1000.0);

        let created = create(&statistic, &db).await.unwrap();
        assert_eq!(created, statistic);

        let found = find_by_date(date(30), &db).await.unwrap();
        assert_eq!(found, Some(statistic));
        assert_eq!(find_by_date(date(29), &db).await.unwrap(), None);
    }

    #[tokio::test]
    async fn second_create_for_the_same_date_is_a_duplicate() {
        let db = database().await;
        create(&Statistic::new(date(30), 1, 1, 1.0), &db).await.unwrap();

        let result = create(&Statistic::new(date(30), 2, 2, 2.0), &db).await;
        assert!(
            matches!(result, Err(StoreError::DuplicateDate { date: d, .. }) if d == date(30)),
            "{result:?}"
        );
    }

    #[tokio::test]
    async fn update_replaces_totals_but_keeps_the_date() {
        let db = database().await;
        let mut statistic = create(&Statistic::new(date(30), 1000, 100, 1000.0), &db)
            .await
            .unwrap();

        statistic.accumulate(Some(500), Some(50), Some(500.0)).unwrap();
        let updated = update(&statistic, &db).await.unwrap();

        assert_eq!(updated, statistic);
        assert_eq!(updated.date, date(30));
        assert_eq!(find_by_date(date(30), &db).await.unwrap(), Some(statistic));
    }

    #[tokio::test]
    async fn update_of_unknown_statistic_is_not_found() {
        let db = database().await;
        let result = update(&Statistic::new(date(30), 1, 1, 1.0), &db).await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })), "{result:?}");
        assert_eq!(find_by_date(date(30), &db).await.unwrap(), None, "update must not insert");
    }

    #[tokio::test]
    async fn increment_adds_onto_totals_and_recomputes_metrics() {
        let db = database().await;
        create(&Statistic::new(date(30), 1000, 0, 1000.0), &db).await.unwrap();

        let submission = Submission::new(date(30), Some(500), Some(150), None);
        let incremented = increment(&submission, &db).await.unwrap();

        let mut expected = Statistic::new(date(30), 1000, 0, 1000.0);
        expected.accumulate(Some(500), Some(150), None).unwrap();
        assert_eq!(incremented.date, date(30));
        assert_eq!(incremented.views, 1500);
        assert_eq!(incremented.clicks, 150);
        assert_eq!(incremented.cost, 1000.0);
        assert_eq!(incremented.cost_per_click, expected.cost_per_click);
        assert_eq!(incremented.cost_per_thousand_views, expected.cost_per_thousand_views);
        assert_eq!(find_by_date(date(30), &db).await.unwrap(), Some(incremented));
    }

    #[tokio::test]
    async fn increment_leaves_undefined_metrics_null() {
        let db = database().await;
        create(&Statistic::new(date(30), 10, 0, 0.0), &db).await.unwrap();

        let incremented = increment(&Submission::new(date(30), Some(5), None, None), &db)
            .await
            .unwrap();
        assert_eq!(incremented.views, 15);
        assert_eq!(incremented.cost_per_click, None);
        assert_eq!(incremented.cost_per_thousand_views, None);
    }

    #[tokio::test]
    async fn increment_of_unknown_date_is_not_found() {
        let db = database().await;
        let result = increment(&Submission::new(date(30), Some(1), None, None), &db).await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })), "{result:?}");
        assert_eq!(find_by_date(date(30), &db).await.unwrap(), None, "increment must not insert");
    }

    #[tokio::test]
    async fn query_filters_and_orders() {
        let db = database().await;
        for (day, views) in [(25, 30), (26, 10), (27, 20), (28, 40)] {
            create(&Statistic::new(date(day), views, 0, 0.0), &db).await.unwrap();
        }

        let filter = Filter::new()
            .and(Predicate::new(Field::Date, Comparison::GreaterOrEqual, date(26)))
            .and(Predicate::new(Field::Date, Comparison::Less, date(28)))
            .order_by(Order::ascending(Field::Views));
        let views: Vec<i64> = query(&filter, &db)
            .await
            .unwrap()
            .into_iter()
            .map(|statistic| statistic.views)
            .collect();
        assert_eq!(views, vec![10, 20]);

        let everything = Filter::new().order_by(Order::descending(Field::Date));
        let dates: Vec<NaiveDate> = query(&everything, &db)
            .await
            .unwrap()
            .into_iter()
            .map(|statistic| statistic.date)
            .collect();
        assert_eq!(dates, vec![date(28), date(27), date(26), date(25)]);
    }

    #[tokio::test]
    async fn delete_by_date_and_delete_all() {
        let db = database().await;
        for day in 25..=27 {
            create(&Statistic::new(date(day), 1, 1, 1.0), &db).await.unwrap();
        }

        let deleted = delete_by_date(date(25), &db).await.unwrap();
        assert_eq!(deleted.date, date(25));
        assert!(matches!(
            delete_by_date(date(25), &db).await,
            Err(StoreError::NotFound { .. })
        ));

        assert_eq!(delete_all(&db).await.unwrap(), 2);
        assert!(query(&Filter::new(), &db).await.unwrap().is_empty());
    }
}
