use chrono::NaiveDate;
use derive_new::new;
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt};

use super::Field;
use crate::database::Record;
use crate::define_table;
use crate::validation::{OverflowSnafu, ValidationError};

/// One day of advertising activity.
///
/// The derived metrics are never set directly. [Statistic::new], [Statistic::accumulate] and the store's increment
/// all recompute them from the totals.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct Statistic {
    #[new(default)]
    pub id: Record<Statistic>,
    pub date: NaiveDate,
    pub views: i64,
    pub clicks: i64,
    pub cost: f64,
    #[new(value = "cost_per_click(cost, clicks)")]
    pub cost_per_click: Option<f64>,
    #[new(value = "cost_per_thousand_views(cost, views)")]
    pub cost_per_thousand_views: Option<f64>,
}

define_table!("statistics": Statistic = id);

impl Statistic {
    /// Add the incoming amounts onto the running totals. Absent and zero amounts leave the total alone.
    ///
    /// Fails without touching the statistic when any total would overflow.
    pub fn accumulate(
        &mut self, views: Option<i64>, clicks: Option<i64>, cost: Option<f64>,
    ) -> Result<(), ValidationError> {
        let views = add_count(Field::Views, self.views, views)?;
        let clicks = add_count(Field::Clicks, self.clicks, clicks)?;
        let cost = add_amount(Field::Cost, self.cost, cost)?;

        self.views = views;
        self.clicks = clicks;
        self.cost = cost;
        self.cost_per_click = cost_per_click(cost, clicks);
        self.cost_per_thousand_views = cost_per_thousand_views(cost, views);
        Ok(())
    }
}

fn add_count(field: Field, total: i64, amount: Option<i64>) -> Result<i64, ValidationError> {
    match amount {
        Some(amount) => total.checked_add(amount).context(OverflowSnafu {
            field,
            value: amount.to_string(),
        }),
        None => Ok(total),
    }
}

fn add_amount(field: Field, total: f64, amount: Option<f64>) -> Result<f64, ValidationError> {
    match amount {
        Some(amount) => {
            let sum = total + amount;
            ensure!(
                sum.is_finite(),
                OverflowSnafu {
                    field,
                    value: amount.to_string()
                }
            );
            Ok(sum)
        }
        None => Ok(total),
    }
}

/// `None` unless both the cost and the clicks are non-zero.
pub fn cost_per_click(cost: f64, clicks: i64) -> Option<f64> {
    (cost != 0.0 && clicks != 0).then(|| cost / clicks as f64)
}

/// `None` unless both the cost and the views are non-zero.
pub fn cost_per_thousand_views(cost: f64, views: i64) -> Option<f64> {
    (cost != 0.0 && views != 0).then(|| cost / views as f64 * 1000.0)
}

/// An incoming day of activity, before it is merged into the stored totals.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct Submission {
    pub date: NaiveDate,
    #[serde(default)]
    pub views: Option<i64>,
    #[serde(default)]
    pub clicks: Option<i64>,
    #[serde(default)]
    pub cost: Option<f64>,
}

impl Submission {
    /// A fresh statistic for this submission's date, missing amounts count as zero.
    pub fn to_statistic(&self) -> Statistic {
        Statistic::new(
            self.date,
            self.views.unwrap_or_default(),
            self.clicks.unwrap_or_default(),
            self.cost.unwrap_or_default(),
        )
    }
}

/// How a statistic is rendered to API callers.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StatisticOutput {
    pub date: NaiveDate,
    pub views: i64,
    pub clicks: i64,
    pub cost: f64,
    pub cost_per_click: Option<f64>,
    pub cost_per_thousand_views: Option<f64>,
}

impl From<Statistic> for StatisticOutput {
    fn from(statistic: Statistic) -> Self {
        StatisticOutput {
            date: statistic.date,
            views: statistic.views,
            clicks: statistic.clicks,
            cost: statistic.cost,
            cost_per_click: statistic.cost_per_click,
            cost_per_thousand_views: statistic.cost_per_thousand_views,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, 30).unwrap()
    }

    #[test]
    fn derive_metrics_on_creation() {
        let statistic = Statistic::new(date(), 1000, 100, 1000.0);
        assert_eq!(statistic.cost_per_click, Some(10.0));
        assert_eq!(statistic.cost_per_thousand_views, Some(1000.0));
    }

    #[test]
    fn metrics_are_undefined_without_a_divisor() {
        let statistic = Statistic::new(date(), 0, 0, 50.0);
        assert_eq!(statistic.cost_per_click, None);
        assert_eq!(statistic.cost_per_thousand_views, None);

        let free = Statistic::new(date(), 10, 10, 0.0);
        assert_eq!(free.cost_per_click, None, "zero cost is not a zero metric");
        assert_eq!(free.cost_per_thousand_views, None);
    }

    #[test]
    fn accumulate_adds_onto_totals() {
        let mut statistic = Statistic::new(date(), 1000, 100, 1000.0);
        statistic.accumulate(Some(500), Some(50), Some(500.0)).unwrap();

        assert_eq!(statistic.views, 1500);
        assert_eq!(statistic.clicks, 150);
        assert_eq!(statistic.cost, 1500.0);
        assert_eq!(statistic.cost_per_click, Some(10.0));
        assert_eq!(statistic.cost_per_thousand_views, Some(1000.0));
        assert_eq!(statistic.date, date());
    }

    #[test]
    fn accumulate_skips_absent_amounts() {
        let mut statistic = Statistic::new(date(), 0, 0, 0.0);
        statistic.accumulate(None, Some(4), Some(2.0)).unwrap();

        assert_eq!(statistic.views, 0);
        assert_eq!(statistic.clicks, 4);
        assert_eq!(statistic.cost_per_click, Some(0.5));
        assert_eq!(statistic.cost_per_thousand_views, None);
    }

    #[test]
    fn reject_totals_that_overflow() {
        let mut statistic = Statistic::new(date(), i64::MAX, 0, 0.0);
        let before = statistic.clone();

        assert_eq!(
            statistic.accumulate(Some(1), Some(1), None),
            Err(ValidationError::Overflow {
                field: Field::Views,
                value: "1".to_string()
            })
        );
        assert_eq!(statistic, before, "a failed accumulate leaves the totals alone");

        let mut expensive = Statistic::new(date(), 0, 0, f64::MAX);
        assert_eq!(
            expensive.accumulate(None, None, Some(f64::MAX)),
            Err(ValidationError::Overflow {
                field: Field::Cost,
                value: f64::MAX.to_string()
            })
        );
        assert_eq!(expensive.cost, f64::MAX);
    }

    #[test]
    fn missing_amounts_default_to_zero() {
        let submission = Submission::new(date(), Some(10), None, None);
        let statistic = submission.to_statistic();

        assert_eq!(statistic.views, 10);
        assert_eq!(statistic.clicks, 0);
        assert_eq!(statistic.cost, 0.0);
    }

    #[test]
    fn render_undefined_metrics_as_null() {
        let output = StatisticOutput::from(Statistic::new(date(), 10, 0, 0.0));
        let json = serde_json::to_value(&output).unwrap();

        assert_eq!(json["date"], "2023-03-30");
        assert!(json["cost_per_click"].is_null());
        assert!(json["cost_per_thousand_views"].is_null());
        assert!(json.get("id").is_none());
    }
}
