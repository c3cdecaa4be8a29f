//! Dynamic filters over the statistics table.
//!
//! A [Filter] is built from untyped `field[__op] = value` parameters and an optional ordering such as
//! `-date`. Every field name is resolved through [Field::lookup] before anything is built, so a filter either refers
//! only to real columns or fails as a whole.
//!
//! ```rust,ignore
//! let filter = Filter::from_params([("views__gte", json!(100)), ("date__lt", json!("2023-03-30"))], Some("-cost"))?;
//! let statistics = store::query(&filter, &db).await?;
//! ```

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use snafu::{OptionExt, Snafu};

use crate::model::{Field, FieldValue};

#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum QueryError {
    /// The statistics table has no such field
    #[snafu(display("statistic has no field named `{field}`"))]
    UnknownField { field: String },

    /// The value cannot be compared against the field
    #[snafu(display("`{value}` is not a valid value for `{field}`"))]
    InvalidValue { field: Field, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Comparison {
    const SUFFIXES: [(&'static str, Comparison); 4] = [
        ("__gte", Comparison::GreaterOrEqual),
        ("__gt", Comparison::Greater),
        ("__lte", Comparison::LessOrEqual),
        ("__lt", Comparison::Less),
    ];

    /// Split a `field__op` reference into the bare field name and its comparison.
    fn split(reference: &str) -> (&str, Comparison) {
        Self::SUFFIXES
            .iter()
            .find_map(|(suffix, comparison)| {
                reference
                    .strip_suffix(suffix)
                    .map(|field| (field, *comparison))
            })
            .unwrap_or((reference, Comparison::Equal))
    }

    fn operator(self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
        }
    }
}

/// A single comparison of a field against a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: Field,
    pub comparison: Comparison,
    pub value: FieldValue,
}

impl Predicate {
    pub fn new(field: Field, comparison: Comparison, value: impl Into<FieldValue>) -> Self {
        Predicate {
            field,
            comparison,
            value: value.into(),
        }
    }

    pub fn equal(field: Field, value: impl Into<FieldValue>) -> Self {
        Self::new(field, Comparison::Equal, value)
    }

    /// Parse a `field[__op]` reference and its untyped value.
    pub fn parse(reference: &str, value: &Value) -> Result<Self, QueryError> {
        let (name, comparison) = Comparison::split(reference);
        let field = Field::lookup(name).context(UnknownFieldSnafu { field: name })?;
        let value = field.parse_value(value).context(InvalidValueSnafu {
            field,
            value: display_untyped(value),
        })?;

        Ok(Predicate {
            field,
            comparison,
            value,
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.comparison.operator(), self.value)
    }
}

fn display_untyped(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn to_order(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Which field the results are sorted by, written as `field` or `-field` for descending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub field: Field,
    pub sort: SortOrder,
}

impl Order {
    pub fn ascending(field: Field) -> Self {
        Order {
            field,
            sort: SortOrder::Ascending,
        }
    }

    pub fn descending(field: Field) -> Self {
        Order {
            field,
            sort: SortOrder::Descending,
        }
    }
}

impl FromStr for Order {
    type Err = QueryError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (name, sort) = match input.strip_prefix('-') {
            Some(name) => (name, SortOrder::Descending),
            None => (input, SortOrder::Ascending),
        };
        let field = Field::lookup(name).context(UnknownFieldSnafu { field: name })?;

        Ok(Order { field, sort })
    }
}

/// A conjunction of predicates plus an optional ordering. The empty filter matches every record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    predicates: Vec<Predicate>,
    order: Option<Order>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from untyped parameters. Nothing is returned unless every reference names a known field.
    pub fn from_params<K: AsRef<str>>(
        params: impl IntoIterator<Item = (K, Value)>, order_by: Option<&str>,
    ) -> Result<Self, QueryError> {
        let predicates = params
            .into_iter()
            .map(|(reference, value)| Predicate::parse(reference.as_ref(), &value))
            .collect::<Result<Vec<_>, _>>()?;
        let order = order_by.map(str::parse::<Order>).transpose()?;

        Ok(Filter { predicates, order })
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn order(&self) -> Option<Order> {
        self.order
    }

    /// Render the filter as a `SELECT` over `table`. Values never appear in the text, only as bound parameters.
    pub fn to_select(&self, table: &str) -> Statement {
        let mut text = format!("SELECT * FROM {table}");
        let mut bindings = Vec::with_capacity(self.predicates.len());

        for (index, predicate) in self.predicates.iter().enumerate() {
            let parameter = format!("p{index}");
            let keyword = if index == 0 { "WHERE" } else { "AND" };
            text.push_str(&format!(
                " {keyword} {} {} ${parameter}",
                predicate.field.name(),
                predicate.comparison.operator()
            ));
            bindings.push((parameter, predicate.value));
        }

        if let Some(order) = self.order {
            text.push_str(&format!(
                " ORDER BY {} {}",
                order.field.name(),
                order.sort.to_order()
            ));
        }

        Statement { text, bindings }
    }
}

/// A query with its parameters, ready to be sent to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub bindings: Vec<(String, FieldValue)>,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, day).unwrap()
    }

    #[test]
    fn bare_field_is_an_equality() {
        let predicate = Predicate::parse("views", &json!(10)).unwrap();
        assert_eq!(predicate, Predicate::equal(Field::Views, FieldValue::Integer(10)));
    }

    #[test]
    fn suffixes_select_the_comparison() {
        let cases = [
            ("date__gt", Comparison::Greater),
            ("date__gte", Comparison::GreaterOrEqual),
            ("date__lt", Comparison::Less),
            ("date__lte", Comparison::LessOrEqual),
        ];

        for (reference, comparison) in cases {
            let predicate = Predicate::parse(reference, &json!("2023-03-25")).unwrap();
            assert_eq!(predicate, Predicate::new(Field::Date, comparison, date(25)), "{reference}");
        }
    }

    #[test]
    fn unknown_field_fails_the_whole_filter() {
        let result = Filter::from_params(
            [("views__gte", json!(1)), ("bogus__lt", json!(3))],
            None,
        );
        assert_eq!(
            result,
            Err(QueryError::UnknownField {
                field: "bogus".to_string()
            })
        );
    }

    #[test]
    fn unknown_suffix_is_part_of_the_field_name() {
        let result = Predicate::parse("views__ne", &json!(1));
        assert_eq!(
            result,
            Err(QueryError::UnknownField {
                field: "views__ne".to_string()
            })
        );
    }

    #[test]
    fn invalid_value_names_field_and_value() {
        let result = Predicate::parse("clicks__lt", &json!("many"));
        assert_eq!(
            result,
            Err(QueryError::InvalidValue {
                field: Field::Clicks,
                value: "many".to_string()
            })
        );
    }

    #[test]
    fn parse_order_direction() {
        assert_eq!("-date".parse::<Order>(), Ok(Order::descending(Field::Date)));
        assert_eq!("views".parse::<Order>(), Ok(Order::ascending(Field::Views)));
        assert_eq!(
            "-bogus".parse::<Order>(),
            Err(QueryError::UnknownField {
                field: "bogus".to_string()
            })
        );
    }

    #[test]
    fn empty_filter_selects_everything() {
        let filter = Filter::from_params(Vec::<(String, Value)>::new(), None).unwrap();
        let statement = filter.to_select("statistics");

        assert_eq!(statement.text, "SELECT * FROM statistics");
        assert!(statement.bindings.is_empty());
    }

    #[test]
    fn render_predicates_as_bound_parameters() {
        let filter = Filter::new()
            .and(Predicate::new(Field::Date, Comparison::GreaterOrEqual, date(25)))
            .and(Predicate::new(Field::Date, Comparison::LessOrEqual, date(30)))
            .order_by(Order::descending(Field::Cost));
        let statement = filter.to_select("statistics");

        assert_eq!(
            statement.text,
            "SELECT * FROM statistics WHERE date >= $p0 AND date <= $p1 ORDER BY cost DESC"
        );
        assert_eq!(
            statement.bindings,
            vec![
                ("p0".to_string(), FieldValue::Date(date(25))),
                ("p1".to_string(), FieldValue::Date(date(30))),
            ]
        );
    }
}
