use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// A column of the statistics table that can be filtered and ordered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    Views,
    Clicks,
    Cost,
    CostPerClick,
    CostPerThousandViews,
}

/// How a field's values are parsed from untyped input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Date,
    Integer,
    Decimal,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Date,
        Field::Views,
        Field::Clicks,
        Field::Cost,
        Field::CostPerClick,
        Field::CostPerThousandViews,
    ];

    /// The column name, which is also the name callers use to refer to it.
    pub fn name(self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::Views => "views",
            Field::Clicks => "clicks",
            Field::Cost => "cost",
            Field::CostPerClick => "cost_per_click",
            Field::CostPerThousandViews => "cost_per_thousand_views",
        }
    }

    pub fn lookup(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|field| field.name() == name)
    }

    fn kind(self) -> Kind {
        match self {
            Field::Date => Kind::Date,
            Field::Views | Field::Clicks => Kind::Integer,
            Field::Cost | Field::CostPerClick | Field::CostPerThousandViews => Kind::Decimal,
        }
    }

    /// Convert an untyped value into one comparable against this field.
    ///
    /// Both JSON values and query-string text are accepted, so `"10"` and `10` are the same filter on `views`.
    pub fn parse_value(self, value: &Value) -> Option<FieldValue> {
        match (self.kind(), value) {
            (Kind::Date, Value::String(text)) => text.parse().ok().map(FieldValue::Date),
            (Kind::Integer, Value::Number(number)) => number.as_i64().map(FieldValue::Integer),
            (Kind::Integer, Value::String(text)) => text.trim().parse().ok().map(FieldValue::Integer),
            (Kind::Decimal, Value::Number(number)) => number.as_f64().map(FieldValue::Decimal),
            (Kind::Decimal, Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .map(FieldValue::Decimal),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed value bound to a query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Date(NaiveDate),
    Integer(i64),
    Decimal(f64),
}

impl From<NaiveDate> for FieldValue {
    fn from(date: NaiveDate) -> Self {
        FieldValue::Date(date)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Date(date) => date.fmt(f),
            FieldValue::Integer(number) => number.fmt(f),
            FieldValue::Decimal(number) => number.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn every_field_is_found_by_its_name() {
        for field in Field::ALL {
            assert_eq!(Field::lookup(field.name()), Some(field));
        }
        assert_eq!(Field::lookup("bogus"), None);
        assert_eq!(Field::lookup("id"), None, "the id is not a filterable field");
    }

    #[test]
    fn parse_values_by_field_kind() {
        let date = NaiveDate::from_ymd_opt(2023, 3, 30).unwrap();
        assert_eq!(
            Field::Date.parse_value(&json!("2023-03-30")),
            Some(FieldValue::Date(date))
        );
        assert_eq!(
            Field::Views.parse_value(&json!("10")),
            Some(FieldValue::Integer(10))
        );
        assert_eq!(
            Field::Clicks.parse_value(&json!(10)),
            Some(FieldValue::Integer(10))
        );
        assert_eq!(
            Field::Cost.parse_value(&json!("12.5")),
            Some(FieldValue::Decimal(12.5))
        );
        assert_eq!(
            Field::CostPerClick.parse_value(&json!(3)),
            Some(FieldValue::Decimal(3.0))
        );
    }

    #[test]
    fn reject_values_of_the_wrong_kind() {
        assert_eq!(Field::Date.parse_value(&json!("yesterday")), None);
        assert_eq!(Field::Date.parse_value(&json!(20230330)), None);
        assert_eq!(Field::Views.parse_value(&json!("1.5")), None);
        assert_eq!(Field::Cost.parse_value(&json!("NaN")), None);
        assert_eq!(Field::Cost.parse_value(&json!(null)), None);
    }
}
