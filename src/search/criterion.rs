use std::cmp::Ordering;

use async_graphql::Enum;
use jiff::{civil, tz::TimeZone, Timestamp};
use serde::{Deserialize, Serialize};

use super::field::{FieldValue, TrialField};
use crate::database::Trial;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Operator {
    Contains,
    Is,
    IsNot,
    StartsWith,
    EndsWith,
    Equals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

/// How a criterion combines with the one after it.
#[derive(Enum, Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum Logic {
    #[default]
    And,
    Or,
}

/// One advanced-search predicate: `field <operator> value`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub(crate) struct SearchCriterion {
    pub(crate) field: TrialField,
    pub(crate) operator: Operator,
    pub(crate) value: String,
    #[serde(default)]
    pub(crate) logic: Logic,
}

impl SearchCriterion {
    /// A field with no value satisfies `is_not` and nothing else. For fields
    /// with several values, `is_not` requires every value to differ and the
    /// other operators require at least one value to match.
    pub(crate) fn matches(&self, trial: &Trial) -> bool {
        let values = self.field.values(trial);
        if values.is_empty() {
            return self.operator == Operator::IsNot;
        }
        if self.operator == Operator::IsNot {
            return !values.iter().any(|v| self.test(Operator::Is, v));
        }
        values.iter().any(|v| self.test(self.operator, v))
    }

    fn test(&self, operator: Operator, value: &FieldValue<'_>) -> bool {
        let text = value.as_text().to_lowercase();
        let wanted = self.value.to_lowercase();
        match operator {
            Operator::Contains => text.contains(&wanted),
            Operator::Is => text == wanted,
            Operator::IsNot => text != wanted,
            Operator::StartsWith => text.starts_with(&wanted),
            Operator::EndsWith => text.ends_with(&wanted),
            Operator::Equals => {
                compare(value, &self.value).map_or(text == wanted, Ordering::is_eq)
            }
            Operator::GreaterThan => compare(value, &self.value).is_some_and(Ordering::is_gt),
            Operator::GreaterThanOrEqual => {
                compare(value, &self.value).is_some_and(Ordering::is_ge)
            }
            Operator::LessThan => compare(value, &self.value).is_some_and(Ordering::is_lt),
            Operator::LessThanOrEqual => {
                compare(value, &self.value).is_some_and(Ordering::is_le)
            }
        }
    }
}

/// Evaluates `criteria` as a left fold: each criterion's `logic` joins the
/// running result with the next criterion. The last `logic` is unused and an
/// empty list matches everything.
pub(crate) fn matches_criteria(criteria: &[SearchCriterion], trial: &Trial) -> bool {
    let mut iter = criteria.iter();
    let Some(first) = iter.next() else {
        return true;
    };
    let mut acc = first.matches(trial);
    let mut logic = first.logic;
    for criterion in iter {
        acc = match logic {
            Logic::And => acc && criterion.matches(trial),
            Logic::Or => acc || criterion.matches(trial),
        };
        logic = criterion.logic;
    }
    acc
}

/// Orders a field value against a user-entered operand, numerically when both
/// are numbers and chronologically when both are dates.
fn compare(value: &FieldValue<'_>, operand: &str) -> Option<Ordering> {
    let lhs = match value {
        FieldValue::Number(n) => Some(*n),
        FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
    };
    if let (Some(lhs), Ok(rhs)) = (lhs, operand.trim().parse::<f64>()) {
        return lhs.partial_cmp(&rhs);
    }
    let FieldValue::Text(text) = value else {
        return None;
    };
    Some(parse_date(text)?.cmp(&parse_date(operand)?))
}

fn parse_date(s: &str) -> Option<civil::DateTime> {
    let s = s.trim();
    if let Ok(ts) = s.parse::<Timestamp>() {
        return Some(ts.to_zoned(TimeZone::UTC).datetime());
    }
    if let Ok(dt) = s.parse::<civil::DateTime>() {
        return Some(dt);
    }
    s.parse::<civil::Date>()
        .ok()
        .map(|d| d.to_datetime(civil::Time::midnight()))
}
