//! # Metric Calculator
//!
//! Derived display values computed from an entity and its related records:
//! achievement percentage against targets, remaining budget, related counts
//! and sums.
//!
//! Metrics are recomputed on every read and never persisted. Values keep full
//! precision; rounding happens in [`crate::display`].

#![allow(clippy::float_arithmetic)]

use crate::context::RequestContext;
use crate::error::Result;
use crate::filter::Predicate;
use crate::period::{Period, Window, WindowSpec};
use crate::store::{EntityStore, Query};
use crate::{Entity, EntityId, FieldValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

// =============================================================================
// PURE CALCULATIONS
// =============================================================================

/// One related record reduced to what the achievement metric reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodValue {
    pub actual: f64,
    pub target: f64,
    pub period: Period,
}

impl PeriodValue {
    #[must_use]
    pub fn new(actual: f64, target: f64, period: Period) -> Self {
        Self {
            actual,
            target,
            period,
        }
    }

    /// `actual / target × 100`; a zero target scores 0.
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.target == 0.0 {
            0.0
        } else {
            self.actual * 100.0 / self.target
        }
    }

    /// Negative or non-finite inputs are not scorable.
    fn is_scorable(&self) -> bool {
        self.actual.is_finite()
            && self.target.is_finite()
            && self.actual >= 0.0
            && self.target >= 0.0
    }
}

/// Mean achievement percentage over the items whose period falls in `window`.
///
/// Returns 0 when no item falls in the window.
#[must_use]
pub fn achievement(items: &[PeriodValue], window: &Window) -> f64 {
    let (count, total) = items
        .iter()
        .filter(|item| item.is_scorable() && item.period.within(window))
        .fold((0usize, 0.0), |(count, total), item| {
            (count.saturating_add(1), total + item.percent())
        });
    if count == 0 { 0.0 } else { total / count as f64 }
}

/// `total − Σ amounts`. Reported as-is; enforcement belongs to the caller.
#[must_use]
pub fn remaining(total: f64, amounts: impl IntoIterator<Item = f64>) -> f64 {
    total - amounts.into_iter().sum::<f64>()
}

/// A budget and what has been drawn from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemainingBudget {
    pub total: f64,
    pub spent: f64,
}

impl RemainingBudget {
    #[must_use]
    pub fn new(total: f64, spent: f64) -> Self {
        Self { total, spent }
    }

    #[must_use]
    pub fn remaining(&self) -> f64 {
        self.total - self.spent
    }

    /// Whether drawing `amount` keeps the remaining value at or above zero.
    #[must_use]
    pub fn admits(&self, amount: f64) -> bool {
        self.remaining() - amount >= 0.0
    }
}

// =============================================================================
// RELATED RECORD EXTRACTION
// =============================================================================

/// Where a related record keeps its period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum PeriodFields {
    /// Two date fields.
    Range { start: String, end: String },
    /// Numeric ISO year and week fields.
    Week { year: String, week: String },
    /// Numeric year field.
    Year { year: String },
}

impl PeriodFields {
    /// Read the period from a record, `None` when fields are missing or invalid.
    #[must_use]
    pub fn read(&self, entity: &Entity) -> Option<Period> {
        match self {
            Self::Range { start, end } => Some(Period::Range {
                start: entity.date(start)?,
                end: entity.date(end)?,
            }),
            Self::Week { year, week } => Some(Period::Week {
                year: whole(entity.number(year)?)? as i32,
                week: whole(entity.number(week)?)? as u32,
            }),
            Self::Year { year } => Some(Period::Year(whole(entity.number(year)?)? as i32)),
        }
    }
}

fn whole(n: f64) -> Option<f64> {
    (n.is_finite() && n.fract() == 0.0 && n >= 0.0 && n <= f64::from(i32::MAX)).then_some(n)
}

/// Reduce child rows to period values for `parent`.
///
/// Rows pointing at another parent, without a parent reference, or with
/// unreadable numbers or periods are skipped.
#[must_use]
pub fn period_values(
    parent: EntityId,
    rows: &[Entity],
    parent_field: &str,
    actual_field: &str,
    target_field: &str,
    period: &PeriodFields,
) -> Vec<PeriodValue> {
    rows.iter()
        .filter(|row| row.reference(parent_field) == Some(parent))
        .filter_map(|row| {
            Some(PeriodValue::new(
                row.number(actual_field)?,
                row.number(target_field)?,
                period.read(row)?,
            ))
        })
        .collect()
}

// =============================================================================
// METRIC SPECS
// =============================================================================

/// Configuration of one named derived metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum MetricSpec {
    /// Mean of `actual / target × 100` over children in the window.
    Achievement {
        child_kind: String,
        parent_field: String,
        actual_field: String,
        target_field: String,
        period: PeriodFields,
        #[serde(default)]
        window: WindowSpec,
    },
    /// Parent total minus the sum of child amounts.
    Remaining {
        total_field: String,
        child_kind: String,
        parent_field: String,
        amount_field: String,
    },
    /// Number of children, optionally only those where `field == value`.
    RelatedCount {
        child_kind: String,
        parent_field: String,
        #[serde(default)]
        only: Option<Condition>,
    },
    /// Sum of a numeric child field.
    RelatedSum {
        child_kind: String,
        parent_field: String,
        field: String,
    },
}

/// Equality restriction on child rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub value: ConditionValue,
}

/// Comparable value in a [`Condition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Bool(bool),
    Text(String),
}

impl From<&ConditionValue> for FieldValue {
    fn from(value: &ConditionValue) -> Self {
        match value {
            ConditionValue::Bool(b) => Self::Bool(*b),
            ConditionValue::Text(s) => Self::Text(s.clone()),
        }
    }
}

fn children_of(parent: EntityId, parent_field: &str) -> Predicate {
    Predicate::eq(parent_field, FieldValue::Ref(parent))
}

/// Evaluate `spec` for `entity`, reading related rows from `store`.
pub fn evaluate<S: EntityStore + ?Sized>(
    store: &S,
    entity: &Entity,
    spec: &MetricSpec,
    ctx: &RequestContext,
) -> Result<f64> {
    let value = match spec {
        MetricSpec::Achievement {
            child_kind,
            parent_field,
            actual_field,
            target_field,
            period,
            window,
        } => {
            let Some(window) = window.resolve(ctx.today()) else {
                return Ok(0.0);
            };
            let rows = store
                .query(&Query::all(child_kind.as_str(), children_of(entity.id, parent_field)))?
                .items;
            let items = period_values(
                entity.id,
                &rows,
                parent_field,
                actual_field,
                target_field,
                period,
            );
            achievement(&items, &window)
        }
        MetricSpec::Remaining {
            total_field,
            child_kind,
            parent_field,
            amount_field,
        } => {
            let total = entity.number(total_field).unwrap_or(0.0);
            let spent = store
                .aggregate(
                    child_kind,
                    &children_of(entity.id, parent_field),
                    Some(amount_field),
                )?
                .sum;
            RemainingBudget::new(total, spent).remaining()
        }
        MetricSpec::RelatedCount {
            child_kind,
            parent_field,
            only,
        } => {
            let mut predicate = children_of(entity.id, parent_field);
            if let Some(condition) = only {
                predicate = Predicate::all(vec![
                    predicate,
                    Predicate::eq(&condition.field, (&condition.value).into()),
                ]);
            }
            store.aggregate(child_kind, &predicate, None)?.count as f64
        }
        MetricSpec::RelatedSum {
            child_kind,
            parent_field,
            field,
        } => {
            store
                .aggregate(child_kind, &children_of(entity.id, parent_field), Some(field))?
                .sum
        }
    };
    debug!(entity = %entity.id, value, "evaluated metric");
    Ok(value)
}

// =============================================================================
// TESTS
// =============================================================================
