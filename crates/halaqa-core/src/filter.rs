//! # Filter Predicate Builder
//!
//! Translates the flat filter mapping sent by the admin UI into a conjunction
//! of predicates against the entity store.
//!
//! Rules:
//! - Distinct filter keys are AND-combined; search fields are OR-combined.
//! - Absent keys, empty strings and `false` toggles apply no restriction.
//! - Keys without a definition in the resource's schema are ignored.
//! - Malformed input (bad dates, inverted ranges, unparseable ids) yields
//!   [`Predicate::Never`]: the listing is empty, never an error.
//! - Relative toggles are resolved against the request context every time.

use crate::context::RequestContext;
use crate::period::Window;
use crate::{Entity, EntityId, FieldValue};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Date format accepted in filter values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// FILTER INPUT
// =============================================================================

/// A primitive filter value as delivered by the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(value: NaiveDate) -> Self {
        Self::Text(value.format(DATE_FORMAT).to_string())
    }
}

/// Flat mapping from filter name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec(pub BTreeMap<String, FilterValue>);

impl FilterSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FilterValue) {
        self.0.insert(key.into(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// FILTER SCHEMA
// =============================================================================

/// Date window relative to the request date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeWindow {
    Today,
    ThisWeek,
    ThisMonth,
    /// On or after today.
    Future,
    /// Strictly before today.
    Past,
}

impl RelativeWindow {
    /// Bounds for this window, computed from `today`.
    #[must_use]
    pub fn bounds(&self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match self {
            Self::Today => (Some(today), Some(today)),
            Self::ThisWeek => {
                let week = Window::iso_week_of(today);
                (Some(week.start), Some(week.end))
            }
            Self::ThisMonth => {
                let month = Window::month_of(today);
                (Some(month.start), Some(month.end))
            }
            Self::Future => (Some(today), None),
            Self::Past => (None, Some(today.pred_opt().unwrap_or(NaiveDate::MIN))),
        }
    }
}

/// One named filter a resource accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FilterDef {
    /// Inclusive date range over `field`, read from two keys.
    DateRange {
        field: String,
        from_key: String,
        to_key: String,
    },
    /// Boolean toggle restricting `field` to a relative window.
    Toggle {
        key: String,
        field: String,
        window: RelativeWindow,
    },
    /// Equality on a foreign-key field.
    ForeignKey { key: String, field: String },
    /// Equality on a boolean field.
    Flag { key: String, field: String },
    /// Equality on a text field (status, category).
    Choice { key: String, field: String },
    /// Case-insensitive substring search over several fields.
    Search { key: String, fields: Vec<String> },
}

impl FilterDef {
    /// Predicate for this definition, or `None` when the input leaves it open.
    fn predicate(&self, spec: &FilterSpec, today: NaiveDate) -> Option<Predicate> {
        match self {
            Self::DateRange {
                field,
                from_key,
                to_key,
            } => {
                let from = coerce_date(from_key, spec.get(from_key));
                let to = coerce_date(to_key, spec.get(to_key));
                let (from, to) = match (from, to) {
                    (Coerced::Malformed, _) | (_, Coerced::Malformed) => {
                        return Some(Predicate::Never);
                    }
                    (from, to) => (from.into_option(), to.into_option()),
                };
                if from.is_none() && to.is_none() {
                    return None;
                }
                if matches!((from, to), (Some(f), Some(t)) if f > t) {
                    warn!(field = %field, %from_key, %to_key, "inverted date range, no rows match");
                    return Some(Predicate::Never);
                }
                Some(Predicate::date_range(field, from, to))
            }
            Self::Toggle { key, field, window } => match coerce_bool(key, spec.get(key)) {
                Coerced::Value(true) => {
                    let (from, to) = window.bounds(today);
                    Some(Predicate::date_range(field, from, to))
                }
                Coerced::Value(false) | Coerced::Absent => None,
                Coerced::Malformed => Some(Predicate::Never),
            },
            Self::ForeignKey { key, field } => match coerce_id(key, spec.get(key)) {
                Coerced::Value(id) => Some(Predicate::eq(field, FieldValue::Ref(id))),
                Coerced::Absent => None,
                Coerced::Malformed => Some(Predicate::Never),
            },
            Self::Flag { key, field } => match coerce_bool(key, spec.get(key)) {
                Coerced::Value(flag) => Some(Predicate::eq(field, FieldValue::Bool(flag))),
                Coerced::Absent => None,
                Coerced::Malformed => Some(Predicate::Never),
            },
            Self::Choice { key, field } => {
                let text = coerce_text(spec.get(key))?;
                Some(Predicate::eq(field, FieldValue::Text(text)))
            }
            Self::Search { key, fields } => {
                let term = coerce_text(spec.get(key))?;
                if fields.is_empty() {
                    return None;
                }
                Some(Predicate::any(
                    fields.iter().map(|f| Predicate::contains(f, &term)).collect(),
                ))
            }
        }
    }
}

/// Build the conjunction for `spec` under `schema`.
#[must_use]
pub fn build(schema: &[FilterDef], spec: &FilterSpec, ctx: &RequestContext) -> Predicate {
    let today = ctx.today();
    let predicate = Predicate::all(
        schema
            .iter()
            .filter_map(|def| def.predicate(spec, today))
            .collect(),
    );
    debug!(?predicate, filters = spec.0.len(), "built filter predicate");
    predicate
}

// =============================================================================
// INPUT COERCION
// =============================================================================

enum Coerced<T> {
    Absent,
    Value(T),
    Malformed,
}

impl<T> Coerced<T> {
    fn into_option(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Absent | Self::Malformed => None,
        }
    }
}

fn coerce_date(key: &str, value: Option<&FilterValue>) -> Coerced<NaiveDate> {
    match value {
        None => Coerced::Absent,
        Some(FilterValue::Text(s)) if s.trim().is_empty() => Coerced::Absent,
        Some(FilterValue::Text(s)) => match NaiveDate::parse_from_str(s.trim(), DATE_FORMAT) {
            Ok(date) => Coerced::Value(date),
            Err(_) => {
                warn!(%key, value = %s, "malformed date filter");
                Coerced::Malformed
            }
        },
        Some(other) => {
            warn!(%key, value = ?other, "date filter is not a date string");
            Coerced::Malformed
        }
    }
}

fn coerce_bool(key: &str, value: Option<&FilterValue>) -> Coerced<bool> {
    match value {
        None => Coerced::Absent,
        Some(FilterValue::Bool(b)) => Coerced::Value(*b),
        Some(FilterValue::Number(n)) => Coerced::Value(*n != 0.0),
        Some(FilterValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Coerced::Absent,
            "true" | "1" | "yes" | "on" => Coerced::Value(true),
            "false" | "0" | "no" | "off" => Coerced::Value(false),
            _ => {
                warn!(%key, value = %s, "malformed boolean filter");
                Coerced::Malformed
            }
        },
    }
}

fn coerce_id(key: &str, value: Option<&FilterValue>) -> Coerced<EntityId> {
    match value {
        None => Coerced::Absent,
        Some(FilterValue::Text(s)) if s.trim().is_empty() => Coerced::Absent,
        Some(FilterValue::Text(s)) => match s.trim().parse::<u64>() {
            Ok(id) => Coerced::Value(EntityId(id)),
            Err(_) => {
                warn!(%key, value = %s, "malformed id filter");
                Coerced::Malformed
            }
        },
        Some(FilterValue::Number(n)) if n.fract() == 0.0 && *n >= 0.0 => {
            Coerced::Value(EntityId(*n as u64))
        }
        Some(other) => {
            warn!(%key, value = ?other, "id filter is not an id");
            Coerced::Malformed
        }
    }
}

fn coerce_text(value: Option<&FilterValue>) -> Option<String> {
    let text = match value? {
        FilterValue::Text(s) => s.trim().to_string(),
        FilterValue::Bool(b) => b.to_string(),
        FilterValue::Number(n) => n.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

// =============================================================================
// PREDICATE
// =============================================================================

/// A predicate tree evaluated against entities.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Always,
    Never,
    Eq {
        field: String,
        value: FieldValue,
    },
    /// Inclusive on both bounds; a missing bound is open.
    DateRange {
        field: String,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    /// `needle` is stored lowercased.
    Contains {
        field: String,
        needle: String,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    #[must_use]
    pub fn eq(field: &str, value: FieldValue) -> Self {
        Self::Eq {
            field: field.to_string(),
            value,
        }
    }

    #[must_use]
    pub fn date_range(field: &str, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self::DateRange {
            field: field.to_string(),
            from,
            to,
        }
    }

    #[must_use]
    pub fn contains(field: &str, needle: &str) -> Self {
        Self::Contains {
            field: field.to_string(),
            needle: needle.to_lowercase(),
        }
    }

    /// Conjunction. `Never` absorbs, `Always` vanishes, nested `And`s flatten.
    #[must_use]
    pub fn all(parts: Vec<Self>) -> Self {
        let mut kept = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Self::Always => {}
                Self::Never => return Self::Never,
                Self::And(inner) => kept.extend(inner),
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Self::Always,
            1 => kept.pop().unwrap_or(Self::Always),
            _ => Self::And(kept),
        }
    }

    /// Disjunction. `Always` absorbs, `Never` vanishes.
    #[must_use]
    pub fn any(parts: Vec<Self>) -> Self {
        let mut kept = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Self::Never => {}
                Self::Always => return Self::Always,
                Self::Or(inner) => kept.extend(inner),
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Self::Never,
            1 => kept.pop().unwrap_or(Self::Never),
            _ => Self::Or(kept),
        }
    }

    /// True when the predicate can never match, so stores may skip the scan.
    #[must_use]
    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }

    /// Evaluate against one entity.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Eq { field, value } => entity.value(field).as_ref() == Some(value),
            Self::DateRange { field, from, to } => entity.date(field).is_some_and(|date| {
                from.is_none_or(|f| date >= f) && to.is_none_or(|t| date <= t)
            }),
            Self::Contains { field, needle } => entity
                .field(field)
                .and_then(FieldValue::as_text)
                .is_some_and(|text| text.to_lowercase().contains(needle.as_str())),
            Self::And(parts) => parts.iter().all(|p| p.matches(entity)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(entity)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
