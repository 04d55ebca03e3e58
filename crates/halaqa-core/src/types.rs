//! Core data model: entities and typed field values.

use crate::context::RequestContext;
use crate::primitives::{FIELD_CREATED_AT, FIELD_CREATED_BY, FIELD_ID, FIELD_UPDATED_AT};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// FIELD VALUES
// =============================================================================

/// A typed field value.
///
/// Serialized externally tagged in snake case, e.g. `{"date": "2026-01-31"}`
/// or `{"ref": 7}`, so the same shape works for JSON datasets and the binary
/// record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Bool(bool),
    Ref(EntityId),
    Null,
}

impl FieldValue {
    /// Calendar date of a date or timestamp value.
    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Timestamp(t) => Some(t.date_naive()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_ref_id(&self) -> Option<EntityId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Rank of the variant, used to order values of different types.
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Number(_) => 2,
            Self::Date(_) | Self::Timestamp(_) => 3,
            Self::Ref(_) => 4,
            Self::Text(_) => 5,
        }
    }

    /// Total order used for sorting list results.
    ///
    /// Null sorts first. Dates and timestamps compare on a shared timeline
    /// (a date is its midnight UTC). Numbers use IEEE total ordering.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Ref(a), Self::Ref(b)) => a.cmp(b),
            (Self::Date(_) | Self::Timestamp(_), Self::Date(_) | Self::Timestamp(_)) => {
                instant(self).cmp(&instant(other))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn instant(value: &FieldValue) -> Option<DateTime<Utc>> {
    match value {
        FieldValue::Timestamp(t) => Some(*t),
        FieldValue::Date(d) => d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
        _ => None,
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<EntityId> for FieldValue {
    fn from(value: EntityId) -> Self {
        Self::Ref(value)
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// A stored record with typed fields and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Resource type, e.g. `"kpi"` or `"kpi_value"`.
    pub kind: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Create an entity with both timestamps set to `at`.
    #[must_use]
    pub fn new(id: EntityId, kind: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id,
            kind: kind.into(),
            fields: BTreeMap::new(),
            created_at: at,
            updated_at: at,
        }
    }

    /// Create an unsaved record stamped from the request context.
    ///
    /// The id is a placeholder; stores assign the real one on insert.
    /// `created_by` is set when the context carries a user.
    #[must_use]
    pub fn draft(kind: impl Into<String>, ctx: &RequestContext) -> Self {
        let mut entity = Self::new(EntityId(0), kind, ctx.now);
        if let Some(user) = ctx.user {
            entity.set(FIELD_CREATED_BY, FieldValue::Ref(user));
        }
        entity
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Stored field by name. Pseudo-fields are not included.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Field by name, including the `id`, `created_at` and `updated_at`
    /// pseudo-fields.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<FieldValue> {
        match name {
            FIELD_ID => Some(FieldValue::Ref(self.id)),
            FIELD_CREATED_AT => Some(FieldValue::Timestamp(self.created_at)),
            FIELD_UPDATED_AT => Some(FieldValue::Timestamp(self.updated_at)),
            _ => self.fields.get(name).cloned(),
        }
    }

    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(FieldValue::as_number)
    }

    #[must_use]
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.value(name).and_then(|v| v.as_date())
    }

    #[must_use]
    pub fn reference(&self, name: &str) -> Option<EntityId> {
        self.fields.get(name).and_then(FieldValue::as_ref_id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0)
            .single()
            .unwrap_or_default()
    }

    #[test]
    fn pseudo_fields_are_readable() {
        let entity = Entity::new(EntityId(7), "task", at(1));
        assert_eq!(entity.value("id"), Some(FieldValue::Ref(EntityId(7))));
        assert_eq!(entity.date("created_at"), NaiveDate::from_ymd_opt(2026, 3, 1));
        assert!(entity.value("missing").is_none());
    }

    #[test]
    fn draft_stamps_context_user() {
        let ctx = RequestContext::at(at(2)).with_user(EntityId(42));
        let draft = Entity::draft("task", &ctx);
        assert_eq!(draft.reference("created_by"), Some(EntityId(42)));
        assert_eq!(draft.created_at, at(2));

        let anonymous = Entity::draft("task", &RequestContext::at(at(2)));
        assert!(anonymous.field("created_by").is_none());
    }

    #[test]
    fn sort_cmp_orders_dates_against_timestamps() {
        let date = FieldValue::Date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or_default());
        let later = FieldValue::Timestamp(at(1));
        assert_eq!(date.sort_cmp(&later), Ordering::Less);
    }

    #[test]
    fn sort_cmp_puts_null_first_and_ignores_text_case() {
        assert_eq!(FieldValue::Null.sort_cmp(&FieldValue::Number(1.0)), Ordering::Less);
        assert_eq!(
            FieldValue::from("alpha").sort_cmp(&FieldValue::from("Beta")),
            Ordering::Less
        );
    }
}
