//! # Entity Store
//!
//! The collaborator contract the listing core reads through, plus two
//! implementations:
//! - [`MemoryStore`]: BTreeMap-backed, for tests and one-shot datasets.
//! - [`RedbStore`]: disk-backed via redb, rows partitioned by kind, one
//!   read transaction per query.
//!
//! Both evaluate predicates, sorting and pagination with the same helpers in
//! this module, so they return identical pages for identical data.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::error::{Error, Result};
use crate::filter::Predicate;
use crate::primitives::{FIELD_CREATED_AT, FIELD_ID, FIELD_UPDATED_AT};
use crate::{Entity, EntityId, FieldValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Operations the listing core needs from persistence.
///
/// Reads are request-scoped. Writes are last-writer-wins single-row updates.
pub trait EntityStore {
    /// Lookup an entity by id.
    fn find_by_id(&self, id: EntityId) -> Result<Option<Entity>>;

    /// Filter, sort and paginate entities of one kind.
    fn query(&self, query: &Query) -> Result<QueryResult>;

    /// Count (and optionally sum a numeric field) over matching entities.
    fn aggregate(&self, kind: &str, predicate: &Predicate, field: Option<&str>)
    -> Result<Aggregate>;

    /// Overwrite one field and stamp `updated_at`. Returns the new row.
    fn update_field(
        &mut self,
        id: EntityId,
        field: &str,
        value: FieldValue,
        at: DateTime<Utc>,
    ) -> Result<Entity>;

    /// Store a new entity. `EntityId(0)` asks the store to assign an id;
    /// any other id is kept (imports preserve identifiers).
    ///
    /// Never replaces a stored row: an explicit id that exists fails with
    /// [`Error::DuplicateId`], and assignment fails with
    /// [`Error::IdsExhausted`] once `u64::MAX` is taken.
    fn insert(&mut self, entity: Entity) -> Result<EntityId>;

    /// Insert a batch all-or-nothing. On error nothing is stored.
    fn insert_all(&mut self, entities: Vec<Entity>) -> Result<Vec<EntityId>>;

    /// Total number of stored entities, all kinds.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

// =============================================================================
// QUERY TYPES
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Sort key. Ties are always broken by id ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl SortKey {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Newest first.
    #[must_use]
    pub fn newest_first() -> Self {
        Self::desc(FIELD_CREATED_AT)
    }

    /// Parse `"field"` or `"-field"` (descending).
    #[must_use]
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let (field, direction) = match spec.strip_prefix('-') {
            Some(rest) => (rest.trim(), Direction::Desc),
            None => (spec, Direction::Asc),
        };
        (!field.is_empty()).then(|| Self {
            field: field.to_string(),
            direction,
        })
    }

    /// Compare two entities under this key, falling back to id ascending.
    #[must_use]
    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        let left = a.value(&self.field).unwrap_or(FieldValue::Null);
        let right = b.value(&self.field).unwrap_or(FieldValue::Null);
        let ordering = match self.direction {
            Direction::Asc => left.sort_cmp(&right),
            Direction::Desc => right.sort_cmp(&left),
        };
        ordering.then_with(|| a.id.cmp(&b.id))
    }
}

/// A filtered, sorted, paginated read.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub kind: String,
    pub predicate: Predicate,
    pub sort: SortKey,
    pub offset: usize,
    /// `None` returns every matching row.
    pub limit: Option<usize>,
}

impl Query {
    /// All entities of `kind` matching `predicate`, newest first.
    #[must_use]
    pub fn all(kind: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            kind: kind.into(),
            predicate,
            sort: SortKey::newest_first(),
            offset: 0,
            limit: None,
        }
    }

    #[must_use]
    pub fn sorted(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// One page of rows plus the number of rows matching overall.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub items: Vec<Entity>,
    pub total: usize,
}

/// Count and sum over a filtered collection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aggregate {
    /// Matching rows (rows with a numeric value when summing a field).
    pub count: usize,
    pub sum: f64,
}

impl Aggregate {
    /// Arithmetic mean, `None` when nothing was aggregated.
    #[must_use]
    #[allow(clippy::float_arithmetic)]
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

// =============================================================================
// SHARED EVALUATION
// =============================================================================

/// Filter, sort and slice a row source.
pub(crate) fn execute(rows: impl Iterator<Item = Entity>, query: &Query) -> QueryResult {
    if query.predicate.is_never() {
        return QueryResult::default();
    }
    let mut matched: Vec<Entity> = rows
        .filter(|e| e.kind == query.kind && query.predicate.matches(e))
        .collect();
    let total = matched.len();
    matched.sort_by(|a, b| query.sort.compare(a, b));
    let items = matched
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();
    QueryResult { items, total }
}

/// Fold matching rows into an [`Aggregate`].
#[allow(clippy::float_arithmetic)]
pub(crate) fn fold_aggregate<'a>(
    rows: impl Iterator<Item = &'a Entity>,
    kind: &str,
    predicate: &Predicate,
    field: Option<&str>,
) -> Aggregate {
    let mut aggregate = Aggregate::default();
    if predicate.is_never() {
        return aggregate;
    }
    for entity in rows.filter(|e| e.kind == kind && predicate.matches(e)) {
        match field {
            None => aggregate.count = aggregate.count.saturating_add(1),
            Some(name) => {
                if let Some(n) = entity.number(name) {
                    aggregate.count = aggregate.count.saturating_add(1);
                    aggregate.sum += n;
                }
            }
        }
    }
    aggregate
}

/// Resolve the id an insert stores under, and the id counter after it.
///
/// The counter never wraps. Once `u64::MAX` is stored it stays parked there,
/// so the taken check turns further assignment into [`Error::IdsExhausted`].
pub(crate) fn claim_id(
    requested: EntityId,
    next: u64,
    is_taken: impl FnOnce(EntityId) -> Result<bool>,
) -> Result<(EntityId, u64)> {
    let assigned = requested.0 == 0;
    let id = if assigned { EntityId(next) } else { requested };
    if is_taken(id)? {
        return Err(if assigned {
            Error::IdsExhausted
        } else {
            Error::DuplicateId(id)
        });
    }
    let next = if id.0 >= next {
        id.0.checked_add(1).unwrap_or(u64::MAX)
    } else {
        next
    };
    Ok((id, next))
}

/// Apply a single-field write to an entity in place.
pub(crate) fn apply_update(
    entity: &mut Entity,
    field: &str,
    value: FieldValue,
    at: DateTime<Utc>,
) -> Result<()> {
    if matches!(field, FIELD_ID | FIELD_CREATED_AT | FIELD_UPDATED_AT) {
        return Err(Error::FieldType {
            id: entity.id,
            field: field.to_string(),
            expected: "writable field",
        });
    }
    entity.set(field, value);
    entity.updated_at = at;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
