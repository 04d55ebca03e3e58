//! In-memory entity store.

use super::{
    Aggregate, EntityStore, Query, QueryResult, apply_update, claim_id, execute, fold_aggregate,
};
use crate::error::{Error, Result};
use crate::filter::Predicate;
use crate::{Entity, EntityId, FieldValue};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// BTreeMap-backed store. Iteration order is id order.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entities: BTreeMap<EntityId, Entity>,
    next_id: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from existing records, preserving their ids.
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Result<Self> {
        let mut store = Self::new();
        store.insert_all(entities.into_iter().collect())?;
        Ok(store)
    }

    /// Next id that would be assigned.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}

impl EntityStore for MemoryStore {
    fn find_by_id(&self, id: EntityId) -> Result<Option<Entity>> {
        Ok(self.entities.get(&id).cloned())
    }

    fn query(&self, query: &Query) -> Result<QueryResult> {
        Ok(execute(self.entities.values().cloned(), query))
    }

    fn aggregate(
        &self,
        kind: &str,
        predicate: &Predicate,
        field: Option<&str>,
    ) -> Result<Aggregate> {
        Ok(fold_aggregate(self.entities.values(), kind, predicate, field))
    }

    fn update_field(
        &mut self,
        id: EntityId,
        field: &str,
        value: FieldValue,
        at: DateTime<Utc>,
    ) -> Result<Entity> {
        let entity = self.entities.get_mut(&id).ok_or(Error::NotFound(id))?;
        apply_update(entity, field, value, at)?;
        Ok(entity.clone())
    }

    fn insert(&mut self, mut entity: Entity) -> Result<EntityId> {
        let (id, next) = claim_id(entity.id, self.next_id, |id| {
            Ok(self.entities.contains_key(&id))
        })?;
        entity.id = id;
        self.next_id = next;
        self.entities.insert(id, entity);
        Ok(id)
    }

    fn insert_all(&mut self, entities: Vec<Entity>) -> Result<Vec<EntityId>> {
        let mut staged = self.clone();
        let ids = entities
            .into_iter()
            .map(|entity| staged.insert(entity))
            .collect::<Result<Vec<_>>>()?;
        *self = staged;
        Ok(ids)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entities.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    #[test]
    fn insert_assigns_and_preserves_ids() {
        let mut store = MemoryStore::new();
        let first = store.insert(Entity::new(EntityId(0), "task", now()));
        assert_eq!(first.ok(), Some(EntityId(1)));

        let imported = store.insert(Entity::new(EntityId(10), "task", now()));
        assert_eq!(imported.ok(), Some(EntityId(10)));
        assert_eq!(store.next_id(), 11);

        let next = store.insert(Entity::new(EntityId(0), "task", now()));
        assert_eq!(next.ok(), Some(EntityId(11)));
    }

    #[test]
    fn max_id_is_never_reassigned() {
        let mut store = MemoryStore::new();
        let imported = Entity::new(EntityId(u64::MAX), "task", now()).with("title", "last");
        assert_eq!(store.insert(imported).ok(), Some(EntityId(u64::MAX)));

        let draft = store.insert(Entity::new(EntityId(0), "task", now()));
        assert!(matches!(draft, Err(Error::IdsExhausted)));
        assert_eq!(store.len().ok(), Some(1));
        let kept = store.find_by_id(EntityId(u64::MAX)).ok().flatten();
        assert_eq!(
            kept.and_then(|e| e.field("title").cloned()),
            Some(FieldValue::from("last"))
        );
    }

    #[test]
    fn explicit_id_does_not_replace_existing_row() {
        let mut store = MemoryStore::new();
        assert!(store.insert(Entity::new(EntityId(4), "task", now())).is_ok());
        let again = store.insert(Entity::new(EntityId(4), "circle", now()));
        assert!(matches!(again, Err(Error::DuplicateId(EntityId(4)))));
        let kept = store.find_by_id(EntityId(4)).ok().flatten();
        assert_eq!(kept.map(|e| e.kind), Some("task".to_string()));
    }

    #[test]
    fn insert_all_is_all_or_nothing() {
        let mut store = MemoryStore::new();
        let batch = vec![
            Entity::new(EntityId(1), "task", now()),
            Entity::new(EntityId(2), "task", now()),
            Entity::new(EntityId(1), "task", now()),
        ];
        assert!(matches!(store.insert_all(batch), Err(Error::DuplicateId(EntityId(1)))));
        assert_eq!(store.len().ok(), Some(0));
        assert_eq!(store.next_id(), 1);

        let ids = store.insert_all(vec![
            Entity::new(EntityId(0), "task", now()),
            Entity::new(EntityId(5), "task", now()),
        ]);
        assert_eq!(ids.ok(), Some(vec![EntityId(1), EntityId(5)]));
    }

    #[test]
    fn update_missing_entity_is_not_found() {
        let mut store = MemoryStore::new();
        let result = store.update_field(EntityId(9), "title", FieldValue::Null, now());
        assert!(matches!(result, Err(Error::NotFound(EntityId(9)))));
    }

    #[test]
    fn update_overwrites_single_field() {
        let mut store = MemoryStore::new();
        let id = store
            .insert(Entity::new(EntityId(0), "task", now()).with("done", false))
            .unwrap_or(EntityId(0));
        let updated = store.update_field(id, "done", FieldValue::Bool(true), now());
        assert_eq!(
            updated.ok().and_then(|e| e.field("done").cloned()),
            Some(FieldValue::Bool(true))
        );
    }
}
