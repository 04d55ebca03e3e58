//! Disk-backed entity store using redb.
//!
//! Tables:
//! - `entities_by_kind`: (kind, id) -> encoded entity record
//! - `kinds`: id -> kind, for lookups by id alone
//! - `meta`: `next_id` counter
//!
//! Queries range-scan a single kind, so a damaged record only fails listings
//! of its own kind. Every read runs in one read transaction, and every write
//! (single row or whole batch) commits in one write transaction.

use super::{
    Aggregate, EntityStore, Query, QueryResult, apply_update, claim_id, execute, fold_aggregate,
};
use crate::error::{Error, Result};
use crate::filter::Predicate;
use crate::formats::{decode_entity, encode_entity};
use crate::{Entity, EntityId, FieldValue};
use chrono::{DateTime, Utc};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
    WriteTransaction,
};
use std::path::Path;
use tracing::debug;

const ENTITIES: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("entities_by_kind");
const KINDS: TableDefinition<u64, &str> = TableDefinition::new("kinds");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const NEXT_ID: &str = "next_id";

/// redb-backed store.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

/// The three tables, opened inside one write transaction.
struct WriteTables<'txn> {
    entities: Table<'txn, (&'static str, u64), &'static [u8]>,
    kinds: Table<'txn, u64, &'static str>,
    meta: Table<'txn, &'static str, u64>,
}

impl<'txn> WriteTables<'txn> {
    fn open(txn: &'txn WriteTransaction) -> Result<Self> {
        Ok(Self {
            entities: txn.open_table(ENTITIES)?,
            kinds: txn.open_table(KINDS)?,
            meta: txn.open_table(META)?,
        })
    }

    fn find(&self, id: EntityId) -> Result<Option<Entity>> {
        let Some(kind) = self.kinds.get(id.0)?.map(|k| k.value().to_string()) else {
            return Ok(None);
        };
        match self.entities.get((kind.as_str(), id.0))? {
            Some(value) => Ok(Some(decode_entity(value.value())?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, entity: &Entity) -> Result<()> {
        let bytes = encode_entity(entity)?;
        self.entities
            .insert((entity.kind.as_str(), entity.id.0), bytes.as_slice())?;
        self.kinds.insert(entity.id.0, entity.kind.as_str())?;
        Ok(())
    }

    fn insert(&mut self, mut entity: Entity) -> Result<EntityId> {
        let next = self.meta.get(NEXT_ID)?.map(|v| v.value()).unwrap_or(1);
        let (id, next) = claim_id(entity.id, next, |id| Ok(self.kinds.get(id.0)?.is_some()))?;
        entity.id = id;
        self.put(&entity)?;
        self.meta.insert(NEXT_ID, next)?;
        Ok(id)
    }
}

impl RedbStore {
    /// Create (or truncate-open) a database file and its tables.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path)?;
        let store = Self { db };
        store.init_tables()?;
        Ok(store)
    }

    /// Open an existing database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(path)?;
        let store = Self { db };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<()> {
        self.write(|_| Ok(()))
    }

    /// Run `f` in one write transaction. An error drops the transaction
    /// uncommitted.
    fn write<T>(&self, f: impl FnOnce(&mut WriteTables<'_>) -> Result<T>) -> Result<T> {
        let txn = self.db.begin_write()?;
        let out = {
            let mut tables = WriteTables::open(&txn)?;
            f(&mut tables)?
        };
        txn.commit()?;
        Ok(out)
    }

    /// Decode the entities of one kind inside one read transaction.
    fn scan_kind(&self, kind: &str) -> Result<Vec<Entity>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTITIES)?;
        let mut entities = Vec::new();
        for row in table.range((kind, 0u64)..=(kind, u64::MAX))? {
            let (_, value) = row?;
            entities.push(decode_entity(value.value())?);
        }
        Ok(entities)
    }

    /// Next id that would be assigned.
    pub fn next_id(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let meta = txn.open_table(META)?;
        Ok(meta.get(NEXT_ID)?.map(|v| v.value()).unwrap_or(1))
    }
}

impl EntityStore for RedbStore {
    fn find_by_id(&self, id: EntityId) -> Result<Option<Entity>> {
        let txn = self.db.begin_read()?;
        let kinds = txn.open_table(KINDS)?;
        let Some(kind) = kinds.get(id.0)?.map(|k| k.value().to_string()) else {
            return Ok(None);
        };
        let table = txn.open_table(ENTITIES)?;
        match table.get((kind.as_str(), id.0))? {
            Some(value) => Ok(Some(decode_entity(value.value())?)),
            None => Ok(None),
        }
    }

    fn query(&self, query: &Query) -> Result<QueryResult> {
        if query.predicate.is_never() {
            return Ok(QueryResult::default());
        }
        let rows = self.scan_kind(&query.kind)?;
        debug!(kind = %query.kind, scanned = rows.len(), "redb query");
        Ok(execute(rows.into_iter(), query))
    }

    fn aggregate(
        &self,
        kind: &str,
        predicate: &Predicate,
        field: Option<&str>,
    ) -> Result<Aggregate> {
        if predicate.is_never() {
            return Ok(Aggregate::default());
        }
        let rows = self.scan_kind(kind)?;
        Ok(fold_aggregate(rows.iter(), kind, predicate, field))
    }

    fn update_field(
        &mut self,
        id: EntityId,
        field: &str,
        value: FieldValue,
        at: DateTime<Utc>,
    ) -> Result<Entity> {
        self.write(|tables| {
            let mut entity = tables.find(id)?.ok_or(Error::NotFound(id))?;
            apply_update(&mut entity, field, value, at)?;
            tables.put(&entity)?;
            Ok(entity)
        })
    }

    fn insert(&mut self, entity: Entity) -> Result<EntityId> {
        self.write(|tables| tables.insert(entity))
    }

    fn insert_all(&mut self, entities: Vec<Entity>) -> Result<Vec<EntityId>> {
        let count = entities.len();
        let ids = self.write(|tables| {
            entities
                .into_iter()
                .map(|entity| tables.insert(entity))
                .collect::<Result<Vec<_>>>()
        })?;
        debug!(count, "redb batch insert");
        Ok(ids)
    }

    fn len(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(KINDS)?;
        Ok(table.len()? as usize)
    }
}
