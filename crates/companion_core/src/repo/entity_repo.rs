//! Entity store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide persistence APIs for ordered entity collections.
//! - Apply every structural change as one atomic write batch.
//!
//! # Invariants
//! - Only active (`is_deleted=0`) entities are returned by read paths.
//! - Listing is deterministic: `position ASC, entity_id ASC`.
//! - Deleted ids stay as tombstones and can never be upserted again.
//! - A failing batch leaves the store exactly as it was before the batch.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::entity::{CollectionKey, Entity, EntityId};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Result type used by entity store operations.
pub type EntityRepoResult<T> = Result<T, EntityRepoError>;

/// Errors from entity store operations.
#[derive(Debug)]
pub enum EntityRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Upsert targeted an id that was deleted earlier.
    IdRetired(EntityId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for EntityRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::IdRetired(id) => write!(f, "entity id was deleted and cannot be reused: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "entity store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "entity store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "entity store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid entity data: {message}"),
        }
    }
}

impl Error for EntityRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for EntityRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for EntityRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One mutation inside a write batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a new entity or replace an active one with the same id.
    Upsert(Entity),
    /// Move one active entity to a new order key.
    SetPosition { id: EntityId, position: i64 },
    /// Tombstone one active entity. Missing ids are ignored.
    Delete(EntityId),
}

/// Ordered list of mutations applied in a single transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn upsert(&mut self, entity: Entity) {
        self.push(WriteOp::Upsert(entity));
    }

    pub fn set_position(&mut self, id: impl Into<EntityId>, position: i64) {
        self.push(WriteOp::SetPosition {
            id: id.into(),
            position,
        });
    }

    pub fn delete(&mut self, id: impl Into<EntityId>) {
        self.push(WriteOp::Delete(id.into()));
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Persistent store contract used by ordered entity synchronization.
pub trait EntityStore {
    /// Lists active entities sorted by `position`.
    fn list(&self, key: CollectionKey) -> EntityRepoResult<Vec<Entity>>;
    /// Loads one active entity.
    fn get(&self, key: CollectionKey, id: &str) -> EntityRepoResult<Option<Entity>>;
    /// Whether `id` belongs to a deleted entity.
    fn is_retired(&self, key: CollectionKey, id: &str) -> EntityRepoResult<bool>;
    /// Applies all ops atomically: either every op lands or none does.
    fn apply(&self, key: CollectionKey, batch: &WriteBatch) -> EntityRepoResult<()>;
}

impl<T: EntityStore + ?Sized> EntityStore for &T {
    fn list(&self, key: CollectionKey) -> EntityRepoResult<Vec<Entity>> {
        (**self).list(key)
    }

    fn get(&self, key: CollectionKey, id: &str) -> EntityRepoResult<Option<Entity>> {
        (**self).get(key, id)
    }

    fn is_retired(&self, key: CollectionKey, id: &str) -> EntityRepoResult<bool> {
        (**self).is_retired(key, id)
    }

    fn apply(&self, key: CollectionKey, batch: &WriteBatch) -> EntityRepoResult<()> {
        (**self).apply(key, batch)
    }
}

/// SQLite-backed entity store.
pub struct SqliteEntityStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> EntityRepoResult<Self> {
        ensure_entity_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EntityStore for SqliteEntityStore<'_> {
    fn list(&self, key: CollectionKey) -> EntityRepoResult<Vec<Entity>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_id, name, position, payload
             FROM entities
             WHERE collection = ?1
               AND is_deleted = 0
             ORDER BY position ASC, entity_id ASC;",
        )?;
        let mut rows = stmt.query([key.as_str()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_entity_row(row)?);
        }
        Ok(items)
    }

    fn get(&self, key: CollectionKey, id: &str) -> EntityRepoResult<Option<Entity>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_id, name, position, payload
             FROM entities
             WHERE collection = ?1
               AND entity_id = ?2
               AND is_deleted = 0;",
        )?;
        let mut rows = stmt.query(params![key.as_str(), id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entity_row(row)?));
        }
        Ok(None)
    }

    fn is_retired(&self, key: CollectionKey, id: &str) -> EntityRepoResult<bool> {
        is_retired_in(self.conn, key, id)
    }

    fn apply(&self, key: CollectionKey, batch: &WriteBatch) -> EntityRepoResult<()> {
        let started_at = Instant::now();
        let result = apply_batch(self.conn, key, batch);
        match &result {
            Ok(()) => info!(
                "event=collection_write module=repo status=ok collection={} ops={} duration_ms={}",
                key,
                batch.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=collection_write module=repo status=error collection={} ops={} duration_ms={} error={}",
                key,
                batch.len(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

fn apply_batch(conn: &Connection, key: CollectionKey, batch: &WriteBatch) -> EntityRepoResult<()> {
    // Dropping `tx` without commit rolls back every op already applied.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    for op in batch.ops() {
        match op {
            WriteOp::Upsert(entity) => upsert_entity(&tx, key, entity)?,
            WriteOp::SetPosition { id, position } => {
                tx.execute(
                    "UPDATE entities
                     SET position = ?3,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE collection = ?1
                       AND entity_id = ?2
                       AND is_deleted = 0;",
                    params![key.as_str(), id, position],
                )?;
            }
            WriteOp::Delete(id) => {
                tx.execute(
                    "UPDATE entities
                     SET is_deleted = 1,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE collection = ?1
                       AND entity_id = ?2
                       AND is_deleted = 0;",
                    params![key.as_str(), id],
                )?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

fn upsert_entity(conn: &Connection, key: CollectionKey, entity: &Entity) -> EntityRepoResult<()> {
    if entity.id.trim().is_empty() {
        return Err(EntityRepoError::InvalidData(
            "entity id must not be blank".to_string(),
        ));
    }
    if entity.position < 0 {
        return Err(EntityRepoError::InvalidData(format!(
            "negative position {} for entity {}",
            entity.position, entity.id
        )));
    }
    if is_retired_in(conn, key, &entity.id)? {
        return Err(EntityRepoError::IdRetired(entity.id.clone()));
    }

    let payload = serde_json::to_string(&entity.payload)
        .map_err(|err| EntityRepoError::InvalidData(format!("unserializable payload: {err}")))?;
    conn.execute(
        "INSERT INTO entities (
            collection,
            entity_id,
            name,
            position,
            payload,
            is_deleted
        ) VALUES (?1, ?2, ?3, ?4, ?5, 0)
        ON CONFLICT (collection, entity_id) DO UPDATE SET
            name = excluded.name,
            position = excluded.position,
            payload = excluded.payload,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![
            key.as_str(),
            entity.id,
            entity.name,
            entity.position,
            payload
        ],
    )?;
    Ok(())
}

fn is_retired_in(conn: &Connection, key: CollectionKey, id: &str) -> EntityRepoResult<bool> {
    let deleted: Option<i64> = conn
        .query_row(
            "SELECT is_deleted
             FROM entities
             WHERE collection = ?1
               AND entity_id = ?2;",
            params![key.as_str(), id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(deleted == Some(1))
}

fn parse_entity_row(row: &Row<'_>) -> EntityRepoResult<Entity> {
    let id: String = row.get("entity_id")?;
    let payload_text: String = row.get("payload")?;
    let payload = serde_json::from_str(&payload_text).map_err(|err| {
        EntityRepoError::InvalidData(format!("invalid payload json for entity {id}: {err}"))
    })?;

    Ok(Entity {
        id,
        name: row.get("name")?,
        position: row.get("position")?,
        payload,
    })
}

fn ensure_entity_connection_ready(conn: &Connection) -> EntityRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(EntityRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "entities")? {
        return Err(EntityRepoError::MissingRequiredTable("entities"));
    }

    for column in [
        "collection",
        "entity_id",
        "name",
        "position",
        "payload",
        "is_deleted",
        "created_at",
        "updated_at",
    ] {
        if !table_has_column(conn, "entities", column)? {
            return Err(EntityRepoError::MissingRequiredColumn {
                table: "entities",
                column,
            });
        }
    }

    Ok(())
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn table_has_column(
    conn: &Connection,
    table: &str,
    column: &str,
) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
