//! Ordered entity synchronization between an editable row list and storage.
//!
//! # Responsibility
//! - Translate presentation intents (insert, edit completion, delete,
//!   reorder) into store write batches.
//! - Track reorder gestures so that remove+reinsert artifacts emitted by the
//!   presentation layer never destroy entities.
//! - Correlate edit flows with rows through explicit `RowHandle`s.
//!
//! # Invariants
//! - Every structural change is exactly one atomic `EntityStore::apply`.
//! - Cancelled edits and empty deletions never reach the store.
//! - Inserts and deletes keep positions contiguous from 0.
//! - A failed write changes neither the store nor the pending edit state.
//! - Read-only collections accept loads only; every mutating intent fails
//!   with `ReadOnlyCollection` before touching state.

use crate::model::entity::{CollectionKey, Entity, EntityId};
use crate::repo::entity_repo::{EntityRepoError, EntityStore, WriteBatch};
use crate::service::change_feed::{ChangeFeed, CollectionChange};
use log::{debug, error, info};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced to the presentation layer.
#[derive(Debug)]
pub enum SyncError {
    /// Store could not be opened or queried; show an empty list with retry.
    StorageUnavailable(EntityRepoError),
    /// Write transaction rolled back; store state is unchanged.
    PersistenceWriteFailed(EntityRepoError),
    /// Handle was never issued or was already completed.
    UnknownHandle(RowHandle),
    /// `saved=true` completion without a result entity.
    MissingEditResult(RowHandle),
    /// Collection is listed in settings but edited elsewhere.
    ReadOnlyCollection(CollectionKey),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
            Self::PersistenceWriteFailed(err) => write!(f, "persistence write failed: {err}"),
            Self::UnknownHandle(handle) => write!(f, "unknown row handle: {handle}"),
            Self::MissingEditResult(handle) => {
                write!(f, "saved edit for row handle {handle} carried no result")
            }
            Self::ReadOnlyCollection(key) => write!(f, "collection `{key}` is read-only"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) | Self::PersistenceWriteFailed(err) => Some(err),
            Self::UnknownHandle(_) | Self::MissingEditResult(_) | Self::ReadOnlyCollection(_) => {
                None
            }
        }
    }
}

/// Opaque token tying an edit flow to the row that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowHandle(u64);

impl RowHandle {
    /// Rebuilds a handle received back across an FFI boundary.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl Display for RowHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Display values the presentation layer should render after a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowUpdate {
    pub handle: RowHandle,
    pub identifier: EntityId,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditTarget {
    /// Not yet persisted; row disappears if the edit is cancelled.
    Draft,
    /// Re-edit of an entity loaded from the store.
    Existing,
}

#[derive(Debug, Clone)]
struct EditSession {
    entity: Entity,
    target: EditTarget,
    at_index: usize,
}

/// Keeps one persisted collection consistent with user intents.
///
/// All methods are meant to run on the UI sequence; `&mut self` makes
/// concurrent mutation of one instance impossible.
pub struct OrderedEntitySync<S: EntityStore> {
    store: S,
    key: CollectionKey,
    in_flight: HashSet<EntityId>,
    sessions: BTreeMap<RowHandle, EditSession>,
    next_handle: u64,
    feed: ChangeFeed,
}

impl<S: EntityStore> OrderedEntitySync<S> {
    pub fn new(store: S, key: CollectionKey) -> Self {
        Self::with_feed(store, key, ChangeFeed::new())
    }

    /// Creates a sync component publishing into a shared feed.
    pub fn with_feed(store: S, key: CollectionKey, feed: ChangeFeed) -> Self {
        Self {
            store,
            key,
            in_flight: HashSet::new(),
            sessions: BTreeMap::new(),
            next_handle: 1,
            feed,
        }
    }

    pub fn key(&self) -> CollectionKey {
        self.key
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads the collection in display order.
    pub fn load_initial(&self) -> SyncResult<Vec<Entity>> {
        self.store.list(self.key).map_err(|err| {
            error!(
                "event=collection_load module=sync status=error collection={} error={}",
                self.key, err
            );
            SyncError::StorageUnavailable(err)
        })
    }

    /// Marks `id` as being dragged.
    pub fn begin_reorder(&mut self, id: impl Into<EntityId>) -> SyncResult<()> {
        self.ensure_writable()?;
        let id = id.into();
        debug!(
            "event=reorder_begin module=sync status=ok collection={}",
            self.key
        );
        self.in_flight.insert(id);
        Ok(())
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    /// Renumbers every persisted entity listed in `new_order` by its index.
    ///
    /// Ids that are not persisted (drafts, stale rows) are skipped before
    /// indexing and a repeated id keeps its first index, so referenced
    /// entities land on `0..n`. Entities missing from `new_order` keep their
    /// position. In-flight flags are cleared whether or not the write lands.
    pub fn commit_reorder<T: AsRef<str>>(&mut self, new_order: &[T]) -> SyncResult<()> {
        let result = self.commit_reorder_inner(new_order);
        self.in_flight.clear();
        result
    }

    fn commit_reorder_inner<T: AsRef<str>>(&self, new_order: &[T]) -> SyncResult<()> {
        self.ensure_writable()?;
        let entities = self.load_initial()?;
        let current = entities
            .iter()
            .map(|entity| (entity.id.as_str(), entity.position))
            .collect::<HashMap<_, _>>();

        let mut batch = WriteBatch::new();
        let mut seen = HashSet::new();
        let mut rank = 0_i64;
        for id in new_order {
            let id = id.as_ref();
            let Some(&position) = current.get(id) else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            if position != rank {
                batch.set_position(id, rank);
            }
            rank += 1;
        }

        let moved = batch.len();
        self.write(batch, entities.len())?;
        info!(
            "event=reorder_commit module=sync status=ok collection={} referenced={} moved={}",
            self.key, rank, moved
        );
        Ok(())
    }

    /// Ends a drag without persisting anything.
    pub fn cancel_reorder(&mut self, id: &str) {
        self.in_flight.remove(id);
    }

    /// Starts an edit flow for a new row (`existing = None`) or a re-edit.
    ///
    /// No store write happens here; a new row only becomes an entity when
    /// its edit completes with `saved = true`.
    pub fn apply_insert(
        &mut self,
        existing: Option<Entity>,
        at_index: usize,
    ) -> SyncResult<RowHandle> {
        self.ensure_writable()?;
        let handle = RowHandle(self.next_handle);
        self.next_handle += 1;

        let session = match existing {
            Some(entity) => EditSession {
                at_index: usize::try_from(entity.position).unwrap_or(at_index),
                entity,
                target: EditTarget::Existing,
            },
            None => EditSession {
                entity: Entity::draft(self.key, i64::try_from(at_index).unwrap_or(i64::MAX)),
                target: EditTarget::Draft,
                at_index,
            },
        };
        debug!(
            "event=edit_begin module=sync status=ok collection={} handle={} draft={}",
            self.key,
            handle,
            session.target == EditTarget::Draft
        );
        self.sessions.insert(handle, session);
        Ok(handle)
    }

    /// Entity bound to `handle`, for the edit form to start from.
    pub fn draft(&self, handle: RowHandle) -> Option<&Entity> {
        self.sessions.get(&handle).map(|session| &session.entity)
    }

    pub fn pending_edits(&self) -> usize {
        self.sessions.len()
    }

    /// Finishes an edit flow.
    ///
    /// `saved = false` discards the handle without touching the store.
    /// `saved = true` upserts `result` in one write and consumes the handle;
    /// if the write fails the handle stays valid so the user can retry.
    pub fn complete_edit(
        &mut self,
        handle: RowHandle,
        saved: bool,
        result: Option<Entity>,
    ) -> SyncResult<Option<RowUpdate>> {
        let Some(session) = self.sessions.get(&handle) else {
            return Err(SyncError::UnknownHandle(handle));
        };

        if !saved {
            debug!(
                "event=edit_cancel module=sync status=ok collection={} handle={}",
                self.key, handle
            );
            self.sessions.remove(&handle);
            return Ok(None);
        }

        let Some(result) = result else {
            return Err(SyncError::MissingEditResult(handle));
        };
        let at_index = session.at_index;

        let entities = self.load_initial()?;
        let update = RowUpdate {
            handle,
            identifier: result.id.clone(),
            title: result.name.clone(),
        };
        let (batch, len) = upsert_batch(&entities, result, at_index);
        self.write(batch, len)?;

        self.sessions.remove(&handle);
        Ok(Some(update))
    }

    /// Deletes every listed entity that is not part of an active drag.
    ///
    /// Returns the ids that were actually removed. Draft rows among `ids`
    /// drop their pending edit. Survivors are compacted in the same write.
    pub fn apply_delete<I>(&mut self, ids: I) -> SyncResult<Vec<EntityId>>
    where
        I: IntoIterator,
        I::Item: Into<EntityId>,
    {
        self.ensure_writable()?;
        let mut suppressed = 0_usize;
        let requested = ids
            .into_iter()
            .map(Into::into)
            .filter(|id| {
                let in_flight = self.in_flight.contains(id);
                if in_flight {
                    suppressed += 1;
                }
                !in_flight
            })
            .collect::<BTreeSet<EntityId>>();
        if suppressed > 0 {
            debug!(
                "event=delete_suppressed module=sync status=ok collection={} count={}",
                self.key, suppressed
            );
        }
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        self.sessions.retain(|_, session| {
            !(session.target == EditTarget::Draft && requested.contains(&session.entity.id))
        });

        let entities = self.load_initial()?;
        let persisted = entities
            .iter()
            .map(|entity| entity.id.as_str())
            .collect::<HashSet<_>>();
        let deleted = requested
            .into_iter()
            .filter(|id| persisted.contains(id.as_str()))
            .collect::<Vec<_>>();
        if deleted.is_empty() {
            return Ok(deleted);
        }

        let mut batch = WriteBatch::new();
        for id in &deleted {
            batch.delete(id.clone());
        }
        let survivors = entities
            .iter()
            .filter(|entity| !deleted.contains(&entity.id))
            .collect::<Vec<_>>();
        for (rank, entity) in survivors.iter().enumerate() {
            let rank = rank as i64;
            if entity.position != rank {
                batch.set_position(entity.id.clone(), rank);
            }
        }

        self.write(batch, survivors.len())?;
        Ok(deleted)
    }

    fn ensure_writable(&self) -> SyncResult<()> {
        if self.key.is_read_only() {
            return Err(SyncError::ReadOnlyCollection(self.key));
        }
        Ok(())
    }

    fn write(&self, batch: WriteBatch, len: usize) -> SyncResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.store
            .apply(self.key, &batch)
            .map_err(SyncError::PersistenceWriteFailed)?;
        self.feed.publish(CollectionChange { key: self.key, len });
        Ok(())
    }
}

/// Builds the write for a saved edit.
///
/// A known id keeps its stored position. A new id is inserted at
/// `at_index` (clamped to the collection size) and later entities shift.
fn upsert_batch(entities: &[Entity], mut result: Entity, at_index: usize) -> (WriteBatch, usize) {
    let mut batch = WriteBatch::new();
    if let Some(current) = entities.iter().find(|entity| entity.id == result.id) {
        result.position = current.position;
        batch.upsert(result);
        return (batch, entities.len());
    }

    let index = at_index.min(entities.len());
    for (rank, entity) in entities.iter().enumerate() {
        let target = (if rank < index { rank } else { rank + 1 }) as i64;
        if entity.position != target {
            batch.set_position(entity.id.clone(), target);
        }
    }
    result.position = index as i64;
    batch.upsert(result);
    (batch, entities.len() + 1)
}
