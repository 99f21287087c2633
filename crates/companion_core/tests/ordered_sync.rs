use companion_core::db::open_db_in_memory;
use companion_core::{
    CollectionKey, Entity, EntityRepoError, EntityRepoResult, EntityStore, OrderedEntitySync,
    RowHandle, SqliteEntityStore, SyncError, WriteBatch,
};
use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const KEY: CollectionKey = CollectionKey::Actions;

/// Store wrapper that counts write transactions.
struct CountingStore<S> {
    inner: S,
    applies: Cell<usize>,
}

impl<S: EntityStore> CountingStore<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            applies: Cell::new(0),
        }
    }
}

impl<S: EntityStore> EntityStore for CountingStore<S> {
    fn list(&self, key: CollectionKey) -> EntityRepoResult<Vec<Entity>> {
        self.inner.list(key)
    }

    fn get(&self, key: CollectionKey, id: &str) -> EntityRepoResult<Option<Entity>> {
        self.inner.get(key, id)
    }

    fn is_retired(&self, key: CollectionKey, id: &str) -> EntityRepoResult<bool> {
        self.inner.is_retired(key, id)
    }

    fn apply(&self, key: CollectionKey, batch: &WriteBatch) -> EntityRepoResult<()> {
        self.applies.set(self.applies.get() + 1);
        self.inner.apply(key, batch)
    }
}

fn seeded<'c>(conn: &'c Connection, ids: &[&str]) -> OrderedEntitySync<SqliteEntityStore<'c>> {
    let store = SqliteEntityStore::try_new(conn).unwrap();
    let mut batch = WriteBatch::new();
    for (position, id) in ids.iter().enumerate() {
        batch.upsert(Entity::new(*id, id.to_uppercase(), position as i64));
    }
    store.apply(KEY, &batch).unwrap();
    OrderedEntitySync::new(store, KEY)
}

fn order<S: EntityStore>(sync: &OrderedEntitySync<S>) -> Vec<(String, i64)> {
    sync.load_initial()
        .unwrap()
        .into_iter()
        .map(|entity| (entity.id, entity.position))
        .collect()
}

fn save_new<S: EntityStore>(sync: &mut OrderedEntitySync<S>, at_index: usize, name: &str) -> String {
    let handle = sync.apply_insert(None, at_index).unwrap();
    let mut draft = sync.draft(handle).cloned().unwrap();
    draft.name = name.to_string();
    let update = sync.complete_edit(handle, true, Some(draft)).unwrap().unwrap();
    assert_eq!(update.handle, handle);
    assert_eq!(update.title, name);
    update.identifier
}

#[test]
fn completed_saves_persist_in_insertion_order() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = OrderedEntitySync::new(SqliteEntityStore::try_new(&conn).unwrap(), KEY);

    let first = save_new(&mut sync, 0, "First");
    let second = save_new(&mut sync, 1, "Second");
    let third = save_new(&mut sync, 2, "Third");

    assert_eq!(order(&sync), vec![(first, 0), (second, 1), (third, 2)]);
    assert_eq!(sync.pending_edits(), 0);
}

#[test]
fn middle_insert_shifts_later_entities() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = seeded(&conn, &["a", "b"]);

    let inserted = save_new(&mut sync, 1, "Middle");

    assert_eq!(
        order(&sync),
        vec![("a".to_string(), 0), (inserted, 1), ("b".to_string(), 2)]
    );
}

#[test]
fn cancelled_insert_leaves_store_untouched() {
    let conn = open_db_in_memory().unwrap();
    let store = CountingStore::new(SqliteEntityStore::try_new(&conn).unwrap());
    let mut sync = OrderedEntitySync::new(store, KEY);

    let handle = sync.apply_insert(None, 1).unwrap();
    assert!(sync.draft(handle).is_some());
    assert_eq!(sync.complete_edit(handle, false, None).unwrap(), None);

    assert!(sync.load_initial().unwrap().is_empty());
    assert_eq!(sync.store().applies.get(), 0);
    assert_eq!(sync.pending_edits(), 0);
}

#[test]
fn handles_are_consumed_by_completion() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = OrderedEntitySync::new(SqliteEntityStore::try_new(&conn).unwrap(), KEY);

    let handle = sync.apply_insert(None, 0).unwrap();
    sync.complete_edit(handle, false, None).unwrap();

    let err = sync.complete_edit(handle, false, None).unwrap_err();
    assert!(matches!(err, SyncError::UnknownHandle(h) if h == handle));
    let err = sync
        .complete_edit(RowHandle::from_raw(9_999), true, None)
        .unwrap_err();
    assert!(matches!(err, SyncError::UnknownHandle(_)));
}

#[test]
fn saved_completion_requires_result() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = OrderedEntitySync::new(SqliteEntityStore::try_new(&conn).unwrap(), KEY);

    let handle = sync.apply_insert(None, 0).unwrap();
    let err = sync.complete_edit(handle, true, None).unwrap_err();
    assert!(matches!(err, SyncError::MissingEditResult(_)));
    assert_eq!(sync.pending_edits(), 1);
}

#[test]
fn re_edit_keeps_position() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = seeded(&conn, &["a", "b", "c"]);
    let existing = sync.store().get(KEY, "b").unwrap().unwrap();

    let handle = sync.apply_insert(Some(existing.clone()), 0).unwrap();
    let mut edited = existing;
    edited.name = "Renamed".to_string();
    sync.complete_edit(handle, true, Some(edited)).unwrap();

    let stored = sync.store().get(KEY, "b").unwrap().unwrap();
    assert_eq!(stored.name, "Renamed");
    assert_eq!(stored.position, 1);
    assert_eq!(sync.load_initial().unwrap().len(), 3);
}

#[test]
fn reorder_commit_assigns_indices() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = seeded(&conn, &["a", "b", "c"]);

    sync.begin_reorder("c").unwrap();
    sync.commit_reorder(&["c", "a", "b"]).unwrap();

    assert_eq!(
        order(&sync),
        vec![
            ("c".to_string(), 0),
            ("a".to_string(), 1),
            ("b".to_string(), 2)
        ]
    );
    assert!(!sync.is_in_flight("c"));
}

#[test]
fn reorder_commit_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let store = CountingStore::new(SqliteEntityStore::try_new(&conn).unwrap());
    let mut batch = WriteBatch::new();
    for (position, id) in ["a", "b", "c"].into_iter().enumerate() {
        batch.upsert(Entity::new(id, id, position as i64));
    }
    store.apply(KEY, &batch).unwrap();
    let mut sync = OrderedEntitySync::new(store, KEY);

    sync.commit_reorder(&["b", "c", "a"]).unwrap();
    let once = order(&sync);
    let writes = sync.store().applies.get();

    sync.commit_reorder(&["b", "c", "a"]).unwrap();
    assert_eq!(order(&sync), once);
    assert_eq!(sync.store().applies.get(), writes);
}

#[test]
fn reorder_commit_skips_unknown_and_duplicate_ids() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = seeded(&conn, &["a", "b", "c"]);

    sync.commit_reorder(&["ghost", "c", "b", "c", "a"]).unwrap();

    let positions = order(&sync);
    assert_eq!(
        positions,
        vec![
            ("c".to_string(), 0),
            ("b".to_string(), 1),
            ("a".to_string(), 2)
        ]
    );
}

#[test]
fn reorder_commit_leaves_unreferenced_entities_alone() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = seeded(&conn, &["a", "b", "c"]);

    sync.commit_reorder(&["b", "a"]).unwrap();

    let c = sync.store().get(KEY, "c").unwrap().unwrap();
    assert_eq!(c.position, 2);
    assert_eq!(sync.store().get(KEY, "b").unwrap().unwrap().position, 0);
    assert_eq!(sync.store().get(KEY, "a").unwrap().unwrap().position, 1);
}

#[test]
fn delete_during_reorder_is_suppressed_until_cancelled() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = seeded(&conn, &["a", "b"]);

    sync.begin_reorder("a").unwrap();
    assert!(sync.is_in_flight("a"));
    assert!(sync.apply_delete(["a"]).unwrap().is_empty());
    assert!(sync.store().get(KEY, "a").unwrap().is_some());

    sync.cancel_reorder("a");
    assert!(!sync.is_in_flight("a"));
    assert_eq!(sync.apply_delete(["a"]).unwrap(), vec!["a".to_string()]);
    assert_eq!(order(&sync), vec![("b".to_string(), 0)]);
}

#[test]
fn empty_delete_performs_no_write() {
    let conn = open_db_in_memory().unwrap();
    let store = CountingStore::new(SqliteEntityStore::try_new(&conn).unwrap());
    let mut sync = OrderedEntitySync::new(store, KEY);

    assert!(sync.apply_delete(Vec::<String>::new()).unwrap().is_empty());
    sync.begin_reorder("a").unwrap();
    assert!(sync.apply_delete(["a"]).unwrap().is_empty());

    assert_eq!(sync.store().applies.get(), 0);
}

#[test]
fn delete_compacts_survivors() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = seeded(&conn, &["a", "b", "c", "d"]);

    let deleted = sync.apply_delete(["c", "a"]).unwrap();

    assert_eq!(deleted, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(
        order(&sync),
        vec![("b".to_string(), 0), ("d".to_string(), 1)]
    );
}

#[test]
fn failed_delete_rolls_back_every_entity() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = seeded(&conn, &["a", "b", "c"]);
    conn.execute_batch(
        "CREATE TRIGGER fail_delete_b
         BEFORE UPDATE OF is_deleted ON entities
         WHEN NEW.entity_id = 'b' AND NEW.is_deleted = 1
         BEGIN
             SELECT RAISE(ABORT, 'injected failure');
         END;",
    )
    .unwrap();

    let err = sync.apply_delete(["a", "b"]).unwrap_err();

    assert!(matches!(err, SyncError::PersistenceWriteFailed(_)));
    assert_eq!(
        order(&sync),
        vec![
            ("a".to_string(), 0),
            ("b".to_string(), 1),
            ("c".to_string(), 2)
        ]
    );
}

#[test]
fn failed_save_keeps_handle_for_retry() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = OrderedEntitySync::new(SqliteEntityStore::try_new(&conn).unwrap(), KEY);
    conn.execute_batch(
        "CREATE TRIGGER fail_insert
         BEFORE INSERT ON entities
         WHEN NEW.name = 'Broken'
         BEGIN
             SELECT RAISE(ABORT, 'injected failure');
         END;",
    )
    .unwrap();

    let handle = sync.apply_insert(None, 0).unwrap();
    let mut draft = sync.draft(handle).cloned().unwrap();
    draft.name = "Broken".to_string();
    let err = sync
        .complete_edit(handle, true, Some(draft.clone()))
        .unwrap_err();
    assert!(matches!(err, SyncError::PersistenceWriteFailed(_)));
    assert_eq!(sync.pending_edits(), 1);

    draft.name = "Fixed".to_string();
    sync.complete_edit(handle, true, Some(draft)).unwrap();
    assert_eq!(sync.load_initial().unwrap()[0].name, "Fixed");
}

#[test]
fn deleted_ids_are_never_reused() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = seeded(&conn, &["a"]);
    sync.apply_delete(["a"]).unwrap();
    assert!(sync.store().is_retired(KEY, "a").unwrap());

    let handle = sync.apply_insert(None, 0).unwrap();
    let err = sync
        .complete_edit(handle, true, Some(Entity::new("a", "Again", 0)))
        .unwrap_err();

    match err {
        SyncError::PersistenceWriteFailed(EntityRepoError::IdRetired(id)) => assert_eq!(id, "a"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn storage_failure_surfaces_as_unavailable() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = seeded(&conn, &["a"]);
    conn.execute_batch("DROP TABLE entities;").unwrap();

    assert!(matches!(
        sync.load_initial().unwrap_err(),
        SyncError::StorageUnavailable(_)
    ));
    sync.begin_reorder("a").unwrap();
    assert!(sync.commit_reorder(&["a"]).is_err());
    assert!(!sync.is_in_flight("a"));
}

#[test]
fn writes_publish_collection_changes() {
    let conn = open_db_in_memory().unwrap();
    let mut sync = seeded(&conn, &["a", "b"]);
    let seen = Arc::new(AtomicUsize::new(usize::MAX));
    let publishes = Arc::new(AtomicUsize::new(0));

    let subscription = {
        let seen = Arc::clone(&seen);
        let publishes = Arc::clone(&publishes);
        sync.feed().subscribe(move |change| {
            assert_eq!(change.key, KEY);
            seen.store(change.len, Ordering::SeqCst);
            publishes.fetch_add(1, Ordering::SeqCst);
        })
    };

    sync.apply_delete(["a"]).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    sync.apply_delete(["b"]).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(publishes.load(Ordering::SeqCst), 2);

    drop(subscription);
    save_new(&mut sync, 0, "After");
    assert_eq!(publishes.load(Ordering::SeqCst), 2);
    assert_eq!(sync.feed().subscriber_count(), 0);
}

#[test]
fn collections_keep_independent_orders() {
    let conn = open_db_in_memory().unwrap();
    let mut actions = seeded(&conn, &["a", "b"]);
    let mut categories = OrderedEntitySync::new(
        SqliteEntityStore::try_new(&conn).unwrap(),
        CollectionKey::NotificationCategories,
    );

    let category = save_new(&mut categories, 0, "Alarm");
    actions.commit_reorder(&["b", "a"]).unwrap();

    assert_eq!(order(&categories), vec![(category, 0)]);
    assert_eq!(order(&actions)[0].0, "b");
}

#[test]
fn zones_reject_every_mutating_intent() {
    let conn = open_db_in_memory().unwrap();
    let store = CountingStore::new(SqliteEntityStore::try_new(&conn).unwrap());
    let mut batch = WriteBatch::new();
    batch.upsert(Entity::new("home", "Home", 0));
    store.apply(CollectionKey::Zones, &batch).unwrap();
    let mut zones = OrderedEntitySync::new(store, CollectionKey::Zones);

    let read_only =
        |err: SyncError| matches!(err, SyncError::ReadOnlyCollection(CollectionKey::Zones));
    assert!(read_only(zones.apply_insert(None, 0).unwrap_err()));
    assert!(read_only(zones.apply_delete(["home"]).unwrap_err()));
    assert!(read_only(zones.begin_reorder("home").unwrap_err()));
    assert!(read_only(zones.commit_reorder(&["home"]).unwrap_err()));

    assert_eq!(zones.pending_edits(), 0);
    assert!(!zones.is_in_flight("home"));
    assert_eq!(zones.store().applies.get(), 1);
    assert_eq!(order(&zones), vec![("home".to_string(), 0)]);
}
