mod common;

use common::{Project, Task};
use lazyrepo_core::{
    ConnectionMode, DbError, Record, RecordMeta, SqliteStore, Store, StoreConfig, StoreError,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[test]
fn insert_assigns_ids_and_honours_explicit_ones() {
    let store = SqliteStore::open_in_memory().unwrap();

    let first = store.insert(&Task::new("first")).unwrap();
    let explicit = store.insert(&Task::with_id(40, "explicit")).unwrap();
    let next = store.insert(&Task::new("next")).unwrap();

    assert!(first > 0);
    assert_eq!(explicit, 40);
    assert!(next > explicit);

    let loaded: Task = store.get_by_id(40).unwrap().unwrap();
    assert_eq!(loaded.title, "explicit");
    assert_eq!(loaded.id(), 40);
}

#[test]
fn insert_rejects_duplicate_identity() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.insert(&Task::with_id(5, "original")).unwrap();

    let err = store.insert(&Task::with_id(5, "clash")).unwrap_err();
    assert!(matches!(err, StoreError::Db(DbError::Sqlite(_))));
}

#[test]
fn insert_many_and_get_all_return_id_order() {
    let store = SqliteStore::open_in_memory().unwrap();
    let ids = store
        .insert_many(&[
            Task::with_id(9, "nine"),
            Task::with_id(2, "two"),
            Task::with_id(5, "five"),
        ])
        .unwrap();
    assert_eq!(ids, vec![9, 2, 5]);

    let titles: Vec<String> = store
        .get_all::<Task>()
        .unwrap()
        .into_iter()
        .map(|task| task.title)
        .collect();
    assert_eq!(titles, vec!["two", "five", "nine"]);
}

#[test]
fn update_and_delete_report_missing_records() {
    let store = SqliteStore::open_in_memory().unwrap();
    let id = store.insert(&Task::new("draft")).unwrap();

    let mut task: Task = store.get_by_id(id).unwrap().unwrap();
    task.title = "final".to_string();
    task.meta.updated = 77;
    assert!(store.update(&task).unwrap());

    let loaded: Task = store.get_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.title, "final");
    assert_eq!(loaded.updated(), 77);

    assert!(!store.update(&Task::with_id(999, "ghost")).unwrap());
    assert!(store.delete_by_id::<Task>(id).unwrap());
    assert!(!store.delete_by_id::<Task>(id).unwrap());
    assert!(store.get_by_id::<Task>(id).unwrap().is_none());
}

#[test]
fn unassigned_identity_is_a_precondition_failure() {
    let store = SqliteStore::open_in_memory().unwrap();

    let update_err = store.update(&Task::new("no id")).unwrap_err();
    assert!(matches!(update_err, StoreError::InvalidIdentity(0)));

    let delete_err = store.delete_by_id::<Task>(-3).unwrap_err();
    assert!(matches!(delete_err, StoreError::InvalidIdentity(-3)));
}

#[test]
fn upsert_inserts_then_replaces() {
    let store = SqliteStore::open_in_memory().unwrap();

    let id = store.upsert(&Task::with_id(12, "v1")).unwrap();
    assert_eq!(id, 12);
    store.upsert(&Task::with_id(12, "v2")).unwrap();

    let ids = store
        .upsert_many(&[Task::with_id(12, "v3"), Task::new("fresh")])
        .unwrap();
    assert_eq!(ids[0], 12);
    assert!(ids[1] > 12);

    let all = store.get_all::<Task>().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].title, "v3");
}

#[test]
fn predicate_queries_are_evaluated_by_the_store() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut done = Task::with_id(3, "done");
    done.done = true;
    store
        .insert_many(&[Task::with_id(1, "open"), done, Task::with_id(7, "open too")])
        .unwrap();

    let first_open = store
        .get_where(&|task: &Task| !task.done)
        .unwrap()
        .unwrap();
    assert_eq!(first_open.id(), 1);

    let open = store.get_all_where(&|task: &Task| !task.done).unwrap();
    assert_eq!(open.len(), 2);
    assert!(store
        .get_where(&|task: &Task| task.title == "missing")
        .unwrap()
        .is_none());

    let removed = store.delete_where(&|task: &Task| !task.done).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.get_all::<Task>().unwrap().len(), 1);
}

#[test]
fn collections_are_isolated_per_record_type() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.insert(&Task::with_id(1, "task")).unwrap();
    store.insert(&Project::with_id(1, "project")).unwrap();

    assert_eq!(store.get_all::<Task>().unwrap().len(), 1);
    let project: Project = store.get_by_id(1).unwrap().unwrap();
    assert_eq!(project.name, "project");
}

#[test]
fn unique_index_rejects_duplicate_field_values() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.ensure_index::<Task>("title", true).unwrap();
    store.ensure_index::<Task>("title", true).unwrap();

    store.insert(&Task::new("same")).unwrap();
    let err = store.insert(&Task::new("same")).unwrap_err();
    assert!(matches!(err, StoreError::Db(DbError::Sqlite(_))));

    store.rebuild_index::<Task>("title", false).unwrap();
    store.insert(&Task::new("same")).unwrap();
    assert_eq!(store.get_all::<Task>().unwrap().len(), 2);
}

#[test]
fn index_and_collection_names_must_be_identifiers() {
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Hostile {
        #[serde(flatten)]
        meta: RecordMeta,
    }

    impl Record for Hostile {
        const COLLECTION: &'static str = "x\"; DROP TABLE tasks; --";

        fn meta(&self) -> &RecordMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut RecordMeta {
            &mut self.meta
        }
    }

    let store = SqliteStore::open_in_memory().unwrap();
    assert!(matches!(
        store.ensure_collection::<Hostile>(),
        Err(StoreError::InvalidName(_))
    ));
    assert!(matches!(
        store.ensure_index::<Task>("title') --", false),
        Err(StoreError::InvalidName(_))
    ));
}

#[test]
fn ensure_collection_leaves_durable_empty_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());

    let store = SqliteStore::open(&config).unwrap();
    store.ensure_collection::<Task>().unwrap();
    store.ensure_collection::<Task>().unwrap();
    store.dispose().unwrap();

    let conn = Connection::open(config.db_path()).unwrap();
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'tasks');",
            [],
            |row| row.get(0),
        )
        .unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM tasks;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(exists, 1);
    assert_eq!(rows, 0);
}

#[test]
fn version_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path()).with_db_name("versioned");

    let store = SqliteStore::open(&config).unwrap();
    assert_eq!(store.version().unwrap(), 0);
    store.set_version(3).unwrap();
    store.rebuild_collection().unwrap();
    store.dispose().unwrap();

    let reopened = SqliteStore::open(&config).unwrap();
    assert_eq!(reopened.version().unwrap(), 3);
}

#[test]
fn direct_mode_rejects_a_second_connection() {
    let dir = tempfile::tempdir().unwrap();
    let config =
        StoreConfig::new(dir.path().join("nested")).with_connection(ConnectionMode::Direct);

    let holder = SqliteStore::open(&config).unwrap();
    assert!(config.db_path().exists());

    let err = SqliteStore::open(&config).err().expect("second open must fail");
    assert!(matches!(err, StoreError::Db(DbError::StoreAccess { .. })));

    holder.dispose().unwrap();
    SqliteStore::open(&config).unwrap();
}

#[test]
fn shared_mode_allows_concurrent_connections() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());
    assert_eq!(config.connection, ConnectionMode::Shared);

    let writer = SqliteStore::open(&config).unwrap();
    let reader = SqliteStore::open(&config).unwrap();

    writer.insert(&Task::with_id(1, "shared")).unwrap();
    let loaded: Task = reader.get_by_id(1).unwrap().unwrap();
    assert_eq!(loaded.title, "shared");
}
