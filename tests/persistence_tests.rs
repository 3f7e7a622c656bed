//! Durability and schema-recovery tests against a real database file.

use tavolata::dinner_store::{DinnerStore, SqliteDinnerStore};
use tempfile::TempDir;

#[test]
fn test_reopened_store_preserves_committed_rows() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("dinner.db");

    let member_id = {
        let store = SqliteDinnerStore::new(&db_path).unwrap();
        store
            .insert_dinner("2026-08-07", "19:30", "Anna, Luca")
            .unwrap();
        store.insert_family_member("Anna", "parent").unwrap();
        let anna = store.list_family_members().unwrap().remove(0);
        store.update_member_status(anna.id, true).unwrap();
        anna.id
    };

    let store = SqliteDinnerStore::new(&db_path).unwrap();

    let dinners = store.list_dinners().unwrap();
    assert_eq!(dinners.len(), 1);
    assert_eq!(dinners[0].attendees, "Anna, Luca");

    let members = store.list_family_members().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, member_id);
    assert!(members[0].is_online);
}

#[test]
fn test_reopening_does_not_reseed_topics() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("dinner.db");

    let first_ids: Vec<i64> = {
        let store = SqliteDinnerStore::new(&db_path).unwrap();
        assert_eq!(store.stats().unwrap().topics, 4);
        let mut ids = Vec::new();
        // Collect all seeded ids through the random picker; four distinct
        // ids must exist and stay stable across reopen.
        for _ in 0..1000 {
            if ids.len() == 4 {
                break;
            }
            let topic = store.random_topic().unwrap().unwrap();
            if !ids.contains(&topic.id) {
                ids.push(topic.id);
            }
        }
        assert_eq!(ids.len(), 4);
        ids
    };

    let store = SqliteDinnerStore::new(&db_path).unwrap();
    assert_eq!(store.stats().unwrap().topics, 4);
    let topic = store.random_topic().unwrap().unwrap();
    assert!(first_ids.contains(&topic.id));
}

#[test]
fn test_dinner_ids_keep_increasing_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("dinner.db");

    let first_id = {
        let store = SqliteDinnerStore::new(&db_path).unwrap();
        store.insert_dinner("2026-08-01", "18:00", "Anna").unwrap();
        store.list_dinners().unwrap()[0].id
    };

    let store = SqliteDinnerStore::new(&db_path).unwrap();
    store.insert_dinner("2026-08-02", "18:00", "Luca").unwrap();

    let dinners = store.list_dinners().unwrap();
    assert_eq!(dinners.len(), 2);
    assert!(dinners[0].id > first_id);
    assert_eq!(dinners[0].date, "2026-08-02");
}

#[test]
fn test_mismatched_schema_is_destroyed_and_recreated() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("dinner.db");

    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute(
            "CREATE TABLE dinners (id INTEGER PRIMARY KEY, junk TEXT)",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO dinners (junk) VALUES ('legacy')", [])
            .unwrap();
        conn.execute("PRAGMA user_version = 1", []).unwrap();
    }

    let store = SqliteDinnerStore::new(&db_path).unwrap();

    // Legacy content is gone, fresh tables are seeded
    assert!(store.list_dinners().unwrap().is_empty());
    assert!(store.list_family_members().unwrap().is_empty());
    assert_eq!(store.stats().unwrap().topics, 4);
    store
        .insert_dinner("2026-08-07", "19:30", "Anna")
        .unwrap();
    assert_eq!(store.list_dinners().unwrap().len(), 1);
}

#[test]
fn test_outdated_version_stamp_is_destroyed_and_recreated() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("dinner.db");

    {
        let store = SqliteDinnerStore::new(&db_path).unwrap();
        store.insert_family_member("Anna", "parent").unwrap();
    }
    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute("PRAGMA user_version = 99", []).unwrap();
    }

    let store = SqliteDinnerStore::new(&db_path).unwrap();
    assert!(store.list_family_members().unwrap().is_empty());
    assert_eq!(store.stats().unwrap().topics, 4);
}
