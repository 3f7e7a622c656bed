//! SQLite-backed dinner store implementation.

use super::models::{Dinner, FamilyMember, StoreStats, Topic};
use super::schema::{DINNER_DB_SCHEMA, SEED_TOPICS};
use super::DinnerStore;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info};

/// SQLite-backed dinner store.
///
/// Holds one write connection and one read connection, both in WAL mode.
/// Every committed mutation republishes the affected table snapshot on the
/// corresponding watch channel while the write lock is still held, so
/// subscribers observe committed states in commit order.
#[derive(Clone)]
pub struct SqliteDinnerStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
    dinners_tx: Arc<watch::Sender<Vec<Dinner>>>,
    members_tx: Arc<watch::Sender<Vec<FamilyMember>>>,
}

impl SqliteDinnerStore {
    /// Opens (or creates) the dinner database at `db_path`.
    ///
    /// A database whose schema no longer matches is destroyed and recreated.
    /// The topic seed runs only when the tables were freshly (re)created.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open dinner database")?;

        let fresh = DINNER_DB_SCHEMA.ensure(&write_conn)?;
        if fresh {
            info!(
                "Created dinner db schema at version {}",
                DINNER_DB_SCHEMA.version
            );
        }

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on dinner write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open dinner database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on dinner read connection")?;

        let initial_dinners = query_dinners(&write_conn)?;
        let initial_members = query_family_members(&write_conn)?;
        let (dinners_tx, _) = watch::channel(initial_dinners);
        let (members_tx, _) = watch::channel(initial_members);

        let store = Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
            dinners_tx: Arc::new(dinners_tx),
            members_tx: Arc::new(members_tx),
        };

        if fresh {
            store.seed_topics_if_empty()?;
        }

        let stats = store.stats()?;
        info!(
            "Dinner store ready: {} dinners, {} family members, {} topics",
            stats.dinners, stats.family_members, stats.topics
        );

        Ok(store)
    }

    fn publish_dinners(&self, conn: &Connection) -> Result<()> {
        self.dinners_tx.send_replace(query_dinners(conn)?);
        Ok(())
    }

    fn publish_family_members(&self, conn: &Connection) -> Result<()> {
        self.members_tx.send_replace(query_family_members(conn)?);
        Ok(())
    }
}

fn query_dinners(conn: &Connection) -> Result<Vec<Dinner>> {
    let mut stmt =
        conn.prepare_cached("SELECT id, date, time, attendees FROM dinners ORDER BY id DESC")?;
    let dinners = stmt
        .query_map([], |row| {
            Ok(Dinner {
                id: row.get(0)?,
                date: row.get(1)?,
                time: row.get(2)?,
                attendees: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<_, _>>()?;
    Ok(dinners)
}

fn query_family_members(conn: &Connection) -> Result<Vec<FamilyMember>> {
    let mut stmt = conn
        .prepare_cached("SELECT id, name, role, is_online FROM family_members ORDER BY id")?;
    let members = stmt
        .query_map([], |row| {
            Ok(FamilyMember {
                id: row.get(0)?,
                name: row.get(1)?,
                role: row.get(2)?,
                is_online: row.get::<_, i64>(3)? != 0,
            })
        })?
        .collect::<std::result::Result<_, _>>()?;
    Ok(members)
}

impl DinnerStore for SqliteDinnerStore {
    fn list_dinners(&self) -> Result<Vec<Dinner>> {
        let conn = self.read_conn.lock().unwrap();
        query_dinners(&conn)
    }

    fn list_family_members(&self) -> Result<Vec<FamilyMember>> {
        let conn = self.read_conn.lock().unwrap();
        query_family_members(&conn)
    }

    fn watch_dinners(&self) -> watch::Receiver<Vec<Dinner>> {
        self.dinners_tx.subscribe()
    }

    fn watch_family_members(&self) -> watch::Receiver<Vec<FamilyMember>> {
        self.members_tx.subscribe()
    }

    fn insert_dinner(&self, date: &str, time: &str, attendees: &str) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO dinners (date, time, attendees) VALUES (?1, ?2, ?3)",
            params![date, time, attendees],
        )?;
        self.publish_dinners(&conn)
    }

    fn insert_family_member(&self, name: &str, role: &str) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO family_members (name, role) VALUES (?1, ?2)",
            params![name, role],
        )?;
        self.publish_family_members(&conn)
    }

    fn update_member_status(&self, id: i64, online: bool) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE family_members SET is_online = ?1 WHERE id = ?2",
            params![online as i64, id],
        )?;
        if updated == 0 {
            debug!("Status update for unknown family member id {}", id);
            return Ok(());
        }
        self.publish_family_members(&conn)
    }

    fn delete_family_member(&self, member: &FamilyMember) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM family_members WHERE id = ?1",
            params![member.id],
        )?;
        if deleted == 0 {
            debug!("Delete for already absent family member id {}", member.id);
            return Ok(());
        }
        self.publish_family_members(&conn)
    }

    fn random_topic(&self) -> Result<Option<Topic>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, text, category, last_used FROM topics ORDER BY RANDOM() LIMIT 1",
        )?;
        let topic = stmt
            .query_row([], |row| {
                Ok(Topic {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    category: row.get(2)?,
                    last_used: row.get(3)?,
                })
            })
            .optional()?;
        Ok(topic)
    }

    fn seed_topics_if_empty(&self) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        // The count check and the inserts share one transaction, so two
        // stores racing on a fresh file cannot both populate the table.
        let tx = conn.unchecked_transaction()?;
        let existing: i64 = tx.query_row("SELECT COUNT(*) FROM topics", [], |r| r.get(0))?;
        if existing == 0 {
            let mut stmt =
                tx.prepare_cached("INSERT INTO topics (text, category) VALUES (?1, ?2)")?;
            for (text, category) in SEED_TOPICS {
                stmt.execute(params![text, category])?;
            }
            drop(stmt);
            info!("Seeded {} conversation topics", SEED_TOPICS.len());
        }
        tx.commit()?;
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.read_conn.lock().unwrap();
        let dinners: usize = conn.query_row("SELECT COUNT(*) FROM dinners", [], |r| r.get(0))?;
        let family_members: usize =
            conn.query_row("SELECT COUNT(*) FROM family_members", [], |r| r.get(0))?;
        let topics: usize = conn.query_row("SELECT COUNT(*) FROM topics", [], |r| r.get(0))?;
        Ok(StoreStats {
            dinners,
            family_members,
            topics,
        })
    }
}
