//! SQLite schema definition for the dinner database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, Schema, SqlType, Table, DEFAULT_TIMESTAMP};

/// Scheduled dinners. Append-only: nothing updates or deletes rows.
const DINNERS_TABLE: Table = Table {
    name: "dinners",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("date", &SqlType::Text, non_null = true),
        sqlite_column!("time", &SqlType::Text, non_null = true),
        sqlite_column!("attendees", &SqlType::Text, non_null = true),
    ],
};

/// Household members with their online flag.
const FAMILY_MEMBERS_TABLE: Table = Table {
    name: "family_members",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("role", &SqlType::Text, non_null = true),
        sqlite_column!(
            "is_online",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
};

/// Conversation starters, populated once by the seed.
const TOPICS_TABLE: Table = Table {
    name: "topics",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("text", &SqlType::Text, non_null = true),
        sqlite_column!("category", &SqlType::Text, non_null = true),
        sqlite_column!(
            "last_used",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
};

pub const DINNER_DB_SCHEMA: Schema = Schema {
    version: 1,
    tables: &[DINNERS_TABLE, FAMILY_MEMBERS_TABLE, TOPICS_TABLE],
};

/// Topics inserted at first-ever database creation.
pub(crate) const SEED_TOPICS: &[(&str, &str)] = &[
    ("What was the best part of your day?", "Gratitude"),
    ("If you could have any superpower, what would it be?", "Creative"),
    ("What is one goal you want to achieve this week?", "Goals"),
    ("Tell us a funny joke!", "Random"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_creates_and_checks_clean() {
        let conn = Connection::open_in_memory().unwrap();
        DINNER_DB_SCHEMA.create(&conn).unwrap();
        assert_eq!(DINNER_DB_SCHEMA.check(&conn).unwrap(), None);
    }

    #[test]
    fn test_member_online_flag_defaults_to_offline() {
        let conn = Connection::open_in_memory().unwrap();
        DINNER_DB_SCHEMA.create(&conn).unwrap();

        conn.execute(
            "INSERT INTO family_members (name, role) VALUES ('Anna', 'parent')",
            [],
        )
        .unwrap();
        let online: i64 = conn
            .query_row("SELECT is_online FROM family_members", [], |r| r.get(0))
            .unwrap();
        assert_eq!(online, 0);
    }

    #[test]
    fn test_topic_last_used_gets_a_default_stamp() {
        let conn = Connection::open_in_memory().unwrap();
        DINNER_DB_SCHEMA.create(&conn).unwrap();

        conn.execute(
            "INSERT INTO topics (text, category) VALUES ('t', 'c')",
            [],
        )
        .unwrap();
        let last_used: i64 = conn
            .query_row("SELECT last_used FROM topics", [], |r| r.get(0))
            .unwrap();
        assert!(last_used > 0);
    }

    #[test]
    fn test_seed_list_spans_four_categories() {
        let categories: std::collections::HashSet<_> =
            SEED_TOPICS.iter().map(|(_, category)| *category).collect();
        assert_eq!(SEED_TOPICS.len(), 4);
        assert_eq!(categories.len(), 4);
    }
}
