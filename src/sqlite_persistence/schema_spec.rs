use anyhow::Result;
use rusqlite::{params, types::Type, Connection};

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // Allow unused_mut because the variable is only mutated when optional
            // field assignments are passed to the macro (e.g., `is_primary_key = true`)
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                default_value: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
}

pub struct Column<'a, S: AsRef<str>> {
    pub name: S,
    pub sql_type: &'a SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub default_value: Option<S>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column<'static, &'static str>],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut create_sql = format!("CREATE TABLE {} (", self.name);
        for (column_index, column) in self.columns.iter().enumerate() {
            if column_index > 0 {
                create_sql.push_str(", ");
            }
            create_sql.push_str(&format!(
                "{} {}",
                column.name,
                match column.sql_type {
                    SqlType::Text => "TEXT",
                    SqlType::Integer => "INTEGER",
                }
            ));
            if column.is_primary_key {
                create_sql.push_str(" PRIMARY KEY");
            }
            if column.non_null {
                create_sql.push_str(" NOT NULL");
            }
            if let Some(default_value) = column.default_value {
                create_sql.push_str(&format!(" DEFAULT {}", default_value));
            }
        }
        create_sql.push_str(");");
        conn.execute(&create_sql, params![])?;
        Ok(())
    }
}

/// A full database schema at a single version.
///
/// There is no migration path: a database whose version or table shapes
/// do not match is destroyed and recreated from scratch by
/// [`Schema::ensure`].
pub struct Schema {
    pub version: usize,
    pub tables: &'static [Table],
}

fn strip_leading_and_trailing_parentheses<S: AsRef<str>>(s: S) -> String {
    let s = s.as_ref();
    if s.starts_with('(') && s.ends_with(')') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

impl Schema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(&format!("PRAGMA user_version = {}", self.version), [])?;
        Ok(())
    }

    /// Compares the live database against this schema.
    ///
    /// Returns `Ok(None)` on a match, `Ok(Some(reason))` describing the first
    /// mismatch found, and `Err` only for actual I/O failures.
    pub fn check(&self, conn: &Connection) -> Result<Option<String>> {
        let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if db_version != self.version as i64 {
            return Ok(Some(format!(
                "database version is {}, expected {}",
                db_version, self.version
            )));
        }

        for table in self.tables {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", table.name))?;
            let actual_columns: Vec<Column<'_, String>> = stmt
                .query_map(params![], |row| {
                    let name = row.get::<usize, String>(1)?;
                    let sql_type = match row.get::<_, String>(2)?.as_str() {
                        "TEXT" => &SqlType::Text,
                        "INTEGER" => &SqlType::Integer,
                        _ => {
                            return Err(rusqlite::Error::InvalidColumnType(
                                2,
                                "".to_string(),
                                Type::Text,
                            ))
                        }
                    };
                    Ok(Column {
                        name,
                        sql_type,
                        non_null: row.get::<_, i32>(3)? == 1,
                        default_value: row.get::<_, Option<String>>(4)?,
                        is_primary_key: row.get::<_, i32>(5)? == 1,
                    })
                })?
                .collect::<std::result::Result<_, _>>()?;

            if actual_columns.len() != table.columns.len() {
                return Ok(Some(format!(
                    "table {} has {} columns, expected {}",
                    table.name,
                    actual_columns.len(),
                    table.columns.len()
                )));
            }

            for (actual, expected) in actual_columns.iter().zip(table.columns.iter()) {
                if actual.name != expected.name {
                    return Ok(Some(format!(
                        "table {} column name mismatch: expected {}, got {}",
                        table.name, expected.name, actual.name
                    )));
                }
                if actual.sql_type != expected.sql_type {
                    return Ok(Some(format!(
                        "table {} column {} type mismatch: expected {:?}, got {:?}",
                        table.name, expected.name, expected.sql_type, actual.sql_type
                    )));
                }
                if actual.non_null != expected.non_null {
                    return Ok(Some(format!(
                        "table {} column {} non-null mismatch",
                        table.name, expected.name
                    )));
                }
                // Default values might be wrapped in parentheses, so we strip them
                // before comparing
                if actual
                    .default_value
                    .as_ref()
                    .map(strip_leading_and_trailing_parentheses)
                    != expected
                        .default_value
                        .map(strip_leading_and_trailing_parentheses)
                {
                    return Ok(Some(format!(
                        "table {} column {} default value mismatch",
                        table.name, expected.name
                    )));
                }
                if actual.is_primary_key != expected.is_primary_key {
                    return Ok(Some(format!(
                        "table {} column {} primary key mismatch",
                        table.name, expected.name
                    )));
                }
            }
        }
        Ok(None)
    }

    /// Brings the database in line with this schema.
    ///
    /// An empty database is created fresh. A matching database is left
    /// untouched. Anything else is dropped wholesale and recreated.
    /// Returns `true` when the tables were (re)created, so the caller knows
    /// to run any seed population.
    pub fn ensure(&self, conn: &Connection) -> Result<bool> {
        let table_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )?;
        if table_count == 0 {
            self.create(conn)?;
            return Ok(true);
        }

        match self.check(conn)? {
            None => Ok(false),
            Some(_reason) => {
                self.destroy(conn)?;
                self.create(conn)?;
                Ok(true)
            }
        }
    }

    fn destroy(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let table_names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);
        for name in table_names {
            conn.execute(&format!("DROP TABLE {};", name), [])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SCHEMA: Schema = Schema {
        version: 3,
        tables: &[Table {
            name: "test_table",
            columns: &[
                sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
                sqlite_column!("name", &SqlType::Text, non_null = true),
                sqlite_column!("count", &SqlType::Integer, non_null = true, default_value = Some("0")),
            ],
        }],
    };

    #[test]
    fn test_create_then_check_matches() {
        let conn = Connection::open_in_memory().unwrap();
        TEST_SCHEMA.create(&conn).unwrap();
        assert_eq!(TEST_SCHEMA.check(&conn).unwrap(), None);
    }

    #[test]
    fn test_check_detects_version_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        TEST_SCHEMA.create(&conn).unwrap();
        conn.execute("PRAGMA user_version = 7", []).unwrap();

        let reason = TEST_SCHEMA.check(&conn).unwrap().unwrap();
        assert!(reason.contains("version"));
    }

    #[test]
    fn test_check_detects_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE test_table (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            [],
        )
        .unwrap();
        conn.execute("PRAGMA user_version = 3", []).unwrap();

        let reason = TEST_SCHEMA.check(&conn).unwrap().unwrap();
        assert!(reason.contains("columns"));
    }

    #[test]
    fn test_check_detects_type_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE test_table (id INTEGER PRIMARY KEY, name INTEGER NOT NULL, count INTEGER NOT NULL DEFAULT 0)",
            [],
        )
        .unwrap();
        conn.execute("PRAGMA user_version = 3", []).unwrap();

        let reason = TEST_SCHEMA.check(&conn).unwrap().unwrap();
        assert!(reason.contains("type mismatch"));
    }

    #[test]
    fn test_ensure_creates_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(TEST_SCHEMA.ensure(&conn).unwrap());
        assert_eq!(TEST_SCHEMA.check(&conn).unwrap(), None);
    }

    #[test]
    fn test_ensure_leaves_matching_database_untouched() {
        let conn = Connection::open_in_memory().unwrap();
        TEST_SCHEMA.create(&conn).unwrap();
        conn.execute("INSERT INTO test_table (name) VALUES ('kept')", [])
            .unwrap();

        assert!(!TEST_SCHEMA.ensure(&conn).unwrap());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM test_table", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_ensure_destroys_and_recreates_on_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE test_table (id INTEGER PRIMARY KEY, legacy TEXT)", [])
            .unwrap();
        conn.execute("CREATE TABLE stray_table (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        conn.execute("INSERT INTO test_table (legacy) VALUES ('old')", [])
            .unwrap();
        conn.execute("PRAGMA user_version = 1", []).unwrap();

        assert!(TEST_SCHEMA.ensure(&conn).unwrap());
        assert_eq!(TEST_SCHEMA.check(&conn).unwrap(), None);

        // Old rows and stray tables are gone
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM test_table", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
        let stray: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='stray_table'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(stray, 0);
    }

    #[test]
    fn test_default_timestamp_is_applied() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            &format!(
                "CREATE TABLE stamped (id INTEGER PRIMARY KEY, at INTEGER NOT NULL DEFAULT {})",
                DEFAULT_TIMESTAMP
            ),
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO stamped DEFAULT VALUES", []).unwrap();

        let at: i64 = conn
            .query_row("SELECT at FROM stamped", [], |r| r.get(0))
            .unwrap();
        assert!(at > 0);
    }
}
