//! Embedded schema migrations.
//!
//! Each migration is a SQL file compiled into the binary and identified by
//! its file stem. Applied names are recorded in `_inkwell_migrations`. A
//! database that records a name this build does not ship was migrated by a
//! newer Inkwell and is refused rather than silently downgraded.

use std::collections::BTreeSet;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// Schema history, oldest first. Append only.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_categories",
        sql: include_str!("migrations/001_categories.sql"),
    },
    Migration {
        name: "002_posts",
        sql: include_str!("migrations/002_posts.sql"),
    },
];

const TRACKING_TABLE: &str = "CREATE TABLE IF NOT EXISTS _inkwell_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

/// Errors that can occur while migrating the schema.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The tracking table could not be created.
    #[error("failed to create migration tracking table: {0}")]
    Bootstrap(rusqlite::Error),

    /// The set of applied migrations could not be read.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),

    /// The database records a migration this build does not know.
    #[error("database was migrated by a newer version (unknown migration '{0}')")]
    UnknownApplied(String),

    /// A migration's SQL or its tracking row failed; nothing of it was kept.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },
}

/// Applies every pending migration and returns how many ran.
///
/// # Errors
///
/// Returns `MigrationError` if the tracking state cannot be read, the
/// database is ahead of this build, or a migration fails.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    conn.execute_batch(TRACKING_TABLE)
        .map_err(MigrationError::Bootstrap)?;

    let applied = applied_names(conn)?;
    if let Some(unknown) = applied
        .iter()
        .find(|name| !migrations.iter().any(|m| m.name == name.as_str()))
    {
        return Err(MigrationError::UnknownApplied(unknown.clone()));
    }

    let mut count = 0;
    for migration in migrations {
        if applied.contains(migration.name) {
            tracing::debug!(migration = migration.name, "migration already applied");
            continue;
        }
        apply(conn, migration)?;
        count += 1;
    }

    Ok(count)
}

fn applied_names(conn: &Connection) -> Result<BTreeSet<String>, MigrationError> {
    let mut stmt = conn
        .prepare("SELECT name FROM _inkwell_migrations")
        .map_err(MigrationError::StateQuery)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<BTreeSet<_>>>())
        .map_err(MigrationError::StateQuery)?;
    Ok(names)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), MigrationError> {
    tracing::info!(migration = migration.name, "applying migration");

    let failed = |source: rusqlite::Error| MigrationError::ExecutionFailed {
        name: migration.name.to_string(),
        source,
    };

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(failed)?;
    tx.execute_batch(migration.sql).map_err(failed)?;
    tx.execute(
        "INSERT INTO _inkwell_migrations (name) VALUES (?1)",
        [migration.name],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("should enable foreign keys");
        conn
    }

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table],
            |row| row.get(0),
        )
        .expect("should query sqlite_master")
    }

    #[test]
    fn applies_all_then_nothing() {
        let conn = fresh();
        assert_eq!(run_migrations(&conn).expect("first run"), MIGRATIONS.len());
        assert_eq!(run_migrations(&conn).expect("second run"), 0);

        let recorded = applied_names(&conn).expect("should read applied names");
        let expected: BTreeSet<String> = MIGRATIONS.iter().map(|m| m.name.to_string()).collect();
        assert_eq!(recorded, expected);
    }

    #[test]
    fn creates_blog_tables() {
        let conn = fresh();
        run_migrations(&conn).expect("migrations should succeed");

        assert!(table_exists(&conn, "categories"));
        assert!(table_exists(&conn, "posts"));
    }

    #[test]
    fn applies_only_the_pending_tail() {
        let conn = fresh();
        assert_eq!(
            run_migrations_from_list(&conn, &MIGRATIONS[..1]).expect("partial run"),
            1
        );
        assert!(!table_exists(&conn, "posts"));

        assert_eq!(run_migrations(&conn).expect("full run"), 1);
        assert!(table_exists(&conn, "posts"));
    }

    #[test]
    fn refuses_database_from_newer_build() {
        let conn = fresh();
        run_migrations(&conn).expect("migrations should succeed");
        conn.execute(
            "INSERT INTO _inkwell_migrations (name) VALUES ('003_post_tags')",
            [],
        )
        .expect("should record a future migration");

        match run_migrations(&conn) {
            Err(MigrationError::UnknownApplied(name)) => assert_eq!(name, "003_post_tags"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn category_names_are_unique() {
        let conn = fresh();
        run_migrations(&conn).expect("migrations should succeed");

        conn.execute("INSERT INTO categories (name) VALUES ('Tech')", [])
            .expect("first insert should succeed");
        let err = conn
            .execute("INSERT INTO categories (name) VALUES ('Tech')", [])
            .expect_err("duplicate name should be rejected");
        assert!(
            matches!(
                err,
                rusqlite::Error::SqliteFailure(ref e, _)
                    if e.code == rusqlite::ffi::ErrorCode::ConstraintViolation
            ),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn posts_require_existing_category() {
        let conn = fresh();
        run_migrations(&conn).expect("migrations should succeed");

        let result = conn.execute(
            "INSERT INTO posts (title, description, category_id, created_at)
             VALUES ('A', 'd', 42, '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err(), "dangling category_id should be rejected");
    }

    #[test]
    fn failed_migration_leaves_no_schema_behind() {
        let conn = fresh();
        let broken = [Migration {
            name: "001_half_written",
            sql: "
                CREATE TABLE half_written (id INTEGER PRIMARY KEY);
                INSERT INTO missing_table VALUES (1);
            ",
        }];

        match run_migrations_from_list(&conn, &broken) {
            Err(MigrationError::ExecutionFailed { name, .. }) => {
                assert_eq!(name, "001_half_written")
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(!table_exists(&conn, "half_written"));
        assert!(applied_names(&conn).expect("should read").is_empty());
    }
}
