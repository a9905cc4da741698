//! Connection pool for the Inkwell store.
//!
//! [`open_pool`] is the entry point the server uses: it builds the pool,
//! migrates the schema through the first checkout, and hands back a pool
//! whose every connection sees the `categories` and `posts` tables.
//!
//! An in-memory path (`:memory:` or the empty string) gives every SQLite
//! connection its own private database. Such pools are pinned to exactly one
//! long-lived connection so that the migrated schema and all written rows
//! stay visible for the life of the pool.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

use crate::migrations::{run_migrations, MigrationError};

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections. Ignored for in-memory stores,
    /// which always use one.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// The SQLite connection pool shared by request handlers.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors that can occur while opening the store.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to build the connection pool.
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),

    /// The pool was built but no connection could be checked out to migrate.
    #[error("failed to check out a connection for migrations: {0}")]
    Checkout(r2d2::Error),

    /// The schema could not be brought up to date.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Whether `db_path` names a per-connection private database.
pub fn is_in_memory(db_path: &str) -> bool {
    let path = db_path.trim();
    path.is_empty() || path == ":memory:"
}

/// Builds a pool over `db_path` without touching the schema.
///
/// File-backed stores run in WAL mode so readers never block the single
/// writer. In-memory stores get one connection that is never recycled.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if the first connection cannot be opened
/// and configured.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let in_memory = is_in_memory(db_path);
    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);

    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| init_connection(conn, busy_timeout, in_memory));

    let builder = Pool::builder();
    let pool = if in_memory {
        if settings.pool_max_size != 1 {
            tracing::info!(
                requested = settings.pool_max_size,
                "in-memory store uses a single pooled connection"
            );
        }
        builder
            .max_size(1)
            .min_idle(Some(1))
            .max_lifetime(None)
            .idle_timeout(None)
            .build(manager)?
    } else {
        builder.max_size(settings.pool_max_size).build(manager)?
    };

    tracing::debug!(
        path = db_path,
        in_memory,
        max_size = pool.max_size(),
        "database pool created"
    );

    Ok(pool)
}

/// Builds the pool and applies pending migrations before returning it.
///
/// # Errors
///
/// Returns `PoolError` if the pool cannot be built, no connection can be
/// checked out, or a migration fails.
pub fn open_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let pool = create_pool(db_path, settings)?;

    {
        let conn = pool.get().map_err(PoolError::Checkout)?;
        let applied = run_migrations(&conn)?;
        if applied > 0 {
            tracing::info!(count = applied, path = db_path, "applied database migrations");
        }
    }

    Ok(pool)
}

fn init_connection(
    conn: &mut Connection,
    busy_timeout: Duration,
    in_memory: bool,
) -> rusqlite::Result<()> {
    if !in_memory {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("journal_mode WAL was refused, got {mode}")),
            ));
        }
    }
    // Posts reference categories; the foreign key is only enforced when on.
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(busy_timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_posts_table(conn: &Connection) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'posts')",
            [],
            |row| row.get(0),
        )
        .expect("should query sqlite_master")
    }

    #[test]
    fn recognizes_in_memory_paths() {
        assert!(is_in_memory(":memory:"));
        assert!(is_in_memory(""));
        assert!(is_in_memory(" :memory: "));
        assert!(!is_in_memory("inkwell.db"));
        assert!(!is_in_memory("/var/lib/inkwell/memory.db"));
    }

    #[test]
    fn in_memory_pool_is_pinned_to_one_connection() {
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 2_500,
            pool_max_size: 8,
        };

        let pool = create_pool(":memory:", settings).expect("pool creation should succeed");
        assert_eq!(pool.max_size(), 1);

        let conn = pool.get().expect("should get a connection");
        let fk: bool = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .expect("should query foreign_keys");
        assert!(fk, "foreign keys should be enabled");

        let busy_timeout: i64 = conn
            .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
            .expect("should query busy_timeout");
        assert_eq!(busy_timeout, 2_500);
    }

    #[test]
    fn in_memory_schema_is_visible_on_later_checkouts() {
        let pool =
            open_pool(":memory:", DbRuntimeSettings::default()).expect("open should succeed");

        for _ in 0..3 {
            let conn = pool.get().expect("should get a connection");
            assert!(has_posts_table(&conn));
            conn.execute("INSERT INTO categories (name) VALUES (hex(randomblob(8)))", [])
                .expect("insert should succeed");
        }

        let conn = pool.get().expect("should get a connection");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
            .expect("should count categories");
        assert_eq!(count, 3, "rows written through earlier checkouts persist");
    }

    #[test]
    fn file_pool_honours_size_and_uses_wal() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("wal.db");
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 1_000,
            pool_max_size: 3,
        };

        let pool = open_pool(path.to_str().expect("temp path should be utf-8"), settings)
            .expect("open should succeed");
        assert_eq!(pool.max_size(), 3);

        let first = pool.get().expect("should get a connection");
        let second = pool.get().expect("should get a second connection");
        assert!(has_posts_table(&second), "every file connection sees the schema");

        let mode: String = first
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .expect("should query journal_mode");
        assert_eq!(mode, "wal");
    }
}
