//! Database layer for Inkwell.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. Every table Inkwell reads or writes is
//! created through versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: an embedded, file-backed store with no
//!   external database process. WAL mode allows concurrent readers with a
//!   single writer, which matches a request-per-call blog workload.
//! - **`r2d2` connection pool**: each request borrows a connection and the
//!   guard returns it to the pool on drop, on success and error paths alike.
//!   [`open_pool`] migrates before returning, and in-memory stores are held
//!   to one connection so the schema is never split across private databases.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so the schema ships with the code that depends on it.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, is_in_memory, open_pool, DbPool, DbRuntimeSettings, PoolError};
