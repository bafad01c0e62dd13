//! Database connection pool management.
//!
//! SQLite over r2d2: one writer at a time (SQLite's own locking serializes
//! writes), but many readers can proceed concurrently once WAL-friendly
//! pragmas are set.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use vaultcast_common::{Error, Result};

use crate::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

fn init_pragmas(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;",
    )
}

/// Open (creating if necessary) the database file at `db_path`, run pending
/// migrations, and return a pool of connections.
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(init_pragmas);

    let pool = Pool::builder()
        .max_size(8)
        .build(manager)
        .map_err(|e| Error::database(format!("failed to create connection pool: {e}")))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("failed to get connection for migrations: {e}")))?;

    migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("failed to run migrations: {e}")))?;

    Ok(pool)
}

/// In-memory pool for tests: lost on drop, migrated the same way as a real file.
pub fn init_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(init_pragmas);

    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::database(format!("failed to create in-memory pool: {e}")))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("failed to get connection for migrations: {e}")))?;

    migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("failed to run migrations: {e}")))?;

    Ok(pool)
}

pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("failed to get connection from pool: {e}")))
}
