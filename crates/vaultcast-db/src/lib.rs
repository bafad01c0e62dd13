//! The catalog's metadata store: SQLite via rusqlite, pooled with r2d2.
//!
//! - `migrations` — embedded, version-tracked schema migrations.
//! - `pool` — connection pool construction.
//! - `models` — Rust structs matching the three tables.
//! - `queries` — per-table CRUD.
//!
//! ```no_run
//! use vaultcast_db::pool::{init_pool, get_conn};
//! use vaultcast_db::queries::videos;
//! use vaultcast_common::VideoId;
//!
//! let pool = init_pool("/var/lib/vaultcast/catalog.sqlite").unwrap();
//! let conn = get_conn(&pool).unwrap();
//! videos::create_processing(&conn, &VideoId::new("sample"), "sample.mp4", "mp4").unwrap();
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
