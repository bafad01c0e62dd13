//! Segment row CRUD. A row is written only after its upload has committed;
//! writes are single-row inserts, never batched, so a crash mid-distribution
//! leaves a dense prefix of ordinals rather than a half-written row.

use chrono::Utc;
use rusqlite::{params, Connection};
use vaultcast_common::{AccountId, Error, Result, VideoId};

use crate::models::Segment;

/// Insert one segment row inside its own short transaction (the caller opens it).
pub fn insert(
    conn: &Connection,
    video_id: &VideoId,
    ordinal: i64,
    filename: &str,
    duration_secs: f64,
    byte_size: i64,
    handle: &str,
    account_id: &AccountId,
) -> Result<Segment> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO segments (video_id, ordinal, filename, duration_secs, byte_size, handle,
                                account_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            video_id.as_str(),
            ordinal,
            filename,
            duration_secs,
            byte_size,
            handle,
            account_id.as_str(),
            now.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Segment {
        video_id: video_id.clone(),
        ordinal,
        filename: filename.to_string(),
        duration_secs,
        byte_size,
        handle: handle.to_string(),
        account_id: account_id.clone(),
        created_at: now,
    })
}

pub fn get(conn: &Connection, video_id: &VideoId, ordinal: i64) -> Result<Segment> {
    conn.query_row(
        "SELECT video_id, ordinal, filename, duration_secs, byte_size, handle, account_id,
                created_at
         FROM segments WHERE video_id = ? AND ordinal = ?",
        params![video_id.as_str(), ordinal],
        row_to_segment,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            Error::not_found(format!("{video_id}/{ordinal}"))
        }
        _ => Error::database(e.to_string()),
    })
}

/// All segments of a video in ordinal order.
pub fn list(conn: &Connection, video_id: &VideoId) -> Result<Vec<Segment>> {
    let mut stmt = conn
        .prepare(
            "SELECT video_id, ordinal, filename, duration_secs, byte_size, handle, account_id,
                    created_at
             FROM segments WHERE video_id = ? ORDER BY ordinal ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([video_id.as_str()], row_to_segment)
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

pub fn count(conn: &Connection, video_id: &VideoId) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM segments WHERE video_id = ?",
        [video_id.as_str()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Delete every segment row belonging to a video (used when aborting a
/// partial ingest; the `videos` row delete alone already cascades this for
/// the committed-delete path).
pub fn delete_all(conn: &Connection, video_id: &VideoId) -> Result<usize> {
    conn.execute("DELETE FROM segments WHERE video_id = ?", [video_id.as_str()])
        .map_err(|e| Error::database(e.to_string()))
}

fn row_to_segment(row: &rusqlite::Row) -> rusqlite::Result<Segment> {
    let created_at: String = row.get(7)?;
    Ok(Segment {
        video_id: VideoId::new(row.get::<_, String>(0)?),
        ordinal: row.get(1)?,
        filename: row.get(2)?,
        duration_secs: row.get(3)?,
        byte_size: row.get(4)?,
        handle: row.get(5)?,
        account_id: AccountId::new(row.get::<_, String>(6)?),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::videos;

    fn setup(conn: &Connection) -> VideoId {
        let id = VideoId::new("sample");
        videos::create_processing(conn, &id, "sample.mp4", "mp4").unwrap();
        id
    }

    #[test]
    fn insert_and_list_preserves_ordinal_order() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = setup(&conn);

        for i in [2, 0, 1] {
            insert(
                &conn,
                &id,
                i,
                &format!("{i:05}.ts"),
                5.0,
                1_000_000,
                &format!("handle-{i}"),
                &AccountId::new("acct-0"),
            )
            .unwrap();
        }

        let segments = list(&conn, &id).unwrap();
        let ordinals: Vec<i64> = segments.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }

    #[test]
    fn account_id_is_returned_unchanged() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = setup(&conn);
        insert(&conn, &id, 0, "00000.ts", 5.0, 1_000, "h1", &AccountId::new("acct-7")).unwrap();

        let seg = get(&conn, &id, 0).unwrap();
        assert_eq!(seg.account_id, AccountId::new("acct-7"));
    }

    #[test]
    fn cascades_when_video_deleted() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = setup(&conn);
        insert(&conn, &id, 0, "00000.ts", 5.0, 1_000, "h1", &AccountId::new("acct-0")).unwrap();

        videos::delete(&conn, &id).unwrap();
        assert_eq!(count(&conn, &id).unwrap(), 0);
    }
}
