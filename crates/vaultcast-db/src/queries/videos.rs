//! Video row CRUD.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use vaultcast_common::{Error, Result, VideoId, VideoStatus};

use crate::models::Video;

/// Insert the `processing` placeholder row that marks ingest as started.
pub fn create_processing(
    conn: &Connection,
    id: &VideoId,
    original_filename: &str,
    container: &str,
) -> Result<Video> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO videos (id, original_filename, container, video_codec, audio_codec,
                              duration_secs, total_segments, byte_size, status, error_reason,
                              created_at, updated_at)
         VALUES (?, ?, ?, NULL, NULL, 0.0, 0, 0, ?, NULL, ?, ?)",
        params![
            id.as_str(),
            original_filename,
            container,
            VideoStatus::Processing.to_string(),
            now.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Video {
        id: id.clone(),
        original_filename: original_filename.to_string(),
        container: container.to_string(),
        video_codec: None,
        audio_codec: None,
        duration_secs: 0.0,
        total_segments: 0,
        byte_size: 0,
        status: VideoStatus::Processing,
        error_reason: None,
        created_at: now,
        updated_at: now,
    })
}

/// Mark a video `active` with its final codec/duration/segment-count metadata.
/// Called once, in the same commit transaction as the distributor's last insert.
pub fn mark_active(
    conn: &Connection,
    id: &VideoId,
    video_codec: Option<&str>,
    audio_codec: Option<&str>,
    duration_secs: f64,
    total_segments: i64,
    byte_size: i64,
) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE videos SET status = ?, video_codec = ?, audio_codec = ?, duration_secs = ?,
                                total_segments = ?, byte_size = ?, error_reason = NULL,
                                updated_at = ?
             WHERE id = ?",
            params![
                VideoStatus::Active.to_string(),
                video_codec,
                audio_codec,
                duration_secs,
                total_segments,
                byte_size,
                Utc::now().to_rfc3339(),
                id.as_str(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if updated == 0 {
        return Err(Error::not_found(id.as_str()));
    }
    Ok(())
}

/// Mark a video `error` with a short reason code.
pub fn mark_error(conn: &Connection, id: &VideoId, reason: &str) -> Result<()> {
    conn.execute(
        "UPDATE videos SET status = ?, error_reason = ?, updated_at = ? WHERE id = ?",
        params![
            VideoStatus::Error.to_string(),
            reason,
            Utc::now().to_rfc3339(),
            id.as_str(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn get(conn: &Connection, id: &VideoId) -> Result<Video> {
    conn.query_row(
        "SELECT id, original_filename, container, video_codec, audio_codec, duration_secs,
                total_segments, byte_size, status, error_reason, created_at, updated_at
         FROM videos WHERE id = ?",
        [id.as_str()],
        row_to_video,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(id.as_str()),
        _ => Error::database(e.to_string()),
    })
}

/// Paginated list ordered by most-recently-created first.
pub fn list(conn: &Connection, limit: i64, offset: i64) -> Result<Vec<Video>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, original_filename, container, video_codec, audio_codec, duration_secs,
                    total_segments, byte_size, status, error_reason, created_at, updated_at
             FROM videos ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map(params![limit, offset], row_to_video)
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

pub fn count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

/// All videos currently `processing`, used by the coordinator's startup resume scan.
pub fn list_processing(conn: &Connection) -> Result<Vec<Video>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, original_filename, container, video_codec, audio_codec, duration_secs,
                    total_segments, byte_size, status, error_reason, created_at, updated_at
             FROM videos WHERE status = ?",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([VideoStatus::Processing.to_string()], row_to_video)
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Delete the video row; `segments`/`subtitle_tracks` cascade via the foreign key.
/// Returns `false` if the row did not exist.
pub fn delete(conn: &Connection, id: &VideoId) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM videos WHERE id = ?", [id.as_str()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(deleted > 0)
}

fn row_to_video(row: &rusqlite::Row) -> rusqlite::Result<Video> {
    let status_str: String = row.get(8)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;
    Ok(Video {
        id: VideoId::new(row.get::<_, String>(0)?),
        original_filename: row.get(1)?,
        container: row.get(2)?,
        video_codec: row.get(3)?,
        audio_codec: row.get(4)?,
        duration_secs: row.get(5)?,
        total_segments: row.get(6)?,
        byte_size: row.get(7)?,
        status: status_str.parse().unwrap_or(VideoStatus::Error),
        error_reason: row.get(9)?,
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn create_then_mark_active_round_trips() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = VideoId::new("sample");

        create_processing(&conn, &id, "sample.mp4", "mp4").unwrap();
        let v = get(&conn, &id).unwrap();
        assert_eq!(v.status, VideoStatus::Processing);

        mark_active(&conn, &id, Some("h264"), Some("aac"), 60.0, 8, 12_000_000).unwrap();
        let v = get(&conn, &id).unwrap();
        assert_eq!(v.status, VideoStatus::Active);
        assert_eq!(v.total_segments, 8);
    }

    #[test]
    fn delete_is_idempotent_at_the_row_level() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = VideoId::new("sample");
        create_processing(&conn, &id, "sample.mp4", "mp4").unwrap();

        assert!(delete(&conn, &id).unwrap());
        assert!(!delete(&conn, &id).unwrap());
        assert!(matches!(get(&conn, &id), Err(Error::NotFound(_))));
    }

    #[test]
    fn list_processing_filters_by_status() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        create_processing(&conn, &VideoId::new("a"), "a.mp4", "mp4").unwrap();
        create_processing(&conn, &VideoId::new("b"), "b.mp4", "mp4").unwrap();
        mark_active(&conn, &VideoId::new("a"), None, None, 10.0, 1, 100).unwrap();

        let processing = list_processing(&conn).unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, VideoId::new("b"));
    }
}
