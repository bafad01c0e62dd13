//! Subtitle track row CRUD.

use chrono::Utc;
use rusqlite::{params, Connection};
use vaultcast_common::{AccountId, Error, Result, VideoId};

use crate::models::SubtitleTrack;

#[allow(clippy::too_many_arguments)]
pub fn insert(
    conn: &Connection,
    video_id: &VideoId,
    track_index: i64,
    language: Option<&str>,
    title: Option<&str>,
    codec: &str,
    is_default: bool,
    is_forced: bool,
    is_hearing_impaired: bool,
    handle: &str,
    account_id: &AccountId,
) -> Result<SubtitleTrack> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO subtitle_tracks (video_id, track_index, language, title, codec, is_default,
                                       is_forced, is_hearing_impaired, handle, account_id,
                                       created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            video_id.as_str(),
            track_index,
            language,
            title,
            codec,
            is_default as i64,
            is_forced as i64,
            is_hearing_impaired as i64,
            handle,
            account_id.as_str(),
            now.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(SubtitleTrack {
        video_id: video_id.clone(),
        track_index,
        language: language.map(str::to_string),
        title: title.map(str::to_string),
        codec: codec.to_string(),
        is_default,
        is_forced,
        is_hearing_impaired,
        handle: handle.to_string(),
        account_id: account_id.clone(),
        created_at: now,
    })
}

pub fn list(conn: &Connection, video_id: &VideoId) -> Result<Vec<SubtitleTrack>> {
    let mut stmt = conn
        .prepare(
            "SELECT video_id, track_index, language, title, codec, is_default, is_forced,
                    is_hearing_impaired, handle, account_id, created_at
             FROM subtitle_tracks WHERE video_id = ? ORDER BY track_index ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([video_id.as_str()], row_to_track)
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Find a track by language code (used to serve `/hls/{id}/subtitles/{lang}`).
pub fn get_by_language(
    conn: &Connection,
    video_id: &VideoId,
    language: &str,
) -> Result<SubtitleTrack> {
    conn.query_row(
        "SELECT video_id, track_index, language, title, codec, is_default, is_forced,
                is_hearing_impaired, handle, account_id, created_at
         FROM subtitle_tracks WHERE video_id = ? AND language = ?",
        params![video_id.as_str(), language],
        row_to_track,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            Error::not_found(format!("{video_id}/subtitles/{language}"))
        }
        _ => Error::database(e.to_string()),
    })
}

fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<SubtitleTrack> {
    let created_at: String = row.get(10)?;
    Ok(SubtitleTrack {
        video_id: VideoId::new(row.get::<_, String>(0)?),
        track_index: row.get(1)?,
        language: row.get(2)?,
        title: row.get(3)?,
        codec: row.get(4)?,
        is_default: row.get::<_, i64>(5)? != 0,
        is_forced: row.get::<_, i64>(6)? != 0,
        is_hearing_impaired: row.get::<_, i64>(7)? != 0,
        handle: row.get(8)?,
        account_id: AccountId::new(row.get::<_, String>(9)?),
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

    #[test]
    fn insert_and_list() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = VideoId::new("sample");
        videos::create_processing(&conn, &id, "sample.mkv", "mkv").unwrap();

        insert(
            &conn,
            &id,
            0,
            Some("eng"),
            Some("English"),
            "subrip",
            true,
            false,
            false,
            "handle-1",
            &AccountId::new("acct-0"),
        )
        .unwrap();

        let tracks = list(&conn, &id).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].language.as_deref(), Some("eng"));
        assert!(tracks[0].is_default);
    }

    #[test]
    fn get_by_language_not_found() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = VideoId::new("sample");
        videos::create_processing(&conn, &id, "sample.mkv", "mkv").unwrap();

        assert!(matches!(
            get_by_language(&conn, &id, "fre"),
            Err(Error::NotFound(_))
        ));
    }
}
