//! Schema creation and forward-only migration.
//!
//! The whole schema is created in one flat batch guarded by the
//! `schema_version` table. Migrations only ever move the version
//! forward; a catalog newer than this binary is refused.

use crate::error::{ApertureError, Result};

/// Version written by a fresh install of this binary.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub fn run_migrations(conn: &rusqlite::Connection) -> Result<()> {
    let existing = read_version(conn)?;
    if let Some(v) = existing {
        if v > CURRENT_SCHEMA_VERSION {
            return Err(ApertureError::StoreRead(format!(
                "catalog schema version {} is newer than supported version {}",
                v, CURRENT_SCHEMA_VERSION
            )));
        }
        if v == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }
        // Forward migrations slot in here once version 2 exists.
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS photos (
            id                          INTEGER PRIMARY KEY,
            path                        TEXT NOT NULL UNIQUE,
            content_hash                TEXT NOT NULL UNIQUE,
            file_size                   INTEGER NOT NULL,
            width                       INTEGER NOT NULL CHECK (width > 0),
            height                      INTEGER NOT NULL CHECK (height > 0),
            orientation_code            INTEGER,
            capture_time                TEXT,
            time_is_naive_local         INTEGER NOT NULL DEFAULT 0,
            camera_make                 TEXT,
            camera_model                TEXT,
            lens_make                   TEXT,
            lens_model                  TEXT,
            iso                         INTEGER,
            aperture                    REAL,
            shutter                     TEXT,
            focal_mm                    REAL,
            focal_35mm                  REAL,
            flash_fired                 INTEGER,
            white_balance               TEXT,
            color_space                 TEXT,
            latitude                    REAL,
            longitude                   REAL,
            altitude                    REAL,
            perceptual_hash             TEXT,
            shape                       TEXT,
            time_of_day                 TEXT,
            season                      TEXT,
            focal_category              TEXT,
            shooting_condition          TEXT,
            decode_source               TEXT,
            burst_group_id              INTEGER REFERENCES burst_groups(id),
            duplicate_cluster_id        INTEGER REFERENCES duplicate_clusters(id),
            is_burst_representative     INTEGER NOT NULL DEFAULT 0,
            is_duplicate_representative INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS thumbnails (
            photo_id   INTEGER NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
            size       INTEGER NOT NULL,
            data       BLOB NOT NULL,
            byte_len   INTEGER NOT NULL,
            PRIMARY KEY (photo_id, size)
        );

        CREATE TABLE IF NOT EXISTS photo_colors (
            photo_id   INTEGER NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
            rank       INTEGER NOT NULL CHECK (rank BETWEEN 0 AND 4),
            r          INTEGER NOT NULL,
            g          INTEGER NOT NULL,
            b          INTEGER NOT NULL,
            hue        REAL NOT NULL,
            saturation REAL NOT NULL,
            lightness  REAL NOT NULL,
            weight     REAL NOT NULL CHECK (weight >= 0.0 AND weight <= 1.0),
            name       TEXT NOT NULL,
            PRIMARY KEY (photo_id, rank)
        );

        CREATE TABLE IF NOT EXISTS burst_groups (
            id                INTEGER PRIMARY KEY,
            photo_count       INTEGER NOT NULL,
            time_span_s       INTEGER NOT NULL,
            representative_id INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS photo_bursts (
            photo_id       INTEGER PRIMARY KEY REFERENCES photos(id) ON DELETE CASCADE,
            burst_group_id INTEGER NOT NULL REFERENCES burst_groups(id) ON DELETE CASCADE,
            sequence_index INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS duplicate_clusters (
            id                INTEGER PRIMARY KEY,
            cluster_type      TEXT NOT NULL CHECK (cluster_type IN ('exact', 'near', 'similar')),
            member_count      INTEGER NOT NULL,
            representative_id INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS photo_duplicates (
            photo_id   INTEGER PRIMARY KEY REFERENCES photos(id) ON DELETE CASCADE,
            cluster_id INTEGER NOT NULL REFERENCES duplicate_clusters(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS facet_metadata (
            name     TEXT PRIMARY KEY,
            label    TEXT NOT NULL,
            type     TEXT NOT NULL,
            multi    INTEGER NOT NULL,
            ordering TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_photos_content_hash  ON photos(content_hash);
        CREATE INDEX IF NOT EXISTS idx_photos_capture_time  ON photos(capture_time);
        CREATE INDEX IF NOT EXISTS idx_photos_camera_make   ON photos(camera_make);
        CREATE INDEX IF NOT EXISTS idx_photos_camera_model  ON photos(camera_model);
        CREATE INDEX IF NOT EXISTS idx_photos_lens_make     ON photos(lens_make);
        CREATE INDEX IF NOT EXISTS idx_photos_lens_model    ON photos(lens_model);
        CREATE INDEX IF NOT EXISTS idx_photos_iso           ON photos(iso);
        CREATE INDEX IF NOT EXISTS idx_photos_aperture      ON photos(aperture);
        CREATE INDEX IF NOT EXISTS idx_photos_focal_35mm    ON photos(focal_35mm);
        CREATE INDEX IF NOT EXISTS idx_photos_shape         ON photos(shape);
        CREATE INDEX IF NOT EXISTS idx_photos_time_of_day   ON photos(time_of_day);
        CREATE INDEX IF NOT EXISTS idx_photos_season        ON photos(season);
        CREATE INDEX IF NOT EXISTS idx_photos_focal_cat     ON photos(focal_category);
        CREATE INDEX IF NOT EXISTS idx_photos_shooting      ON photos(shooting_condition);
        CREATE INDEX IF NOT EXISTS idx_photos_white_balance ON photos(white_balance);
        CREATE INDEX IF NOT EXISTS idx_photos_burst         ON photos(burst_group_id);
        CREATE INDEX IF NOT EXISTS idx_photos_cluster       ON photos(duplicate_cluster_id);
        CREATE INDEX IF NOT EXISTS idx_colors_name          ON photo_colors(name);

        INSERT INTO schema_version SELECT 1
            WHERE NOT EXISTS (SELECT 1 FROM schema_version);
        UPDATE schema_version SET version = 1 WHERE version < 1;
        ",
    )
    .map_err(|e| ApertureError::StoreWrite(format!("schema init failed: {}", e)))?;

    Ok(())
}

pub fn schema_version(conn: &rusqlite::Connection) -> Result<u32> {
    read_version(conn)?.ok_or_else(|| ApertureError::StoreRead("schema_version empty".into()))
}

fn read_version(conn: &rusqlite::Connection) -> Result<Option<u32>> {
    let table_exists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ApertureError::StoreRead(e.to_string()))?;
    if table_exists == 0 {
        return Ok(None);
    }
    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get::<_, u32>(0)
        })
        .map(Some);
    match version {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(ApertureError::StoreRead(e.to_string())),
    }
}
