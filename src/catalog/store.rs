//! The catalog store: one portable SQLite file holding photos,
//! thumbnails, colors, and derived cluster tables.
//!
//! Writers serialise behind the single writer connection; readers open
//! their own WAL connections and never block it. Every multi-row state
//! change for one photo is a single transaction.

use crate::catalog::facets;
use crate::catalog::model::{BurstGroup, ColorSample, DuplicateCluster, PhotoRecord, PhotoRow};
use crate::db;
use crate::error::{ApertureError, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Outcome of an idempotent photo upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New row created
    Inserted(i64),
    /// Same path, same content hash: zero writes performed
    Unchanged(i64),
    /// Same path, changed content: metadata and derived rows rewritten
    Replaced(i64),
    /// Same content hash already catalogued under a different path
    HashExists(i64),
}

impl UpsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            UpsertOutcome::Inserted(id)
            | UpsertOutcome::Unchanged(id)
            | UpsertOutcome::Replaced(id)
            | UpsertOutcome::HashExists(id) => *id,
        }
    }
}

/// Aggregate numbers for the `stats` subcommand.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CatalogStats {
    pub photo_count: i64,
    pub thumbnail_count: i64,
    pub burst_group_count: i64,
    pub duplicate_cluster_count: i64,
    pub earliest_capture: Option<String>,
    pub latest_capture: Option<String>,
    pub by_camera: Vec<(String, i64)>,
    pub by_year: Vec<(String, i64)>,
}

/// A photo eligible for burst analysis.
#[derive(Debug, Clone)]
pub struct BurstCandidate {
    pub id: i64,
    pub camera_make: String,
    pub camera_model: String,
    pub capture_time: chrono::NaiveDateTime,
    pub focal_mm: Option<f64>,
}

pub struct Catalog {
    path: PathBuf,
    writer: Mutex<Connection>,
}

pub fn format_capture_time(t: &chrono::NaiveDateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%S").to_string()
}

impl Catalog {
    /// Open an existing catalog or initialise a new one, applying
    /// forward-only migrations and seeding the facet registry.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        let conn = db::open_connection(path)
            .map_err(|e| ApertureError::StoreRead(format!("cannot open {:?}: {}", path, e)))?;
        db::run_migrations(&conn)?;
        facets::seed_facet_metadata(&conn)
            .map_err(|e| ApertureError::StoreWrite(format!("facet seed failed: {}", e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open an additional read connection. WAL mode lets these proceed
    /// while the writer commits.
    pub fn open_reader(&self) -> Result<Connection> {
        db::open_connection(&self.path)
            .map_err(|e| ApertureError::StoreRead(format!("cannot open reader: {}", e)))
    }

    /// Run `f` with the writer connection. Used by modules that compose
    /// their own transactions (analyzer table replacement).
    pub fn with_writer<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| ApertureError::StoreWrite("writer lock poisoned".into()))?;
        f(&mut guard)
    }

    // ── Ingest-side writes ───────────────────────────────────────────────

    /// Look up (id, content_hash) by source path.
    pub fn lookup_by_path(&self, path: &str) -> Result<Option<(i64, String)>> {
        self.with_writer(|conn| {
            conn.query_row(
                "SELECT id, content_hash FROM photos WHERE path = ?1",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Look up a photo id by content hash.
    pub fn lookup_by_hash(&self, content_hash: &str) -> Result<Option<i64>> {
        self.with_writer(|conn| {
            conn.query_row(
                "SELECT id FROM photos WHERE content_hash = ?1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Idempotent upsert of a photo row alone. Most callers want
    /// `persist_photo`, which adds thumbnails and colors to the same
    /// transaction.
    pub fn upsert_photo(&self, record: &PhotoRecord) -> Result<UpsertOutcome> {
        self.persist_photo(record, &[], &[])
    }

    /// Persist one photo with its thumbnails and color samples in a
    /// single transaction. A failure rolls back the whole photo.
    pub fn persist_photo(
        &self,
        record: &PhotoRecord,
        thumbnails: &[(u32, Vec<u8>)],
        colors: &[ColorSample],
    ) -> Result<UpsertOutcome> {
        self.with_writer(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
            let outcome = upsert_photo_tx(&tx, record)?;
            match outcome {
                UpsertOutcome::Unchanged(_) | UpsertOutcome::HashExists(_) => {
                    // Zero-write path; nothing to commit but commit is harmless.
                }
                UpsertOutcome::Inserted(id) | UpsertOutcome::Replaced(id) => {
                    write_thumbnails_tx(&tx, id, thumbnails)?;
                    write_colors_tx(&tx, id, colors)?;
                }
            }
            tx.commit()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
            Ok(outcome)
        })
    }

    /// Replace the thumbnail variants of a photo.
    pub fn write_thumbnails(&self, photo_id: i64, thumbnails: &[(u32, Vec<u8>)]) -> Result<()> {
        self.with_writer(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
            write_thumbnails_tx(&tx, photo_id, thumbnails)?;
            tx.commit()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))
        })
    }

    /// Replace the color samples of a photo.
    pub fn write_colors(&self, photo_id: i64, colors: &[ColorSample]) -> Result<()> {
        self.with_writer(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
            write_colors_tx(&tx, photo_id, colors)?;
            tx.commit()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))
        })
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn photo(&self, id: i64) -> Result<Option<PhotoRow>> {
        let conn = self.open_reader()?;
        conn.query_row(
            &format!("{} WHERE p.id = ?1", PHOTO_SELECT),
            params![id],
            row_to_photo,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn thumbnail(&self, photo_id: i64, size: u32) -> Result<Option<Vec<u8>>> {
        let conn = self.open_reader()?;
        conn.query_row(
            "SELECT data FROM thumbnails WHERE photo_id = ?1 AND size = ?2",
            params![photo_id, size],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn colors(&self, photo_id: i64) -> Result<Vec<ColorSample>> {
        let conn = self.open_reader()?;
        let mut stmt = conn
            .prepare(
                "SELECT rank, r, g, b, hue, saturation, lightness, weight, name
                 FROM photo_colors WHERE photo_id = ?1 ORDER BY rank",
            )
            .map_err(ApertureError::from)?;
        let rows = stmt
            .query_map(params![photo_id], |row| {
                Ok(ColorSample {
                    rank: row.get(0)?,
                    r: row.get(1)?,
                    g: row.get(2)?,
                    b: row.get(3)?,
                    hue: row.get(4)?,
                    saturation: row.get(5)?,
                    lightness: row.get(6)?,
                    weight: row.get(7)?,
                    name: row.get(8)?,
                })
            })
            .map_err(ApertureError::from)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn photo_count(&self) -> Result<i64> {
        let conn = self.open_reader()?;
        conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let conn = self.open_reader()?;
        let (photo_count, earliest, latest): (i64, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT COUNT(*), MIN(capture_time), MAX(capture_time) FROM photos",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(ApertureError::from)?;
        let thumbnail_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM thumbnails", [], |r| r.get(0))
            .map_err(ApertureError::from)?;
        let burst_group_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM burst_groups", [], |r| r.get(0))
            .map_err(ApertureError::from)?;
        let duplicate_cluster_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM duplicate_clusters", [], |r| r.get(0))
            .map_err(ApertureError::from)?;

        let by_camera = collect_pairs(
            &conn,
            "SELECT COALESCE(camera_make || ' ' || camera_model, camera_make, camera_model, '(unknown)'),
                    COUNT(*)
             FROM photos GROUP BY 1 ORDER BY 2 DESC, 1",
        )?;
        let by_year = collect_pairs(
            &conn,
            "SELECT COALESCE(strftime('%Y', capture_time), '(undated)'), COUNT(*)
             FROM photos GROUP BY 1 ORDER BY 1",
        )?;

        Ok(CatalogStats {
            photo_count,
            thumbnail_count,
            burst_group_count,
            duplicate_cluster_count,
            earliest_capture: earliest,
            latest_capture: latest,
            by_camera,
            by_year,
        })
    }

    // ── Analyzer support ─────────────────────────────────────────────────

    /// Photos with the attributes burst detection sorts on. Undated
    /// photos cannot join bursts and are excluded here.
    pub fn burst_candidates(&self) -> Result<Vec<BurstCandidate>> {
        let conn = self.open_reader()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, COALESCE(camera_make, ''), COALESCE(camera_model, ''),
                        capture_time, focal_mm
                 FROM photos
                 WHERE capture_time IS NOT NULL
                 ORDER BY COALESCE(camera_make, ''), COALESCE(camera_model, ''),
                          capture_time, id",
            )
            .map_err(ApertureError::from)?;
        let rows = stmt
            .query_map([], |row| {
                let time_str: String = row.get(3)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    time_str,
                    row.get::<_, Option<f64>>(4)?,
                ))
            })
            .map_err(ApertureError::from)?;
        let mut out = Vec::new();
        for row in rows {
            let (id, make, model, time_str, focal) = row.map_err(ApertureError::from)?;
            let Ok(t) =
                chrono::NaiveDateTime::parse_from_str(&time_str, "%Y-%m-%dT%H:%M:%S")
            else {
                tracing::warn!("unparseable capture_time on photo {}: {}", id, time_str);
                continue;
            };
            out.push(BurstCandidate {
                id,
                camera_make: make,
                camera_model: model,
                capture_time: t,
                focal_mm: focal,
            });
        }
        Ok(out)
    }

    /// (photo_id, perceptual hash) for every photo that has one.
    pub fn perceptual_hashes(&self) -> Result<Vec<(i64, u64)>> {
        let conn = self.open_reader()?;
        let mut stmt = conn
            .prepare("SELECT id, perceptual_hash FROM photos WHERE perceptual_hash IS NOT NULL")
            .map_err(ApertureError::from)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(ApertureError::from)?;
        let mut out = Vec::new();
        for row in rows {
            let (id, hex_hash) = row.map_err(ApertureError::from)?;
            match u64::from_str_radix(&hex_hash, 16) {
                Ok(h) => out.push((id, h)),
                Err(_) => tracing::warn!("invalid perceptual_hash on photo {}", id),
            }
        }
        Ok(out)
    }

    /// Replace the burst tables and membership columns transactionally.
    /// `groups` pairs each group with its members in timestamp order.
    pub fn replace_bursts(&self, groups: &[(BurstGroup, Vec<i64>)]) -> Result<()> {
        self.with_writer(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
            // membership column first, then children, then parents, so
            // the foreign keys stay satisfied mid-batch
            tx.execute_batch(
                "UPDATE photos SET burst_group_id = NULL, is_burst_representative = 0;
                 DELETE FROM photo_bursts;
                 DELETE FROM burst_groups;",
            )
            .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
            for (group, members) in groups {
                tx.execute(
                    "INSERT INTO burst_groups (id, photo_count, time_span_s, representative_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![group.id, group.photo_count, group.time_span_s, group.representative_id],
                )
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
                for (seq, photo_id) in members.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO photo_bursts (photo_id, burst_group_id, sequence_index)
                         VALUES (?1, ?2, ?3)",
                        params![photo_id, group.id, seq as i64],
                    )
                    .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
                    tx.execute(
                        "UPDATE photos SET burst_group_id = ?1, is_burst_representative = ?2
                         WHERE id = ?3",
                        params![group.id, (*photo_id == group.representative_id) as i64, photo_id],
                    )
                    .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
                }
            }
            tx.commit()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))
        })
    }

    /// Replace the duplicate-cluster tables and membership columns
    /// transactionally.
    pub fn replace_clusters(&self, clusters: &[(DuplicateCluster, Vec<i64>)]) -> Result<()> {
        self.with_writer(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
            tx.execute_batch(
                "UPDATE photos SET duplicate_cluster_id = NULL, is_duplicate_representative = 0;
                 DELETE FROM photo_duplicates;
                 DELETE FROM duplicate_clusters;",
            )
            .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
            for (cluster, members) in clusters {
                tx.execute(
                    "INSERT INTO duplicate_clusters (id, cluster_type, member_count, representative_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        cluster.id,
                        cluster.cluster_type.as_str(),
                        cluster.member_count,
                        cluster.representative_id
                    ],
                )
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
                for photo_id in members {
                    tx.execute(
                        "INSERT INTO photo_duplicates (photo_id, cluster_id) VALUES (?1, ?2)",
                        params![photo_id, cluster.id],
                    )
                    .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
                    tx.execute(
                        "UPDATE photos SET duplicate_cluster_id = ?1, is_duplicate_representative = ?2
                         WHERE id = ?3",
                        params![
                            cluster.id,
                            (*photo_id == cluster.representative_id) as i64,
                            photo_id
                        ],
                    )
                    .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
                }
            }
            tx.commit()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))
        })
    }

    // ── Maintenance ──────────────────────────────────────────────────────

    /// Remove photos whose source file no longer exists. This is the only
    /// code path that deletes photo rows.
    pub fn prune_missing(&self) -> Result<u64> {
        let paths: Vec<(i64, String)> = {
            let conn = self.open_reader()?;
            let mut stmt = conn
                .prepare("SELECT id, path FROM photos")
                .map_err(ApertureError::from)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(ApertureError::from)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(ApertureError::from)?
        };
        let missing: Vec<i64> = paths
            .into_iter()
            .filter(|(_, p)| !Path::new(p).exists())
            .map(|(id, _)| id)
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }
        self.with_writer(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
            for id in &missing {
                tx.execute("DELETE FROM photos WHERE id = ?1", params![id])
                    .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
            }
            tx.commit()
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
            Ok(missing.len() as u64)
        })
    }

    /// Run a filtered, sorted, paged query. Thin wrapper over the
    /// query engine with a fresh reader.
    pub fn query(
        &self,
        state: &crate::query::FilterState,
        sort: crate::query::SortKey,
        limit: usize,
        offset: usize,
    ) -> Result<crate::query::QueryResult> {
        let conn = self.open_reader()?;
        crate::query::engine::run_query(
            &conn,
            state,
            sort,
            crate::query::Page { limit, offset },
        )
    }

    /// Facet values and counts for one dimension under a filter state.
    pub fn facet_counts(
        &self,
        dim: &str,
        state: &crate::query::FilterState,
    ) -> Result<crate::query::Facet> {
        let def = facets::facet_def(dim)
            .ok_or_else(|| ApertureError::StoreRead(format!("unknown facet dimension {}", dim)))?;
        let conn = self.open_reader()?;
        crate::query::engine::compute_facet(&conn, state, def)
    }

    /// VACUUM + ANALYZE. Returns (bytes_before, bytes_after).
    pub fn compact(&self) -> Result<(u64, u64)> {
        let before = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        self.with_writer(|conn| {
            conn.execute_batch("VACUUM; ANALYZE;")
                .map_err(|e| ApertureError::StoreWrite(e.to_string()))
        })?;
        let after = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok((before, after))
    }
}

/// Column list shared by every photo SELECT; kept in one place so
/// `row_to_photo` and the query engine stay in sync.
pub const PHOTO_SELECT: &str = "SELECT
    p.id, p.path, p.content_hash, p.file_size, p.width, p.height,
    p.capture_time, p.camera_make, p.camera_model, p.lens_make, p.lens_model,
    p.iso, p.aperture, p.shutter, p.focal_mm, p.focal_35mm, p.flash_fired,
    p.white_balance, p.latitude, p.longitude, p.perceptual_hash, p.shape,
    p.time_of_day, p.season, p.focal_category, p.shooting_condition,
    p.burst_group_id, p.duplicate_cluster_id,
    p.is_burst_representative, p.is_duplicate_representative
    FROM photos p";

pub fn row_to_photo(row: &rusqlite::Row<'_>) -> rusqlite::Result<PhotoRow> {
    Ok(PhotoRow {
        id: row.get(0)?,
        path: row.get(1)?,
        content_hash: row.get(2)?,
        file_size: row.get::<_, i64>(3)? as u64,
        width: row.get::<_, i64>(4)? as u32,
        height: row.get::<_, i64>(5)? as u32,
        capture_time: row.get(6)?,
        camera_make: row.get(7)?,
        camera_model: row.get(8)?,
        lens_make: row.get(9)?,
        lens_model: row.get(10)?,
        iso: row.get::<_, Option<i64>>(11)?.map(|v| v as u32),
        aperture: row.get(12)?,
        shutter: row.get(13)?,
        focal_mm: row.get(14)?,
        focal_35mm: row.get(15)?,
        flash_fired: row.get::<_, Option<i64>>(16)?.map(|v| v != 0),
        white_balance: row.get(17)?,
        latitude: row.get(18)?,
        longitude: row.get(19)?,
        perceptual_hash: row.get(20)?,
        shape: row.get(21)?,
        time_of_day: row.get(22)?,
        season: row.get(23)?,
        focal_category: row.get(24)?,
        shooting_condition: row.get(25)?,
        burst_group_id: row.get(26)?,
        duplicate_cluster_id: row.get(27)?,
        is_burst_representative: row.get::<_, i64>(28)? != 0,
        is_duplicate_representative: row.get::<_, i64>(29)? != 0,
    })
}

fn collect_pairs(conn: &Connection, sql: &str) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(sql).map_err(ApertureError::from)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(ApertureError::from)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

// ── Transaction bodies ────────────────────────────────────────────────────

fn upsert_photo_tx(tx: &Transaction<'_>, record: &PhotoRecord) -> Result<UpsertOutcome> {
    let path = record.path.to_string_lossy();
    let existing: Option<(i64, String)> = tx
        .query_row(
            "SELECT id, content_hash FROM photos WHERE path = ?1",
            params![path.as_ref()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(ApertureError::from)?;

    if let Some((id, hash)) = existing {
        if hash == record.content_hash {
            return Ok(UpsertOutcome::Unchanged(id));
        }
        // Same path, changed file: rewrite metadata, drop derived rows.
        tx.execute(
            "DELETE FROM thumbnails WHERE photo_id = ?1",
            params![id],
        )
        .map_err(ApertureError::from)?;
        tx.execute(
            "DELETE FROM photo_colors WHERE photo_id = ?1",
            params![id],
        )
        .map_err(ApertureError::from)?;
        tx.execute(
            "DELETE FROM photo_bursts WHERE photo_id = ?1",
            params![id],
        )
        .map_err(ApertureError::from)?;
        tx.execute(
            "DELETE FROM photo_duplicates WHERE photo_id = ?1",
            params![id],
        )
        .map_err(ApertureError::from)?;
        update_photo_row(tx, id, record)?;
        return Ok(UpsertOutcome::Replaced(id));
    }

    // Content-hash collision under a different path is a duplicate file;
    // the ingest run records it as skipped.
    let hash_owner: Option<i64> = tx
        .query_row(
            "SELECT id FROM photos WHERE content_hash = ?1",
            params![record.content_hash],
            |row| row.get(0),
        )
        .optional()
        .map_err(ApertureError::from)?;
    if let Some(id) = hash_owner {
        return Ok(UpsertOutcome::HashExists(id));
    }

    insert_photo_row(tx, record).map(UpsertOutcome::Inserted)
}

fn photo_params(record: &PhotoRecord) -> Vec<Box<dyn rusqlite::ToSql>> {
    vec![
        Box::new(record.path.to_string_lossy().into_owned()),
        Box::new(record.content_hash.clone()),
        Box::new(record.file_size as i64),
        Box::new(record.width as i64),
        Box::new(record.height as i64),
        Box::new(record.orientation_code.map(|o| o as i64)),
        Box::new(record.capture_time.as_ref().map(format_capture_time)),
        Box::new(record.time_is_naive_local as i64),
        Box::new(record.camera_make.clone()),
        Box::new(record.camera_model.clone()),
        Box::new(record.lens_make.clone()),
        Box::new(record.lens_model.clone()),
        Box::new(record.iso.map(|v| v as i64)),
        Box::new(record.aperture),
        Box::new(record.shutter.clone()),
        Box::new(record.focal_mm),
        Box::new(record.focal_35mm),
        Box::new(record.flash_fired.map(|b| b as i64)),
        Box::new(record.white_balance.clone()),
        Box::new(record.color_space.clone()),
        Box::new(record.latitude),
        Box::new(record.longitude),
        Box::new(record.altitude),
        Box::new(record.perceptual_hash.clone()),
        Box::new(record.shape.map(|s| s.as_str())),
        Box::new(record.time_of_day.map(|s| s.as_str())),
        Box::new(record.season.map(|s| s.as_str())),
        Box::new(record.focal_category.map(|s| s.as_str())),
        Box::new(record.shooting_condition.map(|s| s.as_str())),
        Box::new(record.decode_source.map(|s| s.as_str())),
    ]
}

const PHOTO_COLUMNS: &str = "path, content_hash, file_size, width, height, orientation_code,
     capture_time, time_is_naive_local, camera_make, camera_model, lens_make, lens_model,
     iso, aperture, shutter, focal_mm, focal_35mm, flash_fired, white_balance, color_space,
     latitude, longitude, altitude, perceptual_hash, shape, time_of_day, season,
     focal_category, shooting_condition, decode_source";

fn insert_photo_row(tx: &Transaction<'_>, record: &PhotoRecord) -> Result<i64> {
    let placeholders: Vec<String> = (1..=30).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO photos ({}) VALUES ({})",
        PHOTO_COLUMNS,
        placeholders.join(", ")
    );
    let params = photo_params(record);
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    tx.execute(&sql, param_refs.as_slice())
        .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
    Ok(tx.last_insert_rowid())
}

fn update_photo_row(tx: &Transaction<'_>, id: i64, record: &PhotoRecord) -> Result<()> {
    let assignments: Vec<String> = PHOTO_COLUMNS
        .split(',')
        .map(|c| c.trim())
        .enumerate()
        .map(|(i, col)| format!("{} = ?{}", col, i + 1))
        .collect();
    let sql = format!(
        "UPDATE photos SET {}, burst_group_id = NULL, duplicate_cluster_id = NULL,
         is_burst_representative = 0, is_duplicate_representative = 0
         WHERE id = ?31",
        assignments.join(", ")
    );
    let mut params = photo_params(record);
    params.push(Box::new(id));
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    tx.execute(&sql, param_refs.as_slice())
        .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
    Ok(())
}

fn write_thumbnails_tx(tx: &Transaction<'_>, photo_id: i64, thumbnails: &[(u32, Vec<u8>)]) -> Result<()> {
    tx.execute("DELETE FROM thumbnails WHERE photo_id = ?1", params![photo_id])
        .map_err(ApertureError::from)?;
    for (size, bytes) in thumbnails {
        tx.execute(
            "INSERT INTO thumbnails (photo_id, size, data, byte_len) VALUES (?1, ?2, ?3, ?4)",
            params![photo_id, size, bytes, bytes.len() as i64],
        )
        .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
    }
    Ok(())
}

fn write_colors_tx(tx: &Transaction<'_>, photo_id: i64, colors: &[ColorSample]) -> Result<()> {
    tx.execute("DELETE FROM photo_colors WHERE photo_id = ?1", params![photo_id])
        .map_err(ApertureError::from)?;
    for c in colors {
        tx.execute(
            "INSERT INTO photo_colors (photo_id, rank, r, g, b, hue, saturation, lightness, weight, name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![photo_id, c.rank, c.r, c.g, c.b, c.hue, c.saturation, c.lightness, c.weight, c.name],
        )
        .map_err(|e| ApertureError::StoreWrite(e.to_string()))?;
    }
    Ok(())
}

/// Referential-integrity findings for the `verify` subcommand.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct IntegrityReport {
    pub orphan_burst_memberships: i64,
    pub orphan_cluster_memberships: i64,
    pub representatives_outside_group: i64,
    pub undersized_bursts: i64,
    pub undersized_clusters: i64,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_burst_memberships == 0
            && self.orphan_cluster_memberships == 0
            && self.representatives_outside_group == 0
            && self.undersized_bursts == 0
            && self.undersized_clusters == 0
    }
}

impl Catalog {
    pub fn check_integrity(&self) -> Result<IntegrityReport> {
        let conn = self.open_reader()?;
        let scalar = |sql: &str| -> Result<i64> {
            conn.query_row(sql, [], |row| row.get(0)).map_err(Into::into)
        };
        Ok(IntegrityReport {
            orphan_burst_memberships: scalar(
                "SELECT COUNT(*) FROM photo_bursts pb
                 LEFT JOIN burst_groups bg ON bg.id = pb.burst_group_id
                 WHERE bg.id IS NULL",
            )?,
            orphan_cluster_memberships: scalar(
                "SELECT COUNT(*) FROM photo_duplicates pd
                 LEFT JOIN duplicate_clusters dc ON dc.id = pd.cluster_id
                 WHERE dc.id IS NULL",
            )?,
            representatives_outside_group: scalar(
                "SELECT
                   (SELECT COUNT(*) FROM burst_groups bg
                    WHERE NOT EXISTS (SELECT 1 FROM photo_bursts pb
                        WHERE pb.burst_group_id = bg.id AND pb.photo_id = bg.representative_id))
                 + (SELECT COUNT(*) FROM duplicate_clusters dc
                    WHERE NOT EXISTS (SELECT 1 FROM photo_duplicates pd
                        WHERE pd.cluster_id = dc.id AND pd.photo_id = dc.representative_id))",
            )?,
            undersized_bursts: scalar(
                "SELECT COUNT(*) FROM burst_groups WHERE photo_count < 3",
            )?,
            undersized_clusters: scalar(
                "SELECT COUNT(*) FROM duplicate_clusters WHERE member_count < 2",
            )?,
        })
    }
}
