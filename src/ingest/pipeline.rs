//! The ingestion pipeline: discovery feeds a bounded queue, N workers
//! drain it, and each photo is hashed, decoded, featurised, and
//! persisted in one transaction. Per-file failures are recorded and the
//! run continues; a cancellation signal drains the queue and lets
//! in-flight photos finish.

use crate::catalog::model::{
    DecodeSource, FocalCategory, PhotoRecord, Season, Shape, ShootingCondition, TimeOfDay,
};
use crate::catalog::{Catalog, UpsertOutcome};
use crate::decode::{DecoderRegistry, OrientationTracker};
use crate::error::{ApertureError, ErrorKind};
use crate::features::{palette, phash, thumbs};
use crate::ingest::{metadata, scanner};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub const DEFAULT_WORKERS: usize = 4;

/// Queue capacity per worker; discovery blocks when the queue is full.
const QUEUE_FACTOR: usize = 4;

/// A progress event is emitted every this many completions.
const PROGRESS_EVERY: usize = 100;

/// Cap on retained failure details, mirroring the run-report error log.
const MAX_FAILURE_DETAILS: usize = 100;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub root: PathBuf,
    pub workers: usize,
}

impl PipelineConfig {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Counters for one progress event.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ProgressEvent {
    pub discovered: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed_s: f64,
    /// completions per second since the run started
    pub throughput: f64,
}

/// One recorded per-file failure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FailureDetail {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

/// Totals for a whole run.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct RunReport {
    pub discovered: usize,
    pub processed: usize,
    pub skipped_unchanged: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
    pub failures_by_kind: BTreeMap<String, usize>,
    /// capped at 100 entries
    pub failure_details: Vec<FailureDetail>,
    pub duration_s: f64,
    pub cancelled: bool,
}

impl RunReport {
    fn record_failure(&mut self, path: &Path, err: &ApertureError) {
        self.failed += 1;
        *self
            .failures_by_kind
            .entry(err.kind().as_str().to_string())
            .or_insert(0) += 1;
        if self.failure_details.len() < MAX_FAILURE_DETAILS {
            self.failure_details.push(FailureDetail {
                path: path.to_path_buf(),
                kind: err.kind(),
                message: err.to_string(),
            });
        }
    }
}

/// What one worker did with one path.
enum Outcome {
    Processed,
    SkippedUnchanged,
    SkippedDuplicate,
    Failed(ApertureError),
    Drained,
}

/// Run the full pipeline. Blocks until discovery and all workers finish.
pub fn run_pipeline(
    catalog: &Catalog,
    config: &PipelineConfig,
    cancel: &Arc<AtomicBool>,
    on_progress: &(dyn Fn(&ProgressEvent) + Sync),
) -> RunReport {
    let started = Instant::now();
    let workers = config.workers.max(1);
    let (tx, rx) = crossbeam_channel::bounded::<PathBuf>(QUEUE_FACTOR * workers);

    let discovered = AtomicUsize::new(0);
    let completions = AtomicUsize::new(0);
    let report = Mutex::new(RunReport::default());
    let registry = DecoderRegistry::default();

    tracing::info!(
        "pipeline: indexing {:?} with {} worker(s)",
        config.root,
        workers
    );

    std::thread::scope(|scope| {
        // Discovery thread: streams the walk into the bounded queue.
        // send() blocks when the queue is full, which is the whole
        // back-pressure story.
        let disc_tx = tx.clone();
        let disc_cancel = Arc::clone(cancel);
        let discovered_ref = &discovered;
        let report_ref = &report;
        scope.spawn(move || {
            for item in scanner::walk(&config.root) {
                if disc_cancel.load(Ordering::SeqCst) {
                    tracing::info!("pipeline: discovery cancelled");
                    break;
                }
                match item {
                    Ok(found) => {
                        discovered_ref.fetch_add(1, Ordering::SeqCst);
                        if disc_tx.send(found.path).is_err() {
                            break;
                        }
                    }
                    Err(msg) => {
                        let mut r = report_ref.lock().expect("report lock");
                        r.record_failure(
                            Path::new("(walk)"),
                            &ApertureError::Io {
                                path: PathBuf::from("(walk)"),
                                message: msg,
                            },
                        );
                    }
                }
            }
            drop(disc_tx);
        });
        drop(tx);

        for worker_id in 0..workers {
            let rx = rx.clone();
            let cancel = Arc::clone(cancel);
            let registry = &registry;
            let report_ref = &report;
            let discovered_ref = &discovered;
            let completions_ref = &completions;
            scope.spawn(move || {
                while let Ok(path) = rx.recv() {
                    // On cancel the queue is drained without work so the
                    // discoverer never deadlocks on a full channel.
                    let outcome = if cancel.load(Ordering::SeqCst) {
                        Outcome::Drained
                    } else {
                        process_guarded(catalog, registry, &path)
                    };

                    let mut r = report_ref.lock().expect("report lock");
                    match outcome {
                        Outcome::Processed => r.processed += 1,
                        Outcome::SkippedUnchanged => r.skipped_unchanged += 1,
                        Outcome::SkippedDuplicate => r.skipped_duplicate += 1,
                        Outcome::Failed(err) => {
                            tracing::warn!("worker {}: {:?} failed: {}", worker_id, path, err);
                            r.record_failure(&path, &err);
                        }
                        Outcome::Drained => continue,
                    }
                    let processed = r.processed;
                    let skipped = r.skipped_unchanged + r.skipped_duplicate;
                    let failed = r.failed;
                    drop(r);

                    let done = completions_ref.fetch_add(1, Ordering::SeqCst) + 1;
                    if done % PROGRESS_EVERY == 0 {
                        let elapsed = started.elapsed().as_secs_f64();
                        on_progress(&ProgressEvent {
                            discovered: discovered_ref.load(Ordering::SeqCst),
                            processed,
                            skipped,
                            failed,
                            elapsed_s: elapsed,
                            throughput: done as f64 / elapsed.max(1e-9),
                        });
                    }
                }
            });
        }
    });

    let mut final_report = report.into_inner().expect("report lock");
    final_report.discovered = discovered.load(Ordering::SeqCst);
    final_report.duration_s = started.elapsed().as_secs_f64();
    final_report.cancelled = cancel.load(Ordering::SeqCst);

    tracing::info!(
        "pipeline: done in {:.1}s: discovered={} processed={} skipped={} failed={}",
        final_report.duration_s,
        final_report.discovered,
        final_report.processed,
        final_report.skipped_unchanged + final_report.skipped_duplicate,
        final_report.failed
    );
    final_report
}

/// A panicking decoder must not take the worker thread down; the photo
/// is recorded as a decode failure and the worker moves on.
fn process_guarded(catalog: &Catalog, registry: &DecoderRegistry, path: &Path) -> Outcome {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        process_one(catalog, registry, path)
    })) {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!("panic while processing {:?}", path);
            Outcome::Failed(ApertureError::Decode {
                path: path.to_path_buf(),
                message: "decoder panicked".into(),
            })
        }
    }
}

fn process_one(catalog: &Catalog, registry: &DecoderRegistry, path: &Path) -> Outcome {
    // 1. Content hash. The catalog check must precede any decoding so
    //    unchanged re-ingest performs zero writes and near-zero work.
    let (content_hash, file_size) = match hash_file(path) {
        Ok(v) => v,
        Err(e) => return Outcome::Failed(e),
    };

    let path_str = path.to_string_lossy();
    match catalog.lookup_by_path(&path_str) {
        Ok(Some((_, existing_hash))) if existing_hash == content_hash => {
            tracing::debug!("{:?} unchanged, skipping", path);
            return Outcome::SkippedUnchanged;
        }
        Ok(_) => {}
        Err(e) => return Outcome::Failed(e),
    }

    // 2. Metadata. Failures degrade to an anonymous photo.
    let meta = metadata::extract_metadata(path);
    for w in &meta.warnings {
        tracing::warn!("metadata warning for {:?}: {}", path, w);
    }

    // 3. Decode through the fallback chain.
    let decoded = match registry.decode(path) {
        Ok(d) => d,
        Err(e) => return Outcome::Failed(e),
    };
    for w in &decoded.warnings {
        tracing::warn!("decode warning for {:?}: {}", path, w);
    }

    // 4. Orient exactly once. Previews extracted from raw containers
    //    are already oriented by the camera.
    let mut tracker = OrientationTracker::new(path);
    let orientation = if decoded.source == DecodeSource::EmbeddedPreview {
        None
    } else {
        meta.orientation
    };
    let image = tracker.apply(decoded.image, orientation);
    debug_assert_eq!(tracker.apply_events(), 1);

    // 5. Features. Everything below works on resized buffers; the full
    //    frame is dropped before the catalog write so one decoded image
    //    per worker is the high-water mark.
    let (width, height) = (image.width(), image.height());
    let thumbnails = match thumbs::generate_thumbnails(&image) {
        Ok(t) => t,
        Err(e) => return Outcome::Failed(e),
    };
    let perceptual = if thumbnails.is_empty() {
        None
    } else {
        Some(phash::to_hex(phash::perceptual_hash(&image)))
    };
    let palette_source = image
        .resize(256, 256, image::imageops::FilterType::Lanczos3)
        .to_rgb8();
    let colors = palette::extract_palette(&palette_source);
    drop(image);

    // 6. Assemble and persist in one transaction.
    let record = build_record(
        path,
        content_hash,
        file_size,
        (width, height),
        &meta,
        &decoded.source,
        perceptual,
    );
    match catalog.persist_photo(&record, &thumbnails, &colors) {
        Ok(UpsertOutcome::HashExists(id)) => {
            tracing::info!(
                "{:?} has identical content to photo {}, skipping duplicate",
                path,
                id
            );
            Outcome::SkippedDuplicate
        }
        Ok(_) => Outcome::Processed,
        Err(e) => Outcome::Failed(e),
    }
}

fn build_record(
    path: &Path,
    content_hash: String,
    file_size: u64,
    (width, height): (u32, u32),
    meta: &metadata::PhotoMetadata,
    source: &DecodeSource,
    perceptual_hash: Option<String>,
) -> PhotoRecord {
    // Categories materialise at insert time so they are plain indexed
    // columns for the facet engine.
    let time_of_day = meta
        .capture_time
        .map(|t| TimeOfDay::from_hour(chrono::Timelike::hour(&t)));
    let season = meta
        .capture_time
        .map(|t| Season::from_month(chrono::Datelike::month(&t)));
    let focal_for_category = meta.focal_35mm.or(meta.focal_mm);
    let focal_category = focal_for_category.map(FocalCategory::from_focal_35mm);
    let shooting_condition = meta.iso.map(ShootingCondition::from_iso);

    PhotoRecord {
        path: path.to_path_buf(),
        content_hash,
        file_size,
        width,
        height,
        orientation_code: meta.orientation,
        capture_time: meta.capture_time,
        time_is_naive_local: meta.time_is_naive_local,
        camera_make: meta.camera_make.clone(),
        camera_model: meta.camera_model.clone(),
        lens_make: meta.lens_make.clone(),
        lens_model: meta.lens_model.clone(),
        iso: meta.iso,
        aperture: meta.aperture,
        shutter: meta.shutter.clone(),
        focal_mm: meta.focal_mm,
        focal_35mm: meta.focal_35mm,
        flash_fired: meta.flash_fired,
        white_balance: meta.white_balance.clone(),
        color_space: meta.color_space.clone(),
        latitude: meta.latitude,
        longitude: meta.longitude,
        altitude: meta.altitude,
        perceptual_hash,
        shape: Some(Shape::from_dimensions(width, height)),
        time_of_day,
        season,
        focal_category,
        shooting_condition,
        decode_source: Some(*source),
    }
}

/// Streaming SHA-256 of a file. Returns (hex digest, byte length).
pub fn hash_file(path: &Path) -> crate::error::Result<(String, u64)> {
    use std::io::Read;
    let mut file = std::fs::File::open(path).map_err(|e| ApertureError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf).map_err(|e| ApertureError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), total))
}

/// Convenience wrapper: run with no progress sink and no cancellation,
/// as `index` does when stdout is not a terminal.
pub fn run_to_completion(catalog: &Catalog, config: &PipelineConfig) -> RunReport {
    let cancel = Arc::new(AtomicBool::new(false));
    run_pipeline(catalog, config, &cancel, &|_| {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_file_is_stable_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("x.bin");
        std::fs::write(&p, b"abc").unwrap();
        let (hash, len) = hash_file(&p).unwrap();
        assert_eq!(len, 3);
        // SHA-256("abc")
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_file_missing_is_io_error() {
        let err = hash_file(Path::new("/no/such/file")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_report_failure_counts_by_kind() {
        let mut report = RunReport::default();
        report.record_failure(
            Path::new("/a.jpg"),
            &ApertureError::Decode {
                path: "/a.jpg".into(),
                message: "bad".into(),
            },
        );
        report.record_failure(
            Path::new("/b.jpg"),
            &ApertureError::Decode {
                path: "/b.jpg".into(),
                message: "worse".into(),
            },
        );
        report.record_failure(
            Path::new("/c.jpg"),
            &ApertureError::Io {
                path: "/c.jpg".into(),
                message: "gone".into(),
            },
        );
        assert_eq!(report.failed, 3);
        assert_eq!(report.failures_by_kind.get("decode"), Some(&2));
        assert_eq!(report.failures_by_kind.get("io"), Some(&1));
        assert_eq!(report.failure_details.len(), 3);
    }

    #[test]
    fn test_failure_details_are_capped() {
        let mut report = RunReport::default();
        for i in 0..250 {
            report.record_failure(
                Path::new("/x.jpg"),
                &ApertureError::Io {
                    path: format!("/{}.jpg", i).into(),
                    message: "gone".into(),
                },
            );
        }
        assert_eq!(report.failed, 250);
        assert_eq!(report.failure_details.len(), MAX_FAILURE_DETAILS);
    }

    #[test]
    fn test_config_workers_floor_is_one() {
        let config = PipelineConfig::new(Path::new("/tmp")).with_workers(0);
        assert_eq!(config.workers, 1);
    }
}
