//! End-to-end ingest scenarios over a real temp directory and catalog.

use crate::catalog::Catalog;
use crate::ingest::pipeline::{run_pipeline, run_to_completion, PipelineConfig};
use crate::testutil::{canon_r5_spec, jpeg_with_exif, write_jpeg_with_exif, ExifSpec};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn setup() -> (TempDir, TempDir, Catalog) {
    let photos = tempfile::tempdir().unwrap();
    let db_dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::open_or_create(&db_dir.path().join("catalog.db")).unwrap();
    (photos, db_dir, catalog)
}

#[test]
fn test_single_canon_jpeg_end_to_end() {
    let (photos, _db, catalog) = setup();
    write_jpeg_with_exif(&photos.path().join("r5.jpg"), 800, 600, 9, &canon_r5_spec());

    let report = run_to_completion(&catalog, &PipelineConfig::new(photos.path()).with_workers(1));
    assert_eq!(report.discovered, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);

    let conn = catalog.open_reader().unwrap();
    let id: i64 = conn
        .query_row("SELECT id FROM photos", [], |r| r.get(0))
        .unwrap();

    let row = catalog.photo(id).unwrap().unwrap();
    assert_eq!(row.camera_make.as_deref(), Some("Canon"));
    assert_eq!(row.camera_model.as_deref(), Some("EOS R5"));
    assert_eq!(row.iso, Some(400));
    assert_eq!(row.aperture, Some(2.8));
    assert_eq!(row.focal_mm, Some(50.0));
    assert_eq!(row.focal_category.as_deref(), Some("normal"));
    assert_eq!(row.shooting_condition.as_deref(), Some("bright"));
    assert_eq!(row.time_of_day.as_deref(), Some("afternoon"));
    assert_eq!(row.season.as_deref(), Some("autumn"));
    assert_eq!(row.shape.as_deref(), Some("landscape"));
    assert!(row.perceptual_hash.is_some());

    // thumbnails: 64, 256, 512 present; 1024 omitted (800 < 1024)
    for size in [64u32, 256, 512] {
        assert!(
            catalog.thumbnail(id, size).unwrap().is_some(),
            "{}px variant must exist",
            size
        );
    }
    assert!(catalog.thumbnail(id, 1024).unwrap().is_none());

    // color samples exist and weights sum to one
    let colors = catalog.colors(id).unwrap();
    assert!(!colors.is_empty() && colors.len() <= 5);
    let sum: f64 = colors.iter().map(|c| c.weight).sum();
    assert!((sum - 1.0).abs() < 1e-6);
}

#[test]
fn test_reingest_is_a_no_op() {
    // an unmodified file must re-ingest as a pure no-op
    let (photos, _db, catalog) = setup();
    write_jpeg_with_exif(&photos.path().join("a.jpg"), 400, 300, 5, &canon_r5_spec());

    let config = PipelineConfig::new(photos.path()).with_workers(1);
    let first = run_to_completion(&catalog, &config);
    assert_eq!(first.processed, 1);

    let conn = catalog.open_reader().unwrap();
    let id_before: i64 = conn
        .query_row("SELECT id FROM photos", [], |r| r.get(0))
        .unwrap();

    let second = run_to_completion(&catalog, &config);
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped_unchanged, 1);

    let id_after: i64 = conn
        .query_row("SELECT id FROM photos", [], |r| r.get(0))
        .unwrap();
    assert_eq!(id_before, id_after, "re-ingest must keep the same id");
    assert_eq!(catalog.photo_count().unwrap(), 1);
}

#[test]
fn test_changed_file_is_reindexed_in_place() {
    let (photos, _db, catalog) = setup();
    let path = photos.path().join("a.jpg");
    write_jpeg_with_exif(&path, 400, 300, 5, &canon_r5_spec());
    let config = PipelineConfig::new(photos.path()).with_workers(1);
    run_to_completion(&catalog, &config);
    let id = {
        let conn = catalog.open_reader().unwrap();
        conn.query_row("SELECT id FROM photos", [], |r| r.get::<_, i64>(0))
            .unwrap()
    };

    // same path, different pixels
    write_jpeg_with_exif(&path, 500, 300, 77, &canon_r5_spec());
    let report = run_to_completion(&catalog, &config);
    assert_eq!(report.processed, 1);
    assert_eq!(catalog.photo_count().unwrap(), 1, "still one row");
    let row = catalog.photo(id).unwrap().unwrap();
    assert_eq!(row.width, 500, "metadata rewritten in place");
}

#[test]
fn test_identical_content_under_two_paths_is_skipped() {
    let (photos, _db, catalog) = setup();
    let bytes = jpeg_with_exif(300, 200, 11, &ExifSpec::default());
    std::fs::write(photos.path().join("one.jpg"), &bytes).unwrap();
    std::fs::write(photos.path().join("two.jpg"), &bytes).unwrap();

    let report = run_to_completion(&catalog, &PipelineConfig::new(photos.path()).with_workers(1));
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped_duplicate, 1);
    assert_eq!(catalog.photo_count().unwrap(), 1);
}

#[test]
fn test_tiny_source_indexed_without_thumbnails() {
    let (photos, _db, catalog) = setup();
    write_jpeg_with_exif(&photos.path().join("tiny.jpg"), 48, 32, 3, &ExifSpec::default());

    let report = run_to_completion(&catalog, &PipelineConfig::new(photos.path()).with_workers(1));
    assert_eq!(report.processed, 1);

    let conn = catalog.open_reader().unwrap();
    let (id, phash): (i64, Option<String>) = conn
        .query_row("SELECT id, perceptual_hash FROM photos", [], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })
        .unwrap();
    assert!(phash.is_none(), "no thumbnail, no perceptual hash");
    let thumb_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM thumbnails WHERE photo_id = ?1",
            [id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(thumb_count, 0);
}

#[test]
fn test_raw_container_uses_embedded_preview_fallback() {
    // the native raw decode fails, the SOI/EOI fallback
    // produces non-black thumbnails
    let (photos, _db, catalog) = setup();
    let preview = jpeg_with_exif(320, 240, 130, &ExifSpec::default());
    let mut container = b"II*\x00".to_vec();
    container.extend(std::iter::repeat(0u8).take(700));
    container.extend_from_slice(&preview);
    std::fs::write(photos.path().join("mono.dng"), container).unwrap();

    let report = run_to_completion(&catalog, &PipelineConfig::new(photos.path()).with_workers(1));
    assert_eq!(report.processed, 1, "failures: {:?}", report.failure_details);

    let conn = catalog.open_reader().unwrap();
    let (id, source): (i64, String) = conn
        .query_row("SELECT id, decode_source FROM photos", [], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })
        .unwrap();
    assert_eq!(source, "embedded_preview");

    let thumb = catalog.thumbnail(id, 256).unwrap().unwrap();
    let img = image::load_from_memory(&thumb).unwrap().to_luma8();
    let mean: f64 =
        img.pixels().map(|p| p.0[0] as f64).sum::<f64>() / (img.width() * img.height()) as f64;
    assert!(mean > 5.0, "thumbnail must not be black, mean {}", mean);
}

#[test]
fn test_corrupt_file_fails_without_aborting_the_run() {
    let (photos, _db, catalog) = setup();
    std::fs::write(photos.path().join("broken.jpg"), b"\xFF\xD8\xFF junk").unwrap();
    write_jpeg_with_exif(&photos.path().join("good.jpg"), 200, 150, 21, &ExifSpec::default());

    let report = run_to_completion(&catalog, &PipelineConfig::new(photos.path()).with_workers(1));
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures_by_kind.get("decode"), Some(&1));
    assert_eq!(catalog.photo_count().unwrap(), 1, "no partial insert");
}

#[test]
fn test_parallel_workers_persist_the_full_set() {
    let (photos, _db, catalog) = setup();
    for i in 0..10u8 {
        write_jpeg_with_exif(
            &photos.path().join(format!("p{}.jpg", i)),
            200 + i as u32,
            150,
            i.wrapping_mul(37),
            &ExifSpec::default(),
        );
    }

    let report = run_to_completion(&catalog, &PipelineConfig::new(photos.path()).with_workers(4));
    assert_eq!(report.discovered, 10);
    assert_eq!(report.processed, 10, "failures: {:?}", report.failure_details);
    assert_eq!(catalog.photo_count().unwrap(), 10);
}

#[test]
fn test_pre_cancelled_run_drains_without_processing() {
    let (photos, _db, catalog) = setup();
    for i in 0..5u8 {
        write_jpeg_with_exif(
            &photos.path().join(format!("p{}.jpg", i)),
            100,
            100,
            i + 1,
            &ExifSpec::default(),
        );
    }
    let cancel = Arc::new(AtomicBool::new(true));
    let report = run_pipeline(
        &catalog,
        &PipelineConfig::new(photos.path()).with_workers(2),
        &cancel,
        &|_| {},
    );
    assert!(report.cancelled);
    assert_eq!(report.processed, 0);
    assert_eq!(catalog.photo_count().unwrap(), 0);
    assert!(cancel.load(Ordering::SeqCst));
}

#[test]
fn test_empty_corpus_runs_cleanly() {
    let (photos, _db, catalog) = setup();
    let report = run_to_completion(&catalog, &PipelineConfig::new(photos.path()).with_workers(2));
    assert_eq!(report.discovered, 0);
    assert_eq!(report.processed, 0);
    assert_eq!(report.failed, 0);
    assert!(!report.cancelled);
}

#[test]
fn test_png_source_is_indexed_like_any_standard_format() {
    let (photos, _db, catalog) = setup();
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(300, 200, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 77])
    }));
    img.save(photos.path().join("shot.png")).unwrap();

    let report = run_to_completion(&catalog, &PipelineConfig::new(photos.path()).with_workers(1));
    assert_eq!(report.processed, 1, "failures: {:?}", report.failure_details);

    let conn = catalog.open_reader().unwrap();
    let (id, source, phash): (i64, String, Option<String>) = conn
        .query_row(
            "SELECT id, decode_source, perceptual_hash FROM photos",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    assert_eq!(source, "standard");
    assert!(phash.is_some());
    // thumbnails are JPEG regardless of source container
    let thumb = catalog.thumbnail(id, 256).unwrap().unwrap();
    assert_eq!(&thumb[0..2], &[0xFF, 0xD8]);
}

#[test]
fn test_unsupported_files_never_enter_the_queue() {
    let (photos, _db, catalog) = setup();
    std::fs::write(photos.path().join("notes.txt"), b"hello").unwrap();
    std::fs::write(photos.path().join("doc.pdf"), b"%PDF-1.4").unwrap();
    write_jpeg_with_exif(&photos.path().join("real.jpg"), 120, 90, 2, &ExifSpec::default());

    let report = run_to_completion(&catalog, &PipelineConfig::new(photos.path()).with_workers(1));
    assert_eq!(report.discovered, 1);
    assert_eq!(report.processed, 1);
}

#[test]
fn test_orientation_applied_exactly_once() {
    // a 6-oriented landscape must land as portrait in the catalog and
    // its thumbnails
    let (photos, _db, catalog) = setup();
    let spec = ExifSpec {
        orientation: Some(6),
        ..Default::default()
    };
    write_jpeg_with_exif(&photos.path().join("rot.jpg"), 600, 200, 15, &spec);

    run_to_completion(&catalog, &PipelineConfig::new(photos.path()).with_workers(1));

    let conn = catalog.open_reader().unwrap();
    let (id, w, h, shape): (i64, u32, u32, String) = conn
        .query_row("SELECT id, width, height, shape FROM photos", [], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
        })
        .unwrap();
    assert!(h > w, "stored dimensions must reflect the rotation");
    assert_eq!(shape, "portrait");

    let thumb = catalog.thumbnail(id, 256).unwrap().unwrap();
    let img = image::load_from_memory(&thumb).unwrap();
    assert!(img.height() > img.width(), "thumbnail rotated exactly once");
}
