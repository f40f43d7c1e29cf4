//! Engine scenarios against a seeded catalog, including the
//! facet-count/result-count property check.

use crate::catalog::model::{ColorSample, PhotoRecord, Shape};
use crate::catalog::Catalog;
use crate::query::engine::{compute_facet, run_query, Page, QueryEngine, SortKey};
use crate::query::state::FilterState;
use crate::query::url::parse_state;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

fn open_temp() -> (TempDir, Catalog) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::open_or_create(&dir.path().join("catalog.db")).unwrap();
    (dir, catalog)
}

struct Seed {
    name: &'static str,
    time: &'static str,
    make: &'static str,
    model: &'static str,
    iso: u32,
    focal: f64,
    color: &'static str,
    shape: Shape,
}

fn insert_seed(catalog: &Catalog, seed: &Seed) -> i64 {
    let capture =
        chrono::NaiveDateTime::parse_from_str(seed.time, "%Y-%m-%dT%H:%M:%S").unwrap();
    use crate::catalog::model::{FocalCategory, Season, ShootingCondition, TimeOfDay};
    use chrono::{Datelike, Timelike};
    let (width, height) = match seed.shape {
        Shape::Landscape => (800, 600),
        Shape::Portrait => (600, 800),
        Shape::Square => (700, 700),
    };
    let record = PhotoRecord {
        path: format!("/corpus/{}.jpg", seed.name).into(),
        content_hash: format!("hash-{}", seed.name),
        file_size: 1000,
        width,
        height,
        capture_time: Some(capture),
        camera_make: Some(seed.make.to_string()),
        camera_model: Some(seed.model.to_string()),
        iso: Some(seed.iso),
        focal_mm: Some(seed.focal),
        focal_35mm: Some(seed.focal),
        shape: Some(seed.shape),
        time_of_day: Some(TimeOfDay::from_hour(capture.hour())),
        season: Some(Season::from_month(capture.month())),
        focal_category: Some(FocalCategory::from_focal_35mm(seed.focal)),
        shooting_condition: Some(ShootingCondition::from_iso(seed.iso)),
        ..Default::default()
    };
    let colors = vec![ColorSample {
        rank: 0,
        r: 120,
        g: 120,
        b: 120,
        hue: 0.0,
        saturation: 0.5,
        lightness: 0.5,
        weight: 1.0,
        name: seed.color.to_string(),
    }];
    catalog.persist_photo(&record, &[], &colors).unwrap().id()
}

/// A small corpus spanning two years, three cameras, and several
/// categories.
fn seed_corpus(catalog: &Catalog) {
    let seeds = [
        Seed { name: "a", time: "2024-10-15T14:22:00", make: "Canon", model: "EOS R5", iso: 400, focal: 50.0, color: "red", shape: Shape::Landscape },
        Seed { name: "b", time: "2024-10-16T09:10:00", make: "Canon", model: "EOS R5", iso: 100, focal: 24.0, color: "blue", shape: Shape::Portrait },
        Seed { name: "c", time: "2024-07-04T19:30:00", make: "Nikon", model: "Z8", iso: 800, focal: 85.0, color: "green", shape: Shape::Landscape },
        Seed { name: "d", time: "2025-03-09T06:45:00", make: "Nikon", model: "Z8", iso: 3200, focal: 35.0, color: "red", shape: Shape::Square },
        Seed { name: "e", time: "2025-10-02T12:00:00", make: "Sony", model: "A7 IV", iso: 200, focal: 200.0, color: "blue", shape: Shape::Landscape },
        Seed { name: "f", time: "2025-01-20T22:15:00", make: "Sony", model: "A7 IV", iso: 6400, focal: 16.0, color: "black", shape: Shape::Portrait },
        Seed { name: "g", time: "2024-10-15T15:00:00", make: "Canon", model: "EOS R6", iso: 400, focal: 50.0, color: "yellow", shape: Shape::Landscape },
        Seed { name: "h", time: "2023-12-25T11:05:00", make: "Canon", model: "EOS R6", iso: 1600, focal: 70.0, color: "white", shape: Shape::Square },
    ];
    for seed in &seeds {
        insert_seed(catalog, seed);
    }
}

fn total_of(catalog: &Catalog, state: &FilterState) -> i64 {
    let conn = catalog.open_reader().unwrap();
    run_query(&conn, state, SortKey::default(), Page::default())
        .unwrap()
        .total
}

#[test]
fn test_month_only_filter_spans_years() {
    // month=10 means every October in the corpus, whatever the year
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    let state = FilterState::from_pairs([("month", "10")]);
    assert_eq!(total_of(&catalog, &state), 3, "a, b, e are October shots");
}

#[test]
fn test_day_without_year_or_month() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    let state = FilterState::from_pairs([("day", "15")]);
    assert_eq!(total_of(&catalog, &state), 2, "a and g are on the 15th");
}

#[test]
fn test_month_plus_day_without_year() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    let state = FilterState::from_pairs([("month", "10"), ("day", "15")]);
    assert_eq!(total_of(&catalog, &state), 2);
}

#[test]
fn test_year_facet_under_month_filter() {
    // under a month filter the year facet counts each year's Octobers
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    let state = FilterState::from_pairs([("month", "10")]);
    let conn = catalog.open_reader().unwrap();
    let facet = compute_facet(
        &conn,
        &state,
        crate::catalog::facets::facet_def("year").unwrap(),
    )
    .unwrap();

    let y2024 = facet.values.iter().find(|v| v.value == "2024").unwrap();
    assert_eq!(y2024.count, 2);
    assert!(!y2024.selected);
    assert!(
        y2024.url.contains("month=10") && y2024.url.contains("year=2024"),
        "url must add year while preserving month: {}",
        y2024.url
    );

    let y2025 = facet.values.iter().find(|v| v.value == "2025").unwrap();
    assert_eq!(y2025.count, 1, "e is the only 2025 October shot");
}

#[test]
fn test_selected_year_click_replaces_and_leads_to_advertised_count() {
    // from {month=10, year=2024}, clicking 2025 yields
    // {month=10, year=2025} whose total equals the advertised count
    let (_dir, catalog) = open_temp();
    // only the two photos of the scenario
    insert_seed(&catalog, &Seed { name: "oct24", time: "2024-10-15T14:22:00", make: "Canon", model: "EOS R5", iso: 400, focal: 50.0, color: "red", shape: Shape::Landscape });
    insert_seed(&catalog, &Seed { name: "mar25", time: "2025-03-09T10:00:00", make: "Canon", model: "EOS R5", iso: 400, focal: 50.0, color: "red", shape: Shape::Landscape });

    let state = FilterState::from_pairs([("month", "10"), ("year", "2024")]);
    let conn = catalog.open_reader().unwrap();
    let facet = compute_facet(
        &conn,
        &state,
        crate::catalog::facets::facet_def("year").unwrap(),
    )
    .unwrap();

    let y2024 = facet.values.iter().find(|v| v.value == "2024").unwrap();
    assert!(y2024.selected);
    assert_eq!(y2024.count, 1);

    let y2025 = facet.values.iter().find(|v| v.value == "2025").unwrap();
    assert!(!y2025.selected);
    assert_eq!(y2025.count, 0, "no October 2025 photo: disabled");

    // follow the url anyway (deep link): graceful zero-result state
    let next = parse_state(&y2025.url);
    assert_eq!(next.year, Some(2025));
    assert_eq!(next.month, Some(10), "month preserved");
    assert_eq!(total_of(&catalog, &next), 0);

    // the zero state renders with two removable chips
    let engine = QueryEngine::new(&catalog);
    let render = engine
        .render(&next, SortKey::default(), Page::default())
        .unwrap();
    assert_eq!(render.result.total, 0);
    assert_eq!(render.chips.len(), 2);
    let dims: Vec<&str> = render.chips.iter().map(|c| c.dim.as_str()).collect();
    assert!(dims.contains(&"year") && dims.contains(&"month"));
    // each chip removes only its own dimension
    let year_chip = render.chips.iter().find(|c| c.dim == "year").unwrap();
    let after_remove = parse_state(&year_chip.remove_url);
    assert_eq!(after_remove.year, None);
    assert_eq!(after_remove.month, Some(10));
}

#[test]
fn test_facet_counts_match_result_counts_across_random_states() {
    // the master invariant: for every rendered facet value,
    // following url(v) lands on a query whose total equals count(v)
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    let engine = QueryEngine::new(&catalog);
    let mut rng = StdRng::seed_from_u64(42);

    let dims_and_values: Vec<(&str, Vec<&str>)> = vec![
        ("year", vec!["2023", "2024", "2025"]),
        ("month", vec!["1", "3", "7", "10", "12"]),
        ("day", vec!["15", "20", "25"]),
        ("camera_make", vec!["Canon", "Nikon", "Sony"]),
        ("camera_model", vec!["EOS R5", "Z8", "A7 IV"]),
        ("season", vec!["winter", "spring", "summer", "autumn"]),
        ("time_of_day", vec!["morning", "afternoon", "evening", "night"]),
        ("shooting_condition", vec!["bright", "moderate", "low_light"]),
        ("focal_category", vec!["ultra_wide", "wide", "normal", "telephoto"]),
        ("shape", vec!["landscape", "portrait", "square"]),
        ("color_name", vec!["red", "blue", "green", "black"]),
    ];

    for _ in 0..12 {
        let mut state = FilterState::default();
        let active = rng.gen_range(0..=5);
        for _ in 0..active {
            let (dim, values) = &dims_and_values[rng.gen_range(0..dims_and_values.len())];
            let value = values[rng.gen_range(0..values.len())];
            state = state.toggle(dim, value);
        }

        let facets = engine.facets(&state).unwrap();
        for facet in &facets {
            for value in &facet.values {
                let target = parse_state(&value.url);
                let total = total_of(&catalog, &target);
                assert_eq!(
                    total, value.count,
                    "state {:?}: facet {} value {} advertises {} but url {} yields {}",
                    state, facet.name, value.value, value.count, value.url, total
                );
            }
        }
    }
}

#[test]
fn test_zero_count_values_are_retained_not_hidden() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    // a filter matching only Canon photos
    let state = FilterState::from_pairs([("camera_make", "Canon")]);
    let conn = catalog.open_reader().unwrap();
    let facet = compute_facet(
        &conn,
        &state,
        crate::catalog::facets::facet_def("camera_model").unwrap(),
    )
    .unwrap();
    let z8 = facet.values.iter().find(|v| v.value == "Z8").unwrap();
    assert_eq!(z8.count, 0, "Nikon model disabled under Canon filter");
    assert!(!z8.selected);
    assert!(!z8.url.is_empty(), "disabled values keep a url");
}

#[test]
fn test_multi_select_or_semantics_and_counts() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    let state = FilterState::from_pairs([("camera_make", "Canon")]);
    // adding Nikon must advertise the OR total
    let conn = catalog.open_reader().unwrap();
    let facet = compute_facet(
        &conn,
        &state,
        crate::catalog::facets::facet_def("camera_make").unwrap(),
    )
    .unwrap();
    let nikon = facet.values.iter().find(|v| v.value == "Nikon").unwrap();
    let canon_count = 4i64;
    let nikon_count = 2i64;
    assert_eq!(
        nikon.count,
        canon_count + nikon_count,
        "toggling Nikon keeps Canon selected: OR within the dimension"
    );
    // and the selected value advertises the total after removal
    let canon = facet.values.iter().find(|v| v.value == "Canon").unwrap();
    assert!(canon.selected);
    assert_eq!(canon.count, 8, "removing the only make filter shows all");
}

#[test]
fn test_empty_corpus_returns_clean_empty_page() {
    // an empty catalog renders a clean, empty page
    let (_dir, catalog) = open_temp();
    let engine = QueryEngine::new(&catalog);
    let render = engine
        .render(&FilterState::default(), SortKey::default(), Page::default())
        .unwrap();
    assert_eq!(render.result.total, 0);
    assert!(render.result.photos.is_empty());
    for facet in &render.facets {
        assert!(
            facet.values.is_empty(),
            "empty corpus: facet {} must have no values",
            facet.name
        );
    }
    assert!(render.chips.is_empty());
}

#[test]
fn test_zero_match_text_filter_disables_every_value() {
    // a no-match filter leaves the whole facet collection at count zero
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    let engine = QueryEngine::new(&catalog);
    let state = FilterState::from_pairs([("q", "no-such-camera-anywhere")]);
    let render = engine
        .render(&state, SortKey::default(), Page::default())
        .unwrap();
    assert_eq!(render.result.total, 0);
    for facet in &render.facets {
        for value in &facet.values {
            assert_eq!(
                value.count, 0,
                "facet {} value {} must be disabled",
                facet.name, value.value
            );
        }
    }
}

#[test]
fn test_sort_orders() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    let conn = catalog.open_reader().unwrap();

    let by_time = run_query(
        &conn,
        &FilterState::default(),
        SortKey::CaptureTime,
        Page::default(),
    )
    .unwrap();
    let times: Vec<_> = by_time
        .photos
        .iter()
        .map(|p| p.capture_time.clone().unwrap())
        .collect();
    let mut sorted = times.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(times, sorted, "default sort is capture time descending");

    let by_iso = run_query(&conn, &FilterState::default(), SortKey::Iso, Page::default())
        .unwrap();
    let isos: Vec<_> = by_iso.photos.iter().map(|p| p.iso.unwrap()).collect();
    let mut sorted = isos.clone();
    sorted.sort_unstable();
    assert_eq!(isos, sorted);
}

#[test]
fn test_paging_window() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    let conn = catalog.open_reader().unwrap();
    let page1 = run_query(
        &conn,
        &FilterState::default(),
        SortKey::CaptureTime,
        Page { limit: 3, offset: 0 },
    )
    .unwrap();
    assert_eq!(page1.photos.len(), 3);
    assert_eq!(page1.total, 8, "total ignores the window");
    let page2 = run_query(
        &conn,
        &FilterState::default(),
        SortKey::CaptureTime,
        Page { limit: 3, offset: 6 },
    )
    .unwrap();
    assert_eq!(page2.photos.len(), 2);
}

#[test]
fn test_facet_truncation_flags() {
    let (_dir, catalog) = open_temp();
    // 35 distinct camera models so the facet must truncate at 30
    for i in 0..35 {
        insert_seed(
            &catalog,
            &Seed {
                name: Box::leak(format!("m{}", i).into_boxed_str()),
                time: "2024-05-01T10:00:00",
                make: "Canon",
                model: Box::leak(format!("Model {:02}", i).into_boxed_str()),
                iso: 100,
                focal: 50.0,
                color: "red",
                shape: Shape::Landscape,
            },
        );
    }
    let conn = catalog.open_reader().unwrap();
    let facet = compute_facet(
        &conn,
        &FilterState::default(),
        crate::catalog::facets::facet_def("camera_model").unwrap(),
    )
    .unwrap();
    assert!(facet.truncated);
    assert_eq!(facet.total_distinct, 35);
    assert_eq!(facet.values.len(), 30);
}

#[test]
fn test_range_filters_bound_both_ends() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);

    let iso_band = FilterState::from_pairs([("iso_min", "200"), ("iso_max", "800")]);
    // b=100 and d/f above 800 fall out; a=400, c=800, e=200, g=400, h=1600 out
    assert_eq!(total_of(&catalog, &iso_band), 4);

    let long_lenses = FilterState::from_pairs([("focal_min", "70")]);
    // c=85, e=200, h=70
    assert_eq!(total_of(&catalog, &long_lenses), 3);

    let tele_low_iso = FilterState::from_pairs([("focal_min", "70"), ("iso_max", "800")]);
    assert_eq!(total_of(&catalog, &tele_low_iso), 2, "ranges AND together");
}

#[test]
fn test_text_search_matches_camera_and_path() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);

    let by_model = FilterState::from_pairs([("q", "Z8")]);
    assert_eq!(total_of(&catalog, &by_model), 2);

    // paths are /corpus/<name>.jpg
    let by_path = FilterState::from_pairs([("q", "corpus/a")]);
    assert_eq!(total_of(&catalog, &by_path), 1);

    let no_match = FilterState::from_pairs([("q", "medium format")]);
    assert_eq!(total_of(&catalog, &no_match), 0);
}

#[test]
fn test_color_filter_through_samples() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);

    let red = FilterState::from_pairs([("color_name", "red")]);
    assert_eq!(total_of(&catalog, &red), 2, "a and d carry red samples");

    let red_or_blue = FilterState::from_pairs([("color_name", "red"), ("color_name", "blue")]);
    assert_eq!(total_of(&catalog, &red_or_blue), 4, "OR within the color dimension");

    let red_canon =
        FilterState::from_pairs([("color_name", "red"), ("camera_make", "Nikon")]);
    assert_eq!(total_of(&catalog, &red_canon), 1, "AND across dimensions");
}

#[test]
fn test_shape_filter_with_square_first_class() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);

    let square = FilterState::from_pairs([("shape", "square")]);
    assert_eq!(total_of(&catalog, &square), 2, "d and h are square");

    let square_or_portrait =
        FilterState::from_pairs([("shape", "square"), ("shape", "portrait")]);
    assert_eq!(total_of(&catalog, &square_or_portrait), 4);
}

#[test]
fn test_month_facet_labels_read_as_calendar_months() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    let conn = catalog.open_reader().unwrap();
    let facet = compute_facet(
        &conn,
        &FilterState::default(),
        crate::catalog::facets::facet_def("month").unwrap(),
    )
    .unwrap();
    let october = facet.values.iter().find(|v| v.value == "10").unwrap();
    assert_eq!(october.label, "October");
    // calendar order despite named labels
    let values: Vec<&str> = facet.values.iter().map(|v| v.value.as_str()).collect();
    let mut sorted: Vec<i32> = values.iter().map(|v| v.parse().unwrap()).collect();
    sorted.sort_unstable();
    let resorted: Vec<String> = sorted.iter().map(|v| v.to_string()).collect();
    assert_eq!(values, resorted.iter().map(|s| s.as_str()).collect::<Vec<_>>());
}

#[test]
fn test_chips_remove_exactly_one_selection() {
    let (_dir, catalog) = open_temp();
    seed_corpus(&catalog);
    let engine = QueryEngine::new(&catalog);
    let state = FilterState::from_pairs([
        ("camera_make", "Canon"),
        ("camera_make", "Nikon"),
        ("month", "10"),
    ]);
    let render = engine
        .render(&state, SortKey::default(), Page::default())
        .unwrap();
    assert_eq!(render.chips.len(), 3);

    let canon_chip = render
        .chips
        .iter()
        .find(|c| c.dim == "camera_make" && c.value == "Canon")
        .unwrap();
    let after = parse_state(&canon_chip.remove_url);
    assert_eq!(after.camera_make, vec!["Nikon"], "only Canon removed");
    assert_eq!(after.month, Some(10), "month untouched");
    assert_eq!(render.clear_all_url, "/photos");
}
