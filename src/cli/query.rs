//! `query --db <file> [filter flags...] [--format table|json|ids] [--facets]`
//!
//! Filter flags mirror the web dimensions one to one, underscores and
//! all. Temporal flags are independent: `--month 10` without `--year`
//! is a valid invocation.

use crate::query::engine::{run_query, Page, QueryEngine, SortKey};
use crate::query::state::FilterState;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Ids,
}

#[derive(Args, Debug, Default)]
pub struct QueryArgs {
    /// Catalog file
    #[arg(long)]
    pub db: PathBuf,

    #[arg(long)]
    pub year: Option<i32>,
    #[arg(long)]
    pub month: Option<u32>,
    #[arg(long)]
    pub day: Option<u32>,

    #[arg(long = "camera_make")]
    pub camera_make: Vec<String>,
    #[arg(long = "camera_model")]
    pub camera_model: Vec<String>,
    #[arg(long = "lens_make")]
    pub lens_make: Vec<String>,
    #[arg(long = "lens_model")]
    pub lens_model: Vec<String>,

    #[arg(long = "iso_min")]
    pub iso_min: Option<u32>,
    #[arg(long = "iso_max")]
    pub iso_max: Option<u32>,
    #[arg(long = "aperture_min")]
    pub aperture_min: Option<f64>,
    #[arg(long = "aperture_max")]
    pub aperture_max: Option<f64>,
    #[arg(long = "focal_min")]
    pub focal_min: Option<f64>,
    #[arg(long = "focal_max")]
    pub focal_max: Option<f64>,
    #[arg(long = "flash_fired")]
    pub flash_fired: Option<bool>,
    #[arg(long = "white_balance")]
    pub white_balance: Vec<String>,

    #[arg(long = "time_of_day")]
    pub time_of_day: Vec<String>,
    #[arg(long)]
    pub season: Vec<String>,
    #[arg(long = "focal_category")]
    pub focal_category: Vec<String>,
    #[arg(long = "shooting_condition")]
    pub shooting_condition: Vec<String>,
    #[arg(long)]
    pub shape: Vec<String>,

    #[arg(long = "color_name")]
    pub color_name: Vec<String>,
    #[arg(long = "hue_min")]
    pub hue_min: Option<f64>,
    #[arg(long = "hue_max")]
    pub hue_max: Option<f64>,

    #[arg(long = "in_burst")]
    pub in_burst: Option<bool>,
    #[arg(long = "burst_group_id")]
    pub burst_group_id: Option<i64>,
    #[arg(long = "is_duplicate")]
    pub is_duplicate: Vec<String>,
    #[arg(long = "cluster_type")]
    pub cluster_type: Vec<String>,
    #[arg(long = "has_gps")]
    pub has_gps: Option<bool>,

    /// Substring search over camera, lens, and path
    #[arg(long)]
    pub q: Option<String>,

    /// Sort key: capture_time, camera, focal, iso, aperture
    #[arg(long, default_value = "capture_time")]
    pub sort: String,
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Also print facet counts for the state
    #[arg(long)]
    pub facets: bool,
}

impl QueryArgs {
    pub fn to_state(&self) -> FilterState {
        FilterState {
            year: self.year,
            month: self.month.filter(|m| (1..=12).contains(m)),
            day: self.day.filter(|d| (1..=31).contains(d)),
            camera_make: self.camera_make.clone(),
            camera_model: self.camera_model.clone(),
            lens_make: self.lens_make.clone(),
            lens_model: self.lens_model.clone(),
            iso_min: self.iso_min,
            iso_max: self.iso_max,
            aperture_min: self.aperture_min,
            aperture_max: self.aperture_max,
            focal_min: self.focal_min,
            focal_max: self.focal_max,
            flash_fired: self.flash_fired,
            white_balance: self.white_balance.clone(),
            time_of_day: self.time_of_day.clone(),
            season: self.season.clone(),
            focal_category: self.focal_category.clone(),
            shooting_condition: self.shooting_condition.clone(),
            shape: self.shape.clone(),
            color_name: self.color_name.clone(),
            hue_min: self.hue_min,
            hue_max: self.hue_max,
            in_burst: self.in_burst,
            burst_group_id: self.burst_group_id,
            is_duplicate: self.is_duplicate.clone(),
            cluster_type: self.cluster_type.clone(),
            has_gps: self.has_gps,
            text: self.q.clone(),
        }
    }
}

pub fn execute(args: QueryArgs) -> i32 {
    let catalog = match super::open_catalog(&args.db) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let state = args.to_state();
    let sort = SortKey::parse(&args.sort).unwrap_or_default();
    let page = Page {
        limit: args.limit,
        offset: args.offset,
    };

    let conn = match catalog.open_reader() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fatal: {}", e);
            return 2;
        }
    };
    let result = match run_query(&conn, &state, sort, page) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("fatal: query failed: {}", e);
            return 2;
        }
    };

    match args.format {
        OutputFormat::Ids => {
            for photo in &result.photos {
                println!("{}", photo.id);
            }
        }
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "total": result.total,
                "photos": result.photos,
            });
            println!("{}", serde_json::to_string_pretty(&payload).expect("serializable"));
        }
        OutputFormat::Table => {
            println!(
                "{:>6}  {:<19}  {:<24}  {:>5}  {:>6}  path",
                "id", "captured", "camera", "iso", "focal"
            );
            for photo in &result.photos {
                println!(
                    "{:>6}  {:<19}  {:<24}  {:>5}  {:>6}  {}",
                    photo.id,
                    photo.capture_time.as_deref().unwrap_or("-"),
                    format!(
                        "{} {}",
                        photo.camera_make.as_deref().unwrap_or("?"),
                        photo.camera_model.as_deref().unwrap_or("?")
                    ),
                    photo
                        .iso
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".into()),
                    photo
                        .focal_mm
                        .map(|v| format!("{}mm", v))
                        .unwrap_or_else(|| "-".into()),
                    photo.path
                );
            }
            println!("total: {}", result.total);
        }
    }

    if args.facets {
        let engine = QueryEngine::new(&catalog);
        match engine.facets(&state) {
            Ok(facets) => {
                for facet in facets {
                    if facet.values.is_empty() {
                        continue;
                    }
                    println!("\n{}:", facet.label);
                    for value in &facet.values {
                        println!(
                            "  {} {} ({}){}",
                            if value.selected { "*" } else { " " },
                            value.label,
                            value.count,
                            if value.count == 0 { " [disabled]" } else { "" }
                        );
                    }
                    if facet.truncated {
                        println!("  … {} more", facet.total_distinct - facet.values.len());
                    }
                }
            }
            Err(e) => {
                eprintln!("fatal: facet computation failed: {}", e);
                return 2;
            }
        }
    }

    0
}
