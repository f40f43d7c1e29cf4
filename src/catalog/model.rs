//! Row types and derived-category enums shared by the store, the
//! pipeline, and the query engine.

use std::path::PathBuf;

/// Thumbnail size tags, longest edge in pixels. Variants whose tag
/// exceeds the source's longest edge are omitted (never upscaled).
pub const THUMBNAIL_SIZES: [u32; 4] = [64, 256, 512, 1024];

/// Which decoder produced the pixel buffer for a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeSource {
    Standard,
    Raw,
    EmbeddedPreview,
}

impl DecodeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeSource::Standard => "standard",
            DecodeSource::Raw => "raw",
            DecodeSource::EmbeddedPreview => "embedded_preview",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Bucket by local capture hour: morning 5-11, afternoon 12-16,
    /// evening 17-20, night otherwise.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Meteorological quarters: Dec-Feb winter, Mar-May spring,
    /// Jun-Aug summer, Sep-Nov autumn.
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FocalCategory {
    UltraWide,
    Wide,
    Normal,
    Telephoto,
    SuperTelephoto,
}

impl FocalCategory {
    /// Bucket by 35mm-equivalent focal length.
    pub fn from_focal_35mm(mm: f64) -> Self {
        if mm < 24.0 {
            FocalCategory::UltraWide
        } else if mm < 35.0 {
            FocalCategory::Wide
        } else if mm < 70.0 {
            FocalCategory::Normal
        } else if mm < 200.0 {
            FocalCategory::Telephoto
        } else {
            FocalCategory::SuperTelephoto
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FocalCategory::UltraWide => "ultra_wide",
            FocalCategory::Wide => "wide",
            FocalCategory::Normal => "normal",
            FocalCategory::Telephoto => "telephoto",
            FocalCategory::SuperTelephoto => "super_telephoto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShootingCondition {
    Bright,
    Moderate,
    LowLight,
}

impl ShootingCondition {
    /// Bucket by ISO: bright <= 400, moderate <= 1600, low_light above.
    pub fn from_iso(iso: u32) -> Self {
        if iso <= 400 {
            ShootingCondition::Bright
        } else if iso <= 1600 {
            ShootingCondition::Moderate
        } else {
            ShootingCondition::LowLight
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShootingCondition::Bright => "bright",
            ShootingCondition::Moderate => "moderate",
            ShootingCondition::LowLight => "low_light",
        }
    }
}

/// Frame shape after orientation is applied. Square is first-class:
/// a photo is exactly one of the three, square on equal dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Landscape,
    Portrait,
    Square,
}

impl Shape {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        use std::cmp::Ordering;
        match width.cmp(&height) {
            Ordering::Greater => Shape::Landscape,
            Ordering::Less => Shape::Portrait,
            Ordering::Equal => Shape::Square,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Landscape => "landscape",
            Shape::Portrait => "portrait",
            Shape::Square => "square",
        }
    }
}

/// Duplicate cluster tightness, derived from the minimum intra-cluster
/// Hamming distance: 0 exact, 1-5 near, 6-15 similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterType {
    Exact,
    Near,
    Similar,
}

impl ClusterType {
    pub fn from_min_distance(d: u32) -> Self {
        match d {
            0 => ClusterType::Exact,
            1..=5 => ClusterType::Near,
            _ => ClusterType::Similar,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterType::Exact => "exact",
            ClusterType::Near => "near",
            ClusterType::Similar => "similar",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(ClusterType::Exact),
            "near" => Some(ClusterType::Near),
            "similar" => Some(ClusterType::Similar),
            _ => None,
        }
    }
}

/// Everything the decoder and feature stack produce for one source file,
/// ready to be persisted. No id yet; the store assigns one.
#[derive(Debug, Clone, Default)]
pub struct PhotoRecord {
    pub path: PathBuf,
    pub content_hash: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub orientation_code: Option<u16>,
    /// RFC3339 UTC when the camera offset was known; naive local otherwise
    pub capture_time: Option<chrono::NaiveDateTime>,
    /// true when no UTC offset was available and capture_time is camera-local
    pub time_is_naive_local: bool,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_make: Option<String>,
    pub lens_model: Option<String>,
    pub iso: Option<u32>,
    pub aperture: Option<f64>,
    /// shutter speed preserved as display string, e.g. "1/250"
    pub shutter: Option<String>,
    pub focal_mm: Option<f64>,
    pub focal_35mm: Option<f64>,
    pub flash_fired: Option<bool>,
    pub white_balance: Option<String>,
    pub color_space: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    /// 64-bit perceptual hash, hex; present iff thumbnail generation succeeded
    pub perceptual_hash: Option<String>,
    pub shape: Option<Shape>,
    pub time_of_day: Option<TimeOfDay>,
    pub season: Option<Season>,
    pub focal_category: Option<FocalCategory>,
    pub shooting_condition: Option<ShootingCondition>,
    pub decode_source: Option<DecodeSource>,
}

/// A photo as read back from the catalog.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PhotoRow {
    pub id: i64,
    pub path: String,
    pub content_hash: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub capture_time: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_make: Option<String>,
    pub lens_model: Option<String>,
    pub iso: Option<u32>,
    pub aperture: Option<f64>,
    pub shutter: Option<String>,
    pub focal_mm: Option<f64>,
    pub focal_35mm: Option<f64>,
    pub flash_fired: Option<bool>,
    pub white_balance: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub perceptual_hash: Option<String>,
    pub shape: Option<String>,
    pub time_of_day: Option<String>,
    pub season: Option<String>,
    pub focal_category: Option<String>,
    pub shooting_condition: Option<String>,
    pub burst_group_id: Option<i64>,
    pub duplicate_cluster_id: Option<i64>,
    pub is_burst_representative: bool,
    pub is_duplicate_representative: bool,
}

/// One dominant color of a photo. Up to five per photo, ordered by rank.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ColorSample {
    pub rank: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
    /// proportion of sampled pixels in this cluster, in [0,1]
    pub weight: f64,
    /// one of the fixed 11-name palette
    pub name: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BurstGroup {
    pub id: i64,
    pub photo_count: u32,
    pub time_span_s: i64,
    pub representative_id: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DuplicateCluster {
    pub id: i64,
    pub cluster_type: ClusterType,
    pub member_count: u32,
    pub representative_id: i64,
}
