//! The request state: one typed filter per dimension.
//!
//! Every dimension is independent. No operation here ever touches a
//! dimension other than the one it was asked about; the facet-count
//! invariant lives or dies on that property, so all mutation goes
//! through the pure `toggle` / `remove_value` / `without_dim` helpers.

/// Typed filter selections over the declared dimensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    // temporal: each part stands alone; month=10 without year is valid
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    // equipment
    pub camera_make: Vec<String>,
    pub camera_model: Vec<String>,
    pub lens_make: Vec<String>,
    pub lens_model: Vec<String>,
    // exposure
    pub iso_min: Option<u32>,
    pub iso_max: Option<u32>,
    pub aperture_min: Option<f64>,
    pub aperture_max: Option<f64>,
    pub focal_min: Option<f64>,
    pub focal_max: Option<f64>,
    pub flash_fired: Option<bool>,
    pub white_balance: Vec<String>,
    // classification
    pub time_of_day: Vec<String>,
    pub season: Vec<String>,
    pub focal_category: Vec<String>,
    pub shooting_condition: Vec<String>,
    // orientation
    pub shape: Vec<String>,
    // color
    pub color_name: Vec<String>,
    pub hue_min: Option<f64>,
    pub hue_max: Option<f64>,
    // structural
    pub in_burst: Option<bool>,
    pub burst_group_id: Option<i64>,
    pub is_duplicate: Vec<String>,
    pub cluster_type: Vec<String>,
    // geo
    pub has_gps: Option<bool>,
    // text
    pub text: Option<String>,
}

/// Canonical parameter order for URLs and chip rendering.
pub const PARAM_ORDER: &[&str] = &[
    "year",
    "month",
    "day",
    "camera_make",
    "camera_model",
    "lens_make",
    "lens_model",
    "iso_min",
    "iso_max",
    "aperture_min",
    "aperture_max",
    "focal_min",
    "focal_max",
    "flash_fired",
    "white_balance",
    "time_of_day",
    "season",
    "focal_category",
    "shooting_condition",
    "shape",
    "color_name",
    "hue_min",
    "hue_max",
    "in_burst",
    "burst_group_id",
    "is_duplicate",
    "cluster_type",
    "has_gps",
    "q",
];

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.to_pairs().is_empty()
    }

    /// Values currently selected in one dimension, as strings.
    pub fn selections_of(&self, dim: &str) -> Vec<String> {
        if let Some(values) = self.multi_dim(dim) {
            return values.clone();
        }
        self.single_dim(dim).into_iter().collect()
    }

    pub fn is_selected(&self, dim: &str, value: &str) -> bool {
        self.selections_of(dim).iter().any(|v| v == value)
    }

    /// The state with one value toggled in one dimension: removed when
    /// selected, added otherwise (single-valued dimensions replace).
    /// Every other dimension is untouched.
    pub fn toggle(&self, dim: &str, value: &str) -> FilterState {
        let mut next = self.clone();
        if let Some(values) = next.multi_dim_mut(dim) {
            if let Some(pos) = values.iter().position(|v| v == value) {
                values.remove(pos);
            } else {
                values.push(value.to_string());
            }
            return next;
        }
        if next.single_dim(dim).as_deref() == Some(value) {
            next.clear_single(dim);
        } else {
            next.set_single(dim, value);
        }
        next
    }

    /// The state with one selection removed (chip removal). A no-op if
    /// the value is not selected.
    pub fn remove_value(&self, dim: &str, value: &str) -> FilterState {
        let mut next = self.clone();
        if let Some(values) = next.multi_dim_mut(dim) {
            values.retain(|v| v != value);
            return next;
        }
        if next.single_dim(dim).as_deref() == Some(value) {
            next.clear_single(dim);
        }
        next
    }

    /// The state with one dimension's own selections cleared; the
    /// facet engine computes counts for D against this.
    pub fn without_dim(&self, dim: &str) -> FilterState {
        let mut next = self.clone();
        if let Some(values) = next.multi_dim_mut(dim) {
            values.clear();
            return next;
        }
        next.clear_single(dim);
        next
    }

    /// Every active selection as (dimension, value), in canonical
    /// order. One chip per entry.
    pub fn active_selections(&self) -> Vec<(String, String)> {
        self.to_pairs()
    }

    /// Canonical (key, value) pairs. `from_pairs` is the inverse.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for &dim in PARAM_ORDER {
            if let Some(values) = self.multi_dim(dim) {
                for v in values {
                    pairs.push((dim.to_string(), v.clone()));
                }
            } else if let Some(v) = self.single_dim(dim) {
                pairs.push((dim.to_string(), v));
            }
        }
        pairs
    }

    /// Build a state from (key, value) pairs. Unknown keys and
    /// unparseable values are ignored.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> FilterState {
        let mut state = FilterState::default();
        for (key, value) in pairs {
            if let Some(values) = state.multi_dim_mut(key) {
                if !value.is_empty() {
                    values.push(value.to_string());
                }
            } else {
                state.set_single(key, value);
            }
        }
        state
    }

    // ── dimension plumbing ───────────────────────────────────────────

    fn multi_dim(&self, dim: &str) -> Option<&Vec<String>> {
        match dim {
            "camera_make" => Some(&self.camera_make),
            "camera_model" => Some(&self.camera_model),
            "lens_make" => Some(&self.lens_make),
            "lens_model" => Some(&self.lens_model),
            "white_balance" => Some(&self.white_balance),
            "time_of_day" => Some(&self.time_of_day),
            "season" => Some(&self.season),
            "focal_category" => Some(&self.focal_category),
            "shooting_condition" => Some(&self.shooting_condition),
            "shape" => Some(&self.shape),
            "color_name" => Some(&self.color_name),
            "is_duplicate" => Some(&self.is_duplicate),
            "cluster_type" => Some(&self.cluster_type),
            _ => None,
        }
    }

    fn multi_dim_mut(&mut self, dim: &str) -> Option<&mut Vec<String>> {
        match dim {
            "camera_make" => Some(&mut self.camera_make),
            "camera_model" => Some(&mut self.camera_model),
            "lens_make" => Some(&mut self.lens_make),
            "lens_model" => Some(&mut self.lens_model),
            "white_balance" => Some(&mut self.white_balance),
            "time_of_day" => Some(&mut self.time_of_day),
            "season" => Some(&mut self.season),
            "focal_category" => Some(&mut self.focal_category),
            "shooting_condition" => Some(&mut self.shooting_condition),
            "shape" => Some(&mut self.shape),
            "color_name" => Some(&mut self.color_name),
            "is_duplicate" => Some(&mut self.is_duplicate),
            "cluster_type" => Some(&mut self.cluster_type),
            _ => None,
        }
    }

    fn single_dim(&self, dim: &str) -> Option<String> {
        match dim {
            "year" => self.year.map(|v| v.to_string()),
            "month" => self.month.map(|v| v.to_string()),
            "day" => self.day.map(|v| v.to_string()),
            "iso_min" => self.iso_min.map(|v| v.to_string()),
            "iso_max" => self.iso_max.map(|v| v.to_string()),
            "aperture_min" => self.aperture_min.map(|v| v.to_string()),
            "aperture_max" => self.aperture_max.map(|v| v.to_string()),
            "focal_min" => self.focal_min.map(|v| v.to_string()),
            "focal_max" => self.focal_max.map(|v| v.to_string()),
            "flash_fired" => self.flash_fired.map(|v| v.to_string()),
            "hue_min" => self.hue_min.map(|v| v.to_string()),
            "hue_max" => self.hue_max.map(|v| v.to_string()),
            "in_burst" => self.in_burst.map(|v| v.to_string()),
            "burst_group_id" => self.burst_group_id.map(|v| v.to_string()),
            "has_gps" => self.has_gps.map(|v| v.to_string()),
            "q" => self.text.clone(),
            _ => None,
        }
    }

    fn set_single(&mut self, dim: &str, value: &str) {
        match dim {
            "year" => self.year = value.parse().ok(),
            "month" => self.month = value.parse().ok().filter(|m| (1..=12).contains(m)),
            "day" => self.day = value.parse().ok().filter(|d| (1..=31).contains(d)),
            "iso_min" => self.iso_min = value.parse().ok(),
            "iso_max" => self.iso_max = value.parse().ok(),
            "aperture_min" => self.aperture_min = value.parse().ok(),
            "aperture_max" => self.aperture_max = value.parse().ok(),
            "focal_min" => self.focal_min = value.parse().ok(),
            "focal_max" => self.focal_max = value.parse().ok(),
            "flash_fired" => self.flash_fired = parse_bool(value),
            "hue_min" => self.hue_min = value.parse().ok(),
            "hue_max" => self.hue_max = value.parse().ok(),
            "in_burst" => self.in_burst = parse_bool(value),
            "burst_group_id" => self.burst_group_id = value.parse().ok(),
            "has_gps" => self.has_gps = parse_bool(value),
            "q" => self.text = (!value.is_empty()).then(|| value.to_string()),
            _ => {}
        }
    }

    fn clear_single(&mut self, dim: &str) {
        match dim {
            "year" => self.year = None,
            "month" => self.month = None,
            "day" => self.day = None,
            "iso_min" => self.iso_min = None,
            "iso_max" => self.iso_max = None,
            "aperture_min" => self.aperture_min = None,
            "aperture_max" => self.aperture_max = None,
            "focal_min" => self.focal_min = None,
            "focal_max" => self.focal_max = None,
            "flash_fired" => self.flash_fired = None,
            "hue_min" => self.hue_min = None,
            "hue_max" => self.hue_max = None,
            "in_burst" => self.in_burst = None,
            "burst_group_id" => self.burst_group_id = None,
            "has_gps" => self.has_gps = None,
            "q" => self.text = None,
            _ => {}
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
