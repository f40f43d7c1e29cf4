//! The faceted query engine.
//!
//! For every dimension the facet collection advertises, each value's
//! count equals the total of the query reached by following that
//! value's URL. The engine never refuses a state: a zero-result state
//! returns the empty page plus the same facet collection rather than
//! an error.

use crate::catalog::facets::{FacetDef, FacetOrdering, FACET_DEFS};
use crate::catalog::store::{row_to_photo, PHOTO_SELECT};
use crate::catalog::{Catalog, PhotoRow};
use crate::error::{ApertureError, Result};
use crate::query::sql::{build_where_clause, calendar_part_expr};
use crate::query::state::FilterState;
use crate::query::url::build_url;
use rayon::prelude::*;
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Each facet returns at most this many values before truncation.
pub const FACET_VALUE_LIMIT: usize = 30;

/// Soft deadline per facet computation.
pub const FACET_DEADLINE: Duration = Duration::from_millis(200);

/// Soft deadline for facet discovery (which dimensions to show).
pub const DISCOVERY_DEADLINE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CaptureTime,
    Camera,
    FocalLength,
    Iso,
    Aperture,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "capture_time" | "time" => Some(SortKey::CaptureTime),
            "camera" => Some(SortKey::Camera),
            "focal" | "focal_length" => Some(SortKey::FocalLength),
            "iso" => Some(SortKey::Iso),
            "aperture" => Some(SortKey::Aperture),
            _ => None,
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            SortKey::CaptureTime => "p.capture_time DESC NULLS LAST, p.id DESC",
            SortKey::Camera => "p.camera_make ASC NULLS LAST, p.camera_model ASC, p.id ASC",
            SortKey::FocalLength => "p.focal_mm ASC NULLS LAST, p.id ASC",
            SortKey::Iso => "p.iso ASC NULLS LAST, p.id ASC",
            SortKey::Aperture => "p.aperture ASC NULLS LAST, p.id ASC",
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 60,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryResult {
    pub photos: Vec<PhotoRow>,
    pub total: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FacetValue {
    pub value: String,
    pub label: String,
    pub count: i64,
    pub selected: bool,
    pub url: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Facet {
    pub name: String,
    pub label: String,
    pub values: Vec<FacetValue>,
    pub truncated: bool,
    pub total_distinct: usize,
    pub degraded: bool,
}

/// One removable active-filter chip.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Chip {
    pub dim: String,
    pub value: String,
    pub remove_url: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PageRender {
    pub result: QueryResult,
    pub facets: Vec<Facet>,
    pub chips: Vec<Chip>,
    /// canonical URL of the current state, without view parameters
    pub state_url: String,
    pub page: Page,
    pub clear_all_url: String,
    pub degraded: bool,
}

/// Run the composed filter against the photo table.
pub fn run_query(
    conn: &Connection,
    state: &FilterState,
    sort: SortKey,
    page: Page,
) -> Result<QueryResult> {
    let filter = build_where_clause(state, None);
    let total: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM photos p {}", filter.where_clause),
            filter.param_refs().as_slice(),
            |row| row.get(0),
        )
        .map_err(ApertureError::from)?;

    let sql = format!(
        "{} {} ORDER BY {} LIMIT ? OFFSET ?",
        PHOTO_SELECT,
        filter.where_clause,
        sort.order_by()
    );
    let mut stmt = conn.prepare(&sql).map_err(ApertureError::from)?;
    let mut params = filter.param_refs();
    let limit = page.limit as i64;
    let offset = page.offset as i64;
    params.push(&limit);
    params.push(&offset);
    let rows = stmt
        .query_map(params.as_slice(), row_to_photo)
        .map_err(ApertureError::from)?;
    let photos = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(ApertureError::from)?;
    Ok(QueryResult { photos, total })
}

/// Total alone, used for toggled-state counts.
fn count_total(conn: &Connection, state: &FilterState) -> Result<i64> {
    let filter = build_where_clause(state, None);
    conn.query_row(
        &format!("SELECT COUNT(*) FROM photos p {}", filter.where_clause),
        filter.param_refs().as_slice(),
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// SQL expression yielding a dimension's per-photo value.
fn value_expr(dim: &str) -> String {
    match dim {
        "year" | "month" | "day" => calendar_part_expr(dim),
        "camera_make" => "p.camera_make".into(),
        "camera_model" => "p.camera_model".into(),
        "lens_make" => "p.lens_make".into(),
        "lens_model" => "p.lens_model".into(),
        "white_balance" => "p.white_balance".into(),
        "time_of_day" => "p.time_of_day".into(),
        "season" => "p.season".into(),
        "focal_category" => "p.focal_category".into(),
        "shooting_condition" => "p.shooting_condition".into(),
        "shape" => "p.shape".into(),
        "flash_fired" => {
            "CASE p.flash_fired WHEN 1 THEN 'true' WHEN 0 THEN 'false' ELSE NULL END".into()
        }
        "in_burst" => {
            "CASE WHEN p.burst_group_id IS NULL THEN 'false' ELSE 'true' END".into()
        }
        "is_duplicate" => {
            "CASE WHEN p.duplicate_cluster_id IS NULL THEN 'false' ELSE 'true' END".into()
        }
        "has_gps" => {
            "CASE WHEN p.latitude IS NOT NULL AND p.longitude IS NOT NULL \
             THEN 'true' ELSE 'false' END"
                .into()
        }
        "cluster_type" => {
            "(SELECT dc.cluster_type FROM duplicate_clusters dc \
              WHERE dc.id = p.duplicate_cluster_id)"
                .into()
        }
        other => unreachable!("no value expression for dimension {}", other),
    }
}

/// Corpus-wide distinct values of a dimension. Facet values with zero
/// matches under the current filter stay visible (disabled, never
/// hidden), so the universe ignores the filter entirely.
fn value_universe(conn: &Connection, dim: &str) -> Result<Vec<String>> {
    let sql = if dim == "color_name" {
        "SELECT DISTINCT name FROM photo_colors ORDER BY 1".to_string()
    } else {
        let expr = value_expr(dim);
        format!(
            "SELECT DISTINCT {expr} FROM photos p WHERE {expr} IS NOT NULL ORDER BY 1",
            expr = expr
        )
    };
    let mut stmt = conn.prepare(&sql).map_err(ApertureError::from)?;
    let rows = stmt
        .query_map([], |row| {
            // calendar parts come back as integers
            match row.get::<_, String>(0) {
                Ok(s) => Ok(s),
                Err(_) => row.get::<_, i64>(0).map(|v| v.to_string()),
            }
        })
        .map_err(ApertureError::from)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// Raw value counts under the filter minus the dimension.
fn raw_counts(
    conn: &Connection,
    state: &FilterState,
    dim: &str,
) -> Result<Vec<(String, i64)>> {
    let minus = state.without_dim(dim);
    let filter = build_where_clause(&minus, Some(dim));
    let sql = if dim == "color_name" {
        format!(
            "SELECT pc.name, COUNT(DISTINCT p.id) FROM photos p \
             JOIN photo_colors pc ON pc.photo_id = p.id {} \
             GROUP BY pc.name",
            filter.where_clause
        )
    } else {
        format!(
            "SELECT {expr}, COUNT(*) FROM photos p {w} GROUP BY 1",
            expr = value_expr(dim),
            w = filter.where_clause
        )
    };
    let mut stmt = conn.prepare(&sql).map_err(ApertureError::from)?;
    let rows = stmt
        .query_map(filter.param_refs().as_slice(), |row| {
            let value = match row.get::<_, Option<String>>(0) {
                Ok(v) => v,
                Err(_) => row.get::<_, Option<i64>>(0)?.map(|v| v.to_string()),
            };
            Ok((value, row.get::<_, i64>(1)?))
        })
        .map_err(ApertureError::from)?;
    let mut out = Vec::new();
    for row in rows {
        let (value, count) = row.map_err(ApertureError::from)?;
        if let Some(v) = value {
            out.push((v, count));
        }
    }
    Ok(out)
}

/// Compute one facet. The count shown for every value is the total of
/// the state reached by toggling that value, which is exactly what the
/// master invariant demands.
pub fn compute_facet(
    conn: &Connection,
    state: &FilterState,
    def: &FacetDef,
) -> Result<Facet> {
    let started = Instant::now();

    let universe = value_universe(conn, def.name)?;
    let raw: Vec<(String, i64)> = raw_counts(conn, state, def.name)?;
    let raw_for = |v: &str| {
        raw.iter()
            .find(|(value, _)| value == v)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    };

    let selections = state.selections_of(def.name);

    // Total after removing a single-valued dimension's selection; shared
    // by the selected value's count.
    let mut total_minus_cache: Option<i64> = None;

    let mut values = Vec::with_capacity(universe.len());
    for value in &universe {
        let selected = selections.iter().any(|s| s == value);
        let count = if selections.is_empty() {
            // toggling adds the only selection; group-by already
            // counted exactly that state
            raw_for(value)
        } else if !def.multi {
            if selected {
                // toggling removes the selection
                match total_minus_cache {
                    Some(t) => t,
                    None => {
                        let t = count_total(conn, &state.without_dim(def.name))?;
                        total_minus_cache = Some(t);
                        t
                    }
                }
            } else {
                // single-valued: toggling replaces, same as group-by
                raw_for(value)
            }
        } else {
            // multi-valued with existing selections: OR-semantics make
            // the toggled total irreducible to the group-by row
            count_total(conn, &state.toggle(def.name, value))?
        };

        values.push(FacetValue {
            label: display_label(def.name, value),
            value: value.clone(),
            count,
            selected,
            url: build_url(&state.toggle(def.name, value)),
        });
    }

    // Ordering ties break on the raw value so month labels keep
    // calendar order rather than alphabetical.
    match def.ordering {
        FacetOrdering::ByCount => {
            values.sort_by(|a, b| {
                b.count
                    .cmp(&a.count)
                    .then_with(|| label_cmp(&a.value, &b.value))
            });
        }
        FacetOrdering::Alphabetic => {
            values.sort_by(|a, b| label_cmp(&a.value, &b.value));
        }
    }

    let total_distinct = values.len();
    let truncated = total_distinct > FACET_VALUE_LIMIT;
    values.truncate(FACET_VALUE_LIMIT);

    let elapsed = started.elapsed();
    let degraded = elapsed > FACET_DEADLINE;
    if degraded {
        tracing::warn!(
            facet = def.name,
            elapsed_ms = elapsed.as_millis() as u64,
            "facet computation exceeded the soft deadline"
        );
    }

    Ok(Facet {
        name: def.name.to_string(),
        label: def.label.to_string(),
        values,
        truncated,
        total_distinct,
        degraded,
    })
}

/// Numeric-aware label ordering so "2" sorts before "10".
fn label_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Display text for a facet value. Most dimensions show the raw value;
/// months get their names and boolean dimensions read as yes/no.
fn display_label(dim: &str, value: &str) -> String {
    match dim {
        "month" => value
            .parse::<usize>()
            .ok()
            .and_then(|m| MONTH_NAMES.get(m.wrapping_sub(1)))
            .map(|s| s.to_string())
            .unwrap_or_else(|| value.to_string()),
        "flash_fired" | "in_burst" | "is_duplicate" | "has_gps" => match value {
            "true" => "yes".to_string(),
            "false" => "no".to_string(),
            other => other.to_string(),
        },
        _ => value.to_string(),
    }
}

/// Cross-render memory for the zero-result self-check. The web layer
/// shares one across requests; CLI invocations keep a private one.
pub type DisabledAudit = std::sync::Arc<Mutex<HashSet<(String, String)>>>;

/// The engine: computes pages and remembers the previous render's
/// disabled values for the zero-result self-check.
pub struct QueryEngine<'a> {
    catalog: &'a Catalog,
    last_disabled: DisabledAudit,
}

impl<'a> QueryEngine<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self::with_audit(catalog, DisabledAudit::default())
    }

    pub fn with_audit(catalog: &'a Catalog, audit: DisabledAudit) -> Self {
        Self {
            catalog,
            last_disabled: audit,
        }
    }

    /// Compute the full facet collection, one dimension per rayon task.
    pub fn facets(&self, state: &FilterState) -> Result<Vec<Facet>> {
        let discovery_started = Instant::now();
        let defs: &[FacetDef] = FACET_DEFS;
        if discovery_started.elapsed() > DISCOVERY_DEADLINE {
            tracing::warn!("facet discovery exceeded its soft deadline");
        }

        defs.par_iter()
            .map(|def| {
                let conn = self.catalog.open_reader()?;
                compute_facet(&conn, state, def)
            })
            .collect()
    }

    /// Produce everything one page render needs, and emit the
    /// per-render observability record.
    pub fn render(&self, state: &FilterState, sort: SortKey, page: Page) -> Result<PageRender> {
        let conn = self.catalog.open_reader()?;
        let result = run_query(&conn, state, sort, page)?;
        let facets = self.facets(state)?;

        let chips: Vec<Chip> = state
            .active_selections()
            .into_iter()
            .map(|(dim, value)| Chip {
                remove_url: build_url(&state.remove_value(&dim, &value)),
                dim,
                value,
            })
            .collect();

        let degraded = facets.iter().any(|f| f.degraded);
        self.observe(state, &result, &facets);

        Ok(PageRender {
            result,
            facets,
            chips,
            state_url: build_url(state),
            page,
            clear_all_url: build_url(&FilterState::default()),
            degraded,
        })
    }

    /// One structured log record per render; zero-result renders also
    /// run the disabled-value self-check against the previous render.
    fn observe(&self, state: &FilterState, result: &QueryResult, facets: &[Facet]) {
        let mut enabled = 0usize;
        let mut disabled: Vec<(String, String)> = Vec::new();
        for facet in facets {
            for value in &facet.values {
                if value.count > 0 {
                    enabled += 1;
                } else {
                    disabled.push((facet.name.clone(), value.value.clone()));
                }
            }
        }
        let disabled_list: Vec<String> =
            disabled.iter().map(|(d, v)| format!("{}:{}", d, v)).collect();

        tracing::info!(
            state = %build_url(state),
            total = result.total,
            enabled_facet_values = enabled,
            disabled_facet_values = disabled.len(),
            disabled = %disabled_list.join(","),
            "page render"
        );

        let current: HashSet<(String, String)> = disabled.into_iter().collect();
        if result.total == 0 {
            tracing::warn!(
                state = %build_url(state),
                "zero_result: query produced an empty result set"
            );
            let prior = self.last_disabled.lock().expect("disabled-set lock");
            for entry in prior.iter() {
                if !current.contains(entry) {
                    // a value disabled last render is enabled now while
                    // the page is empty; a transition the UI forbids
                    // was likely followed
                    tracing::error!(
                        dimension = %entry.0,
                        value = %entry.1,
                        "invariant: previously disabled facet value became enabled on a zero-result render"
                    );
                }
            }
        }
        *self.last_disabled.lock().expect("disabled-set lock") = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(SortKey::parse("capture_time"), Some(SortKey::CaptureTime));
        assert_eq!(SortKey::parse("camera"), Some(SortKey::Camera));
        assert_eq!(SortKey::parse("iso"), Some(SortKey::Iso));
        assert_eq!(SortKey::parse("nope"), None);
    }

    #[test]
    fn test_label_cmp_is_numeric_aware() {
        use std::cmp::Ordering;
        assert_eq!(label_cmp("2", "10"), Ordering::Less);
        assert_eq!(label_cmp("10", "2"), Ordering::Greater);
        assert_eq!(label_cmp("alpha", "beta"), Ordering::Less);
    }

    #[test]
    fn test_default_sort_is_capture_time_desc() {
        assert!(SortKey::default().order_by().contains("capture_time DESC"));
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(display_label("month", "10"), "October");
        assert_eq!(display_label("month", "1"), "January");
        assert_eq!(display_label("month", "13"), "13");
        assert_eq!(display_label("has_gps", "true"), "yes");
        assert_eq!(display_label("flash_fired", "false"), "no");
        assert_eq!(display_label("camera_make", "Canon"), "Canon");
    }
}
