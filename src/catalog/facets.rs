//! The pre-declared registry of queryable dimensions.
//!
//! Each entry mirrors a row of the `facet_metadata` table. The query
//! engine iterates this registry when computing facet collections; the
//! store seeds the table from it so the catalog file is self-describing.

/// Value type of a facet dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetValueType {
    Enum,
    Int,
    Float,
    String,
    Bool,
}

impl FacetValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacetValueType::Enum => "enum",
            FacetValueType::Int => "int",
            FacetValueType::Float => "float",
            FacetValueType::String => "string",
            FacetValueType::Bool => "bool",
        }
    }
}

/// Ordering hint for facet values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetOrdering {
    ByCount,
    Alphabetic,
}

impl FacetOrdering {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacetOrdering::ByCount => "by_count",
            FacetOrdering::Alphabetic => "alphabetic",
        }
    }
}

/// One queryable dimension.
#[derive(Debug, Clone, Copy)]
pub struct FacetDef {
    pub name: &'static str,
    pub label: &'static str,
    pub value_type: FacetValueType,
    pub multi: bool,
    pub ordering: FacetOrdering,
}

/// All enumerable dimensions the engine computes value lists for.
/// Range filters (iso_min, aperture_max, ...) and free text are filter
/// dimensions but have no value list, so they do not appear here.
pub const FACET_DEFS: &[FacetDef] = &[
    FacetDef {
        name: "year",
        label: "Year",
        value_type: FacetValueType::Int,
        multi: false,
        ordering: FacetOrdering::Alphabetic,
    },
    FacetDef {
        name: "month",
        label: "Month",
        value_type: FacetValueType::Int,
        multi: false,
        ordering: FacetOrdering::Alphabetic,
    },
    FacetDef {
        name: "day",
        label: "Day",
        value_type: FacetValueType::Int,
        multi: false,
        ordering: FacetOrdering::Alphabetic,
    },
    FacetDef {
        name: "camera_make",
        label: "Camera make",
        value_type: FacetValueType::String,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "camera_model",
        label: "Camera model",
        value_type: FacetValueType::String,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "lens_make",
        label: "Lens make",
        value_type: FacetValueType::String,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "lens_model",
        label: "Lens model",
        value_type: FacetValueType::String,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "flash_fired",
        label: "Flash",
        value_type: FacetValueType::Bool,
        multi: false,
        ordering: FacetOrdering::Alphabetic,
    },
    FacetDef {
        name: "white_balance",
        label: "White balance",
        value_type: FacetValueType::Enum,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "time_of_day",
        label: "Time of day",
        value_type: FacetValueType::Enum,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "season",
        label: "Season",
        value_type: FacetValueType::Enum,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "focal_category",
        label: "Focal range",
        value_type: FacetValueType::Enum,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "shooting_condition",
        label: "Light",
        value_type: FacetValueType::Enum,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "shape",
        label: "Orientation",
        value_type: FacetValueType::Enum,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "color_name",
        label: "Color",
        value_type: FacetValueType::Enum,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "in_burst",
        label: "In burst",
        value_type: FacetValueType::Bool,
        multi: false,
        ordering: FacetOrdering::Alphabetic,
    },
    FacetDef {
        name: "is_duplicate",
        label: "Duplicate",
        value_type: FacetValueType::Bool,
        multi: true,
        ordering: FacetOrdering::Alphabetic,
    },
    FacetDef {
        name: "cluster_type",
        label: "Duplicate kind",
        value_type: FacetValueType::Enum,
        multi: true,
        ordering: FacetOrdering::ByCount,
    },
    FacetDef {
        name: "has_gps",
        label: "Has location",
        value_type: FacetValueType::Bool,
        multi: false,
        ordering: FacetOrdering::Alphabetic,
    },
];

pub fn facet_def(name: &str) -> Option<&'static FacetDef> {
    FACET_DEFS.iter().find(|d| d.name == name)
}

/// Seed (or refresh) the facet_metadata table from the registry.
pub fn seed_facet_metadata(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO facet_metadata (name, label, type, multi, ordering)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(name) DO UPDATE SET
             label = excluded.label,
             type = excluded.type,
             multi = excluded.multi,
             ordering = excluded.ordering",
    )?;
    for def in FACET_DEFS {
        stmt.execute(rusqlite::params![
            def.name,
            def.label,
            def.value_type.as_str(),
            def.multi as i64,
            def.ordering.as_str(),
        ])?;
    }
    Ok(())
}
