pub mod facets;
pub mod model;
pub mod store;

pub use model::{
    BurstGroup, ClusterType, ColorSample, DuplicateCluster, PhotoRecord, PhotoRow,
    THUMBNAIL_SIZES,
};
pub use store::{Catalog, CatalogStats, IntegrityReport, UpsertOutcome};
