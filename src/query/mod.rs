pub mod engine;
pub mod sql;
pub mod state;
pub mod url;

#[cfg(test)]
mod integration_tests;

pub use engine::{Facet, FacetValue, Page, PageRender, QueryEngine, QueryResult, SortKey};
pub use state::FilterState;
pub use url::{build_url, parse_state};
