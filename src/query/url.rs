//! URL state mapping.
//!
//! One canonical route (`/photos`) plus one query parameter per
//! dimension; multi-valued dimensions repeat the key. `parse_state` and
//! `build_url` are inverses up to parameter order. Legacy path-style
//! URLs (a bare year segment) are accepted on input and normalised to
//! the canonical form on output.

use crate::query::state::FilterState;
use url::form_urlencoded;

pub const CANONICAL_ROUTE: &str = "/photos";

/// Canonical URL for a state: `/photos` with no filters, otherwise
/// `/photos?dim=value&...` in canonical parameter order.
pub fn build_url(state: &FilterState) -> String {
    let pairs = state.to_pairs();
    if pairs.is_empty() {
        return CANONICAL_ROUTE.to_string();
    }
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in &pairs {
        serializer.append_pair(k, v);
    }
    format!("{}?{}", CANONICAL_ROUTE, serializer.finish())
}

/// Parse a state from a path plus query string. Accepts:
///   /photos?year=2024&month=10      (canonical)
///   ?year=2024                      (bare query)
///   /2024                           (legacy year segment)
///   /2024/10                        (legacy year/month)
pub fn parse_state(path_and_query: &str) -> FilterState {
    let (path, query) = match path_and_query.split_once('?') {
        Some((p, q)) => (p, q),
        None => (path_and_query, ""),
    };

    let mut state = parse_query(query);
    apply_legacy_path(&mut state, path);
    state
}

/// Parse just a query string (the web handler already has the path).
pub fn parse_query(query: &str) -> FilterState {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    FilterState::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

/// Legacy path-style segments: /<year>[/<month>[/<day>]]. Query
/// parameters win over path segments for the same dimension.
fn apply_legacy_path(state: &mut FilterState, path: &str) {
    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.first() == Some(&"photos") || segments.is_empty() {
        return;
    }

    if state.year.is_none() {
        if let Ok(year) = segments[0].parse::<i32>() {
            if (1800..=9999).contains(&year) {
                state.year = Some(year);
            } else {
                return;
            }
        } else {
            return;
        }
    }
    if let Some(seg) = segments.get(1) {
        if state.month.is_none() {
            state.month = seg.parse().ok().filter(|m| (1..=12).contains(m));
        }
    }
    if let Some(seg) = segments.get(2) {
        if state.day.is_none() {
            state.day = seg.parse().ok().filter(|d| (1..=31).contains(d));
        }
    }
}
