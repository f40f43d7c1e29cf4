//! The embedded web UI: a faceted browse page, photo detail pages, and
//! the thumbnail API with long-lived caching. Query-engine work runs on
//! blocking tasks; rusqlite never blocks the async executor directly.

pub mod render;

use crate::catalog::model::THUMBNAIL_SIZES;
use crate::catalog::Catalog;
use crate::query::engine::{DisabledAudit, Page, QueryEngine, SortKey};
use crate::query::url::{build_url, parse_query, parse_state};
use axum::body::Body;
use axum::extract::{Path as AxumPath, RawQuery, State};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub audit: DisabledAudit,
}

pub fn router(catalog: Arc<Catalog>) -> Router {
    let state = AppState {
        catalog,
        audit: DisabledAudit::default(),
    };
    Router::new()
        .route("/", get(|| async { Redirect::permanent("/photos") }))
        .route("/photos", get(photos_handler))
        .route("/photo/:id", get(photo_handler))
        .route("/api/thumbnail/:id/:size", get(thumbnail_handler))
        .fallback(legacy_handler)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until SIGINT.
pub async fn serve(catalog: Arc<Catalog>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!("explore: listening on http://{}", local);
    println!("Browse your catalog at http://{}/photos", local);
    axum::serve(listener, router(catalog))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot install SIGINT handler: {}", e);
    }
    tracing::info!("explore: shutting down");
}

/// sort / limit / offset are view parameters, not filter dimensions.
fn view_params(query: &str) -> (SortKey, Page) {
    let mut sort = SortKey::default();
    let mut page = Page::default();
    for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
        match k.as_ref() {
            "sort" => {
                if let Some(s) = SortKey::parse(&v) {
                    sort = s;
                }
            }
            "limit" => {
                if let Ok(n) = v.parse::<usize>() {
                    page.limit = n.clamp(1, 500);
                }
            }
            "offset" => {
                if let Ok(n) = v.parse::<usize>() {
                    page.offset = n;
                }
            }
            _ => {}
        }
    }
    (sort, page)
}

async fn photos_handler(
    State(app): State<AppState>,
    RawQuery(query): RawQuery,
) -> Response {
    let query = query.unwrap_or_default();
    let filter = parse_query(&query);
    let (sort, page) = view_params(&query);

    let result = tokio::task::spawn_blocking(move || {
        let engine = QueryEngine::with_audit(&app.catalog, app.audit.clone());
        engine
            .render(&filter, sort, page)
            .map(|r| render::photos_page(&r))
    })
    .await;

    match result {
        Ok(Ok(html)) => Html(html).into_response(),
        Ok(Err(e)) => {
            tracing::error!("photos render failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!("photos task panicked: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn photo_handler(
    State(app): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let photo = app.catalog.photo(id)?;
        let colors = app.catalog.colors(id)?;
        Ok::<_, crate::error::ApertureError>(photo.map(|p| render::photo_page(&p, &colors)))
    })
    .await;

    match result {
        Ok(Ok(Some(html))) => Html(html).into_response(),
        Ok(Ok(None)) => {
            (StatusCode::NOT_FOUND, Html(render::not_found_page())).into_response()
        }
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Pick the stored variant for a requested size: exact, else the
/// smallest stored variant at least as large, else the largest stored.
fn fallback_sizes(requested: u32) -> Vec<u32> {
    let mut sizes: Vec<u32> = THUMBNAIL_SIZES.to_vec();
    sizes.sort_by_key(|&s| {
        if s == requested {
            (0, 0)
        } else if s > requested {
            (1, s)
        } else {
            (2, u32::MAX - s)
        }
    });
    sizes
}

async fn thumbnail_handler(
    State(app): State<AppState>,
    AxumPath((id, size)): AxumPath<(i64, u32)>,
    headers: HeaderMap,
) -> Response {
    let etag = format!("\"{}-{}\"", id, size);
    if headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        == Some(etag.as_str())
    {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::ETAG, etag)
            .body(Body::empty())
            .expect("static 304 response")
            .into_response();
    }

    let bytes = tokio::task::spawn_blocking(move || {
        for candidate in fallback_sizes(size) {
            if let Some(bytes) = app.catalog.thumbnail(id, candidate)? {
                return Ok::<_, crate::error::ApertureError>(Some(bytes));
            }
        }
        Ok(None)
    })
    .await;

    match bytes {
        Ok(Ok(Some(bytes))) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/jpeg")
            .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
            .header(header::ETAG, etag)
            .body(Body::from(bytes))
            .expect("thumbnail response")
            .into_response(),
        Ok(Ok(None)) => StatusCode::NOT_FOUND.into_response(),
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Legacy path-style URLs (`/2024`, `/2024/10`) redirect permanently to
/// the canonical query form.
async fn legacy_handler(request: Request<Body>) -> Response {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let state = parse_state(path_and_query);
    if !state.is_empty() {
        return Redirect::permanent(&build_url(&state)).into_response();
    }
    (StatusCode::NOT_FOUND, Html(render::not_found_page())).into_response()
}
