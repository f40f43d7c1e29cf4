//! Minimal HTML rendering for the browse and detail pages.
//!
//! Plain string building; layout and styling are deliberately simple.
//! Everything user-derived goes through `escape`.

use crate::catalog::model::ColorSample;
use crate::catalog::PhotoRow;
use crate::query::engine::{Facet, Page, PageRender};

pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\">\
         <title>{}</title>\
         <style>\
         body{{font-family:sans-serif;margin:0;display:flex}}\
         nav{{width:260px;padding:1rem;border-right:1px solid #ddd;overflow-y:auto;height:100vh}}\
         main{{flex:1;padding:1rem}}\
         .grid{{display:flex;flex-wrap:wrap;gap:8px}}\
         .grid img{{display:block}}\
         .chip{{display:inline-block;background:#eee;border-radius:12px;padding:2px 10px;margin:2px}}\
         .facet h4{{margin:0.8em 0 0.2em}}\
         .disabled{{color:#aaa}}\
         .selected{{font-weight:bold}}\
         </style></head><body>{}</body></html>",
        escape(title),
        body
    )
}

fn facet_html(facet: &Facet) -> String {
    if facet.values.is_empty() {
        return String::new();
    }
    let mut out = format!(
        "<div class=\"facet\"><h4>{}</h4><ul>",
        escape(&facet.label)
    );
    for value in &facet.values {
        let class = if value.selected {
            "selected"
        } else if value.count == 0 {
            // disabled, never hidden
            "disabled"
        } else {
            ""
        };
        if value.count == 0 && !value.selected {
            out.push_str(&format!(
                "<li class=\"{}\">{} ({})</li>",
                class,
                escape(&value.label),
                value.count
            ));
        } else {
            out.push_str(&format!(
                "<li class=\"{}\"><a href=\"{}\">{}</a> ({})</li>",
                class,
                escape(&value.url),
                escape(&value.label),
                value.count
            ));
        }
    }
    if facet.truncated {
        out.push_str(&format!(
            "<li class=\"disabled\">{} more …</li>",
            facet.total_distinct - facet.values.len()
        ));
    }
    out.push_str("</ul></div>");
    out
}

fn chips_html(render: &PageRender) -> String {
    if render.chips.is_empty() {
        return String::new();
    }
    let mut out = String::from("<div>");
    for chip in &render.chips {
        out.push_str(&format!(
            "<span class=\"chip\">{}: {} <a href=\"{}\">✕</a></span>",
            escape(&chip.dim),
            escape(&chip.value),
            escape(&chip.remove_url)
        ));
    }
    out.push_str(&format!(
        " <a href=\"{}\">clear all</a></div>",
        escape(&render.clear_all_url)
    ));
    out
}

fn page_url(render: &PageRender, offset: usize) -> String {
    let sep = if render.state_url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}limit={}&offset={}",
        render.state_url, sep, render.page.limit, offset
    )
}

fn paging_html(render: &PageRender) -> String {
    let Page { limit, offset } = render.page;
    let total = render.result.total as usize;
    let mut out = String::new();
    if offset == 0 && offset + limit >= total {
        return out;
    }
    out.push_str("<p>");
    if offset > 0 {
        out.push_str(&format!(
            "<a href=\"{}\">← newer</a> ",
            escape(&page_url(render, offset.saturating_sub(limit)))
        ));
    }
    if offset + limit < total {
        out.push_str(&format!(
            "<a href=\"{}\">older →</a>",
            escape(&page_url(render, offset + limit))
        ));
    }
    out.push_str("</p>");
    out
}

/// The faceted browse page.
pub fn photos_page(render: &PageRender) -> String {
    let mut nav = String::new();
    for facet in &render.facets {
        nav.push_str(&facet_html(facet));
    }

    let mut main = chips_html(render);
    if render.degraded {
        main.push_str("<p><em>Some counts may be approximate.</em></p>");
    }

    if render.result.total == 0 {
        main.push_str(
            "<h2>No results</h2>\
             <p>No photos match the current filters. Remove a filter above or \
             clear them all.</p>",
        );
    } else {
        main.push_str(&format!("<p>{} photo(s)</p><div class=\"grid\">", render.result.total));
        for photo in &render.result.photos {
            main.push_str(&format!(
                "<a href=\"/photo/{id}\"><img src=\"/api/thumbnail/{id}/256\" \
                 alt=\"{alt}\" loading=\"lazy\"></a>",
                id = photo.id,
                alt = escape(&photo.path)
            ));
        }
        main.push_str("</div>");
        main.push_str(&paging_html(render));
    }

    layout(
        "Aperture",
        &format!("<nav>{}</nav><main>{}</main>", nav, main),
    )
}

/// The photo detail page.
pub fn photo_page(photo: &PhotoRow, colors: &[ColorSample]) -> String {
    let mut rows = String::new();
    let mut field = |name: &str, value: Option<String>| {
        if let Some(v) = value {
            rows.push_str(&format!(
                "<tr><th>{}</th><td>{}</td></tr>",
                escape(name),
                escape(&v)
            ));
        }
    };
    field("Path", Some(photo.path.clone()));
    field("Captured", photo.capture_time.clone());
    field("Camera make", photo.camera_make.clone());
    field("Camera model", photo.camera_model.clone());
    field("Lens", photo.lens_model.clone());
    field("ISO", photo.iso.map(|v| v.to_string()));
    field("Aperture", photo.aperture.map(|v| format!("f/{}", v)));
    field("Shutter", photo.shutter.clone());
    field("Focal length", photo.focal_mm.map(|v| format!("{} mm", v)));
    field(
        "Dimensions",
        Some(format!("{}×{}", photo.width, photo.height)),
    );
    field(
        "Location",
        match (photo.latitude, photo.longitude) {
            (Some(lat), Some(lon)) => Some(format!("{:.5}, {:.5}", lat, lon)),
            _ => None,
        },
    );
    field(
        "Burst",
        photo.burst_group_id.map(|id| {
            format!(
                "group {}{}",
                id,
                if photo.is_burst_representative {
                    " (representative)"
                } else {
                    ""
                }
            )
        }),
    );
    field(
        "Duplicate cluster",
        photo.duplicate_cluster_id.map(|id| id.to_string()),
    );

    let mut swatches = String::new();
    for c in colors {
        swatches.push_str(&format!(
            "<span class=\"chip\" style=\"background:rgb({},{},{})\">{} {:.0}%</span>",
            c.r,
            c.g,
            c.b,
            escape(&c.name),
            c.weight * 100.0
        ));
    }

    layout(
        &format!("Photo {}", photo.id),
        &format!(
            "<main><p><a href=\"/photos\">← back</a></p>\
             <img src=\"/api/thumbnail/{id}/1024\" \
             onerror=\"this.src='/api/thumbnail/{id}/512'\">\
             <table>{rows}</table><div>{swatches}</div></main>",
            id = photo.id,
            rows = rows,
            swatches = swatches
        ),
    )
}

pub fn not_found_page() -> String {
    layout("Not found", "<main><h2>Not found</h2></main>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html_metacharacters() {
        assert_eq!(
            escape("<img src=\"x\" & more>"),
            "&lt;img src=&quot;x&quot; &amp; more&gt;"
        );
    }

    #[test]
    fn test_disabled_values_rendered_without_link() {
        let facet = Facet {
            name: "year".into(),
            label: "Year".into(),
            values: vec![
                crate::query::engine::FacetValue {
                    value: "2024".into(),
                    label: "2024".into(),
                    count: 3,
                    selected: false,
                    url: "/photos?year=2024".into(),
                },
                crate::query::engine::FacetValue {
                    value: "2025".into(),
                    label: "2025".into(),
                    count: 0,
                    selected: false,
                    url: "/photos?year=2025".into(),
                },
            ],
            truncated: false,
            total_distinct: 2,
            degraded: false,
        };
        let html = facet_html(&facet);
        assert!(html.contains("<a href=\"/photos?year=2024\">2024</a>"));
        assert!(html.contains("class=\"disabled\">2025 (0)"));
        assert!(
            !html.contains("<a href=\"/photos?year=2025\""),
            "disabled values render without a link"
        );
    }

    #[test]
    fn test_paging_links_preserve_the_filter_state() {
        let render = PageRender {
            result: crate::query::engine::QueryResult {
                photos: Vec::new(),
                total: 150,
            },
            facets: Vec::new(),
            chips: Vec::new(),
            state_url: "/photos?year=2024".into(),
            page: Page {
                limit: 60,
                offset: 60,
            },
            clear_all_url: "/photos".into(),
            degraded: false,
        };
        let html = paging_html(&render);
        assert!(html.contains("/photos?year=2024&amp;limit=60&amp;offset=0"));
        assert!(html.contains("/photos?year=2024&amp;limit=60&amp;offset=120"));
    }

    #[test]
    fn test_no_paging_links_when_everything_fits() {
        let render = PageRender {
            result: crate::query::engine::QueryResult {
                photos: Vec::new(),
                total: 10,
            },
            facets: Vec::new(),
            chips: Vec::new(),
            state_url: "/photos".into(),
            page: Page {
                limit: 60,
                offset: 0,
            },
            clear_all_url: "/photos".into(),
            degraded: false,
        };
        assert!(paging_html(&render).is_empty());
    }

    #[test]
    fn test_truncated_facet_shows_more_affordance() {
        let values: Vec<_> = (0..30)
            .map(|i| crate::query::engine::FacetValue {
                value: format!("v{}", i),
                label: format!("v{}", i),
                count: 1,
                selected: false,
                url: "/photos".into(),
            })
            .collect();
        let facet = Facet {
            name: "camera_model".into(),
            label: "Camera model".into(),
            values,
            truncated: true,
            total_distinct: 45,
            degraded: false,
        };
        assert!(facet_html(&facet).contains("15 more …"));
    }
}
