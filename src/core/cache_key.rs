// FILE: src/core/cache_key.rs
//! Query fingerprints for the text-search cache.
//!
//! Two queries that would plausibly return the same upstream result set must
//! produce the same key: text is normalized, the viewport is rounded to three
//! decimal degrees, and the zoom level is collapsed into five coarse tiers.

use crate::model::{BoundingBox, DetailsRequest, TextSearchOptions};

/// Zoom tier boundaries (inclusive upper bound of each tier but the last).
const ZOOM_TIERS: [f64; 4] = [5.0, 9.0, 12.0, 15.0];

pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bounds rounded to 3 decimal degrees (~110 m).
pub fn viewport_bucket(viewport: &BoundingBox) -> String {
    format!("{:.3},{:.3},{:.3},{:.3}", viewport.south, viewport.west, viewport.north, viewport.east)
}

/// Maps a map zoom level onto one of five tiers: 0 (world) .. 4 (street).
pub fn zoom_bucket(zoom: f64) -> u8 {
    let zoom = zoom.round();
    ZOOM_TIERS.iter().position(|&upper| zoom <= upper).unwrap_or(ZOOM_TIERS.len()) as u8
}

/// STABLE FNV-1a HASHING
/// Must not change between runs or platforms, so `DefaultHasher` is out.
pub fn fnv1a(key: &str) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET_BASIS;
    for byte in key.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Fingerprint of a text search: `hash(text, viewport bucket, zoom bucket, open_now)`
/// plus every filter that changes the returned page (type, keyword, viewport
/// restriction, page size).
pub fn text_search_key(options: &TextSearchOptions) -> String {
    let text = normalize_text(&options.query);

    let area = match (&options.viewport, &options.location) {
        (Some(viewport), _) => viewport_bucket(viewport),
        (None, Some(loc)) => format!("{:.3},{:.3}r{}", loc.lat, loc.lng, options.radius_m.unwrap_or(0.0).round()),
        (None, None) => "any".to_string(),
    };

    let zoom = options.zoom.or_else(|| options.viewport.map(|v| v.estimated_zoom()));
    let zoom = zoom.map(|z| zoom_bucket(z).to_string()).unwrap_or_else(|| "-".to_string());

    let category = options.category.as_deref().map(normalize_text).unwrap_or_default();
    let keyword = options.keyword.as_deref().map(normalize_text).unwrap_or_default();

    let raw = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        text, area, zoom, options.open_now as u8, category, keyword, options.restrict_to_viewport as u8, options.max_results,
    );
    format!("text:{:016x}", fnv1a(&raw))
}

/// Details are keyed by place id plus the requested field mask.
pub fn details_key(request: &DetailsRequest) -> String {
    let mut fields: Vec<&str> = request.fields.iter().map(|f| f.trim()).collect();
    fields.sort_unstable();
    fields.dedup();
    format!("details:{}|{}", request.place_id.trim(), fields.join(","))
}
