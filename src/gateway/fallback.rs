//! Substitute responses for failed fetches.

use crate::cache::entry::{ResponseSnapshot, ResponseType};

/// Inline 400×300 placeholder shown in place of images that could not be loaded.
pub const PLACEHOLDER_SVG: &str = concat!(
    r#"<svg width="400" height="300" xmlns="http://www.w3.org/2000/svg">"#,
    r##"<rect width="100%" height="100%" fill="#f0f0f0"/>"##,
    r##"<text x="50%" y="50%" text-anchor="middle" dy=".3em" fill="#999">"##,
    "Billede ikke tilgængeligt",
    "</text></svg>"
);

/// `200 OK` placeholder image.
pub fn placeholder_image() -> ResponseSnapshot {
    ResponseSnapshot::new(200, ResponseType::Synthetic, PLACEHOLDER_SVG)
        .with_header("content-type", "image/svg+xml")
        .with_header("cache-control", "no-store")
}
