//! Accept/reject heuristic separating content page images from site furniture.
//!
//! Both checks run against the whole URL, not just the file name, so a path
//! segment such as `/covers/` rejects an otherwise valid page.

use std::sync::LazyLock;

use regex::Regex;

/// Supported page image extensions, anchored at the end of the URL or right
/// before its query string.
pub const IMAGE_EXTENSION_PATTERN: &str = r"(?i)\.(?:jpg|jpeg|png|webp|gif)(?:$|\?)";

/// Substrings that mark decorative assets (logos, avatars, ad slots, thumbnails).
/// Matched against the whole URL, so a `/covers/` path segment rejects its images.
pub const EXCLUDED_ASSET_PATTERN: &str =
    r"(?i)logo|icon|avatar|banner|ad[_-]|thumb|cover|button|sprite";

static IMAGE_EXTENSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IMAGE_EXTENSION_PATTERN).expect("valid image extension regex"));

static EXCLUDED_ASSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EXCLUDED_ASSET_PATTERN).expect("valid excluded asset regex"));

pub fn is_candidate(url: &str) -> bool {
    if url.trim().is_empty() {
        return false;
    }
    has_image_extension(url) && !EXCLUDED_ASSET_RE.is_match(url)
}

pub fn has_image_extension(url: &str) -> bool {
    IMAGE_EXTENSION_RE.is_match(url)
}
