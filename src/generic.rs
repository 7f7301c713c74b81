//! Heuristic extraction from one static HTML document.
//!
//! Three independent scans feed one set keyed by normalized URL: every `<img>`
//! in the page, every `<img>` under a reader-looking container, and quoted image
//! URLs inside inline scripts. The result is sorted lexicographically, which
//! approximates page order only for zero-padded numeric file names
//! (`img10.jpg` sorts before `img9.jpg`).

use std::collections::BTreeSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{Result, ScrapeError};
use crate::extract::ChapterExtractor;
use crate::filter::is_candidate;
use crate::formats::ExtractionResult;
use crate::http::HttpClient;
use crate::normalize::normalize;

/// Class names of elements that usually wrap the reader pages.
pub const CONTAINER_CLASS_PATTERN: &str = r"(?i)page|chapter|manga|reader|viewer|panel";

/// Quoted absolute image URLs embedded in inline scripts (JSON blobs, JS arrays).
pub const SCRIPT_IMAGE_URL_PATTERN: &str =
    r#"(?i)["']https?://[^"\s]+\.(?:jpg|jpeg|png|webp|gif)["']"#;

/// Image attributes in priority order; lazy loaders park the real URL in the
/// `data-*` ones.
const IMAGE_SOURCE_ATTRIBUTES: [&str; 3] = ["src", "data-src", "data-lazy-src"];

static CONTAINER_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CONTAINER_CLASS_PATTERN).expect("valid container class regex"));
static SCRIPT_IMAGE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SCRIPT_IMAGE_URL_PATTERN).expect("valid script image regex"));

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid img selector"));
static CONTAINER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div[class], section[class]").expect("valid container selector")
});
static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("valid script selector"));

#[derive(Debug, Clone)]
pub struct GenericExtractor {
    client: HttpClient,
}

impl GenericExtractor {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub async fn extract(&self, chapter_url: &str) -> Result<ExtractionResult> {
        tracing::info!(url = %chapter_url, "generic extraction: fetch");
        let html = self
            .client
            .fetch_html(chapter_url, Some(chapter_url))
            .await?;

        let result = extract_from_html(&html, chapter_url);
        if result.is_empty() {
            tracing::warn!(url = %chapter_url, "generic extraction found no candidate images");
            return Err(ScrapeError::NoImagesFound {
                url: chapter_url.to_owned(),
            });
        }

        tracing::info!(url = %chapter_url, count = result.total_pages(), "generic extraction done");
        Ok(result)
    }
}

#[async_trait]
impl ChapterExtractor for GenericExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    async fn image_urls(&self, chapter_url: &str) -> Result<Vec<String>> {
        Ok(self.extract(chapter_url).await?.into_image_urls())
    }
}

/// Runs all scans over an already fetched document.
pub fn extract_from_html(html: &str, base_url: &str) -> ExtractionResult {
    let document = Html::parse_document(html);
    let mut found = BTreeSet::new();

    scan_images(document.root_element(), base_url, &mut found);
    let after_tags = found.len();

    for container in document.select(&CONTAINER_SELECTOR) {
        let class = container.value().attr("class").unwrap_or_default();
        if CONTAINER_CLASS_RE.is_match(class) {
            scan_images(container, base_url, &mut found);
        }
    }
    let after_containers = found.len();

    for script in document.select(&SCRIPT_SELECTOR) {
        let body = script.text().collect::<String>();
        scan_script(&body, &mut found);
    }

    tracing::debug!(
        tag_scan = after_tags,
        container_scan = after_containers - after_tags,
        script_scan = found.len() - after_containers,
        "generic scan counts"
    );

    ExtractionResult::from_ordered(found)
}

fn scan_images(scope: ElementRef<'_>, base_url: &str, found: &mut BTreeSet<String>) {
    for img in scope.select(&IMG_SELECTOR) {
        let Some(src) = image_source(img) else {
            continue;
        };
        if is_candidate(src) {
            found.insert(normalize(src, base_url));
        }
    }
}

fn image_source<'a>(img: ElementRef<'a>) -> Option<&'a str> {
    IMAGE_SOURCE_ATTRIBUTES
        .iter()
        .filter_map(|name| img.value().attr(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

fn scan_script(body: &str, found: &mut BTreeSet<String>) {
    for quoted in SCRIPT_IMAGE_URL_RE.find_iter(body) {
        let url = quoted.as_str().trim_matches(|c| c == '"' || c == '\'');
        if is_candidate(url) {
            found.insert(url.to_owned());
        }
    }
}
