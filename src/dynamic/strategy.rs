//! Ordered DOM selection strategies, most order-reliable first.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::dynamic::session::{ImageNode, PageSession};
use crate::error::Result;
use crate::formats::PageImage;

/// Images whose element id carries the page number, e.g. `id="p-12"`.
pub const PAGE_MARKER_SELECTOR: &str = r#"img[id^="p-"]"#;
pub const PAGE_MARKER_ID_PATTERN: &str = r"p-(\d+)";

/// Images inside reader/viewer containers.
pub const READER_CONTAINER_SELECTOR: &str =
    r#".reader img, #viewer img, .viewer img, [class*="reader"] img"#;

/// Images that declare a lazy-load source attribute.
pub const LAZY_ATTRIBUTE_SELECTOR: &str = "img[data-src], img[data-lazy-src]";

pub const ALL_IMAGES_SELECTOR: &str = "img";

/// Narrower images are treated as site furniture.
pub const MIN_PAGE_WIDTH_PX: u32 = 500;

static PAGE_MARKER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PAGE_MARKER_ID_PATTERN).expect("valid page marker regex"));

#[async_trait]
pub trait ImageStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the strategy found nothing and the next one should run.
    async fn try_extract(&self, page: &mut dyn PageSession) -> Result<Option<Vec<PageImage>>>;
}

pub fn default_strategies() -> Vec<Box<dyn ImageStrategy>> {
    vec![
        Box::new(PageMarkerStrategy),
        Box::new(ReaderContainerStrategy),
        Box::new(LazyAttributeStrategy),
        Box::new(LargeImageStrategy {
            min_width: MIN_PAGE_WIDTH_PX,
        }),
    ]
}

#[derive(Debug, Clone, Copy)]
pub struct PageMarkerStrategy;

#[async_trait]
impl ImageStrategy for PageMarkerStrategy {
    fn name(&self) -> &'static str {
        "page-marker"
    }

    async fn try_extract(&self, page: &mut dyn PageSession) -> Result<Option<Vec<PageImage>>> {
        let nodes = page.query_images(PAGE_MARKER_SELECTOR).await?;
        let images = nodes
            .iter()
            .filter_map(|node| {
                let page_index = page_index_from_id(node.id.as_deref()?)?;
                let url = node.http_source()?;
                Some(PageImage {
                    page_index,
                    url: url.to_owned(),
                })
            })
            .collect();
        Ok(non_empty(images))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReaderContainerStrategy;

#[async_trait]
impl ImageStrategy for ReaderContainerStrategy {
    fn name(&self) -> &'static str {
        "reader-container"
    }

    async fn try_extract(&self, page: &mut dyn PageSession) -> Result<Option<Vec<PageImage>>> {
        let nodes = page.query_images(READER_CONTAINER_SELECTOR).await?;
        Ok(non_empty(in_discovery_order(&nodes, |_| true)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LazyAttributeStrategy;

#[async_trait]
impl ImageStrategy for LazyAttributeStrategy {
    fn name(&self) -> &'static str {
        "lazy-attribute"
    }

    async fn try_extract(&self, page: &mut dyn PageSession) -> Result<Option<Vec<PageImage>>> {
        let nodes = page.query_images(LAZY_ATTRIBUTE_SELECTOR).await?;
        let images = in_discovery_order(&nodes, |node| {
            node.has_lazy_attribute()
                && node
                    .http_source()
                    .is_some_and(|url| !mentions_any(url, &["logo", "icon"]))
        });
        Ok(non_empty(images))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LargeImageStrategy {
    pub min_width: u32,
}

#[async_trait]
impl ImageStrategy for LargeImageStrategy {
    fn name(&self) -> &'static str {
        "large-image"
    }

    async fn try_extract(&self, page: &mut dyn PageSession) -> Result<Option<Vec<PageImage>>> {
        let nodes = page.query_images(ALL_IMAGES_SELECTOR).await?;
        let images = in_discovery_order(&nodes, |node| {
            node.natural_width > self.min_width
                && node
                    .http_source()
                    .is_some_and(|url| !mentions_any(url, &["logo", "icon", "avatar"]))
        });
        Ok(non_empty(images))
    }
}

pub fn page_index_from_id(id: &str) -> Option<u32> {
    PAGE_MARKER_ID_RE.captures(id)?[1].parse().ok()
}

/// Page index is the 1-based position among all queried nodes, so skipped
/// nodes leave gaps rather than shifting later pages.
fn in_discovery_order(nodes: &[ImageNode], keep: impl Fn(&ImageNode) -> bool) -> Vec<PageImage> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| keep(*node))
        .filter_map(|(idx, node)| {
            Some(PageImage {
                page_index: u32::try_from(idx + 1).ok()?,
                url: node.http_source()?.to_owned(),
            })
        })
        .collect()
}

fn mentions_any(url: &str, needles: &[&str]) -> bool {
    let lower = url.to_ascii_lowercase();
    needles.iter().any(|needle| lower.contains(needle))
}

fn non_empty(images: Vec<PageImage>) -> Option<Vec<PageImage>> {
    if images.is_empty() { None } else { Some(images) }
}
