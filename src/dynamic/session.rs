use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Attributes of one `<img>` as seen in the live DOM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageNode {
    pub id: Option<String>,
    pub src: Option<String>,
    pub data_src: Option<String>,
    pub data_lazy_src: Option<String>,
    #[serde(default)]
    pub natural_width: u32,
}

impl ImageNode {
    /// First of `src`, `data-src`, `data-lazy-src` that is an absolute http(s) URL.
    ///
    /// A lazy image often keeps a `data:` placeholder in `src` until it is
    /// scrolled into view, so non-http values fall through to the next attribute.
    pub fn http_source(&self) -> Option<&str> {
        [&self.src, &self.data_src, &self.data_lazy_src]
            .into_iter()
            .filter_map(|value| value.as_deref())
            .map(str::trim)
            .find(|value| value.starts_with("http"))
    }

    pub fn has_lazy_attribute(&self) -> bool {
        self.data_src.is_some() || self.data_lazy_src.is_some()
    }
}

/// Page structure summary logged before the strategies run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageProbe {
    pub total_images: usize,
    pub images_with_page_ids: usize,
    pub sample_ids: Vec<String>,
    pub container_classes: Vec<String>,
}

/// One open browser tab. Deadlines are enforced by the caller.
#[async_trait]
pub trait PageSession: Send {
    /// Navigates and returns once the DOM has been parsed.
    async fn navigate(&mut self, url: &str) -> Result<()>;
    async fn scroll_by(&mut self, dy: u32) -> Result<()>;
    async fn scroll_to_top(&mut self) -> Result<()>;
    /// `<img>` elements matching a CSS selector, in document order.
    async fn query_images(&mut self, selector: &str) -> Result<Vec<ImageNode>>;
    async fn probe(&mut self) -> Result<PageProbe>;
    async fn save_snapshot(&mut self, path: &Path) -> Result<()>;
    /// Releases the session. Must be safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageSession>>;
}
