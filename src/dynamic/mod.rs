//! Chapter extraction through a live headless browser session.
//!
//! One session per call: launch, navigate, settle, scroll twice to trigger
//! lazy loading, query the DOM through the strategy chain, close. The session
//! is closed on every exit path.

mod chrome;
mod scroll;
mod session;
mod strategy;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use chrome::{ChromeLauncher, ChromeSession};
pub use scroll::{ScrollPass, ScrollPlan};
pub use session::{BrowserLauncher, ImageNode, PageProbe, PageSession};
pub use strategy::{
    ALL_IMAGES_SELECTOR, ImageStrategy, LAZY_ATTRIBUTE_SELECTOR, LargeImageStrategy,
    LazyAttributeStrategy, MIN_PAGE_WIDTH_PX, PAGE_MARKER_SELECTOR, PageMarkerStrategy,
    READER_CONTAINER_SELECTOR, ReaderContainerStrategy, default_strategies, page_index_from_id,
};

use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::extract::ChapterExtractor;
use crate::formats::PageImage;

pub struct DynamicExtractor {
    launcher: Arc<dyn BrowserLauncher>,
    strategies: Vec<Box<dyn ImageStrategy>>,
    plan: ScrollPlan,
    navigation_timeout: Duration,
    script_timeout: Duration,
    debug_snapshot: Option<PathBuf>,
}

impl DynamicExtractor {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: &ScraperConfig) -> Self {
        Self {
            launcher,
            strategies: default_strategies(),
            plan: config.scroll,
            navigation_timeout: config.navigation_timeout(),
            script_timeout: config.script_timeout(),
            debug_snapshot: config.debug_snapshot.clone(),
        }
    }

    /// Headless Chrome backed extractor.
    pub fn chrome(config: &ScraperConfig) -> Self {
        Self::new(Arc::new(ChromeLauncher::new(config)), config)
    }

    pub fn with_scroll_plan(mut self, plan: ScrollPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn ImageStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_debug_snapshot(mut self, path: Option<PathBuf>) -> Self {
        self.debug_snapshot = path;
        self
    }

    /// Page image URLs of `chapter_url`, in page order.
    pub async fn extract(&self, chapter_url: &str) -> Result<Vec<String>> {
        tracing::info!(url = %chapter_url, "dynamic extraction: launching browser");
        let mut session = self.launcher.launch().await?;

        let outcome = self.run_session(session.as_mut(), chapter_url).await;

        if let Err(err) = session.close().await {
            tracing::warn!(url = %chapter_url, %err, "closing browser session failed");
        }
        outcome
    }

    async fn run_session(
        &self,
        page: &mut dyn PageSession,
        chapter_url: &str,
    ) -> Result<Vec<String>> {
        deadline(
            chapter_url,
            "navigation",
            self.navigation_timeout,
            page.navigate(chapter_url),
        )
        .await?;
        tokio::time::sleep(self.plan.initial_settle()).await;

        tracing::info!(url = %chapter_url, "scrolling to load all pages");
        self.scroll_pass(page, chapter_url, &self.plan.first_pass).await?;
        self.script(chapter_url, page.scroll_to_top()).await?;
        tokio::time::sleep(self.plan.reset_settle()).await;
        self.scroll_pass(page, chapter_url, &self.plan.second_pass).await?;
        tokio::time::sleep(self.plan.final_settle()).await;

        match self.script(chapter_url, page.probe()).await {
            Ok(probe) => tracing::debug!(?probe, "page structure"),
            Err(err) => tracing::debug!(%err, "page structure probe failed"),
        }

        let mut images = Vec::new();
        for strategy in &self.strategies {
            let found = self.script(chapter_url, strategy.try_extract(page)).await?;
            match found {
                Some(found) => {
                    tracing::info!(
                        strategy = strategy.name(),
                        count = found.len(),
                        "strategy matched"
                    );
                    images = found;
                    break;
                }
                None => tracing::debug!(strategy = strategy.name(), "strategy found nothing"),
            }
        }

        if images.is_empty() {
            tracing::warn!(url = %chapter_url, "no page images found");
            self.capture_snapshot(page).await;
            return Err(ScrapeError::NoImagesFound {
                url: chapter_url.to_owned(),
            });
        }

        let urls = into_page_order(images);
        tracing::info!(url = %chapter_url, count = urls.len(), "dynamic extraction done");
        Ok(urls)
    }

    async fn scroll_pass(
        &self,
        page: &mut dyn PageSession,
        chapter_url: &str,
        pass: &ScrollPass,
    ) -> Result<()> {
        for _ in 0..pass.step_count {
            self.script(chapter_url, page.scroll_by(pass.step_size_px)).await?;
            tokio::time::sleep(pass.step_delay()).await;
        }
        Ok(())
    }

    async fn script<T>(
        &self,
        chapter_url: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        deadline(chapter_url, "script evaluation", self.script_timeout, fut).await
    }

    async fn capture_snapshot(&self, page: &mut dyn PageSession) {
        let Some(path) = self.debug_snapshot.as_deref() else {
            return;
        };
        match page.save_snapshot(path).await {
            Ok(()) => tracing::info!(path = %path.display(), "debug snapshot saved"),
            Err(err) => tracing::error!(path = %path.display(), %err, "debug snapshot failed"),
        }
    }
}

#[async_trait]
impl ChapterExtractor for DynamicExtractor {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    async fn image_urls(&self, chapter_url: &str) -> Result<Vec<String>> {
        self.extract(chapter_url).await
    }
}

async fn deadline<T>(
    url: &str,
    stage: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ScrapeError::RenderTimeout {
            url: url.to_owned(),
            stage,
            timeout: limit,
        }),
    }
}

/// Stable sort by page index, then drop repeated URLs.
fn into_page_order(mut images: Vec<PageImage>) -> Vec<String> {
    images.sort_by_key(|image| image.page_index);
    let mut seen = std::collections::HashSet::new();
    images
        .into_iter()
        .map(|image| image.url)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use scraper::{Html, Selector};

    use super::*;

    #[derive(Default)]
    struct Calls {
        closed: AtomicBool,
        scrolls: AtomicUsize,
        resets: AtomicUsize,
        snapshots: AtomicUsize,
    }

    /// Serves a static HTML fixture as if it were the rendered page.
    struct FixtureSession {
        html: String,
        navigate_delay: Duration,
        scroll_delay: Duration,
        calls: Arc<Calls>,
    }

    fn fixture_nodes(html: &str, selector: &str) -> Result<Vec<ImageNode>> {
        let selector = Selector::parse(selector)
            .map_err(|err| ScrapeError::Browser(format!("bad selector: {err:?}")))?;
        let document = Html::parse_document(html);
        Ok(document
            .select(&selector)
            .map(|img| {
                let attr = |name: &str| img.value().attr(name).map(str::to_owned);
                ImageNode {
                    id: attr("id"),
                    src: attr("src"),
                    data_src: attr("data-src"),
                    data_lazy_src: attr("data-lazy-src"),
                    natural_width: attr("width")
                        .and_then(|w| w.parse().ok())
                        .unwrap_or_default(),
                }
            })
            .collect())
    }

    #[async_trait]
    impl PageSession for FixtureSession {
        async fn navigate(&mut self, _url: &str) -> Result<()> {
            tokio::time::sleep(self.navigate_delay).await;
            Ok(())
        }

        async fn scroll_by(&mut self, _dy: u32) -> Result<()> {
            self.calls.scrolls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.scroll_delay).await;
            Ok(())
        }

        async fn scroll_to_top(&mut self) -> Result<()> {
            self.calls.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn query_images(&mut self, selector: &str) -> Result<Vec<ImageNode>> {
            fixture_nodes(&self.html, selector)
        }

        async fn probe(&mut self) -> Result<PageProbe> {
            Ok(PageProbe::default())
        }

        async fn save_snapshot(&mut self, _path: &Path) -> Result<()> {
            self.calls.snapshots.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.calls.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FixtureLauncher {
        html: &'static str,
        navigate_delay: Duration,
        scroll_delay: Duration,
        calls: Arc<Calls>,
    }

    #[async_trait]
    impl BrowserLauncher for FixtureLauncher {
        async fn launch(&self) -> Result<Box<dyn PageSession>> {
            Ok(Box::new(FixtureSession {
                html: self.html.to_owned(),
                navigate_delay: self.navigate_delay,
                scroll_delay: self.scroll_delay,
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    fn extractor(html: &'static str) -> (DynamicExtractor, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let launcher = FixtureLauncher {
            html,
            navigate_delay: Duration::ZERO,
            scroll_delay: Duration::ZERO,
            calls: Arc::clone(&calls),
        };
        let extractor = DynamicExtractor::new(Arc::new(launcher), &ScraperConfig::default())
            .with_scroll_plan(ScrollPlan::instant())
            .with_debug_snapshot(None);
        (extractor, calls)
    }

    #[tokio::test]
    async fn falls_back_to_reader_container_in_discovery_order() -> anyhow::Result<()> {
        let (extractor, calls) = extractor(
            r#"<html><body>
                <header><img src="https://cdn.test/site/logo.png"></header>
                <div class="reader">
                    <img src="https://cdn.test/ch/e.jpg">
                    <img src="https://cdn.test/ch/d.jpg">
                    <img src="https://cdn.test/ch/c.jpg">
                    <img src="https://cdn.test/ch/b.jpg">
                    <img src="https://cdn.test/ch/a.jpg">
                </div>
            </body></html>"#,
        );

        let urls = extractor.extract("https://reader.test/title/1-en-x/2-ch-1").await?;

        assert_eq!(
            urls,
            vec![
                "https://cdn.test/ch/e.jpg",
                "https://cdn.test/ch/d.jpg",
                "https://cdn.test/ch/c.jpg",
                "https://cdn.test/ch/b.jpg",
                "https://cdn.test/ch/a.jpg",
            ]
        );
        assert!(calls.closed.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn page_markers_win_and_sort_by_marker_number() -> anyhow::Result<()> {
        let (extractor, _calls) = extractor(
            r#"<div class="reader">
                <img id="p-3" src="https://cdn.test/x.jpg">
                <img id="p-1" data-src="https://cdn.test/y.jpg" src="data:image/gif;base64,AA">
                <img id="p-2" src="https://cdn.test/z.jpg">
                <img src="https://cdn.test/unmarked.jpg">
            </div>"#,
        );

        let urls = extractor.extract("https://reader.test/ch").await?;

        assert_eq!(
            urls,
            vec![
                "https://cdn.test/y.jpg",
                "https://cdn.test/z.jpg",
                "https://cdn.test/x.jpg",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn lazy_attribute_strategy_skips_logos_and_icons() -> anyhow::Result<()> {
        let (extractor, _calls) = extractor(
            r#"<main>
                <img data-src="https://cdn.test/brand/LOGO.png">
                <img data-src="https://cdn.test/p/1.webp">
                <img data-lazy-src="https://cdn.test/ui/icon-next.png">
                <img data-lazy-src="https://cdn.test/p/2.webp">
                <img src="https://cdn.test/p/not-lazy.webp">
            </main>"#,
        );

        let urls = extractor.extract("https://reader.test/ch").await?;

        assert_eq!(urls, vec!["https://cdn.test/p/1.webp", "https://cdn.test/p/2.webp"]);
        Ok(())
    }

    #[tokio::test]
    async fn large_image_strategy_requires_page_width() -> anyhow::Result<()> {
        let (extractor, _calls) = extractor(
            r#"<main>
                <img src="https://cdn.test/p/1.jpg" width="800">
                <img src="https://cdn.test/small.jpg" width="120">
                <img src="https://cdn.test/u/avatar.jpg" width="900">
                <img src="https://cdn.test/p/2.jpg" width="800">
            </main>"#,
        );

        let urls = extractor.extract("https://reader.test/ch").await?;

        assert_eq!(urls, vec!["https://cdn.test/p/1.jpg", "https://cdn.test/p/2.jpg"]);
        Ok(())
    }

    #[tokio::test]
    async fn no_images_closes_session_and_reports_not_found() {
        let (extractor, calls) = extractor(r#"<main><p>Loading...</p></main>"#);
        let extractor = extractor.with_debug_snapshot(Some(PathBuf::from("/tmp/unused.png")));

        let err = extractor
            .extract("https://reader.test/ch")
            .await
            .expect_err("no images");

        assert!(matches!(err, ScrapeError::NoImagesFound { .. }));
        assert!(calls.closed.load(Ordering::SeqCst));
        assert_eq!(calls.snapshots.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn navigation_deadline_surfaces_render_timeout() {
        let calls = Arc::new(Calls::default());
        let launcher = FixtureLauncher {
            html: "<img src=\"https://cdn.test/1.jpg\" width=\"900\">",
            navigate_delay: Duration::from_secs(5),
            scroll_delay: Duration::ZERO,
            calls: Arc::clone(&calls),
        };
        let config = ScraperConfig {
            navigation_timeout_secs: 0,
            debug_snapshot: None,
            ..ScraperConfig::default()
        };
        let extractor = DynamicExtractor::new(Arc::new(launcher), &config)
            .with_scroll_plan(ScrollPlan::instant());

        let err = extractor
            .extract("https://reader.test/ch")
            .await
            .expect_err("timeout");

        assert!(err.is_timeout());
        assert!(calls.closed.load(Ordering::SeqCst));
        assert_eq!(calls.scrolls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stalled_script_surfaces_render_timeout_and_closes() {
        let calls = Arc::new(Calls::default());
        let launcher = FixtureLauncher {
            html: r#"<div class="reader"><img src="https://cdn.test/1.jpg"></div>"#,
            navigate_delay: Duration::ZERO,
            scroll_delay: Duration::from_secs(5),
            calls: Arc::clone(&calls),
        };
        let config = ScraperConfig {
            script_timeout_secs: 0,
            debug_snapshot: None,
            ..ScraperConfig::default()
        };
        let extractor = DynamicExtractor::new(Arc::new(launcher), &config)
            .with_scroll_plan(ScrollPlan::instant());

        let err = extractor
            .extract("https://reader.test/ch")
            .await
            .expect_err("timeout");

        assert!(matches!(
            err,
            ScrapeError::RenderTimeout {
                stage: "script evaluation",
                ..
            }
        ));
        assert!(calls.closed.load(Ordering::SeqCst));
        assert_eq!(calls.scrolls.load(Ordering::SeqCst), 1);
        assert_eq!(calls.snapshots.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scroll_plan_runs_both_passes_and_one_reset() -> anyhow::Result<()> {
        let (extractor, calls) =
            extractor(r#"<div class="reader"><img src="https://cdn.test/1.jpg"></div>"#);
        let plan = ScrollPlan {
            first_pass: ScrollPass {
                step_count: 3,
                step_size_px: 500,
                step_delay_ms: 0,
            },
            second_pass: ScrollPass {
                step_count: 2,
                step_size_px: 400,
                step_delay_ms: 0,
            },
            ..ScrollPlan::instant()
        };

        extractor
            .with_scroll_plan(plan)
            .extract("https://reader.test/ch")
            .await?;

        assert_eq!(calls.scrolls.load(Ordering::SeqCst), 5);
        assert_eq!(calls.resets.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
