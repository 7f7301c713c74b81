//! Headless Chrome sessions over the DevTools protocol.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt as _;
use tokio::task::JoinHandle;

use crate::config::ScraperConfig;
use crate::dynamic::session::{BrowserLauncher, ImageNode, PageProbe, PageSession};
use crate::error::{Result, ScrapeError};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long teardown waits for the Chrome process to exit.
const EXIT_WAIT: Duration = Duration::from_secs(5);

const DOM_READY_EXPRESSION: &str =
    "document.readyState !== 'loading' && location.href !== 'about:blank'";

const PROBE_EXPRESSION: &str = r#"(() => {
    const all = document.querySelectorAll('img');
    const marked = document.querySelectorAll('img[id^="p-"]');
    return JSON.stringify({
        total_images: all.length,
        images_with_page_ids: marked.length,
        sample_ids: Array.from(marked).slice(0, 3).map(img => img.id),
        container_classes: Array.from(
            document.querySelectorAll('[class*="reader"], [class*="viewer"]')
        ).map(el => String(el.className)),
    });
})()"#;

#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    user_agent: String,
    executable: Option<PathBuf>,
}

impl ChromeLauncher {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            executable: config.chrome_executable.clone(),
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .viewport(Some(Viewport {
                width: 1920,
                height: 1080,
                device_scale_factor: Some(1.0),
                ..Default::default()
            }))
            .window_size(1920, 1080)
            .no_sandbox()
            .args([
                "--disable-dev-shm-usage".to_owned(),
                "--disable-gpu".to_owned(),
                "--no-first-run".to_owned(),
                format!("--user-agent={}", self.user_agent),
            ]);
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }
        builder.build().map_err(ScrapeError::Browser)
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn PageSession>> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| ScrapeError::Browser(format!("launch: {err}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let mut session = ChromeSession {
            browser,
            page: None,
            handler_task,
            closed: false,
        };
        match session.browser.new_page("about:blank").await {
            Ok(page) => session.page = Some(page),
            Err(err) => {
                let _ = session.close().await;
                return Err(ScrapeError::Browser(format!("open tab: {err}")));
            }
        }
        tracing::debug!("headless browser launched");
        Ok(Box::new(session))
    }
}

pub struct ChromeSession {
    browser: Browser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    closed: bool,
}

impl ChromeSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::Browser("session has no open tab".to_owned()))
    }

    async fn evaluate_json<T: serde::de::DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let raw: String = self
            .page()?
            .evaluate(expression)
            .await
            .map_err(|err| ScrapeError::Browser(format!("evaluate: {err}")))?
            .into_value()
            .map_err(|err| ScrapeError::Browser(format!("evaluate result: {err}")))?;
        serde_json::from_str(&raw)
            .map_err(|err| ScrapeError::Browser(format!("decode evaluate result: {err}")))
    }

    async fn run_script(&self, expression: &str) -> Result<()> {
        self.page()?
            .evaluate(expression)
            .await
            .map_err(|err| ScrapeError::Browser(format!("evaluate: {err}")))?;
        Ok(())
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let page = self.page()?;
        let response = page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|err| ScrapeError::Browser(format!("navigate {url}: {err}")))?;
        if let Some(error_text) = response.result.error_text.as_deref() {
            return Err(ScrapeError::fetch(url, error_text));
        }

        loop {
            // The old document may still answer while the new one commits.
            let ready = page
                .evaluate(DOM_READY_EXPRESSION)
                .await
                .ok()
                .and_then(|result| result.into_value::<bool>().ok())
                .unwrap_or(false);
            if ready {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn scroll_by(&mut self, dy: u32) -> Result<()> {
        self.run_script(&format!("window.scrollBy(0, {dy})")).await
    }

    async fn scroll_to_top(&mut self) -> Result<()> {
        self.run_script("window.scrollTo(0, 0)").await
    }

    async fn query_images(&mut self, selector: &str) -> Result<Vec<ImageNode>> {
        let selector = serde_json::to_string(selector)
            .map_err(|err| ScrapeError::Browser(format!("encode selector: {err}")))?;
        let expression = format!(
            r#"JSON.stringify(Array.from(document.querySelectorAll({selector})).map(img => ({{
                id: img.id || null,
                src: img.src || null,
                data_src: img.getAttribute('data-src'),
                data_lazy_src: img.getAttribute('data-lazy-src'),
                natural_width: img.naturalWidth || 0,
            }})))"#
        );
        self.evaluate_json(&expression).await
    }

    async fn probe(&mut self) -> Result<PageProbe> {
        self.evaluate_json(PROBE_EXPRESSION).await
    }

    async fn save_snapshot(&mut self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page()?
            .save_screenshot(params, path)
            .await
            .map_err(|err| ScrapeError::Browser(format!("screenshot: {err}")))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.page = None;

        let closed = self.browser.close().await;
        if closed.is_err() {
            // CDP is gone, so Chrome never saw the close request.
            if let Some(Err(err)) = self.browser.kill().await {
                tracing::debug!(%err, "kill browser");
            }
        }
        if !wait_for_exit(self.browser.wait(), EXIT_WAIT).await {
            tracing::warn!(timeout = ?EXIT_WAIT, "browser did not exit; abandoning it");
        }
        self.handler_task.abort();
        closed.map_err(|err| ScrapeError::Browser(format!("close: {err}")))?;
        tracing::debug!("headless browser closed");
        Ok(())
    }
}

/// `false` when `exit` did not resolve within `limit`.
async fn wait_for_exit<T, E: std::fmt::Display>(
    exit: impl std::future::Future<Output = std::result::Result<T, E>>,
    limit: Duration,
) -> bool {
    match tokio::time::timeout(limit, exit).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            tracing::debug!(%err, "wait for browser exit");
            true
        }
        Err(_) => false,
    }
}

impl Drop for ChromeSession {
    // Dropped without `close()` (cancelled extraction): stop the CDP handler;
    // `Browser`'s own drop kills the child process.
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
