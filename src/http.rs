use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};

use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Shared HTTP session. Construct once per process and clone it into each
/// component; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    fetch_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let inner = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build reqwest client")?;

        Ok(Self {
            inner,
            fetch_timeout: config.fetch_timeout(),
        })
    }

    /// GETs an HTML document, sending `referer` as the `Referer` header.
    pub async fn fetch_html(&self, url: &str, referer: Option<&str>) -> Result<String> {
        self.fetch_html_with_timeout(url, referer, self.fetch_timeout)
            .await
    }

    pub async fn fetch_html_with_timeout(
        &self,
        url: &str,
        referer: Option<&str>,
        timeout: Duration,
    ) -> Result<String> {
        let mut request = self
            .inner
            .get(url)
            .header(ACCEPT, HTML_ACCEPT)
            .timeout(timeout);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        let response = request.send().await.map_err(|err| describe(url, &err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::fetch(url, format!("HTTP status {status}")));
        }

        response.text().await.map_err(|err| describe(url, &err))
    }

    pub async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let response = self
            .inner
            .get(url)
            .header(ACCEPT, IMAGE_ACCEPT)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| describe(url, &err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::fetch(url, format!("HTTP status {status}")));
        }

        let bytes = response.bytes().await.map_err(|err| describe(url, &err))?;
        Ok(bytes.to_vec())
    }
}

fn describe(url: &str, err: &reqwest::Error) -> ScrapeError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connect failed"
    } else if err.is_redirect() {
        "redirect failed"
    } else {
        "request failed"
    };
    ScrapeError::fetch(url, format!("{kind}: {err}"))
}
