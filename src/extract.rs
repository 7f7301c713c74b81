use std::io::Write as _;

use anyhow::Context as _;
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::cli::ExtractArgs;
use crate::config::ScraperConfig;
use crate::dynamic::DynamicExtractor;
use crate::error::{Result, ScrapeError};
use crate::formats::{ChapterSource, ExtractionResult};
use crate::generic::GenericExtractor;
use crate::http::HttpClient;

/// Anything that turns a chapter URL into its page image URLs, in page order.
#[async_trait]
pub trait ChapterExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn image_urls(&self, chapter_url: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Static HTML heuristics (single GET, no script execution).
    Generic,
    /// Headless browser with scroll/settle and DOM strategies.
    #[default]
    Dynamic,
}

impl Engine {
    pub fn build(
        self,
        config: &ScraperConfig,
        client: &HttpClient,
    ) -> Box<dyn ChapterExtractor> {
        match self {
            Self::Generic => Box::new(GenericExtractor::new(client.clone())),
            Self::Dynamic => Box::new(DynamicExtractor::chrome(config)),
        }
    }
}

/// The on-demand extraction call: ordered URLs plus page count, no download.
pub async fn extract_chapter(
    extractor: &dyn ChapterExtractor,
    source: &ChapterSource,
) -> Result<ExtractionResult> {
    let urls = extractor.image_urls(&source.chapter_url).await?;
    let result = ExtractionResult::from_ordered(urls);
    if result.is_empty() {
        return Err(ScrapeError::NoImagesFound {
            url: source.chapter_url.clone(),
        });
    }
    Ok(result)
}

pub async fn run(args: ExtractArgs, config: &ScraperConfig) -> anyhow::Result<()> {
    let client = HttpClient::new(config).context("build http client")?;
    let extractor = args.engine.build(config, &client);
    let source = ChapterSource {
        chapter_url: args.url,
    };

    tracing::info!(url = %source.chapter_url, engine = extractor.name(), "extract");
    let result = extract_chapter(extractor.as_ref(), &source)
        .await
        .with_context(|| format!("extract {}", source.chapter_url))?;

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &result).context("write extraction result")?;
    stdout.write_all(b"\n").context("write newline")?;
    Ok(())
}
