//! Rate-limited chapter downloads into `<root>/<manga>/chapter_<n>/page_<NNN><ext>`.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;

use crate::catalog::{CatalogDiscoverer, chapter_number_from_url, manga_slug_from_url};
use crate::cli::{DownloadArgs, DownloadMangaArgs};
use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::extract::ChapterExtractor;
use crate::formats::{DownloadOutcome, MangaDownloadSummary};
use crate::http::HttpClient;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    pub between_images: Duration,
    pub between_chapters: Duration,
    pub image_timeout: Duration,
}

impl Pacing {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            between_images: config.image_delay(),
            between_chapters: config.chapter_delay(),
            image_timeout: config.image_timeout(),
        }
    }
}

pub struct Downloader<'a> {
    client: HttpClient,
    extractor: &'a dyn ChapterExtractor,
    root: PathBuf,
    pacing: Pacing,
}

impl<'a> Downloader<'a> {
    pub fn new(
        client: HttpClient,
        extractor: &'a dyn ChapterExtractor,
        root: impl Into<PathBuf>,
        pacing: Pacing,
    ) -> Self {
        Self {
            client,
            extractor,
            root: root.into(),
            pacing,
        }
    }

    /// Downloads one chapter. Extraction failures and empty chapters come back
    /// as an unsuccessful outcome; single image failures are only counted.
    pub async fn download_chapter(
        &self,
        chapter_url: &str,
        manga_name: Option<&str>,
        chapter_number: Option<&str>,
    ) -> DownloadOutcome {
        let manga_dir = manga_dir_name(chapter_url, manga_name);
        let chapter_number = chapter_number
            .map(str::to_owned)
            .or_else(|| chapter_number_from_url(chapter_url))
            .map(|number| path_component(&number, "unknown"))
            .unwrap_or_else(|| "unknown".to_owned());
        let output_directory = chapter_dir(&self.root, &manga_dir, &chapter_number);

        let mut outcome = DownloadOutcome {
            chapter_url: chapter_url.to_owned(),
            manga_name: manga_dir,
            chapter_number,
            output_directory,
            total_images: 0,
            downloaded_count: 0,
            failed_count: 0,
            success: false,
            error: None,
            finished_at: Utc::now(),
        };

        let urls = match self.extractor.image_urls(chapter_url).await {
            Ok(urls) => urls,
            Err(ScrapeError::NoImagesFound { .. }) => Vec::new(),
            Err(err) => {
                tracing::error!(url = %chapter_url, %err, "chapter extraction failed");
                outcome.error = Some(err.to_string());
                outcome.finished_at = Utc::now();
                return outcome;
            }
        };
        if urls.is_empty() {
            tracing::warn!(url = %chapter_url, "no images found in chapter");
            outcome.error = Some("no images found".to_owned());
            outcome.finished_at = Utc::now();
            return outcome;
        }

        outcome.total_images = urls.len();
        if let Err(err) = tokio::fs::create_dir_all(&outcome.output_directory).await {
            let err = ScrapeError::io(&outcome.output_directory, err);
            tracing::error!(%err, "create chapter directory");
            outcome.error = Some(err.to_string());
            outcome.finished_at = Utc::now();
            return outcome;
        }

        for (idx, url) in urls.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.pacing.between_images).await;
            }

            let index = idx + 1;
            let path = outcome.output_directory.join(page_file_name(index, url));
            match self.save_image(index, url, &path).await {
                Ok(()) => {
                    tracing::info!(file = %path.display(), "downloaded");
                    outcome.downloaded_count += 1;
                }
                Err(err) => {
                    tracing::error!(%err, "image download failed");
                    outcome.failed_count += 1;
                }
            }
        }

        outcome.success = true;
        outcome.finished_at = Utc::now();
        tracing::info!(
            url = %chapter_url,
            downloaded = outcome.downloaded_count,
            total = outcome.total_images,
            "chapter download complete"
        );
        outcome
    }

    async fn save_image(&self, index: usize, url: &str, path: &Path) -> Result<()> {
        let per_item = |message: String| ScrapeError::PerItemDownload {
            index,
            url: url.to_owned(),
            message,
        };

        let bytes = self
            .client
            .fetch_bytes(url, self.pacing.image_timeout)
            .await
            .map_err(|err| per_item(err.to_string()))?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|err| per_item(format!("write {}: {err}", path.display())))
    }

    /// Downloads the chapters of a title page within the inclusive range.
    pub async fn download_manga(
        &self,
        catalog: &CatalogDiscoverer,
        title_url: &str,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<MangaDownloadSummary> {
        let found = catalog.catalog(title_url).await?;
        let manga_name = found.manga.manga_name;

        let mut summary = MangaDownloadSummary {
            manga_name: manga_name.clone(),
            success: false,
            message: None,
            total_chapters: 0,
            successful_chapters: 0,
            total_images_downloaded: 0,
            results: Vec::new(),
        };

        if found.chapters.is_empty() {
            summary.message = Some("no chapters found".to_owned());
            return Ok(summary);
        }

        let lower = start.unwrap_or(f64::NEG_INFINITY);
        let upper = end.unwrap_or(f64::INFINITY);
        let chapters: Vec<_> = found
            .chapters
            .into_iter()
            .filter(|chapter| (lower..=upper).contains(&chapter.chapter_number))
            .collect();
        if chapters.is_empty() {
            summary.message = Some("no chapters in specified range".to_owned());
            return Ok(summary);
        }

        tracing::info!(manga = %manga_name, count = chapters.len(), "downloading chapters");
        summary.total_chapters = chapters.len();

        for (idx, chapter) in chapters.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.pacing.between_chapters).await;
            }

            tracing::info!(chapter = %chapter.number_text, "downloading chapter");
            let outcome = self
                .download_chapter(&chapter.url, Some(&manga_name), Some(&chapter.number_text))
                .await;
            summary.results.push(outcome);
        }

        summary.successful_chapters = summary.results.iter().filter(|r| r.success).count();
        summary.total_images_downloaded = summary.results.iter().map(|r| r.downloaded_count).sum();
        summary.success = true;
        Ok(summary)
    }
}

/// Directory name for a manga: caller names are lowercased with `_` for
/// spaces, URL slugs get `_` for `-`.
pub fn manga_dir_name(chapter_url: &str, manga_name: Option<&str>) -> String {
    let name = match manga_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.replace(' ', "_").to_lowercase(),
        None => match manga_slug_from_url(chapter_url) {
            Some(slug) => slug.replace('-', "_"),
            None => return "unknown_manga".to_owned(),
        },
    };
    path_component(&name, "unknown_manga")
}

/// Turns scraped or caller text into a single path component under the
/// download root: separators become `_`, dot-only names use `fallback`.
pub fn path_component(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        fallback.to_owned()
    } else {
        cleaned
    }
}

pub fn chapter_dir(root: &Path, manga_dir: &str, chapter_number: &str) -> PathBuf {
    root.join(manga_dir).join(format!("chapter_{chapter_number}"))
}

/// `page_001.jpg`; `.png` and `.jpeg` are recognized anywhere in the URL.
pub fn page_file_name(index: usize, url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    let ext = if lower.contains(".png") {
        ".png"
    } else if lower.contains(".jpeg") {
        ".jpeg"
    } else {
        ".jpg"
    };
    format!("page_{index:03}{ext}")
}

pub async fn run(args: DownloadArgs, config: &ScraperConfig) -> anyhow::Result<()> {
    let client = HttpClient::new(config).context("build http client")?;
    let extractor = args.engine.build(config, &client);
    let root = args.out.unwrap_or_else(|| config.download_root.clone());
    let downloader = Downloader::new(client, extractor.as_ref(), root, Pacing::from_config(config));

    let outcome = downloader
        .download_chapter(
            &args.url,
            args.manga_name.as_deref(),
            args.chapter_number.as_deref(),
        )
        .await;
    print_json(&outcome)?;
    if !outcome.success {
        anyhow::bail!(
            "chapter download failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

pub async fn run_manga(args: DownloadMangaArgs, config: &ScraperConfig) -> anyhow::Result<()> {
    let client = HttpClient::new(config).context("build http client")?;
    let extractor = args.engine.build(config, &client);
    let catalog = CatalogDiscoverer::new(client.clone(), config.catalog_timeout());
    let root = args.out.unwrap_or_else(|| config.download_root.clone());
    let downloader = Downloader::new(client, extractor.as_ref(), root, Pacing::from_config(config));

    let summary = downloader
        .download_manga(&catalog, &args.url, args.start, args.end)
        .await
        .with_context(|| format!("download manga {}", args.url))?;
    print_json(&summary)?;
    if !summary.success {
        anyhow::bail!(
            "manga download failed: {}",
            summary.message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("write json")?;
    stdout.write_all(b"\n").context("write newline")?;
    Ok(())
}
