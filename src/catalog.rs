//! Chapter list discovery from a manga title page.
//!
//! Title pages live at `/title/<manga_id>-en-<slug>` and link chapters as
//! `/title/<manga_id>-en-<slug>/<chapter_id>-ch-<n>` or `...-chapter-<n>`.

use std::collections::HashSet;
use std::io::Write as _;
use std::sync::LazyLock;

use anyhow::Context as _;
use regex::Regex;
use scraper::{Html, Selector};

use crate::cli::ChaptersArgs;
use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::formats::{ChapterCatalog, ChapterRecord, MangaRef};
use crate::http::HttpClient;
use crate::normalize::normalize;

/// Manga id and slug from a title page URL.
pub const TITLE_URL_PATTERN: &str = r"/title/(\d+)-en-([^/?#]+)";

/// Chapter id and (possibly fractional) chapter number from a chapter link.
pub const CHAPTER_LINK_PATTERN: &str = r"/title/\d+-en-[^/]+/(\d+)-(?:ch|chapter)-([\d.]+)";

/// Chapter number anywhere in a chapter URL, either dialect.
pub const CHAPTER_NUMBER_PATTERN: &str = r"-(?:ch|chapter)-([\d.]+)";

/// Manga slug of a chapter URL (requires the chapter segment after it).
pub const CHAPTER_SLUG_PATTERN: &str = r"/title/\d+-en-([^/]+)/";

const TITLE_URL_SHAPE: &str = "/title/<id>-en-<slug>";

static TITLE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TITLE_URL_PATTERN).expect("valid title url regex"));
static CHAPTER_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CHAPTER_LINK_PATTERN).expect("valid chapter link regex"));
static CHAPTER_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CHAPTER_NUMBER_PATTERN).expect("valid chapter number regex"));
static CHAPTER_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CHAPTER_SLUG_PATTERN).expect("valid chapter slug regex"));

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));
static TITLE_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.link.link-hover").expect("valid title link selector"));

/// `(manga_id, slug)` of a title page URL.
pub fn parse_title_url(title_url: &str) -> Result<(String, String)> {
    let captures = TITLE_URL_RE
        .captures(title_url)
        .ok_or_else(|| ScrapeError::InvalidUrl {
            url: title_url.to_owned(),
            expected: TITLE_URL_SHAPE,
        })?;
    Ok((captures[1].to_owned(), captures[2].to_owned()))
}

pub fn chapter_number_from_url(chapter_url: &str) -> Option<String> {
    CHAPTER_NUMBER_RE
        .captures(chapter_url)
        .map(|captures| captures[1].to_owned())
}

pub fn manga_slug_from_url(chapter_url: &str) -> Option<String> {
    CHAPTER_SLUG_RE
        .captures(chapter_url)
        .map(|captures| captures[1].to_owned())
}

#[derive(Debug, Clone)]
pub struct CatalogDiscoverer {
    client: HttpClient,
    timeout: std::time::Duration,
}

impl CatalogDiscoverer {
    pub fn new(client: HttpClient, timeout: std::time::Duration) -> Self {
        Self { client, timeout }
    }

    /// Chapters of a title page, ascending by chapter number.
    pub async fn discover(&self, title_url: &str) -> Result<Vec<ChapterRecord>> {
        Ok(self.catalog(title_url).await?.chapters)
    }

    pub async fn discover_manga(&self, title_url: &str) -> Result<MangaRef> {
        Ok(self.catalog(title_url).await?.manga)
    }

    /// Manga reference and chapter list from a single fetch of the title page.
    pub async fn catalog(&self, title_url: &str) -> Result<ChapterCatalog> {
        let (manga_id, slug) = parse_title_url(title_url)?;

        tracing::info!(url = %title_url, "fetching title page");
        let html = self
            .client
            .fetch_html_with_timeout(title_url, None, self.timeout)
            .await?;

        let manga = manga_ref_from_html(&html, title_url, manga_id, &slug);
        let chapters = parse_chapter_links(&html, title_url);
        tracing::info!(manga = %manga.manga_name, count = chapters.len(), "chapters discovered");

        Ok(ChapterCatalog { manga, chapters })
    }
}

pub async fn run(args: ChaptersArgs, config: &ScraperConfig) -> anyhow::Result<()> {
    let client = HttpClient::new(config).context("build http client")?;
    let discoverer = CatalogDiscoverer::new(client, config.catalog_timeout());
    let catalog = discoverer
        .catalog(&args.url)
        .await
        .with_context(|| format!("discover chapters {}", args.url))?;

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &catalog).context("write chapter catalog")?;
    stdout.write_all(b"\n").context("write newline")?;
    Ok(())
}

fn manga_ref_from_html(html: &str, title_url: &str, manga_id: String, slug: &str) -> MangaRef {
    let document = Html::parse_document(html);
    let manga_name = document
        .select(&TITLE_LINK_SELECTOR)
        .map(|link| link.text().collect::<String>().trim().to_owned())
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| title_case_slug(slug));

    MangaRef {
        manga_id,
        manga_name,
        source_url: title_url.to_owned(),
    }
}

/// Chapter anchors of a title page: deduplicated by chapter id (first wins),
/// ordered by numeric chapter number.
pub fn parse_chapter_links(html: &str, title_url: &str) -> Vec<ChapterRecord> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut chapters = Vec::new();

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(captures) = CHAPTER_LINK_RE.captures(href) else {
            continue;
        };

        let chapter_id = captures[1].to_owned();
        let raw_number = &captures[2];
        let Ok(chapter_number) = raw_number.parse::<f64>() else {
            tracing::debug!(href, raw_number, "skipping chapter link with unparsable number");
            continue;
        };
        if !seen.insert(chapter_id.clone()) {
            continue;
        }

        chapters.push(ChapterRecord {
            chapter_id,
            chapter_number,
            number_text: raw_number.to_owned(),
            chapter_label: anchor.text().collect::<String>().trim().to_owned(),
            url: normalize(href, title_url),
        });
    }

    chapters.sort_by(|a, b| a.chapter_number.total_cmp(&b.chapter_number));
    chapters
}

fn title_case_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
