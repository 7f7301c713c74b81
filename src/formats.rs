use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::is_candidate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSource {
    pub chapter_url: String,
}

/// Ordered page images of one chapter.
///
/// Fields are private so that `total_pages == image_urls.len()` holds, every
/// URL passes the candidate filter and no URL repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    image_urls: Vec<String>,
    total_pages: usize,
}

impl ExtractionResult {
    /// Keeps the given order, dropping repeats and non-candidates.
    pub fn from_ordered<I>(urls: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        let image_urls: Vec<String> = urls
            .into_iter()
            .filter(|url| is_candidate(url))
            .filter(|url| seen.insert(url.clone()))
            .collect();
        let total_pages = image_urls.len();
        Self {
            image_urls,
            total_pages,
        }
    }

    pub fn image_urls(&self) -> &[String] {
        &self.image_urls
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn is_empty(&self) -> bool {
        self.image_urls.is_empty()
    }

    pub fn into_image_urls(self) -> Vec<String> {
        self.image_urls
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub chapter_id: String,
    /// Sort and range key.
    pub chapter_number: f64,
    /// The number exactly as written in the link (`1.10`, `05`); used for
    /// directory names.
    pub number_text: String,
    pub chapter_label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaRef {
    pub manga_id: String,
    pub manga_name: String,
    pub source_url: String,
}

/// One rendered page image before it is flattened into page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub page_index: u32,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub chapter_url: String,
    pub manga_name: String,
    pub chapter_number: String,
    pub output_directory: PathBuf,
    pub total_images: usize,
    pub downloaded_count: usize,
    pub failed_count: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaDownloadSummary {
    pub manga_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub total_chapters: usize,
    pub successful_chapters: usize,
    pub total_images_downloaded: usize,
    pub results: Vec<DownloadOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterCatalog {
    pub manga: MangaRef,
    pub chapters: Vec<ChapterRecord>,
}
