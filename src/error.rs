use std::path::PathBuf;
use std::time::Duration;

/// Failure taxonomy shared by the extractors, the catalog discoverer and the
/// downloader. Every variant is scoped to a single invocation.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("{stage} exceeded its {timeout:?} deadline: {url}")]
    RenderTimeout {
        url: String,
        stage: &'static str,
        timeout: Duration,
    },

    #[error("no manga page images found: {url}")]
    NoImagesFound { url: String },

    #[error("invalid url ({expected}): {url}")]
    InvalidUrl { url: String, expected: &'static str },

    #[error("download image {index} ({url}): {message}")]
    PerItemDownload {
        index: usize,
        url: String,
        message: String,
    },

    #[error("headless browser: {0}")]
    Browser(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse response class for an HTTP front end sitting on top of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    NotFound,
    BadRequest,
    ServerError,
}

impl ScrapeError {
    pub fn fetch(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn response_class(&self) -> ResponseClass {
        match self {
            Self::NoImagesFound { .. } => ResponseClass::NotFound,
            Self::InvalidUrl { .. } => ResponseClass::BadRequest,
            _ => ResponseClass::ServerError,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RenderTimeout { .. })
    }
}

pub type Result<T, E = ScrapeError> = std::result::Result<T, E>;
