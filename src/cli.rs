use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::extract::Engine;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML config file (defaults apply when omitted).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the ordered page image URLs of a chapter.
    Extract(ExtractArgs),
    /// Print the chapter list of a manga title page.
    Chapters(ChaptersArgs),
    /// Download every page image of one chapter.
    Download(DownloadArgs),
    /// Download a range of chapters of one manga.
    DownloadManga(DownloadMangaArgs),
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Chapter URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Extraction engine.
    #[arg(long, value_enum, default_value_t = Engine::Generic)]
    pub engine: Engine,
}

#[derive(Debug, Args)]
pub struct ChaptersArgs {
    /// Title page URL (`/title/<id>-en-<slug>`).
    #[arg(long)]
    pub url: String,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Chapter URL.
    #[arg(long)]
    pub url: String,

    /// Manga directory name (default: derived from the URL).
    #[arg(long)]
    pub manga_name: Option<String>,

    /// Chapter number (default: derived from the URL).
    #[arg(long)]
    pub chapter_number: Option<String>,

    /// Download root (default: `download_root` from config).
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Engine::Dynamic)]
    pub engine: Engine,
}

#[derive(Debug, Args)]
pub struct DownloadMangaArgs {
    /// Title page URL (`/title/<id>-en-<slug>`).
    #[arg(long)]
    pub url: String,

    /// First chapter number to download (inclusive).
    #[arg(long)]
    pub start: Option<f64>,

    /// Last chapter number to download (inclusive).
    #[arg(long)]
    pub end: Option<f64>,

    /// Download root (default: `download_root` from config).
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Engine::Dynamic)]
    pub engine: Engine,
}
