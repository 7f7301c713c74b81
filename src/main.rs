use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use mangascrape::cli::{Cli, Command};
use mangascrape::config::ScraperConfig;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ScraperConfig::from_file(cli.config.as_deref()).context("load config")?;
    mangascrape::logging::init(&config.log_filter).context("init logging")?;
    config.apply_env();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Extract(args) => {
            mangascrape::extract::run(args, &config)
                .await
                .context("extract")?;
        }
        Command::Chapters(args) => {
            mangascrape::catalog::run(args, &config)
                .await
                .context("chapters")?;
        }
        Command::Download(args) => {
            mangascrape::download::run(args, &config)
                .await
                .context("download")?;
        }
        Command::DownloadManga(args) => {
            mangascrape::download::run_manga(args, &config)
                .await
                .context("download-manga")?;
        }
    }

    Ok(())
}
