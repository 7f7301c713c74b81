use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::dynamic::ScrollPlan;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ENV_PREFIX: &str = "MANGASCRAPE_";

/// Process-wide settings. Built once at startup and only read afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
    pub catalog_timeout_secs: u64,
    pub image_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    pub script_timeout_secs: u64,

    /// Pause between consecutive image requests of one chapter.
    pub image_delay_ms: u64,
    /// Pause between consecutive chapters of one manga.
    pub chapter_delay_ms: u64,

    pub download_root: PathBuf,
    pub debug_snapshot: Option<PathBuf>,
    pub chrome_executable: Option<PathBuf>,
    pub log_filter: String,
    pub scroll: ScrollPlan,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            fetch_timeout_secs: 30,
            catalog_timeout_secs: 10,
            image_timeout_secs: 15,
            navigation_timeout_secs: 60,
            script_timeout_secs: 30,
            image_delay_ms: 500,
            chapter_delay_ms: 1000,
            download_root: PathBuf::from("downloads"),
            debug_snapshot: Some(PathBuf::from("/tmp/mangapark_debug.png")),
            chrome_executable: None,
            log_filter: "info".to_owned(),
            scroll: ScrollPlan::default(),
        }
    }
}

impl ScraperConfig {
    /// Defaults, then the optional YAML file, then `MANGASCRAPE_*` variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults overlaid with the optional YAML file.
    pub fn from_file(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        serde_yaml::from_str(&yaml).with_context(|| format!("parse config: {}", path.display()))
    }

    /// Applies `MANGASCRAPE_*` overrides. The log filter is file-only, so this
    /// can run after logging is initialized.
    pub fn apply_env(&mut self) {
        self.apply_env_overrides(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok());
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = lookup("USER_AGENT") {
            self.user_agent = value;
        }
        if let Some(value) = lookup("DOWNLOAD_ROOT") {
            self.download_root = PathBuf::from(value);
        }
        if let Some(value) = lookup("CHROME_PATH") {
            self.chrome_executable = Some(PathBuf::from(value));
        }

        let numeric = [
            ("FETCH_TIMEOUT_SECS", &mut self.fetch_timeout_secs),
            ("NAVIGATION_TIMEOUT_SECS", &mut self.navigation_timeout_secs),
            ("IMAGE_DELAY_MS", &mut self.image_delay_ms),
            ("CHAPTER_DELAY_MS", &mut self.chapter_delay_ms),
        ];
        for (key, slot) in numeric {
            let Some(raw) = lookup(key) else {
                continue;
            };
            match raw.parse::<u64>() {
                Ok(value) => *slot = value,
                Err(err) => {
                    tracing::warn!(
                        key = %format!("{ENV_PREFIX}{key}"),
                        %raw,
                        %err,
                        "ignoring invalid override"
                    );
                }
            }
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    pub fn image_delay(&self) -> Duration {
        Duration::from_millis(self.image_delay_ms)
    }

    pub fn chapter_delay(&self) -> Duration {
        Duration::from_millis(self.chapter_delay_ms)
    }
}
