//! Runtime configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then a
//! few environment variables. Command-line flags are applied on top by the
//! binary.

use crate::error::{Result, ScrapeError};
use crate::models::{AreaRadius, SearchCriteria};
use crate::scrapers::pacing::PacingPolicy;
use crate::scrapers::traits::RetryBudget;
use crate::scrapers::types::SitesConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BROWSER_PATH_ENV: &str = "CHROME_BROWSER_PATH";
pub const DEBUG_ENV: &str = "SCRAPER_DEBUG";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub scraper: ScraperSettings,
    pub browser: BrowserConfig,
    pub sites: SitesConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load defaults, overlay `path` when given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            ScrapeError::Config(format!("Failed to read {}: {}", path.display(), err))
        })?;

        toml::from_str(&content)
            .map_err(|err| ScrapeError::Config(format!("{}: {}", path.display(), err)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| ScrapeError::Config(err.to_string()))
    }

    /// Apply environment overrides read through `var`
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var(BROWSER_PATH_ENV).filter(|path| !path.trim().is_empty()) {
            self.browser.executable = Some(PathBuf::from(path.trim()));
        }

        if let Some(value) = var(DEBUG_ENV) {
            self.logging.debug = parse_flag(&value).ok_or_else(|| {
                ScrapeError::Config(format!("{} must be a boolean, got {:?}", DEBUG_ENV, value))
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let scraper = &self.scraper;

        if scraper.location_query.trim().is_empty() {
            return Err(ScrapeError::Config("scraper.location_query must not be empty".to_string()));
        }
        if scraper.offer_cap == 0 {
            return Err(ScrapeError::InvalidOfferCap);
        }
        if scraper.max_retries == 0 {
            return Err(ScrapeError::Config("scraper.max_retries must be at least 1".to_string()));
        }
        if scraper.min_delay < 0.0 || scraper.max_delay < scraper.min_delay {
            return Err(ScrapeError::Config(format!(
                "invalid delay bounds {}..{}",
                scraper.min_delay, scraper.max_delay
            )));
        }
        for (name, secs) in [
            ("scraper.wait_timeout_secs", scraper.wait_timeout_secs),
            ("scraper.multi_wait_timeout_secs", scraper.multi_wait_timeout_secs),
            ("browser.page_timeout_secs", self.browser.page_timeout_secs),
        ] {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ScrapeError::Config(format!("{} must be positive", name)));
            }
        }
        let log_file = self.logging.file.trim();
        if log_file.is_empty() || log_file.contains(['/', '\\']) {
            return Err(ScrapeError::Config(format!(
                "logging.file must be a plain file name, got {:?}",
                self.logging.file
            )));
        }
        if self.browser.window_size.0 == 0 || self.browser.window_size.1 == 0 {
            return Err(ScrapeError::Config("browser.window_size must be non-zero".to_string()));
        }

        Ok(())
    }

    pub fn debug(&self) -> bool {
        self.logging.debug
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Search defaults, retry budgets and pacing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScraperSettings {
    pub location_query: String,
    pub area_radius: AreaRadius,
    pub offer_cap: u32,
    /// Attempts per wait before giving up on a page
    pub max_retries: u32,
    /// Timeout for waits on a whole page
    pub wait_timeout_secs: f64,
    /// Timeout for each element of a multi-element wait, and for optional
    /// controls such as cookie banners
    pub multi_wait_timeout_secs: f64,
    pub min_delay: f64,
    pub max_delay: f64,
    /// Randomized pauses between actions
    pub anti_bot: bool,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            location_query: "Mierzęcice, Będziński, Śląskie".to_string(),
            area_radius: AreaRadius::Km25,
            offer_cap: 3,
            max_retries: 5,
            wait_timeout_secs: 10.0,
            multi_wait_timeout_secs: 5.0,
            min_delay: 0.90,
            max_delay: 1.30,
            anti_bot: true,
        }
    }
}

impl ScraperSettings {
    pub fn criteria(&self) -> Result<SearchCriteria> {
        SearchCriteria::new(self.location_query.trim(), self.area_radius, self.offer_cap)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.wait_timeout_secs)
    }

    pub fn multi_wait_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.multi_wait_timeout_secs)
    }

    pub fn pacing(&self) -> PacingPolicy {
        PacingPolicy::new(self.anti_bot, self.min_delay, self.max_delay)
    }

    pub fn retry_budget(&self) -> RetryBudget {
        RetryBudget {
            timeout: self.multi_wait_timeout(),
            max_retries: self.max_retries,
        }
    }
}

/// How the browser is launched
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub sandbox: bool,
    pub ignore_certificate_errors: bool,
    pub window_size: (u32, u32),
    pub maximize_window: bool,
    /// Chrome binary; detected automatically when unset
    pub executable: Option<PathBuf>,
    pub user_agent: UserAgent,
    /// Chrome is shut down after this long without any command
    pub idle_timeout_secs: u64,
    /// Default timeout for page loads and element lookups
    pub page_timeout_secs: f64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            ignore_certificate_errors: true,
            window_size: (1920, 1080),
            maximize_window: true,
            executable: None,
            user_agent: UserAgent::Random,
            idle_timeout_secs: 300,
            page_timeout_secs: 30.0,
        }
    }
}

impl BrowserConfig {
    pub fn browser_path(&self) -> Option<PathBuf> {
        self.executable.clone()
    }
}

/// User agent sent by every tab.
///
/// In the config file this is `"random"`, `"default"` (Chrome's own) or
/// any other string, used verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserAgent {
    #[default]
    Random,
    Default,
    Fixed(String),
}

impl From<String> for UserAgent {
    fn from(value: String) -> Self {
        match value.trim() {
            "random" => UserAgent::Random,
            "" | "default" => UserAgent::Default,
            other => UserAgent::Fixed(other.to_string()),
        }
    }
}

impl From<UserAgent> for String {
    fn from(agent: UserAgent) -> Self {
        match agent {
            UserAgent::Random => "random".to_string(),
            UserAgent::Default => "default".to_string(),
            UserAgent::Fixed(agent) => agent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Root folder for scraped records
    pub output_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./data/raw"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Stop on the first failure and log at debug level
    pub debug: bool,
    /// Folder for the log file
    pub dir: PathBuf,
    /// Log file name inside `dir`
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            debug: false,
            dir: PathBuf::from("./logs"),
            file: "scraper.log".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn default_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scraper.area_radius, AreaRadius::Km25);
        assert_eq!(config.scraper.offer_cap, 3);
        assert_eq!(config.scraper.max_retries, 5);
        assert_eq!(config.scraper.wait_timeout(), Duration::from_secs(10));
        assert_eq!(config.scraper.retry_budget().timeout, Duration::from_secs(5));
        assert!(config.scraper.anti_bot);
        assert_eq!(config.data.output_dir, PathBuf::from("./data/raw"));
        assert_eq!(config.logging.file_path(), PathBuf::from("./logs/scraper.log"));
        assert_eq!(config.sites.domains.olx, "https://www.olx.pl");
        assert!(!config.debug());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [scraper]
            location_query = "Katowice"
            area_radius = 10
            offer_cap = 40

            [browser]
            headless = false
            user_agent = "Mozilla/5.0 test"

            [sites.otodom]
            main_feed = "main"
            "#,
        )
        .unwrap();

        assert_eq!(config.scraper.location_query, "Katowice");
        assert_eq!(config.scraper.area_radius, AreaRadius::Km10);
        assert_eq!(config.scraper.offer_cap, 40);
        assert_eq!(config.scraper.max_retries, 5);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.user_agent, UserAgent::Fixed("Mozilla/5.0 test".to_string()));
        assert_eq!(config.sites.otodom.main_feed, "main");
        assert_eq!(config.sites.otodom.location_input, "#location-picker-input");
        assert_eq!(config.sites.olx_category, "nieruchomosci/mieszkania/wynajem/");
    }

    #[test]
    fn test_unsupported_radius_is_rejected() {
        let result = Config::from_toml("[scraper]\narea_radius = 20\n");
        assert!(matches!(result, Err(ScrapeError::Config(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            (BROWSER_PATH_ENV, "/opt/chrome/chrome"),
            (DEBUG_ENV, "true"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();

        assert_eq!(config.browser.browser_path(), Some(PathBuf::from("/opt/chrome/chrome")));
        assert!(config.debug());
        assert_eq!(config.logging.default_filter(), "debug");
    }

    #[test]
    fn test_bad_debug_flag_is_a_config_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == DEBUG_ENV).then(|| "maybe".to_string()));
        assert!(matches!(result, Err(ScrapeError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.scraper.min_delay = 2.0;
        config.scraper.max_delay = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scraper.offer_cap = 0;
        assert!(matches!(config.validate(), Err(ScrapeError::InvalidOfferCap)));

        let mut config = Config::default();
        config.scraper.location_query = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\ndebug = true\n[data]\noutput_dir = \"out\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.debug());
        assert_eq!(config.data.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_log_file_location() {
        let config = Config::from_toml(
            r#"
            [logging]
            dir = "/var/log/scout"
            file = "run.log"
            "#,
        )
        .unwrap();
        assert!(!config.debug());
        assert_eq!(config.logging.file_path(), PathBuf::from("/var/log/scout/run.log"));

        let mut config = Config::default();
        config.logging.file = "nested/run.log".to_string();
        assert!(matches!(config.validate(), Err(ScrapeError::Config(_))));

        config.logging.file = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_user_agent_round_trip_names() {
        assert_eq!(UserAgent::from("random".to_string()), UserAgent::Random);
        assert_eq!(UserAgent::from("default".to_string()), UserAgent::Default);
        assert_eq!(String::from(UserAgent::Random), "random");
    }
}
