use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

pub const DEFAULT_BASE_URL: &str = "https://coinmarketcap.com/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const DEFAULT_STAT_LABELS: [&str; 3] = ["FDV", "Volume (24h)", "Total Supply"];

/// What the extraction core needs from the caller. Nothing in the core reads
/// the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub stat_labels: Vec<String>,
    pub ratio_threshold: f64,
    /// Maximum number of detail documents to harvest and extract.
    pub record_limit: Option<usize>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            stat_labels: DEFAULT_STAT_LABELS.iter().map(|s| s.to_string()).collect(),
            ratio_threshold: 0.3,
            record_limit: Some(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub list_pages: u32,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub output_dir: PathBuf,
    /// Run offline from a saved detail archive instead of fetching.
    pub archive_path: Option<PathBuf>,
    pub extraction: ExtractionConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, with defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut base_url = get("BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let list_pages = parse_or(get("LIST_PAGES"), "LIST_PAGES", 3u32)?;
        let timeout_secs = parse_or(get("REQUEST_TIMEOUT_SECS"), "REQUEST_TIMEOUT_SECS", 20u64)?;
        let record_limit = match parse_or(get("RECORD_LIMIT"), "RECORD_LIMIT", 300usize)? {
            0 => None,
            n => Some(n),
        };

        let ratio_threshold = parse_or(get("RATIO_THRESHOLD"), "RATIO_THRESHOLD", 0.3f64)?;
        if !ratio_threshold.is_finite() {
            return Err(AppError::ConfigError(format!(
                "Invalid RATIO_THRESHOLD: {}",
                ratio_threshold
            )));
        }

        let stat_labels = match get("STAT_LABELS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
            None => ExtractionConfig::default().stat_labels,
        };

        Ok(Config {
            base_url,
            list_pages,
            user_agent: get("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
            output_dir: PathBuf::from(get("OUTPUT_DIR").unwrap_or_else(|| ".".to_string())),
            archive_path: get("ARCHIVE_PATH").map(PathBuf::from),
            extraction: ExtractionConfig {
                stat_labels,
                ratio_threshold,
                record_limit,
            },
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v
            .parse::<T>()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}
