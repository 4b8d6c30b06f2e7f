use std::path::PathBuf;
use std::time::Duration;

/// NASDAQ-style sector enumeration used for classification. Every sector the
/// classifier produces must be one of these or the configured default.
pub const SECTORS: &[&str] = &[
    "Technology",
    "Consumer Cyclical",
    "Industrials",
    "Utilities",
    "Healthcare",
    "Communication",
    "Energy",
    "Consumer Defensive",
    "Real Estate",
    "Financial",
];

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub max_stocks_default: usize,
    pub top_n: usize,
    pub bottom_n: usize,
    pub default_sector: String,
    pub fetch_max_retries: u32,
    pub classify_max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub classify_min_delay: Duration,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(env_or("DATA_DIR", "data"));
        let results_dir = std::env::var("RESULTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("results"));
        let uploads_dir = data_dir.join("uploads");

        Self {
            data_dir,
            results_dir,
            uploads_dir,
            max_stocks_default: parse_or("MAX_STOCKS_DEFAULT", 5),
            top_n: parse_or("RECOMMEND_TOP_N", 5),
            bottom_n: parse_or("RECOMMEND_BOTTOM_N", 5),
            default_sector: env_or("DEFAULT_SECTOR", "Technology"),
            fetch_max_retries: parse_or("FETCH_MAX_RETRIES", 3),
            classify_max_retries: parse_or("CLASSIFY_MAX_RETRIES", 3),
            retry_base_delay: Duration::from_millis(parse_or("RETRY_BASE_DELAY_MS", 1_000)),
            retry_max_delay: Duration::from_secs(parse_or("RETRY_MAX_DELAY_SECS", 60)),
            classify_min_delay: Duration::from_millis(parse_or("CLASSIFY_MIN_DELAY_MS", 500)),
            port: parse_or("BACKEND_PORT", 8881),
        }
    }

    pub fn sectors(&self) -> Vec<String> {
        SECTORS.iter().map(|s| s.to_string()).collect()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
