use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::BookingPolicy;
use crate::model::{Color, UnknownColor};

/// Runtime configuration, read once at startup from `CHALET_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// WAL appends since the last compaction that trigger a new one.
    pub compact_threshold: u64,
    pub compact_interval: Duration,
    pub bookable_colors: Vec<Color>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(60),
            bookable_colors: BookingPolicy::default().colors().to_vec(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid { var: &'static str, value: String },
    Color(UnknownColor),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { var, value } => write!(f, "invalid {var}: {value:?}"),
            ConfigError::Color(e) => write!(f, "invalid CHALET_BOOKABLE_COLORS: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Unset variables keep their
    /// defaults; set but unparsable ones are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        if let Some(dir) = lookup("CHALET_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(port) = lookup("CHALET_METRICS_PORT") {
            config.metrics_port = Some(parse("CHALET_METRICS_PORT", &port)?);
        }
        if let Some(n) = lookup("CHALET_COMPACT_THRESHOLD") {
            config.compact_threshold = parse("CHALET_COMPACT_THRESHOLD", &n)?;
        }
        if let Some(secs) = lookup("CHALET_COMPACT_INTERVAL_SECS") {
            let secs: u64 = parse("CHALET_COMPACT_INTERVAL_SECS", &secs)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var: "CHALET_COMPACT_INTERVAL_SECS",
                    value: "0".into(),
                });
            }
            config.compact_interval = Duration::from_secs(secs);
        }
        if let Some(colors) = lookup("CHALET_BOOKABLE_COLORS") {
            config.bookable_colors = colors
                .split(',')
                .filter(|c| !c.trim().is_empty())
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map_err(ConfigError::Color)?;
        }
        Ok(config)
    }

    pub fn booking_policy(&self) -> BookingPolicy {
        BookingPolicy::new(self.bookable_colors.iter().copied())
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("chalet.wal")
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}
