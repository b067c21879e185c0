//! Startup configuration.
//!
//! A [`Config`] is built once from the command line, validated, and then
//! shared read-only by every lap.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::collector::Family;

/// Default delay between laps.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
/// Default consistency window.
pub const DEFAULT_CONSISTENCY: Duration = Duration::from_secs(1);
/// Default bound on a single family's read.
pub const DEFAULT_SAMPLE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of immediate re-samples in one-shot mode.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Error type for invalid configuration. Always fatal at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A duration string could not be parsed.
    InvalidDuration(String),
    /// The sampling interval is zero.
    ZeroInterval,
    /// A family name is not one of the known families.
    UnknownFamily(String),
    /// The family list is empty.
    NoFamilies,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDuration(s) => write!(f, "invalid duration '{}'", s),
            ConfigError::ZeroInterval => write!(f, "interval must be greater than zero"),
            ConfigError::UnknownFamily(name) => write!(
                f,
                "unknown family '{}' (expected one of: {})",
                name,
                Family::ALL.map(Family::name).join(", ")
            ),
            ConfigError::NoFamilies => write!(f, "no families to collect"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// How batches are shown on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Off,
    Text,
    Json,
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "off" | "none" => Ok(DisplayMode::Off),
            "text" => Ok(DisplayMode::Text),
            "json" => Ok(DisplayMode::Json),
            other => Err(format!(
                "invalid display mode '{}' (expected off, text or json)",
                other
            )),
        }
    }
}

/// Immutable runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Delay between laps in daemon mode.
    pub interval: Duration,
    /// Window rates are expressed over. Zero disables rescaling.
    pub consistency: Duration,
    /// Run laps until shutdown instead of emitting once.
    pub daemon: bool,
    /// Families to sample, in emission order, without duplicates.
    pub families: Vec<Family>,
    /// Table name prefix, empty or ending in `.`.
    pub prefix: String,
    /// Append an `fqdn` column to every row.
    pub fqdn: bool,
    pub display: DisplayMode,
    pub proc_path: PathBuf,
    pub sample_timeout: Duration,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            consistency: DEFAULT_CONSISTENCY,
            daemon: false,
            families: Family::ALL.to_vec(),
            prefix: String::new(),
            fqdn: false,
            display: DisplayMode::Off,
            proc_path: PathBuf::from("/proc"),
            sample_timeout: DEFAULT_SAMPLE_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Config {
    /// Checks the invariants the orchestrator relies on and normalizes the
    /// family list and prefix.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        self.families = dedup_families(&self.families);
        if self.families.is_empty() {
            return Err(ConfigError::NoFamilies);
        }
        self.prefix = normalize_prefix(&self.prefix);
        Ok(self)
    }

    /// Multiplier applied to every counter delta.
    pub fn consistency_factor(&self) -> f64 {
        if self.consistency.is_zero() {
            return 1.0;
        }
        self.consistency.as_secs_f64() / self.interval.as_secs_f64()
    }
}

/// Parses a comma-separated family list, keeping first-seen order.
pub fn parse_families(s: &str) -> Result<Vec<Family>, ConfigError> {
    let families = s
        .split(',')
        .filter(|name| !name.trim().is_empty())
        .map(Family::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dedup_families(&families))
}

fn dedup_families(families: &[Family]) -> Vec<Family> {
    let mut out = Vec::with_capacity(families.len());
    for &family in families {
        if !out.contains(&family) {
            out.push(family);
        }
    }
    out
}

/// Makes a non-empty prefix end with exactly one `.`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}.", trimmed)
    }
}

/// Parses a human-readable duration (e.g., "500ms", "1m30s", "2h 5m").
///
/// A bare number, fractional or not, is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    humantime::parse_duration(s)
        .ok()
        .or_else(|| {
            s.parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        })
        .ok_or_else(|| ConfigError::InvalidDuration(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration(" 30 ").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_compound_and_fractional() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(
            parse_duration("2h 5m").unwrap(),
            Duration::from_secs(2 * 3600 + 5 * 60)
        );
        assert_eq!(parse_duration("1.5").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("0.25").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert_eq!(
            parse_duration("fast"),
            Err(ConfigError::InvalidDuration("fast".into()))
        );
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("10 parsecs").is_err());
    }

    #[test]
    fn test_parse_families_dedups_in_order() {
        let families = parse_families("load,cpu,load,mem").unwrap();
        assert_eq!(families, [Family::Load, Family::Cpu, Family::Mem]);

        assert_eq!(
            parse_families("cpu,gpu"),
            Err(ConfigError::UnknownFamily("gpu".into()))
        );
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("web01"), "web01.");
        assert_eq!(normalize_prefix("web01."), "web01.");
        assert_eq!(normalize_prefix("web01.."), "web01.");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn test_consistency_factor() {
        let config = Config {
            interval: Duration::from_secs(1),
            consistency: Duration::from_secs(60),
            ..Config::default()
        };
        assert_eq!(config.consistency_factor(), 60.0);

        let config = Config {
            interval: Duration::from_secs(10),
            consistency: Duration::ZERO,
            ..Config::default()
        };
        assert_eq!(config.consistency_factor(), 1.0);

        let config = Config {
            interval: Duration::from_millis(500),
            consistency: Duration::from_secs(1),
            ..Config::default()
        };
        assert_eq!(config.consistency_factor(), 2.0);
    }

    #[test]
    fn test_validate() {
        let config = Config {
            families: vec![Family::Cpu, Family::Cpu, Family::Load],
            prefix: "web01".into(),
            ..Config::default()
        }
        .validate()
        .unwrap();
        assert_eq!(config.families, [Family::Cpu, Family::Load]);
        assert_eq!(config.prefix, "web01.");

        let zero = Config {
            interval: Duration::ZERO,
            ..Config::default()
        };
        assert_eq!(zero.validate(), Err(ConfigError::ZeroInterval));

        let empty = Config {
            families: Vec::new(),
            ..Config::default()
        };
        assert_eq!(empty.validate(), Err(ConfigError::NoFamilies));
    }

    #[test]
    fn test_display_mode_from_str() {
        assert_eq!("json".parse::<DisplayMode>().unwrap(), DisplayMode::Json);
        assert_eq!("off".parse::<DisplayMode>().unwrap(), DisplayMode::Off);
        assert!("xml".parse::<DisplayMode>().is_err());
    }
}
