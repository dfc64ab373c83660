use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use crate::normalize::limits::{DisplayConfig, Limits, MissingEntryPolicy, SortMode};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_rate_ms: u64,
    pub default_sort: String,
    pub only_proc: bool,
    pub missing_entry: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_rate_ms: 2000,
            default_sort: "cpu".to_string(),
            only_proc: true,
            missing_entry: "fail".to_string(),
        }
    }
}

/// Row limits per list. Values are clamped on the way in: negatives and
/// anything non-numeric become 0.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    #[serde(deserialize_with = "clamped_limit")]
    pub processes: usize,
    #[serde(deserialize_with = "clamped_limit")]
    pub cpu: usize,
    #[serde(deserialize_with = "clamped_limit")]
    pub lvm: usize,
    #[serde(deserialize_with = "clamped_limit")]
    pub disk: usize,
    #[serde(deserialize_with = "clamped_limit")]
    pub interface: usize,
    #[serde(deserialize_with = "clamped_limit")]
    pub numa: usize,
    #[serde(deserialize_with = "clamped_limit")]
    pub llc: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = Limits::default();
        LimitsConfig {
            processes: limits.processes,
            cpu: limits.cpu,
            lvm: limits.lvm,
            disk: limits.disk,
            interface: limits.interface,
            numa: limits.numa,
            llc: limits.llc,
        }
    }
}

fn clamped_limit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    struct LimitVisitor;

    impl Visitor<'_> for LimitVisitor {
        type Value = usize;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a row limit")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<usize, E> {
            Ok(usize::try_from(v).unwrap_or(0))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<usize, E> {
            Ok(usize::try_from(v).unwrap_or(usize::MAX))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<usize, E> {
            if v.is_finite() && v > 0.0 {
                Ok(v.trunc() as usize)
            } else {
                Ok(0)
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<usize, E> {
            match v.trim().parse::<f64>() {
                Ok(n) => self.visit_f64(n),
                Err(_) => Ok(0),
            }
        }

        fn visit_bool<E: de::Error>(self, _: bool) -> Result<usize, E> {
            Ok(0)
        }
    }

    deserializer.deserialize_any(LimitVisitor)
}

impl Config {
    pub fn display_config(&self) -> DisplayConfig {
        let l = &self.limits;
        DisplayConfig {
            limits: Limits {
                processes: l.processes,
                cpu: l.cpu,
                lvm: l.lvm,
                disk: l.disk,
                interface: l.interface,
                numa: l.numa,
                llc: l.llc,
            },
            sort_mode: SortMode::from_str_config(&self.general.default_sort),
            only_proc: self.general.only_proc,
            missing_entry: MissingEntryPolicy::from_str_config(&self.general.missing_entry),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("atopweb").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "ignoring invalid config");
                Config::default()
            }
        },
        Err(_) => Config::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.general.refresh_rate_ms, 2000);
        assert_eq!(config.general.default_sort, "cpu");
        assert!(config.general.only_proc);
        assert_eq!(config.limits.processes, 200);
        assert_eq!(config.limits.lvm, 4);
        assert_eq!(config.limits.interface, 2);
        assert_eq!(config.display_config(), DisplayConfig::default());
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[general]
refresh_rate_ms = 500
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.refresh_rate_ms, 500);
        // Other fields should be defaults
        assert_eq!(config.general.missing_entry, "fail");
        assert_eq!(config.limits.disk, 1);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[general]
refresh_rate_ms = 1000
default_sort = "disk"
only_proc = false
missing_entry = "empty"

[limits]
processes = 50
cpu = 8
lvm = 2
disk = 3
interface = 4
numa = 2
llc = 1
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let display = config.display_config();
        assert_eq!(config.general.refresh_rate_ms, 1000);
        assert_eq!(display.sort_mode, SortMode::Disk);
        assert!(!display.only_proc);
        assert_eq!(display.missing_entry, MissingEntryPolicy::Empty);
        assert_eq!(
            display.limits,
            Limits {
                processes: 50,
                cpu: 8,
                lvm: 2,
                disk: 3,
                interface: 4,
                numa: 2,
                llc: 1,
            }
        );
    }

    #[test]
    fn limits_clamp_negative_and_non_numeric() {
        let toml_str = r#"
[limits]
processes = -5
cpu = "12"
lvm = "lots"
disk = 2.9
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.limits.processes, 0);
        assert_eq!(config.limits.cpu, 12);
        assert_eq!(config.limits.lvm, 0);
        assert_eq!(config.limits.disk, 2);
        assert_eq!(config.limits.interface, 2);
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.general.refresh_rate_ms, 2000);
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("atopweb_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.general.refresh_rate_ms, 2000);
        let _ = std::fs::remove_file(&temp);
    }
}
