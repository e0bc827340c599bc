//! Configuration file handling.

use crate::{external::dependency_provider::Backend, sync::EngineConfig};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Deserializer};
use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

/// Contents of the configuration file. Every key is optional.
///
/// ```toml
/// backend = "ddcutil"
/// device = "display:1"
/// poll-interval = "10s"
/// render-interval = "500ms"
/// step-size = 5
/// start-paused = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub backend: Backend,
    pub device: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub render_interval: Duration,
    pub step_size: u8,
    pub start_paused: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: Backend::default(),
            device: String::new(),
            poll_interval: Duration::from_secs(10),
            render_interval: Duration::from_millis(500),
            step_size: 1,
            start_paused: false,
        }
    }
}

impl Config {
    /// Load the configuration from the given file, or from the default
    /// location if none is given. A missing file at the default location
    /// means the defaults are used.
    pub async fn load(path: Option<&Path>) -> Result<Config> {
        let (path, required) = match path {
            Some(path) => (path.to_owned(), true),
            None => match default_path() {
                Some(path) => (path, false),
                None => {
                    log::debug!("No configuration directory, using defaults");
                    return Ok(Config::default());
                }
            },
        };
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} doesn't exist, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Couldn't read {}", path.display()))
            }
        };
        log::info!("Loading configuration from {}", path.display());
        Config::parse(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            bail!("poll-interval must be longer than zero");
        }
        if self.render_interval.is_zero() {
            bail!("render-interval must be longer than zero");
        }
        if self.step_size > 100 {
            bail!("step-size can't be more than 100");
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            poll_interval: self.poll_interval,
            step_size: self.step_size,
            start_paused: self.start_paused,
        }
    }
}

fn default_path() -> Option<PathBuf> {
    let config_dir = env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(config_dir.join("brightsync").join("config.toml"))
}

fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let string = String::deserialize(deserializer)?;
    parse_duration(&string).map_err(serde::de::Error::custom)
}

/// Parses durations such as `500ms`, `10s` or `1m 30s`.
pub fn parse_duration(string: &str) -> Result<Duration> {
    let mut total = Duration::ZERO;
    for substr in string.split_ascii_whitespace() {
        total += if let Some(number) = substr.strip_suffix("ms") {
            Duration::from_millis(parse_duration_numeric(number)?)
        } else if let Some(number) = substr.strip_suffix('s') {
            Duration::from_secs(parse_duration_numeric(number)?)
        } else if let Some(number) = substr.strip_suffix('m') {
            Duration::from_secs(parse_duration_numeric(number)? * 60)
        } else if let Some(number) = substr.strip_suffix('h') {
            Duration::from_secs(parse_duration_numeric(number)? * 3600)
        } else {
            return Err(anyhow!(
                "syntax error in duration: Duration component {} doesn't have a unit",
                substr
            ));
        };
    }
    Ok(total)
}

fn parse_duration_numeric(component: &str) -> Result<u64> {
    component
        .parse()
        .context("syntax error in duration: numeric component couldn't be parsed")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration("54s").unwrap(), Duration::from_secs(54));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("32m").unwrap(), Duration::from_secs(32 * 60));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(3600 * 2));
        assert_eq!(parse_duration("2m 30s").unwrap(), Duration::from_secs(150));
        assert_eq!(
            parse_duration("1s 500ms").unwrap(),
            Duration::from_millis(1500)
        );
        assert!(parse_duration("5m6h").is_err());
        assert!(parse_duration("5mh").is_err());
        assert!(parse_duration("5m 6d").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.backend, Backend::Light);
        assert_eq!(config.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            backend = "ddcutil"
            device = "display:1"
            poll-interval = "2s"
            render-interval = "100ms"
            step-size = 5
            start-paused = true
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, Backend::Ddcutil);
        assert_eq!(config.device, "display:1");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.render_interval, Duration::from_millis(100));
        let engine_config = config.engine_config();
        assert_eq!(engine_config.step_size, 5);
        assert!(engine_config.start_paused);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::parse("backend = \"xrandr\"").is_err());
        assert!(Config::parse("poll-interval = \"0s\"").is_err());
        assert!(Config::parse("poll-interval = 10").is_err());
        assert!(Config::parse("step-size = 150").is_err());
        assert!(Config::parse("interval = \"1s\"").is_err());
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/brightsync.toml")))
            .await
            .is_err());
    }
}
