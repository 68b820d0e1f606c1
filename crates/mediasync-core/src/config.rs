use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::fetcher::CurlOptions;
use crate::layout::{AudioFormat, DEFAULT_FILENAME_FORMAT};

/// Upper bound on parallel downloads.
pub const MAX_CONCURRENCY: usize = 32;

/// Validated settings for one engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of workers, 1..=MAX_CONCURRENCY.
    pub concurrency: usize,
    /// Per-worker pause after a job that touched the network.
    pub pacing_delay: Duration,
    pub max_attempts: u32,
    pub retry_wait: Duration,
    pub force_overwrite: bool,
    /// Keep existing files whose size cannot be checked.
    pub skip_unverified: bool,
    pub extract_enabled: bool,
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            pacing_delay: Duration::from_secs(1),
            max_attempts: 5,
            retry_wait: Duration::from_secs(5),
            force_overwrite: false,
            skip_unverified: false,
            extract_enabled: false,
            dry_run: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Concurrency {
                got: self.concurrency,
                max: MAX_CONCURRENCY,
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::MaxAttempts);
        }
        Ok(())
    }
}

/// Transfer tuning (optional `[fetch]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    /// Abort a transfer that stays below this many bytes/s ...
    pub low_speed_limit: u32,
    /// ... for this many seconds.
    pub low_speed_time_secs: u64,
    /// Wall-clock cap per attempt in seconds (None = no cap).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Extra request headers, e.g. `Cookie = "session=..."`.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Receive speed cap in bytes per second (None = no cap).
    #[serde(default)]
    pub max_recv_speed: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let o = CurlOptions::default();
        Self {
            connect_timeout_secs: o.connect_timeout.as_secs(),
            low_speed_limit: o.low_speed_limit,
            low_speed_time_secs: o.low_speed_time.as_secs(),
            timeout_secs: None,
            user_agent: None,
            headers: BTreeMap::new(),
            max_recv_speed: None,
        }
    }
}

/// Global configuration loaded from `~/.config/mediasync/config.toml`.
/// Command-line flags override these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Collection root; the current directory when unset.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    pub filename_format: String,
    pub format: AudioFormat,
    pub parallel_downloads: usize,
    /// Pause in seconds after each download, per worker.
    pub wait_after_download_secs: f64,
    pub max_download_attempts: u32,
    pub retry_wait_secs: f64,
    #[serde(default)]
    pub extract: bool,
    #[serde(default)]
    pub skip_unverified: bool,
    /// Optional transfer tuning; if missing, built-in defaults are used.
    #[serde(default)]
    pub fetch: Option<FetchConfig>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            filename_format: DEFAULT_FILENAME_FORMAT.to_string(),
            format: AudioFormat::default(),
            parallel_downloads: 5,
            wait_after_download_secs: 1.0,
            max_download_attempts: 5,
            retry_wait_secs: 5.0,
            extract: false,
            skip_unverified: false,
            fetch: None,
        }
    }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::Seconds { field, value })
}

impl SyncConfig {
    /// Engine settings from this file, validated. Run-only switches (force,
    /// dry run) start off and are set by the caller.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let cfg = EngineConfig {
            concurrency: self.parallel_downloads,
            pacing_delay: seconds("wait_after_download_secs", self.wait_after_download_secs)?,
            max_attempts: self.max_download_attempts,
            retry_wait: seconds("retry_wait_secs", self.retry_wait_secs)?,
            force_overwrite: false,
            skip_unverified: self.skip_unverified,
            extract_enabled: self.extract,
            dry_run: false,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn curl_options(&self) -> CurlOptions {
        let mut o = CurlOptions::default();
        if let Some(f) = &self.fetch {
            o.connect_timeout = Duration::from_secs(f.connect_timeout_secs);
            o.low_speed_limit = f.low_speed_limit;
            o.low_speed_time = Duration::from_secs(f.low_speed_time_secs);
            o.timeout = f.timeout_secs.map(Duration::from_secs);
            o.user_agent = f.user_agent.clone();
            o.headers = f.headers.clone();
            o.max_recv_speed = f.max_recv_speed;
        }
        o
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mediasync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SyncConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SyncConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SyncConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.parallel_downloads, 5);
        assert_eq!(cfg.max_download_attempts, 5);
        assert_eq!(cfg.filename_format, "{artist}/{artist} - {title}");
        assert_eq!(cfg.format, AudioFormat::Mp3_320);
        let engine = cfg.engine_config().unwrap();
        assert_eq!(engine, EngineConfig::default());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = SyncConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SyncConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.parallel_downloads, cfg.parallel_downloads);
        assert_eq!(parsed.filename_format, cfg.filename_format);
        assert_eq!(parsed.format, cfg.format);
        assert!(parsed.fetch.is_none());
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            download_dir = "/srv/music"
            filename_format = "{artist} - {title}"
            format = "flac"
            parallel_downloads = 2
            wait_after_download_secs = 0.5
            max_download_attempts = 3
            retry_wait_secs = 10
            extract = true
        "#;
        let cfg: SyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.download_dir, Some(PathBuf::from("/srv/music")));
        assert_eq!(cfg.format, AudioFormat::Flac);
        let engine = cfg.engine_config().unwrap();
        assert_eq!(engine.concurrency, 2);
        assert_eq!(engine.pacing_delay, Duration::from_millis(500));
        assert_eq!(engine.max_attempts, 3);
        assert_eq!(engine.retry_wait, Duration::from_secs(10));
        assert!(engine.extract_enabled);
        assert!(!engine.skip_unverified);
    }

    #[test]
    fn config_toml_fetch_section() {
        let toml = r#"
            filename_format = "{title}"
            format = "mp3-v0"
            parallel_downloads = 5
            wait_after_download_secs = 1
            max_download_attempts = 5
            retry_wait_secs = 5

            [fetch]
            connect_timeout_secs = 10
            low_speed_limit = 512
            low_speed_time_secs = 30
            timeout_secs = 7200
            user_agent = "mediasync/0.1"
            max_recv_speed = 1_000_000

            [fetch.headers]
            Cookie = "identity=abc"
        "#;
        let cfg: SyncConfig = toml::from_str(toml).unwrap();
        let o = cfg.curl_options();
        assert_eq!(o.connect_timeout, Duration::from_secs(10));
        assert_eq!(o.low_speed_limit, 512);
        assert_eq!(o.user_agent.as_deref(), Some("mediasync/0.1"));
        assert_eq!(o.headers.get("Cookie").unwrap(), "identity=abc");
        assert_eq!(o.max_recv_speed, Some(1_000_000));
        assert_eq!(o.timeout, Some(Duration::from_secs(7200)));
    }

    #[test]
    fn no_wall_clock_cap_unless_configured() {
        assert_eq!(SyncConfig::default().curl_options().timeout, None);
        let cfg = SyncConfig {
            fetch: Some(FetchConfig::default()),
            ..SyncConfig::default()
        };
        assert_eq!(cfg.curl_options().timeout, None);
    }

    #[test]
    fn engine_config_bounds() {
        for bad in [0, MAX_CONCURRENCY + 1] {
            let cfg = EngineConfig {
                concurrency: bad,
                ..EngineConfig::default()
            };
            assert_eq!(
                cfg.validate(),
                Err(ConfigError::Concurrency {
                    got: bad,
                    max: MAX_CONCURRENCY
                })
            );
        }
        let cfg = EngineConfig {
            concurrency: MAX_CONCURRENCY,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_ok());
        let cfg = EngineConfig {
            max_attempts: 0,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::MaxAttempts));
    }

    #[test]
    fn negative_seconds_rejected() {
        let cfg = SyncConfig {
            retry_wait_secs: -1.0,
            ..SyncConfig::default()
        };
        assert!(matches!(
            cfg.engine_config(),
            Err(ConfigError::Seconds {
                field: "retry_wait_secs",
                ..
            })
        ));
    }
}
