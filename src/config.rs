use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::GlobalArgs;
use crate::controller::DEFAULT_SAVE_DELAY;
use crate::error::BetterPromptError;
use crate::notify::DEFAULT_NOTIFICATION_DURATION;

// Precedence: CLI > env > file > defaults.

const ENV_PREFIX: &str = "BETTERPROMPT_";
const APP_DIR: &str = "betterprompt";
const SETTINGS_FILE: &str = "settings.json";
const FALLBACK_SETTINGS_DIR: &str = ".betterprompt";

/// Resolved application configuration.
///
/// This is how the program runs, not what the user picked in the form; the
/// latter lives in [`crate::settings::Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// JSON file holding the persisted settings.
    pub settings_path: PathBuf,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    /// Overall timeout for one rewrite request. `None` (or 0) leaves the
    /// transport default, which never times out.
    pub request_timeout_sec: Option<u64>,
    pub save_delay_ms: u64,
    pub notification_ms: u64,
}

impl AppConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_sec
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn save_delay(&self) -> Duration {
        Duration::from_millis(self.save_delay_ms)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }
}

/// TOML-deserializable config file representation. All fields optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    settings_path: Option<PathBuf>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    request_timeout_sec: Option<u64>,
    save_delay_ms: Option<u64>,
    notification_ms: Option<u64>,
}

/// Intermediate layer where every field is optional, used to merge sources.
#[derive(Debug, Default)]
struct ConfigLayer {
    settings_path: Option<PathBuf>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    request_timeout_sec: Option<u64>,
    save_delay_ms: Option<u64>,
    notification_ms: Option<u64>,
}

impl AppConfig {
    /// Load configuration with precedence: CLI > env > file > defaults.
    ///
    /// The config file is `--config` when given; otherwise no file is read.
    pub fn load(args: &GlobalArgs) -> anyhow::Result<Self> {
        Self::load_with_env(args, real_env_var)
    }

    /// Internal constructor that accepts an env-var lookup function,
    /// enabling deterministic testing without process-global mutation.
    fn load_with_env(
        args: &GlobalArgs,
        env_fn: fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let file_layer = match args.config.as_deref() {
            Some(path) => load_file_layer(path)?,
            None => ConfigLayer::default(),
        };
        let env_layer = load_env_layer(env_fn)?;
        let cli_layer = cli_layer_from(args);

        let merged = merge_layers(file_layer, env_layer, cli_layer);

        Ok(AppConfig {
            settings_path: merged
                .settings_path
                .unwrap_or_else(default_settings_path),
            log_level: merged.log_level,
            log_file: merged.log_file,
            request_timeout_sec: merged.request_timeout_sec,
            save_delay_ms: merged
                .save_delay_ms
                .unwrap_or(DEFAULT_SAVE_DELAY.as_millis() as u64),
            notification_ms: merged
                .notification_ms
                .unwrap_or(DEFAULT_NOTIFICATION_DURATION.as_millis() as u64),
        })
    }
}

/// `<config dir>/betterprompt/settings.json`, or `.betterprompt/settings.json`
/// when the platform has no config directory.
pub fn default_settings_path() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join(APP_DIR).join(SETTINGS_FILE),
        None => PathBuf::from(FALLBACK_SETTINGS_DIR).join(SETTINGS_FILE),
    }
}

fn load_file_layer(path: &Path) -> anyhow::Result<ConfigLayer> {
    let contents = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
    let fc: FileConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;
    Ok(ConfigLayer {
        settings_path: fc.settings_path,
        log_level: fc.log_level,
        log_file: fc.log_file,
        request_timeout_sec: fc.request_timeout_sec,
        save_delay_ms: fc.save_delay_ms,
        notification_ms: fc.notification_ms,
    })
}

fn real_env_var(suffix: &str) -> Option<String> {
    let key = format!("{ENV_PREFIX}{suffix}");
    env::var(&key).ok().filter(|v| !v.is_empty())
}

fn load_env_layer(env_fn: fn(&str) -> Option<String>) -> Result<ConfigLayer, BetterPromptError> {
    Ok(ConfigLayer {
        settings_path: env_fn("SETTINGS_PATH").map(PathBuf::from),
        log_level: env_fn("LOG_LEVEL"),
        log_file: env_fn("LOG_FILE").map(PathBuf::from),
        request_timeout_sec: parse_env_u64(env_fn, "REQUEST_TIMEOUT_SEC")?,
        save_delay_ms: parse_env_u64(env_fn, "SAVE_DELAY_MS")?,
        notification_ms: parse_env_u64(env_fn, "NOTIFICATION_MS")?,
    })
}

fn parse_env_u64(
    env_fn: fn(&str) -> Option<String>,
    suffix: &str,
) -> Result<Option<u64>, BetterPromptError> {
    match env_fn(suffix) {
        Some(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| BetterPromptError::ConfigEnvParseError {
                var: format!("{ENV_PREFIX}{suffix}"),
                detail: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn cli_layer_from(args: &GlobalArgs) -> ConfigLayer {
    ConfigLayer {
        settings_path: args.settings_file.clone(),
        log_level: args.log_level.clone(),
        log_file: args.log_file.clone(),
        request_timeout_sec: args.timeout_sec,
        save_delay_ms: None,
        notification_ms: None,
    }
}

/// Merge three layers. For each field, pick CLI first, then env, then file.
fn merge_layers(file: ConfigLayer, env: ConfigLayer, cli: ConfigLayer) -> ConfigLayer {
    ConfigLayer {
        settings_path: cli
            .settings_path
            .or(env.settings_path)
            .or(file.settings_path),
        log_level: cli.log_level.or(env.log_level).or(file.log_level),
        log_file: cli.log_file.or(env.log_file).or(file.log_file),
        request_timeout_sec: cli
            .request_timeout_sec
            .or(env.request_timeout_sec)
            .or(file.request_timeout_sec),
        save_delay_ms: cli
            .save_delay_ms
            .or(env.save_delay_ms)
            .or(file.save_delay_ms),
        notification_ms: cli
            .notification_ms
            .or(env.notification_ms)
            .or(file.notification_ms),
    }
}
