use crate::{error::PlannerError, utils};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Diagnostic log file; stderr when unset.
    pub logfile: Option<String>,
    pub log_level: String,
    /// Append-only event journal replayed on startup.
    pub journal: String,
    /// City used for weather and infection data, or `"auto"`.
    pub city_name: String,
    pub api_keys: ApiKeys,
    pub news: NewsConfig,
    pub updates: UpdatesConfig,
    pub server: ServerConfig,
    /// Seconds between two background checks for due alarms.
    pub tick_secs: u64,
    pub tts: TtsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logfile: None,
            log_level: "info".to_string(),
            journal: "~/.local/share/covid-planner/journal.log".to_string(),
            city_name: "auto".to_string(),
            api_keys: ApiKeys::default(),
            news: NewsConfig::default(),
            updates: UpdatesConfig::default(),
            server: ServerConfig::default(),
            tick_secs: 30,
            tts: TtsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub weatherapi: String,
    pub newsapi: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub queries: Vec<String>,
    pub country: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            queries: vec!["covid".to_string()],
            country: "gb".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatesConfig {
    pub update_type: String,
    /// Duration string, e.g. `"15m"`; only read in `interval` mode.
    pub interval: Option<String>,
    pub debug_paths: DebugPaths,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugPaths {
    pub covid: String,
    pub weather: String,
    pub news: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Speech command run once per briefing line. Empty disables speech.
    pub command: String,
    pub args: Vec<String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            command: "espeak".to_string(),
            args: Vec::new(),
        }
    }
}

/// When upstream data gets refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Every time the page is loaded.
    PageReload,
    /// Right before an alarm briefing.
    OnAlarm,
    /// On a fixed wall-clock interval.
    Interval(Duration),
    /// Never; local fixtures are loaded once.
    Debug,
}

impl UpdatesConfig {
    pub fn mode(&self) -> Result<UpdateMode, PlannerError> {
        let mode = match self.update_type.as_str() {
            "page_reload" => UpdateMode::PageReload,
            "on_alarm" => UpdateMode::OnAlarm,
            "debug" => UpdateMode::Debug,
            "interval" => {
                let raw = self.interval.as_deref().ok_or_else(|| {
                    PlannerError::Config("interval mode needs updates.interval".to_string())
                })?;
                let secs = utils::get_seconds(raw)?;
                if secs == 0 {
                    return Err(PlannerError::Config(format!(
                        "update interval {raw:?} must be positive"
                    )));
                }
                UpdateMode::Interval(Duration::from_secs(secs))
            }
            other => {
                warn!("invalid or no update type {other:?} given, defaulting to on_alarm");
                UpdateMode::OnAlarm
            }
        };
        Ok(mode)
    }
}

impl Config {
    pub fn open(config_path: &Path) -> Result<Self, PlannerError> {
        let content = fs::read_to_string(config_path).map_err(|e| {
            PlannerError::Config(format!(
                "error while reading {}: {e}",
                config_path.display()
            ))
        })?;

        let config: Config = serde_json::from_str(&content).map_err(|e| {
            PlannerError::Config(format!(
                "error while parsing {}: {e}",
                config_path.display()
            ))
        })?;

        Ok(config)
    }
}

pub fn generate_config(path: &PathBuf) -> std::io::Result<()> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let ex_config = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/access/example_config.json"
        ));
        fs::write(path, ex_config)?;
    }

    Ok(())
}
