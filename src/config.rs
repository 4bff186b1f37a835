use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::account::DEFAULT_PERIOD;

/// Selects the key when more than one is plugged in.
pub const DEVICE_ENV: &str = "YUBIKEY_SERIAL_NUMBER";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub ykman: String,
    pub device: Option<String>,
    pub period: u64,
    pub notice_secs: u64,
    pub touch_pending_secs: u64,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ykman: "ykman".to_string(),
            device: None,
            period: DEFAULT_PERIOD,
            notice_secs: 3,
            touch_pending_secs: 30,
            log_file: None,
        }
    }
}

impl Config {
    /// Read the config file; a missing file means defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let mut cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("invalid config file {}", path.display()))?;

        if cfg.period == 0 {
            cfg.period = DEFAULT_PERIOD;
        }
        Ok(cfg)
    }

    /// Device from the command line, then the environment, then the file.
    pub fn resolve_device(&mut self, cli: Option<String>, env: Option<String>) {
        let pick = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        if let Some(device) = pick(cli).or_else(|| pick(env)) {
            self.device = Some(device);
        }
    }

    pub fn notice(&self) -> Duration {
        Duration::from_secs(self.notice_secs)
    }

    pub fn touch_pending(&self) -> Duration {
        Duration::from_secs(self.touch_pending_secs)
    }

    pub fn log_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.log_file {
            return Ok(path.clone());
        }
        let mut dir = dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("cannot get cache dir"))?;
        dir.push("otpdash");
        Ok(dir.join("otpdash.log"))
    }
}

pub fn config_path() -> anyhow::Result<PathBuf> {
    let mut dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("cannot get config dir"))?;
    dir.push("otpdash");
    Ok(dir.join("config.json"))
}

pub fn save_config(cfg: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let s = serde_json::to_string_pretty(cfg)?;
    std::fs::write(path, s)?;
    Ok(())
}
