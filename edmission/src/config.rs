//! Persistent application configuration.
//!
//! Stored as JSON in a platform-appropriate config directory. A handful of
//! fields can be overridden from the environment for unattended runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use data::Category;
use serde::{Deserialize, Serialize};

use crate::runner::RunnerSettings;

/// On-disk configuration for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Substring of the game window title (or app name) to capture.
    pub window_title: String,

    /// Stop once this many missions are accepted.
    pub max_missions: u32,

    /// Minutes from the start of one sweep to the start of the next.
    pub poll_interval_minutes: u64,

    /// Later sweeps start when the UTC minute plus this offset is a multiple
    /// of `poll_interval_minutes`. Unset polls a full interval after the
    /// previous sweep started.
    pub poll_offset_minutes: Option<u64>,

    /// Wait before retrying a failed capture.
    pub retry_backoff_secs: f32,

    /// Wait after opening a category for the list to render.
    pub settle_delay_secs: f32,

    /// Base delay between key presses; a random jitter is added on top.
    pub input_interval_secs: f32,

    /// Match and report without pressing accept.
    pub dry_run: bool,

    /// Ask for missing values on stdin before a run.
    pub interactive: bool,

    /// Re-read the board after an accept moves the cards.
    pub rescan_after_accept: bool,

    /// Safety limit on how far down a list is walked.
    pub max_rows: usize,

    /// Categories to sweep, in order. Empty means the ones the rules name.
    pub categories: Vec<Category>,

    pub discord_webhook_url: Option<String>,

    /// JSON rule file. The built-in rules are used when unset.
    pub rules_path: Option<PathBuf>,

    /// Directory containing the PaddleOCR models.
    pub ocr_models: PathBuf,

    /// Reference image of the wing mission icon.
    pub wing_icon: Option<PathBuf>,

    /// Save each capture to the working directory.
    pub debug_ocr: bool,

    /// UI colors. The default is the stock orange HUD.
    pub theme: ie::Theme,

    pub thresholds: ie::Thresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_title: "Elite - Dangerous".to_string(),
            max_missions: 20,
            poll_interval_minutes: 10,
            poll_offset_minutes: Some(5),
            retry_backoff_secs: 2.0,
            settle_delay_secs: 5.0,
            input_interval_secs: 0.3,
            dry_run: false,
            interactive: true,
            rescan_after_accept: true,
            max_rows: 40,
            categories: Vec::new(),
            discord_webhook_url: None,
            rules_path: None,
            ocr_models: PathBuf::from("ocr"),
            wing_icon: Some(PathBuf::from("ocr/wing_icon.png")),
            debug_ocr: false,
            theme: ie::Theme::ELITE,
            thresholds: ie::Thresholds::default(),
        }
    }
}

impl Config {
    /// Path to the config file.
    pub fn path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("config_dir() unavailable")?;
        Ok(base.join("edmission.json"))
    }

    /// Where `rules import` puts rules when no rule file is configured yet.
    pub fn default_rules_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("config_dir() unavailable")?;
        Ok(base.join("edmission-rules.json"))
    }

    /// Load configuration from disk. A missing file yields the defaults; a
    /// file that cannot be read or parsed is an error.
    pub fn try_load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        let cfg = serde_json::from_str(&json).with_context(|| format!("parse {:?}", path))?;
        Ok(cfg)
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, json).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }

    /// Apply `ED_*` and `DISCORD_WEBHOOK_URL` overrides from the process
    /// environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = var("ED_MAX_MISSIONS") {
            self.max_missions = v.trim().parse().with_context(|| format!("ED_MAX_MISSIONS={v:?}"))?;
        }
        if let Some(v) = var("ED_POLL_INTERVAL") {
            self.poll_interval_minutes = v.trim().parse().with_context(|| format!("ED_POLL_INTERVAL={v:?}"))?;
        }
        if let Some(v) = var("ED_POLL_OFFSET") {
            let v = v.trim();
            self.poll_offset_minutes = match v {
                "" | "off" | "none" => None,
                v => Some(v.parse().with_context(|| format!("ED_POLL_OFFSET={v:?}"))?),
            };
        }
        if let Some(v) = var("ED_DRY_RUN") {
            self.dry_run = parse_flag(&v).with_context(|| format!("ED_DRY_RUN={v:?}"))?;
        }
        if let Some(v) = var("ED_INTERACTIVE") {
            self.interactive = parse_flag(&v).with_context(|| format!("ED_INTERACTIVE={v:?}"))?;
        }
        if let Some(v) = var("ED_DEBUG_OCR") {
            self.debug_ocr = parse_flag(&v).with_context(|| format!("ED_DEBUG_OCR={v:?}"))?;
        }
        if let Some(v) = var("DISCORD_WEBHOOK_URL") {
            let v = v.trim();
            self.discord_webhook_url = (!v.is_empty()).then(|| v.to_string());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_missions > 0, "max_missions must be positive");
        ensure!(self.poll_interval_minutes > 0, "poll_interval_minutes must be positive");
        ensure!(self.max_rows > 0, "max_rows must be positive");
        for (name, secs) in [
            ("retry_backoff_secs", self.retry_backoff_secs),
            ("settle_delay_secs", self.settle_delay_secs),
            ("input_interval_secs", self.input_interval_secs),
        ] {
            ensure!(secs.is_finite() && secs >= 0.0, "{name} must be a non-negative number");
        }
        Ok(())
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            cap: self.max_missions,
            poll_interval: minutes(self.poll_interval_minutes),
            poll_offset: self.poll_offset_minutes.map(minutes),
            categories: self.categories.clone(),
            dry_run: self.dry_run,
            rescan_after_accept: self.rescan_after_accept,
            retry_backoff: secs(self.retry_backoff_secs),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        secs(self.settle_delay_secs)
    }

    pub fn input_interval(&self) -> Duration {
        secs(self.input_interval_secs)
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}

fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or_default()
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("not a boolean: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        let settings = cfg.runner_settings();
        assert_eq!(settings.cap, 20);
        assert_eq!(settings.poll_interval, Duration::from_secs(600));
        assert_eq!(settings.poll_offset, Some(Duration::from_secs(300)));
        assert!(settings.rescan_after_accept);
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ED_MAX_MISSIONS", "5"),
            ("ED_POLL_INTERVAL", " 3 "),
            ("ED_POLL_OFFSET", "2"),
            ("ED_DRY_RUN", "yes"),
            ("ED_INTERACTIVE", "0"),
            ("DISCORD_WEBHOOK_URL", "https://discord.example/hook"),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::default();
        cfg.apply_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.max_missions, 5);
        assert_eq!(cfg.poll_interval_minutes, 3);
        assert_eq!(cfg.poll_offset_minutes, Some(2));
        assert!(cfg.dry_run);
        assert!(!cfg.interactive);
        assert!(!cfg.debug_ocr);
        assert_eq!(cfg.discord_webhook_url.as_deref(), Some("https://discord.example/hook"));
    }

    #[test]
    fn bad_env_value_is_an_error() {
        let mut cfg = Config::default();
        assert!(cfg.apply_vars(|k| (k == "ED_MAX_MISSIONS").then(|| "lots".to_string())).is_err());
        assert!(cfg.apply_vars(|k| (k == "ED_DRY_RUN").then(|| "maybe".to_string())).is_err());
        assert!(cfg.apply_vars(|k| (k == "ED_POLL_OFFSET").then(|| "-5".to_string())).is_err());
    }

    #[test]
    fn poll_offset_can_be_switched_off() {
        let mut cfg = Config::default();
        cfg.apply_vars(|k| (k == "ED_POLL_OFFSET").then(|| "off".to_string())).unwrap();
        assert_eq!(cfg.poll_offset_minutes, None);
        assert_eq!(cfg.runner_settings().poll_offset, None);
    }

    #[test]
    fn huge_interval_does_not_overflow() {
        let cfg = Config { poll_interval_minutes: u64::MAX, poll_offset_minutes: Some(u64::MAX), ..Default::default() };
        cfg.validate().unwrap();
        let settings = cfg.runner_settings();
        assert_eq!(settings.poll_interval, Duration::from_secs(u64::MAX));
        assert_eq!(settings.poll_offset, Some(Duration::from_secs(u64::MAX)));
    }

    #[test]
    fn zero_cap_or_interval_is_rejected() {
        let cfg = Config { max_missions: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = Config { poll_interval_minutes: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = Config { settle_delay_secs: -1.0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edmission.json");
        let cfg = Config {
            categories: vec![Category::Transport, Category::Combat],
            rules_path: Some(dir.path().join("rules.json")),
            ..Default::default()
        };
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edmission.json");
        fs::write(&path, r#"{"max_missions": 7, "categories": ["transport"]}"#).unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.max_missions, 7);
        assert_eq!(cfg.categories, [Category::Transport]);
        assert_eq!(cfg.poll_interval_minutes, 10);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edmission.json");
        fs::write(&path, r#"{"max_missions": "#).unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parse"), "{err:#}");
    }

    #[test]
    fn missing_file_is_the_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load_from(&dir.path().join("absent.json")).unwrap(), Config::default());
    }
}
