//! Capture configuration
//!
//! Loaded from a JSON file whose fields all default, so a partial file only
//! overrides what it names.

use crate::error::{CaptureError, Result};
use crate::extract::{ChatLayout, FallbackIdPolicy};
use crate::model::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TARGET_URL: &str = "https://discord.com/app";

fn app_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Dispatch")
}

/// Default location of the settings file
pub fn default_config_path() -> PathBuf {
    app_dir().join("config.json")
}

/// Fixed waits and bounds used by setup and the harvest loop, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timings {
    pub navigation_timeout_ms: u64,
    pub target_timeout_ms: u64,
    pub target_poll_ms: u64,
    pub content_timeout_ms: u64,
    pub content_poll_ms: u64,
    /// Wait for images and embeds before the first capture
    pub render_settle_ms: u64,
    /// Wait after every PageUp
    pub scroll_settle_ms: u64,
    pub attachment_timeout_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 60_000,
            target_timeout_ms: 300_000,
            target_poll_ms: 2_000,
            content_timeout_ms: 30_000,
            content_poll_ms: 250,
            render_settle_ms: 3_000,
            scroll_settle_ms: 500,
            attachment_timeout_ms: 60_000,
        }
    }
}

impl Timings {
    /// All waits collapsed to zero and bounds to a few milliseconds
    pub fn immediate() -> Self {
        Self {
            navigation_timeout_ms: 50,
            target_timeout_ms: 50,
            target_poll_ms: 1,
            content_timeout_ms: 10,
            content_poll_ms: 1,
            render_settle_ms: 0,
            scroll_settle_ms: 0,
            attachment_timeout_ms: 1_000,
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
    pub fn target_timeout(&self) -> Duration {
        Duration::from_millis(self.target_timeout_ms)
    }
    pub fn target_poll(&self) -> Duration {
        Duration::from_millis(self.target_poll_ms)
    }
    pub fn content_timeout(&self) -> Duration {
        Duration::from_millis(self.content_timeout_ms)
    }
    pub fn content_poll(&self) -> Duration {
        Duration::from_millis(self.content_poll_ms)
    }
    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }
    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
    pub fn attachment_timeout(&self) -> Duration {
        Duration::from_millis(self.attachment_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    pub format: OutputFormat,
    /// Base directory; each run gets its own session directory below it
    pub output_dir: PathBuf,
    /// Browser profile kept between runs so the login survives
    pub profile_dir: PathBuf,
    pub target_url: String,
    pub browser_path: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub fallback_ids: FallbackIdPolicy,
    pub layout: ChatLayout,
    pub timings: Timings,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let base = app_dir();
        Self {
            format: OutputFormat::Json,
            output_dir: base.join("captures"),
            profile_dir: base.join("discord-profile"),
            target_url: DEFAULT_TARGET_URL.to_string(),
            browser_path: None,
            headless: false,
            no_sandbox: false,
            window_width: 1400,
            window_height: 900,
            fallback_ids: FallbackIdPolicy::Synthesize,
            layout: ChatLayout::default(),
            timings: Timings::default(),
        }
    }
}

impl CaptureConfig {
    /// Read settings from `path`, falling back to defaults.
    ///
    /// A missing file is normal on first run. An unreadable or malformed file
    /// is logged and ignored.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("Failed to load config: {}", e);
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::Config(format!("{}: {}", path.display(), e)))?;
        let config = serde_json::from_str(&raw)
            .map_err(|e| CaptureError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Some(config))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CaptureError::Config(format!("{}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| CaptureError::Config(format!("{}: {}", path.display(), e)))?;
        log::info!("Saved config to {}", path.display());
        Ok(())
    }
}
