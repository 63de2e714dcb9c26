//! Capture data model
//!
//! Plain data shared by the extractor, the ledger, the archive writer and the
//! engine. Field names serialize in the camelCase shape of the message log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A remote attachment referenced by a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,

    /// Path relative to the session directory, set after the resolution phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file: Option<String>,
}

impl Attachment {
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            local_file: None,
        }
    }

    /// The reference written to flat logs: the local copy when one exists
    pub fn reference(&self) -> &str {
        self.local_file.as_deref().unwrap_or(&self.url)
    }
}

/// One captured chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Deduplication key
    pub id: String,
    pub author: String,
    /// ISO-8601 when the UI exposes it, otherwise the displayed text
    pub timestamp: String,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub embeds: Vec<String>,
}

/// Scroll metadata read from the live page once per harvest step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollState {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub msg_count: usize,
    pub is_beginning: bool,
}

/// Serialization format of the final message log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    pub fn log_file_name(self) -> &'static str {
        match self {
            OutputFormat::Json => "messages.json",
            OutputFormat::Csv => "messages.csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Csv => f.write_str("csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format '{}' (expected json or csv)", other)),
        }
    }
}

/// One capture run's output location. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub start_time: DateTime<Utc>,
}

impl Session {
    pub fn screenshots_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.output_dir.join("attachments")
    }

    /// `screenshots/screenshot-0001.png` for index 1
    pub fn screenshot_path(&self, index: usize) -> PathBuf {
        self.screenshots_dir()
            .join(format!("screenshot-{:04}.png", index))
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(self.format.log_file_name())
    }
}
