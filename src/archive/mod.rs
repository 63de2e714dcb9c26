//! Session archive
//!
//! Allocates one timestamped directory per capture run and writes the final
//! message log into it. Screenshots are written straight into
//! [`Session::screenshots_dir`] by the browser controller.

pub mod render;

pub use render::{escape_csv, render_csv, render_json, CSV_HEADER};

use crate::error::{CaptureError, Result};
use crate::model::{Message, OutputFormat, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

#[async_trait]
pub trait ArchiveWriter: Send + Sync {
    /// Create the session directory tree, including `screenshots/` and `attachments/`
    async fn create_session(&self, format: OutputFormat) -> Result<Session>;

    /// Write the full log, replacing any previous file. Returns its path.
    async fn save_log(&self, session: &Session, messages: &[Message]) -> Result<PathBuf>;
}

/// Archive rooted at a base output directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FileArchive {
    root: PathBuf,
}

impl FileArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// `capture-2024-05-01T10-00-00`
pub fn session_id_for(time: DateTime<Utc>) -> String {
    format!("capture-{}", time.format("%Y-%m-%dT%H-%M-%S"))
}

async fn create_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        CaptureError::Persistence(format!("Failed to create {}: {}", path.display(), e))
    })
}

#[async_trait]
impl ArchiveWriter for FileArchive {
    async fn create_session(&self, format: OutputFormat) -> Result<Session> {
        let start_time = Utc::now();
        let base_id = session_id_for(start_time);

        create_dir(&self.root).await?;

        // Two runs within the same second get distinct directories
        let mut id = base_id.clone();
        let mut suffix = 2;
        while tokio::fs::try_exists(self.root.join(&id))
            .await
            .unwrap_or(false)
        {
            id = format!("{}-{}", base_id, suffix);
            suffix += 1;
        }

        let session = Session {
            output_dir: self.root.join(&id),
            id,
            format,
            start_time,
        };

        create_dir(&session.screenshots_dir()).await?;
        create_dir(&session.attachments_dir()).await?;

        log::info!("Session {} at {}", session.id, session.output_dir.display());
        Ok(session)
    }

    async fn save_log(&self, session: &Session, messages: &[Message]) -> Result<PathBuf> {
        let content = match session.format {
            OutputFormat::Json => render_json(session.start_time, messages)?,
            OutputFormat::Csv => render_csv(messages),
        };

        let path = session.log_path();
        tokio::fs::write(&path, content).await.map_err(|e| {
            CaptureError::Persistence(format!("Failed to write {}: {}", path.display(), e))
        })?;

        log::info!("Log saved: {} messages -> {}", messages.len(), path.display());
        Ok(path)
    }
}
