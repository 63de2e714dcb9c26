//! Attachment resolution
//!
//! Downloads each distinct attachment URL once, under a collision-free local
//! filename. Failures are per-URL: a URL that cannot be fetched is simply
//! absent from the returned mapping.

use crate::error::{CaptureError, Result};
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Progress callback: `(completed, total)` after every successful download
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

#[async_trait]
pub trait AttachmentResolver: Send + Sync {
    /// Fetch `urls` into `dest_dir`, returning URL → written file path
    async fn resolve(
        &self,
        urls: &[String],
        dest_dir: &Path,
        on_progress: ProgressFn<'_>,
    ) -> HashMap<String, PathBuf>;
}

const DEFAULT_FILENAME: &str = "attachment";

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Last path segment of `url`, percent-decoded and sanitized.
///
/// URLs without a path (`data:`, `mailto:`) or that fail to parse get the
/// default name.
pub fn filename_from_url(url: &str) -> String {
    let segment = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
    });

    match segment {
        Some(segment) => sanitize(&segment),
        None => DEFAULT_FILENAME.to_string(),
    }
}

/// Hands out unique filenames within one run.
///
/// A repeated name gets `-2`, `-3`, … inserted before its extension. Names
/// compare case-insensitively.
#[derive(Debug, Default)]
pub struct FilenameAllocator {
    taken: HashSet<String>,
}

impl FilenameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_lowercase()) {
            return name.to_string();
        }

        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (name, None),
        };

        let mut n = 2;
        loop {
            let candidate = match ext {
                Some(ext) => format!("{}-{}.{}", stem, n, ext),
                None => format!("{}-{}", stem, n),
            };
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Assign a filename to every URL up front, in input order
pub fn plan_filenames(urls: &[String]) -> Vec<(String, String)> {
    let mut allocator = FilenameAllocator::new();
    urls.iter()
        .map(|url| (url.clone(), allocator.allocate(&filename_from_url(url))))
        .collect()
}

/// Sequential HTTP downloader
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
}

impl HttpResolver {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CaptureError::Other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let fetch_error = |reason: String| CaptureError::AttachmentFetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn download(&self, url: &str, path: &Path) -> Result<()> {
        let bytes = self.fetch(url).await?;
        tokio::fs::write(path, &bytes).await.map_err(|e| {
            CaptureError::Persistence(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl AttachmentResolver for HttpResolver {
    async fn resolve(
        &self,
        urls: &[String],
        dest_dir: &Path,
        on_progress: ProgressFn<'_>,
    ) -> HashMap<String, PathBuf> {
        let plan = plan_filenames(urls);
        let total = plan.len();
        let mut resolved = HashMap::new();

        if let Err(e) = tokio::fs::create_dir_all(dest_dir).await {
            log::error!("Cannot create {}: {}", dest_dir.display(), e);
            return resolved;
        }

        for (url, filename) in plan {
            let path = dest_dir.join(&filename);
            match self.download(&url, &path).await {
                Ok(()) => {}
                Err(e) if !e.is_fatal() => {
                    log::warn!("Skipping attachment: {}", e);
                    continue;
                }
                Err(e) => {
                    log::error!("Stopping attachment downloads: {}", e);
                    break;
                }
            }

            log::debug!("Attachment {} -> {}", url, filename);
            resolved.insert(url, path);
            on_progress(resolved.len(), total);
        }

        resolved
    }
}
