//! Browser controller
//!
//! The engine talks to the browser only through [`PageDriver`] and obtains one
//! through a [`BrowserLauncher`], so the Chrome implementation can be swapped
//! for an in-process fake in tests.

pub mod chrome;
pub mod discovery;

pub use chrome::{ChromeDriver, ChromeLauncher, LaunchOptions};
pub use discovery::{candidate_paths, find_browser};

use crate::error::{CaptureError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// One remote-controlled page in a running browser
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Whether `selector` currently matches anything in the document
    async fn exists(&self, selector: &str) -> Result<bool>;

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Capture the viewport as PNG into `path`
    async fn screenshot_to_file(&self, path: &Path) -> Result<()>;

    async fn press_key(&self, key: &str) -> Result<()>;

    /// Click the first element matching `selector`. `Ok(false)` when absent.
    async fn click(&self, selector: &str) -> Result<bool>;

    /// Shut the browser down. Safe to call more than once; never fails.
    async fn close(&mut self);

    /// Poll every `interval` until any of `selectors` matches.
    ///
    /// Returns the selector that matched first, or `TargetNotFound` once
    /// `timeout` has elapsed.
    async fn wait_for_selector_any(
        &self,
        selectors: &[String],
        timeout: Duration,
        interval: Duration,
    ) -> Result<String> {
        let found = poll_until(timeout, interval, move || async move {
            for selector in selectors {
                match self.exists(selector).await {
                    Ok(true) => return Some(selector.clone()),
                    Ok(false) => {}
                    Err(e) => log::debug!("selector check '{}' failed: {}", selector, e),
                }
            }
            None
        })
        .await;

        found.ok_or_else(|| {
            CaptureError::TargetNotFound(format!(
                "none of [{}] appeared within {}s",
                selectors.join(", "),
                timeout.as_secs()
            ))
        })
    }
}

/// Starts a browser with a given profile directory and hands back its page
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, profile_dir: &Path) -> Result<Box<dyn PageDriver>>;
}

/// Evaluate `script` and deserialize its result
pub async fn evaluate_as<T: DeserializeOwned>(page: &dyn PageDriver, script: &str) -> Result<T> {
    let value = page.evaluate(script).await?;
    serde_json::from_value(value)
        .map_err(|e| CaptureError::Script(format!("Failed to deserialize result: {}", e)))
}

/// Run `check` until it yields a value or `timeout` elapses.
///
/// The check always runs at least once, and once more at the deadline.
pub async fn poll_until<F, Fut, T>(timeout: Duration, interval: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Option<T>> + Send,
    T: Send,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
