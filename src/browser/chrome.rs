// spider_chrome re-exports chromiumoxide API
use super::{BrowserLauncher, PageDriver};
use crate::error::{CaptureError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::{EventLoadEventFired, NavigateParams};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;

/// How to start the browser process
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: PathBuf,
    /// Persistent profile so the logged-in session survives between runs
    pub profile_dir: PathBuf,
    pub headless: bool,
    pub no_sandbox: bool,
    pub window_size: (u32, u32),
}

/// A launched Chromium-family browser driven over CDP
pub struct ChromeDriver {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    closed: bool,
}

impl ChromeDriver {
    /// Launch the browser and spawn the CDP handler loop
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        std::fs::create_dir_all(&options.profile_dir).map_err(|e| {
            CaptureError::LaunchFailed(format!(
                "Failed to create profile directory {}: {}",
                options.profile_dir.display(),
                e
            ))
        })?;

        let mut config = if options.headless {
            BrowserConfig::builder()
        } else {
            BrowserConfig::builder().with_head()
        };

        config = config
            .chrome_executable(&options.executable)
            .user_data_dir(&options.profile_dir)
            .viewport(None::<Viewport>)
            .arg(format!(
                "--window-size={},{}",
                options.window_size.0, options.window_size.1
            ))
            .arg("--disable-blink-features=AutomationControlled");

        // Linux AppArmor workaround
        if options.no_sandbox {
            config = config.arg("--no-sandbox");
        }

        let config = config
            .build()
            .map_err(|e| CaptureError::LaunchFailed(format!("Invalid browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            CaptureError::LaunchFailed(format!("{} ({})", e, options.executable.display()))
        })?;

        let handler_task = tokio::spawn(async move {
            while (handler.next().await).is_some() {
                // Drive browser events
            }
        });

        log::info!("Browser launched: {}", options.executable.display());

        Ok(Self {
            browser,
            handler_task: Some(handler_task),
            closed: false,
        })
    }

    /// Current page, skipping chrome:// pages restored from the profile
    async fn active_page(&self) -> Result<Page> {
        if self.closed {
            return Err(CaptureError::NotReady("browser is closed".to_string()));
        }

        let pages = self.browser.pages().await?;

        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if !url.starts_with("chrome://") {
                    return Ok(page.clone());
                }
            }
        }

        if let Some(page) = pages.first() {
            return Ok(page.clone());
        }

        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| CaptureError::Other(format!("Failed to create page: {}", e)))
    }

    async fn navigate_inner(&self, url: &str) -> Result<()> {
        let page = self.active_page().await?;

        let mut load_events = page.event_listener::<EventLoadEventFired>().await?;

        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| CaptureError::NavigationFailed(format!("Invalid URL {}: {}", url, e)))?;

        let response = page.execute(params).await.map_err(|e| {
            let error_str = e.to_string();
            // "oneshot canceled" means the CDP connection is gone
            if error_str.contains("oneshot canceled") {
                CaptureError::NavigationFailed(
                    "Browser connection lost. The browser may have been closed or crashed."
                        .to_string(),
                )
            } else {
                CaptureError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e))
            }
        })?;

        if let Some(error_text) = &response.result.error_text {
            return Err(CaptureError::NavigationFailed(format!(
                "Navigation error: {}",
                error_text
            )));
        }

        load_events.next().await;
        Ok(())
    }
}

/// CDP key name, code and Windows virtual key code for keys the capture uses
fn key_definition(key: &str) -> Option<(&'static str, i64)> {
    match key {
        "PageUp" => Some(("PageUp", 33)),
        "PageDown" => Some(("PageDown", 34)),
        "End" => Some(("End", 35)),
        "Home" => Some(("Home", 36)),
        "Enter" => Some(("Enter", 13)),
        "Escape" => Some(("Escape", 27)),
        _ => None,
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        log::info!("Navigating to {}", url);
        match tokio::time::timeout(timeout, self.navigate_inner(url)).await {
            Ok(result) => result,
            Err(_) => Err(CaptureError::NavigationTimeout(format!(
                "{} did not finish loading within {}s",
                url,
                timeout.as_secs()
            ))),
        }
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| CaptureError::Script(e.to_string()))?;
        let value = self
            .evaluate(&format!("document.querySelector({}) !== null", quoted))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let page = self.active_page().await?;

        let result = page
            .evaluate(script)
            .await
            .map_err(|e| CaptureError::Script(format!("Script execution failed: {}", e)))?;

        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot_to_file(&self, path: &Path) -> Result<()> {
        let page = self.active_page().await?;

        let data = page
            .screenshot(ScreenshotParams::default())
            .await
            .map_err(|e| CaptureError::Screenshot(format!("Failed to take screenshot: {}", e)))?;

        tokio::fs::write(path, data).await.map_err(|e| {
            CaptureError::Screenshot(format!("Failed to write {}: {}", path.display(), e))
        })?;

        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        let page = self.active_page().await?;
        let (code, vk) = key_definition(key)
            .ok_or_else(|| CaptureError::Other(format!("Unsupported key: {}", key)))?;

        let down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::RawKeyDown)
            .key(key)
            .code(code)
            .windows_virtual_key_code(vk)
            .native_virtual_key_code(vk)
            .build()
            .map_err(CaptureError::Other)?;
        page.execute(down).await?;

        let up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key(key)
            .code(code)
            .windows_virtual_key_code(vk)
            .native_virtual_key_code(vk)
            .build()
            .map_err(CaptureError::Other)?;
        page.execute(up).await?;

        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let page = self.active_page().await?;
        let element = match page.find_element(selector).await {
            Ok(element) => element,
            Err(_) => return Ok(false),
        };
        element.click().await?;
        Ok(true)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.browser.close().await {
            log::debug!("Browser close reported: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            log::debug!("Browser wait reported: {}", e);
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        log::info!("Browser closed");
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}

/// Discovers an installed browser and launches it
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    pub browser_path: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
    pub window_size: (u32, u32),
}

impl Default for ChromeLauncher {
    fn default() -> Self {
        Self {
            browser_path: None,
            headless: false,
            no_sandbox: false,
            window_size: (1400, 900),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, profile_dir: &Path) -> Result<Box<dyn PageDriver>> {
        let executable = super::find_browser(self.browser_path.as_deref()).ok_or_else(|| {
            CaptureError::BrowserNotFound(
                "Chrome or Edge not found. Please install Chrome or Microsoft Edge, \
                 or set CHROME_EXECUTABLE."
                    .to_string(),
            )
        })?;
        log::info!("Using browser: {}", executable.display());

        let driver = ChromeDriver::launch(&LaunchOptions {
            executable,
            profile_dir: profile_dir.to_path_buf(),
            headless: self.headless,
            no_sandbox: self.no_sandbox,
            window_size: self.window_size,
        })
        .await?;

        Ok(Box::new(driver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_definition() {
        assert_eq!(key_definition("PageUp"), Some(("PageUp", 33)));
        assert_eq!(key_definition("Home"), Some(("Home", 36)));
        assert_eq!(key_definition("F13"), None);
    }

    #[test]
    fn test_default_launcher_is_headed() {
        let launcher = ChromeLauncher::default();
        assert!(!launcher.headless);
        assert_eq!(launcher.window_size, (1400, 900));
    }
}
