//! Capture engine
//!
//! Runs the two-phase protocol against injected collaborators:
//!
//! 1. [`CaptureEngine::setup`] launches the browser, opens the target app and
//!    waits until the chat view exists, then reports ready.
//! 2. [`CaptureEngine::begin_capture`] walks backward through history with
//!    PageUp, extracting and screenshotting every viewport, then downloads
//!    attachments and writes the log.
//!
//! Only one capture runs per engine. [`StopHandle`] stops a running capture
//! cooperatively between steps.

pub mod events;
pub mod scroll;
pub mod state;

pub use events::{CaptureEvent, CaptureEvents, CaptureSummary, LogEvents, Progress};
pub use scroll::{ScrollTracker, StepOutcome};
pub use state::{CaptureState, StopHandle};

use crate::archive::{ArchiveWriter, FileArchive};
use crate::attachments::{AttachmentResolver, HttpResolver};
use crate::browser::{poll_until, BrowserLauncher, ChromeLauncher, PageDriver};
use crate::config::{CaptureConfig, Timings};
use crate::error::{CaptureError, Result};
use crate::extract::{DomExtractor, PageExtractor};
use crate::ledger::Ledger;
use crate::model::{OutputFormat, Session};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SCROLL_KEY: &str = "PageUp";

/// The engine's replaceable dependencies
pub struct Collaborators {
    pub launcher: Arc<dyn BrowserLauncher>,
    pub extractor: Arc<dyn PageExtractor>,
    pub resolver: Arc<dyn AttachmentResolver>,
    pub archive: Arc<dyn ArchiveWriter>,
    pub events: Arc<dyn CaptureEvents>,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub target_url: String,
    pub profile_dir: PathBuf,
    pub timings: Timings,
}

impl From<&CaptureConfig> for EngineSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            target_url: config.target_url.clone(),
            profile_dir: config.profile_dir.clone(),
            timings: config.timings.clone(),
        }
    }
}

/// Collaborators and settings shared by every phase of a run
struct Pipeline {
    launcher: Arc<dyn BrowserLauncher>,
    extractor: Arc<dyn PageExtractor>,
    resolver: Arc<dyn AttachmentResolver>,
    archive: Arc<dyn ArchiveWriter>,
    events: Arc<dyn CaptureEvents>,
    settings: EngineSettings,
    running: StopHandle,
}

/// What one capture run has produced so far
#[derive(Default)]
struct RunData {
    session: Option<Session>,
    ledger: Ledger,
    screenshot_count: usize,
}

impl RunData {
    fn reset(&mut self) {
        self.session = None;
        self.ledger.clear();
        self.screenshot_count = 0;
    }
}

pub struct CaptureEngine {
    pipeline: Pipeline,
    state: CaptureState,
    page: Option<Box<dyn PageDriver>>,
    format: OutputFormat,
    run: RunData,
}

/// `base`-relative path with `/` separators, or the full path outside `base`
fn relative_reference(base: &Path, path: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

fn not_ready() -> CaptureError {
    CaptureError::NotReady("Browser not ready. Run setup first.".to_string())
}

impl CaptureEngine {
    pub fn new(collaborators: Collaborators, settings: EngineSettings) -> Self {
        Self {
            pipeline: Pipeline {
                launcher: collaborators.launcher,
                extractor: collaborators.extractor,
                resolver: collaborators.resolver,
                archive: collaborators.archive,
                events: collaborators.events,
                settings,
                running: StopHandle::new(),
            },
            state: CaptureState::Idle,
            page: None,
            format: OutputFormat::default(),
            run: RunData::default(),
        }
    }

    /// Engine wired to Chrome, the DOM extractor, HTTP downloads and the local filesystem
    pub fn from_config(config: &CaptureConfig, events: Arc<dyn CaptureEvents>) -> Result<Self> {
        let launcher = ChromeLauncher {
            browser_path: config.browser_path.clone(),
            headless: config.headless,
            no_sandbox: config.no_sandbox,
            window_size: (config.window_width, config.window_height),
        };

        let collaborators = Collaborators {
            launcher: Arc::new(launcher),
            extractor: Arc::new(DomExtractor::new(config.layout.clone(), config.fallback_ids)),
            resolver: Arc::new(HttpResolver::new(config.timings.attachment_timeout())?),
            archive: Arc::new(FileArchive::new(&config.output_dir)),
            events,
        };

        Ok(Self::new(collaborators, EngineSettings::from(config)))
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.run.ledger
    }

    pub fn screenshot_count(&self) -> usize {
        self.run.screenshot_count
    }

    pub fn session(&self) -> Option<&Session> {
        self.run.session.as_ref()
    }

    /// Handle that stops a running capture from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.pipeline.running.clone()
    }

    /// Request a cooperative stop; the step in flight still completes
    pub fn stop(&self) {
        self.pipeline.running.stop();
    }

    /// Settle a setup or capture whose future was dropped before it returned.
    ///
    /// Both hold `&mut self` until they finish, so seeing their transient
    /// state from a new call means they were abandoned mid-flight.
    async fn recover_abandoned(&mut self) {
        let phase = match self.state {
            CaptureState::SettingUp => "Setup",
            CaptureState::Recording => "Capture",
            _ => return,
        };
        log::warn!("{} was interrupted before it finished", phase);

        self.pipeline.running.stop();
        self.state = CaptureState::Error;
        self.pipeline
            .events
            .on_error(format!("{} was interrupted before it finished", phase));
        self.pipeline.save_partial(&self.run).await;
    }

    // ===== SETUP =====

    /// Launch the browser, open the target app and wait for the chat view.
    ///
    /// Rejected with `AlreadyRunning` while a session is being set up, is
    /// ready, or is recording. Any earlier ledger is discarded.
    pub async fn setup(&mut self, format: OutputFormat) -> Result<()> {
        self.recover_abandoned().await;
        if self.state.is_active() {
            return Err(CaptureError::AlreadyRunning);
        }

        if let Some(mut old) = self.page.take() {
            old.close().await;
        }
        self.run.reset();
        self.format = format;
        self.state = CaptureState::SettingUp;

        match self.pipeline.acquire_target(&self.run).await {
            Ok(page) => {
                self.page = Some(page);
                self.state = CaptureState::Ready;
                self.pipeline
                    .progress(&self.run, "Chat area detected! Begin recording when ready.");
                self.pipeline.events.on_ready();
                Ok(())
            }
            Err(e) => {
                log::error!("Setup failed: {}", e);
                self.state = CaptureState::Error;
                self.pipeline.events.on_error(e.to_string());
                Err(e)
            }
        }
    }

    // ===== CAPTURE =====

    /// Record the conversation. Requires a completed [`setup`](Self::setup).
    ///
    /// On failure the messages harvested so far are still written before the
    /// error is returned. If this future is dropped mid-run, the next call on
    /// the engine saves them instead.
    pub async fn begin_capture(&mut self) -> Result<CaptureSummary> {
        self.recover_abandoned().await;
        if self.state != CaptureState::Ready {
            return Err(not_ready());
        }

        let Self {
            pipeline,
            state,
            page,
            format,
            run,
        } = self;
        let page = page.as_deref().ok_or_else(not_ready)?;

        pipeline.running.start();
        run.reset();
        *state = CaptureState::Recording;

        let result = pipeline.record(page, run, *format).await;
        pipeline.running.stop();

        match result {
            Ok(summary) => {
                *state = CaptureState::Finished;
                pipeline.events.on_complete(summary.clone());
                Ok(summary)
            }
            Err(e) => {
                log::error!("Capture failed: {}", e);
                *state = CaptureState::Error;
                pipeline.events.on_error(e.to_string());
                pipeline.save_partial(run).await;
                Err(e)
            }
        }
    }

    /// Close the browser and return to idle. Safe to call repeatedly.
    pub async fn close_browser(&mut self) {
        self.recover_abandoned().await;
        self.pipeline.running.stop();
        if let Some(mut page) = self.page.take() {
            page.close().await;
        }
        self.state = CaptureState::Idle;
    }
}

impl Pipeline {
    fn progress(&self, run: &RunData, status: impl Into<String>) {
        self.events.on_progress(Progress {
            screenshot_count: run.screenshot_count,
            message_count: run.ledger.len(),
            status: status.into(),
        });
    }

    fn capturing_status(run: &RunData) -> String {
        format!(
            "Capturing... ({} messages, {} screenshots)",
            run.ledger.len(),
            run.screenshot_count
        )
    }

    async fn acquire_target(&self, run: &RunData) -> Result<Box<dyn PageDriver>> {
        self.progress(run, "Launching browser...");
        let mut page = self.launcher.launch(&self.settings.profile_dir).await?;

        if let Err(e) = self.reach_chat(run, page.as_ref()).await {
            page.close().await;
            return Err(e);
        }
        Ok(page)
    }

    async fn reach_chat(&self, run: &RunData, page: &dyn PageDriver) -> Result<()> {
        let timings = &self.settings.timings;

        self.progress(run, "Loading chat application...");
        page.navigate(&self.settings.target_url, timings.navigation_timeout())
            .await?;
        log::info!("Target application loaded");

        self.progress(
            run,
            "Waiting for chat to load... Navigate to a channel in the browser window.",
        );
        let matched = page
            .wait_for_selector_any(
                self.extractor.container_selectors(),
                timings.target_timeout(),
                timings.target_poll(),
            )
            .await
            .map_err(|_| {
                CaptureError::TargetNotFound(
                    "Chat area not found. Make sure you're logged in and on a channel.".to_string(),
                )
            })?;
        log::info!("Chat area detected via {}", matched);
        Ok(())
    }

    async fn record(
        &self,
        page: &dyn PageDriver,
        run: &mut RunData,
        format: OutputFormat,
    ) -> Result<CaptureSummary> {
        let session = self.archive.create_session(format).await?;
        run.session = Some(session.clone());

        self.progress(run, "Capturing...");
        self.harvest(page, &session, run).await?;
        self.finalize(&session, run).await
    }

    async fn save_partial(&self, run: &RunData) {
        let Some(session) = &run.session else {
            return;
        };
        if run.ledger.is_empty() {
            return;
        }
        match self.archive.save_log(session, run.ledger.messages()).await {
            Ok(path) => log::info!(
                "Partial log saved: {} messages -> {}",
                run.ledger.len(),
                path.display()
            ),
            Err(e) => log::error!("Partial save failed: {}", e),
        }
    }

    async fn wait_for_content(&self, page: &dyn PageDriver) {
        let timings = &self.settings.timings;
        let extractor = self.extractor.as_ref();

        log::info!("Waiting for messages to render...");
        let ready = poll_until(timings.content_timeout(), timings.content_poll(), move || async move {
            matches!(extractor.content_ready(page).await, Ok(true)).then_some(())
        })
        .await;

        match ready {
            Some(()) => log::info!("Messages with text content detected"),
            None => log::warn!("Timed out waiting for message text, continuing anyway"),
        }
    }

    async fn harvest(&self, page: &dyn PageDriver, session: &Session, run: &mut RunData) -> Result<()> {
        let timings = &self.settings.timings;

        self.wait_for_content(page).await;
        tokio::time::sleep(timings.render_settle()).await;

        // Bottom of the chat first, so the newest messages survive a failed scroll
        let visible = self.capture_step(page, session, run).await?;
        log::info!(
            "Initial capture: {} visible, {} total, screenshot #{}",
            visible,
            run.ledger.len(),
            run.screenshot_count
        );
        self.progress(run, Self::capturing_status(run));

        // PageUp only scrolls the chat while the message input has focus
        match page.click(self.extractor.input_selector()).await {
            Ok(true) => log::debug!("Focused message input"),
            Ok(false) => log::warn!("Message input not found; PageUp may not scroll the chat"),
            Err(e) => log::warn!("Failed to focus message input: {}", e),
        }

        let mut tracker = ScrollTracker::new();

        while self.running.is_running() {
            let before = self.extractor.scroll_state(page).await?;

            page.press_key(SCROLL_KEY).await?;
            tokio::time::sleep(timings.scroll_settle()).await;

            let visible = self.capture_step(page, session, run).await?;

            let after = self.extractor.scroll_state(page).await?;
            let outcome = tracker.observe(&before, &after);

            log::debug!(
                "Step {}: {} visible, {} total, scroll={}/{}, msgs={}, newContent={}, stuck={}, top={}",
                run.screenshot_count,
                visible,
                run.ledger.len(),
                after.scroll_top,
                after.scroll_height,
                after.msg_count,
                outcome.new_content,
                outcome.stuck,
                outcome.reached_top
            );

            if outcome.reached_top {
                self.progress(run, "Reached the beginning of the chat!");
                log::info!("Reached top of chat");
                break;
            }
            self.progress(run, Self::capturing_status(run));
        }

        if !self.running.is_running() {
            log::info!("Stop requested; harvested {} messages", run.ledger.len());
        }
        Ok(())
    }

    /// Extract, accumulate and screenshot the current viewport
    async fn capture_step(
        &self,
        page: &dyn PageDriver,
        session: &Session,
        run: &mut RunData,
    ) -> Result<usize> {
        let messages = self.extractor.extract_visible(page).await?;
        let visible = messages.len();
        run.ledger.accumulate(messages);
        self.take_screenshot(page, session, run).await?;
        Ok(visible)
    }

    async fn take_screenshot(
        &self,
        page: &dyn PageDriver,
        session: &Session,
        run: &mut RunData,
    ) -> Result<()> {
        run.screenshot_count += 1;
        let path = session.screenshot_path(run.screenshot_count);

        match page.screenshot_to_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if !e.is_fatal() => {
                log::warn!("Screenshot failed: {}", e);
                run.screenshot_count -= 1;
                Ok(())
            }
            Err(e) => {
                run.screenshot_count -= 1;
                Err(e)
            }
        }
    }

    async fn finalize(&self, session: &Session, run: &mut RunData) -> Result<CaptureSummary> {
        let urls = run.ledger.attachment_urls();

        if !urls.is_empty() {
            self.progress(run, format!("Downloading {} attachments...", urls.len()));

            let events = self.events.clone();
            let screenshot_count = run.screenshot_count;
            let message_count = run.ledger.len();
            let on_progress = move |done: usize, total: usize| {
                events.on_progress(Progress {
                    screenshot_count,
                    message_count,
                    status: format!("Downloading attachments... ({}/{})", done, total),
                });
            };

            let resolved = self
                .resolver
                .resolve(&urls, &session.attachments_dir(), &on_progress)
                .await;
            log::info!("Downloaded {}/{} attachments", resolved.len(), urls.len());

            let references: HashMap<String, String> = resolved
                .into_iter()
                .map(|(url, path)| (url, relative_reference(&session.output_dir, &path)))
                .collect();
            run.ledger.apply_resolved(&references);
        }

        let log_path = self.archive.save_log(session, run.ledger.messages()).await?;

        Ok(CaptureSummary {
            session_id: session.id.clone(),
            output_path: session.output_dir.clone(),
            log_path,
            message_count: run.ledger.len(),
            screenshot_count: run.screenshot_count,
        })
    }
}
