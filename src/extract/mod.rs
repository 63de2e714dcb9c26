//! Page extraction
//!
//! Reads the live chat DOM through a [`PageDriver`] without modifying it.

pub mod assemble;
pub mod layout;

pub use assemble::{assemble_messages, fallback_id, FallbackIdPolicy, RawGroup};
pub use layout::ChatLayout;

use crate::browser::{evaluate_as, PageDriver};
use crate::error::Result;
use crate::model::{Message, ScrollState};
use async_trait::async_trait;

/// Capability set the harvest loop needs from the page
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Selectors whose presence means the chat view has materialized
    fn container_selectors(&self) -> &[String];

    /// Control to focus before sending scroll keystrokes
    fn input_selector(&self) -> &str;

    /// All currently rendered messages, in DOM order
    async fn extract_visible(&self, page: &dyn PageDriver) -> Result<Vec<Message>>;

    async fn scroll_state(&self, page: &dyn PageDriver) -> Result<ScrollState>;

    /// Whether message text has rendered enough to start harvesting
    async fn content_ready(&self, page: &dyn PageDriver) -> Result<bool>;
}

/// Extractor driven by a [`ChatLayout`] selector set
#[derive(Debug, Clone)]
pub struct DomExtractor {
    layout: ChatLayout,
    policy: FallbackIdPolicy,
    extraction_script: String,
    scroll_script: String,
    ready_script: String,
}

impl DomExtractor {
    pub fn new(layout: ChatLayout, policy: FallbackIdPolicy) -> Self {
        Self {
            extraction_script: layout.extraction_script(),
            scroll_script: layout.scroll_state_script(),
            ready_script: layout.content_ready_script(),
            layout,
            policy,
        }
    }
}

impl Default for DomExtractor {
    fn default() -> Self {
        Self::new(ChatLayout::default(), FallbackIdPolicy::default())
    }
}

#[async_trait]
impl PageExtractor for DomExtractor {
    fn container_selectors(&self) -> &[String] {
        &self.layout.container_selectors
    }

    fn input_selector(&self) -> &str {
        &self.layout.input_selector
    }

    async fn extract_visible(&self, page: &dyn PageDriver) -> Result<Vec<Message>> {
        let groups: Vec<RawGroup> = evaluate_as(page, &self.extraction_script).await?;
        Ok(assemble_messages(groups, self.policy))
    }

    async fn scroll_state(&self, page: &dyn PageDriver) -> Result<ScrollState> {
        evaluate_as(page, &self.scroll_script).await
    }

    async fn content_ready(&self, page: &dyn PageDriver) -> Result<bool> {
        let value = page.evaluate(&self.ready_script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}
