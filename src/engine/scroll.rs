//! History-exhaustion heuristic
//!
//! A single zero scroll position can be a transient reading while older
//! messages are still loading, so the top is only accepted when it coincides
//! with a step that produced no new content.

use crate::model::ScrollState;

/// Scroll positions at or below this count as the top
pub const TOP_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub new_content: bool,
    pub stuck: bool,
    pub reached_top: bool,
}

#[derive(Debug, Default)]
pub struct ScrollTracker {
    stuck: bool,
}

impl ScrollTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the states around one PageUp step and decide whether to stop
    pub fn observe(&mut self, before: &ScrollState, after: &ScrollState) -> StepOutcome {
        let new_content =
            after.scroll_height > before.scroll_height || after.msg_count > before.msg_count;
        let at_top = after.scroll_top <= TOP_THRESHOLD;

        self.stuck = at_top && !new_content;

        StepOutcome {
            new_content,
            stuck: self.stuck,
            reached_top: (at_top && self.stuck) || after.is_beginning,
        }
    }
}
