//! Message ledger
//!
//! Append-only, first-seen-wins collection of captured messages for one run.

use crate::model::Message;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct Ledger {
    messages: Vec<Message>,
    seen_ids: HashSet<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept every message whose id has not been seen yet.
    ///
    /// Returns the number of newly accepted messages. Re-observed ids are
    /// ignored, so feeding the same extraction twice is a no-op.
    pub fn accumulate<I>(&mut self, messages: I) -> usize
    where
        I: IntoIterator<Item = Message>,
    {
        let mut added = 0;
        for msg in messages {
            if self.seen_ids.insert(msg.id.clone()) {
                self.messages.push(msg);
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Distinct attachment URLs across the whole ledger, in first-reference order
    pub fn attachment_urls(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.messages
            .iter()
            .flat_map(|m| m.attachments.iter())
            .filter(|a| seen.insert(a.url.as_str()))
            .map(|a| a.url.clone())
            .collect()
    }

    /// Patch resolved local paths into every attachment referencing a mapped URL.
    ///
    /// Returns how many attachment records were updated.
    pub fn apply_resolved(&mut self, resolved: &HashMap<String, String>) -> usize {
        let mut patched = 0;
        for att in self.messages.iter_mut().flat_map(|m| m.attachments.iter_mut()) {
            if let Some(local) = resolved.get(&att.url) {
                att.local_file = Some(local.clone());
                patched += 1;
            }
        }
        patched
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.seen_ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attachment;

    fn msg(id: &str, content: &str, urls: &[&str]) -> Message {
        Message {
            id: id.to_string(),
            author: "alice".to_string(),
            timestamp: "2024-05-01T10:00:00.000Z".to_string(),
            content: content.to_string(),
            attachments: urls.iter().map(|u| Attachment::remote(*u)).collect(),
            embeds: vec![],
        }
    }

    #[test]
    fn test_accumulate_is_idempotent() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.accumulate(vec![msg("a", "hello", &[])]), 1);
        assert_eq!(ledger.accumulate(vec![msg("a", "hello", &[])]), 0);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_first_seen_wins() {
        let mut ledger = Ledger::new();
        ledger.accumulate(vec![msg("a", "original", &[])]);
        ledger.accumulate(vec![msg("a", "edited later", &[])]);
        assert_eq!(ledger.messages()[0].content, "original");
    }

    #[test]
    fn test_overlapping_passes_keep_first_seen_order() {
        let mut ledger = Ledger::new();
        ledger.accumulate(vec![msg("A", "", &[]), msg("B", "", &[])]);
        ledger.accumulate(vec![msg("B", "", &[]), msg("C", "", &[])]);
        ledger.accumulate(vec![msg("C", "", &[]), msg("D", "", &[])]);

        let ids: Vec<&str> = ledger.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_attachment_urls_are_distinct() {
        let mut ledger = Ledger::new();
        ledger.accumulate(vec![
            msg("1", "", &["https://cdn/x.png", "https://cdn/y.png"]),
            msg("2", "", &["https://cdn/x.png"]),
            msg("3", "", &["https://cdn/z.png", "https://cdn/y.png"]),
        ]);
        assert_eq!(
            ledger.attachment_urls(),
            vec!["https://cdn/x.png", "https://cdn/y.png", "https://cdn/z.png"]
        );
    }

    #[test]
    fn test_apply_resolved_patches_every_reference() {
        let mut ledger = Ledger::new();
        ledger.accumulate(vec![
            msg("1", "", &["https://cdn/x.png", "https://cdn/missing.png"]),
            msg("2", "", &["https://cdn/x.png"]),
        ]);

        let mut resolved = HashMap::new();
        resolved.insert(
            "https://cdn/x.png".to_string(),
            "attachments/x.png".to_string(),
        );

        assert_eq!(ledger.apply_resolved(&resolved), 2);
        let m = ledger.messages();
        assert_eq!(m[0].attachments[0].local_file.as_deref(), Some("attachments/x.png"));
        assert_eq!(m[0].attachments[1].local_file, None);
        assert_eq!(m[1].attachments[0].local_file.as_deref(), Some("attachments/x.png"));
    }
}
