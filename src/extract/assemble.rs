//! Turns raw group snapshots into messages.
//!
//! Continuation groups of the same author do not render a header, so the last
//! author and timestamp seen are carried forward onto them.

use crate::model::{Attachment, Message};
use serde::{Deserialize, Serialize};

/// Fields read from one rendered message group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGroup {
    #[serde(default)]
    pub dom_id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub embeds: Vec<String>,
}

/// What to do with groups that carry no DOM id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackIdPolicy {
    /// Build `author-timestamp-<first 50 chars>`. Two empty messages from the
    /// same author at the same displayed time collide.
    #[default]
    Synthesize,
    /// Drop groups without a DOM id
    Disabled,
}

const FALLBACK_CONTENT_CHARS: usize = 50;

pub fn fallback_id(author: &str, timestamp: &str, content: &str) -> String {
    let prefix: String = content.chars().take(FALLBACK_CONTENT_CHARS).collect();
    format!("{}-{}-{}", author, timestamp, prefix)
}

/// Assemble messages in DOM order, applying carry-forward and id policy
pub fn assemble_messages(groups: Vec<RawGroup>, policy: FallbackIdPolicy) -> Vec<Message> {
    let mut current_author = String::new();
    let mut current_timestamp = String::new();
    let mut messages = Vec::with_capacity(groups.len());

    for group in groups {
        if let Some(author) = group.author.as_deref().map(str::trim) {
            if !author.is_empty() {
                current_author = author.to_string();
            }
        }
        if let Some(ts) = group.timestamp.as_deref().map(str::trim) {
            if !ts.is_empty() {
                current_timestamp = ts.to_string();
            }
        }

        let content = group.content.trim().to_string();

        let id = match group.dom_id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => match policy {
                FallbackIdPolicy::Synthesize => {
                    if content.is_empty() {
                        log::warn!(
                            "Synthesizing id for an empty message by {} at {}; \
                             identical neighbours will be merged",
                            current_author,
                            current_timestamp
                        );
                    }
                    fallback_id(&current_author, &current_timestamp, &content)
                }
                FallbackIdPolicy::Disabled => {
                    log::debug!("Skipping message group without DOM id");
                    continue;
                }
            },
        };

        let mut urls: Vec<String> = Vec::with_capacity(group.urls.len());
        for url in group.urls {
            if !url.is_empty() && !urls.contains(&url) {
                urls.push(url);
            }
        }

        messages.push(Message {
            id,
            author: current_author.clone(),
            timestamp: current_timestamp.clone(),
            content,
            attachments: urls.into_iter().map(Attachment::remote).collect(),
            embeds: group
                .embeds
                .into_iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        });
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: Option<&str>, author: Option<&str>, ts: Option<&str>, content: &str) -> RawGroup {
        RawGroup {
            dom_id: id.map(String::from),
            author: author.map(String::from),
            timestamp: ts.map(String::from),
            content: content.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_carry_forward_author_and_timestamp() {
        let groups = vec![
            group(Some("chat-messages-1"), Some("alice"), Some("2024-05-01T10:00:00Z"), "first"),
            group(Some("chat-messages-2"), None, None, "second"),
            group(Some("chat-messages-3"), None, None, "third"),
        ];

        let messages = assemble_messages(groups, FallbackIdPolicy::Synthesize);
        assert_eq!(messages.len(), 3);
        for m in &messages {
            assert_eq!(m.author, "alice");
            assert_eq!(m.timestamp, "2024-05-01T10:00:00Z");
        }
    }

    #[test]
    fn test_new_header_replaces_carried_values() {
        let groups = vec![
            group(Some("1"), Some("alice"), Some("t1"), "a"),
            group(Some("2"), None, None, "b"),
            group(Some("3"), Some("bob"), Some("t2"), "c"),
            group(Some("4"), Some("   "), None, "d"),
        ];

        let messages = assemble_messages(groups, FallbackIdPolicy::Synthesize);
        assert_eq!(messages[1].author, "alice");
        assert_eq!(messages[2].author, "bob");
        // Blank header text keeps the carried author
        assert_eq!(messages[3].author, "bob");
        assert_eq!(messages[3].timestamp, "t2");
    }

    #[test]
    fn test_fallback_id_truncates_content() {
        let long = "x".repeat(80);
        let messages = assemble_messages(
            vec![group(None, Some("carol"), Some("t"), &long)],
            FallbackIdPolicy::Synthesize,
        );
        assert_eq!(messages[0].id, format!("carol-t-{}", "x".repeat(50)));
    }

    #[test]
    fn test_fallback_id_counts_chars_not_bytes() {
        let content = "é".repeat(60);
        let id = fallback_id("a", "t", &content);
        assert_eq!(id, format!("a-t-{}", "é".repeat(50)));
    }

    #[test]
    fn test_empty_messages_collide_under_fallback() {
        let messages = assemble_messages(
            vec![
                group(None, Some("dave"), Some("t"), ""),
                group(None, None, None, "  "),
            ],
            FallbackIdPolicy::Synthesize,
        );
        assert_eq!(messages[0].id, messages[1].id);
    }

    #[test]
    fn test_disabled_policy_drops_groups_without_id() {
        let messages = assemble_messages(
            vec![
                group(None, Some("erin"), Some("t"), "no id"),
                group(Some("chat-messages-9"), None, None, "has id"),
            ],
            FallbackIdPolicy::Disabled,
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "chat-messages-9");
        // Header from the dropped group still carries forward
        assert_eq!(messages[0].author, "erin");
    }

    #[test]
    fn test_urls_deduplicated_within_group() {
        let raw = RawGroup {
            dom_id: Some("g".to_string()),
            urls: vec![
                "https://cdn.discordapp.com/a.png".to_string(),
                "https://cdn.discordapp.com/a.png".to_string(),
                "https://media.discordapp.net/b.png".to_string(),
            ],
            embeds: vec!["  Title\nBody ".to_string(), "".to_string()],
            ..Default::default()
        };
        let messages = assemble_messages(vec![raw], FallbackIdPolicy::Synthesize);
        assert_eq!(messages[0].attachments.len(), 2);
        assert_eq!(messages[0].embeds, vec!["Title\nBody".to_string()]);
    }
}
