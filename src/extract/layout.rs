//! Chat layout heuristics
//!
//! Class names in the target UI are build-hashed, so every selector matches on
//! a stable class-name fragment. The set lives in data so it can be replaced
//! from configuration without touching the harvest loop.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatLayout {
    /// Chat container candidates, first match wins
    pub container_selectors: Vec<String>,
    /// One element per rendered message group, in DOM order
    pub group_selector: String,
    pub author_selector: String,
    pub timestamp_selector: String,
    pub content_selector: String,
    /// Anchors pointing at attachment CDN hosts or file links
    pub attachment_link_selector: String,
    /// Inline images rendered for attachments
    pub attachment_image_selector: String,
    pub embed_selector: String,
    /// Scrollable message list candidates, first match wins
    pub scroller_selectors: Vec<String>,
    /// Markers rendered only above the very first message of a channel
    pub beginning_markers: Vec<String>,
    /// Control focused so that PageUp scrolls the message list
    pub input_selector: String,
}

impl Default for ChatLayout {
    fn default() -> Self {
        Self {
            container_selectors: vec![
                r#"[class*="chatContent_"]"#.to_string(),
                r#"[class*="chat_"] > [class*="content_"]"#.to_string(),
            ],
            group_selector: r#"[id^="chat-messages-"]"#.to_string(),
            author_selector: r#"[class*="username_"]"#.to_string(),
            timestamp_selector: "time".to_string(),
            content_selector: r#"[id^="message-content-"]"#.to_string(),
            attachment_link_selector: concat!(
                r#"a[href*="cdn.discordapp.com"], "#,
                r#"a[href*="media.discordapp.net"], "#,
                r#"a[class*="fileNameLink_"]"#
            )
            .to_string(),
            attachment_image_selector: r#"[class*="imageWrapper_"] img, [class*="attachment_"] img"#
                .to_string(),
            embed_selector: r#"[class*="embedWrapper_"]"#.to_string(),
            scroller_selectors: vec![
                r#"[class*="managedReactiveScroller_"]"#.to_string(),
                r#"[class*="scroller_"][class*="auto_"]"#.to_string(),
            ],
            beginning_markers: vec![
                r#"[class*="emptyChannelIcon_"]"#.to_string(),
                r#"[class*="beginningOfChannel_"]"#.to_string(),
            ],
            input_selector: r#"div[role="textbox"]"#.to_string(),
        }
    }
}

impl ChatLayout {
    fn json(&self) -> String {
        // A struct of strings always serializes
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Snapshot every rendered group as raw fields.
    ///
    /// Author and timestamp are `null` when the group does not render its own
    /// header; carry-forward happens on the Rust side.
    pub fn extraction_script(&self) -> String {
        format!(
            r#"
            (() => {{
                const L = {layout};
                let chat = null;
                for (const sel of L.containerSelectors) {{
                    chat = document.querySelector(sel);
                    if (chat) break;
                }}
                if (!chat) return [];

                const text = (el) => (el && el.textContent ? el.textContent.trim() : "");
                const groups = [];

                chat.querySelectorAll(L.groupSelector).forEach((group) => {{
                    const authorEl = group.querySelector(L.authorSelector);
                    const timeEl = group.querySelector(L.timestampSelector);

                    const urls = [];
                    group.querySelectorAll(L.attachmentLinkSelector).forEach((a) => {{
                        const href = a.href || a.getAttribute("href") || "";
                        if (href && !urls.includes(href)) urls.push(href);
                    }});
                    group.querySelectorAll(L.attachmentImageSelector).forEach((img) => {{
                        const src = img.src || "";
                        if (src && !urls.includes(src)) urls.push(src);
                    }});

                    const embeds = [];
                    group.querySelectorAll(L.embedSelector).forEach((e) => {{
                        const t = text(e);
                        if (t) embeds.push(t);
                    }});

                    groups.push({{
                        domId: group.id || null,
                        author: authorEl ? text(authorEl) : null,
                        timestamp: timeEl ? (timeEl.getAttribute("datetime") || text(timeEl)) : null,
                        content: text(group.querySelector(L.contentSelector)),
                        urls,
                        embeds,
                    }});
                }});

                return groups;
            }})()
            "#,
            layout = self.json()
        )
    }

    pub fn scroll_state_script(&self) -> String {
        format!(
            r#"
            (() => {{
                const L = {layout};
                let scroller = null;
                for (const sel of L.scrollerSelectors) {{
                    scroller = document.querySelector(sel);
                    if (scroller) break;
                }}
                if (!scroller) return {{ scrollTop: 0, scrollHeight: 0, msgCount: 0, isBeginning: false }};

                const isBeginning = L.beginningMarkers.some((sel) => document.querySelector(sel) !== null);

                return {{
                    scrollTop: scroller.scrollTop,
                    scrollHeight: scroller.scrollHeight,
                    msgCount: document.querySelectorAll(L.groupSelector).length,
                    isBeginning,
                }};
            }})()
            "#,
            layout = self.json()
        )
    }

    /// True once at least two message bodies exist and one has real text
    pub fn content_ready_script(&self) -> String {
        format!(
            r#"
            (() => {{
                const L = {layout};
                const msgs = Array.from(document.querySelectorAll(L.contentSelector));
                if (msgs.length < 2) return false;
                return msgs.some((m) => ((m.textContent || "").trim().length) > 5);
            }})()
            "#,
            layout = self.json()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_partial_override() {
        let layout: ChatLayout =
            serde_json::from_str(r#"{"groupSelector": "li.message"}"#).unwrap();
        assert_eq!(layout.group_selector, "li.message");
        assert_eq!(layout.timestamp_selector, "time");
        assert_eq!(layout.container_selectors.len(), 2);
    }

    #[test]
    fn test_scripts_embed_layout() {
        let layout = ChatLayout::default();
        let script = layout.extraction_script();
        assert!(script.contains("chatContent_"));
        assert!(script.contains("containerSelectors"));
        assert!(layout.scroll_state_script().contains("beginningOfChannel_"));
        assert!(layout.content_ready_script().contains("message-content-"));
    }
}
