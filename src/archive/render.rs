//! Message log rendering

use crate::error::{CaptureError, Result};
use crate::model::Message;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

pub const CSV_HEADER: &str = "id,author,timestamp,content,attachments,embeds";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogDocument<'a> {
    captured_at: String,
    message_count: usize,
    messages: &'a [Message],
}

/// `{capturedAt, messageCount, messages}` as pretty JSON
pub fn render_json(captured_at: DateTime<Utc>, messages: &[Message]) -> Result<String> {
    let doc = LogDocument {
        captured_at: captured_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        message_count: messages.len(),
        messages,
    };
    serde_json::to_string_pretty(&doc)
        .map_err(|e| CaptureError::Persistence(format!("Failed to serialize log: {}", e)))
}

/// Quote a field: double internal quotes, newlines become a literal `\n`
pub fn escape_csv(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\"").replace('\n', "\\n"))
}

fn csv_row(m: &Message) -> String {
    let attachments = m
        .attachments
        .iter()
        .map(|a| a.reference())
        .collect::<Vec<_>>()
        .join("; ");

    [
        escape_csv(&m.id),
        escape_csv(&m.author),
        escape_csv(&m.timestamp),
        escape_csv(&m.content),
        escape_csv(&attachments),
        escape_csv(&m.embeds.join("; ")),
    ]
    .join(",")
}

/// Header line followed by one row per message
pub fn render_csv(messages: &[Message]) -> String {
    let rows = messages.iter().map(csv_row).collect::<Vec<_>>().join("\n");
    format!("{}\n{}", CSV_HEADER, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attachment;
    use chrono::TimeZone;

    fn quoted_message() -> Message {
        Message {
            id: "chat-messages-1-2".to_string(),
            author: "alice".to_string(),
            timestamp: "2024-05-01T10:00:00.000Z".to_string(),
            content: "He said \"hi\"\nbye".to_string(),
            attachments: vec![
                Attachment {
                    url: "https://cdn.discordapp.com/a.png".to_string(),
                    local_file: Some("attachments/a.png".to_string()),
                },
                Attachment::remote("https://cdn.discordapp.com/b.txt"),
            ],
            embeds: vec![],
        }
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "\"plain\"");
        assert_eq!(escape_csv("He said \"hi\"\nbye"), r#""He said ""hi""\nbye""#);
    }

    #[test]
    fn test_csv_row_quotes_and_joins() {
        let csv = render_csv(&[quoted_message()]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));

        let row = lines.next().unwrap();
        assert!(row.contains(r#""He said ""hi""\nbye""#));
        assert!(row.contains(r#""attachments/a.png; https://cdn.discordapp.com/b.txt""#));
        assert!(row.ends_with(",\"\""));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_csv_empty_ledger_is_header_only() {
        assert_eq!(render_csv(&[]), format!("{}\n", CSV_HEADER));
    }

    #[test]
    fn test_json_document_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let json = render_json(at, &[quoted_message()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["capturedAt"], "2024-05-01T10:00:00.000Z");
        assert_eq!(value["messageCount"], 1);
        let atts = &value["messages"][0]["attachments"];
        assert_eq!(atts[0]["localFile"], "attachments/a.png");
        assert!(atts[1].get("localFile").is_none());
        assert_eq!(value["messages"][0]["embeds"], serde_json::json!([]));
    }
}
