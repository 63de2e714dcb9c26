use dispatch_capture::archive::CSV_HEADER;
use dispatch_capture::{ArchiveWriter, Attachment, FileArchive, Message, OutputFormat};

fn sample() -> Vec<Message> {
    vec![
        Message {
            id: "chat-messages-1-1".to_string(),
            author: "alice".to_string(),
            timestamp: "2024-05-01T10:00:00.000Z".to_string(),
            content: "first line\nsecond \"quoted\" line".to_string(),
            attachments: vec![Attachment {
                url: "https://cdn.discordapp.com/attachments/1/a.png".to_string(),
                local_file: Some("attachments/a.png".to_string()),
            }],
            embeds: vec!["Link preview".to_string()],
        },
        Message {
            id: "chat-messages-1-2".to_string(),
            author: "alice".to_string(),
            timestamp: "2024-05-01T10:00:00.000Z".to_string(),
            content: "continuation".to_string(),
            attachments: vec![],
            embeds: vec![],
        },
    ]
}

#[tokio::test]
async fn test_session_layout() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let archive = FileArchive::new(root.path().join("out"));

    let session = archive.create_session(OutputFormat::Json).await?;

    assert!(session.id.starts_with("capture-"));
    assert_eq!(session.output_dir, root.path().join("out").join(&session.id));
    assert!(session.screenshots_dir().is_dir());
    assert!(session.attachments_dir().is_dir());
    Ok(())
}

#[tokio::test]
async fn test_sessions_in_same_second_do_not_collide() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let archive = FileArchive::new(root.path());

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(archive.create_session(OutputFormat::Csv).await?.id);
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_json_log_document() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let archive = FileArchive::new(root.path());
    let session = archive.create_session(OutputFormat::Json).await?;

    let path = archive.save_log(&session, &sample()).await?;
    assert_eq!(path, session.output_dir.join("messages.json"));

    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(doc["messageCount"], 2);
    assert!(doc["capturedAt"].as_str().unwrap().ends_with('Z'));
    assert_eq!(doc["messages"][0]["content"], "first line\nsecond \"quoted\" line");
    assert_eq!(doc["messages"][0]["attachments"][0]["localFile"], "attachments/a.png");
    assert_eq!(doc["messages"][1]["embeds"], serde_json::json!([]));
    Ok(())
}

#[tokio::test]
async fn test_csv_log_rows() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let archive = FileArchive::new(root.path());
    let session = archive.create_session(OutputFormat::Csv).await?;

    let path = archive.save_log(&session, &sample()).await?;
    let csv = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = csv.split('\n').collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(
        lines[1],
        r#""chat-messages-1-1","alice","2024-05-01T10:00:00.000Z","first line\nsecond ""quoted"" line","attachments/a.png","Link preview""#
    );
    assert_eq!(
        lines[2],
        r#""chat-messages-1-2","alice","2024-05-01T10:00:00.000Z","continuation","","""#
    );
    Ok(())
}

#[tokio::test]
async fn test_save_replaces_previous_log() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let archive = FileArchive::new(root.path());
    let session = archive.create_session(OutputFormat::Json).await?;

    archive.save_log(&session, &sample()).await?;
    let path = archive.save_log(&session, &sample()[..1]).await?;

    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(doc["messageCount"], 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_log_is_still_written() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let archive = FileArchive::new(root.path());
    let session = archive.create_session(OutputFormat::Csv).await?;

    let path = archive.save_log(&session, &[]).await?;
    assert_eq!(std::fs::read_to_string(path)?, format!("{}\n", CSV_HEADER));
    Ok(())
}
