// src/pipeline/report.rs

//! Text artifacts written after collection.

use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{ChannelCollection, CollectionWindow};

const RULE_WIDTH: usize = 70;

/// Message bodies in selection order, newest first within a channel,
/// separated by blank lines.
pub fn raw_corpus(collections: &[ChannelCollection]) -> String {
    let mut corpus = String::new();
    for message in collections.iter().flat_map(|c| &c.messages) {
        corpus.push_str(&message.text_with_links());
        corpus.push_str("\n\n");
    }
    corpus
}

/// Human-readable per-channel and per-message report.
pub fn render_report(
    collections: &[ChannelCollection],
    window: &CollectionWindow,
    generated_at: DateTime<Utc>,
) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let total: usize = collections.iter().map(|c| c.messages.len()).sum();
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "=== Message Report ===");
    let _ = writeln!(
        out,
        "Generated (UTC): {}",
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(
        out,
        "Window (UTC): {} .. {}",
        window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
        window.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "Chats: {}", collections.len());
    let _ = writeln!(out, "Messages: {}", total);
    let _ = writeln!(out);

    for collection in collections {
        let _ = writeln!(
            out,
            "- {} | chat_id={} | {}",
            collection.channel.title,
            collection.channel.id,
            collection.describe()
        );
    }
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);

    for collection in collections {
        for message in &collection.messages {
            let _ = writeln!(
                out,
                "Chat: {} | chat_id={}",
                collection.channel.title, collection.channel.id
            );
            let _ = writeln!(out, "Message ID: {}", message.id);
            let _ = writeln!(
                out,
                "Date (UTC): {}",
                message.date.to_rfc3339_opts(SecondsFormat::Secs, true)
            );
            let _ = writeln!(out, "Content:");
            let _ = writeln!(out, "{}", message.text_with_links());
            let _ = writeln!(out, "{rule}");
            let _ = writeln!(out);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, Message, ScanStatus};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn collection(id: i64, title: &str, texts: &[&str]) -> ChannelCollection {
        let mut c = ChannelCollection::new(Channel::new(id, title));
        c.messages = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Message {
                channel_id: id,
                id: 100 - i as i64,
                date: now() - chrono::Duration::hours(i as i64 + 1),
                text: text.to_string(),
                entities: Vec::new(),
            })
            .collect();
        c
    }

    #[test]
    fn test_raw_corpus_keeps_selection_order() {
        let collections = vec![
            collection(1, "A", &["first", "second"]),
            collection(2, "B", &["third"]),
        ];
        assert_eq!(raw_corpus(&collections), "first\n\nsecond\n\nthird\n\n");
        assert_eq!(raw_corpus(&[]), "");
    }

    #[test]
    fn test_report_lists_channel_outcomes() {
        let mut failed = collection(2, "Flaky", &["kept"]);
        failed.status = ScanStatus::Failed("connection reset".into());
        let collections = vec![collection(1, "Quiet", &[]), failed];

        let report = render_report(&collections, &CollectionWindow::ending_at(now(), 24), now());

        assert!(report.starts_with("=== Message Report ===\n"));
        assert!(report.contains("Generated (UTC): 2026-10-16T12:00:00Z"));
        assert!(report.contains("Window (UTC): 2026-10-15T12:00:00Z .. 2026-10-16T12:00:00Z"));
        assert!(report.contains("Messages: 1"));
        assert!(report.contains("- Quiet | chat_id=1 | zero messages in window"));
        assert!(report.contains("- Flaky | chat_id=2 | partially scanned due to error"));
        assert!(report.contains("Chat: Flaky | chat_id=2\nMessage ID: 100\n"));
        assert!(report.contains("Content:\nkept\n"));
    }
}
