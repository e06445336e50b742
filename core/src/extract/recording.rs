//! Recording announcements in the LMS inbox.

use regex::Regex;
use scraper::ElementRef;
use std::sync::OnceLock;

use super::page::{clean_text, first_within, handle_for, select_all, ElementHandle, PageSnapshot};

pub const RECORDING_MARKER: &str = "[Recording Available]";
const OPEN_CONVERSATION: &str = r#"[data-testid^="open-conversation-for-"]"#;

/// A conversation whose preview announces a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingConversation {
    pub open: ElementHandle,
    pub date: String,
}

/// Fields parsed from the opened announcement message.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingMessage {
    pub url: String,
    pub title: String,
    pub host: String,
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Recording URL:\s*(https://\S+)").expect("url regex is valid"))
}

fn topic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Topic:\s*([^\n]+)").expect("topic regex is valid"))
}

fn host_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Host:\s*([^\n]+)").expect("host regex is valid"))
}

fn course_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"course=course_(\d+)").expect("course regex is valid"))
}

/// Course filter selected in the inbox URL fragment (`#filter=course=course_123`).
pub fn course_id_from_url(url: &str) -> Option<String> {
    course_re().captures(url).map(|c| c[1].to_string())
}

fn preview_announces_recording(conversation: ElementRef<'_>) -> bool {
    first_within(conversation, r#"span[data-testid="last-message-content"]"#)
        .map(|p| clean_text(p).contains(RECORDING_MARKER))
        .unwrap_or(false)
}

/// Conversations with a recording announcement, in page order.
pub fn find_recording_conversations(snapshot: &PageSnapshot) -> Vec<RecordingConversation> {
    let doc = snapshot.document();
    select_all(&doc, r#"[data-testid="conversation"]"#)
        .into_iter()
        .filter(|c| preview_announces_recording(*c))
        .filter_map(|c| {
            let link = first_within(c, OPEN_CONVERSATION)?;
            let open = handle_for(&doc, OPEN_CONVERSATION, link)?;
            let date = first_within(c, r#"span[color="brand"]"#)
                .map(clean_text)
                .unwrap_or_default();
            Some(RecordingConversation { open, date })
        })
        .collect()
}

/// Text nodes joined by newlines so `<br>`-separated lines stay separate.
fn line_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse_recording_text(text: &str) -> Option<RecordingMessage> {
    let url = url_re().captures(text)?[1].to_string();
    let title = topic_re()
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled Recording".to_string());
    let host = host_re()
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();
    Some(RecordingMessage { url, title, host })
}

/// Reads the opened conversation for the announcement body.
pub fn read_recording_message(snapshot: &PageSnapshot) -> Option<RecordingMessage> {
    let doc = snapshot.document();
    select_all(&doc, "span")
        .into_iter()
        .map(line_text)
        .find(|t| t.contains(RECORDING_MARKER) && t.contains("Recording URL:"))
        .and_then(|t| parse_recording_text(&t))
}
