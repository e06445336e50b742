//! Normalized records produced by extraction. These are the payloads handed to
//! the backend, so every type here is plain JSON with stable camelCase keys.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricRating {
    pub points: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricItem {
    pub criterion: String,
    pub points: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ratings: Vec<RubricRating>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    pub title: String,
    pub url: String,
    /// ISO-8601 date or date-time, `None` when the page shows no due date.
    pub due_date: Option<String>,
    pub description: String,
    pub rubric: Option<Vec<RubricItem>>,
    pub points_possible: f64,
    pub status: String,
    #[serde(default = "default_group")]
    pub assignment_group: String,
}

pub(crate) fn default_group() -> String {
    "Uncategorized".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub timestamp_seconds: u32,
    /// `MM:SS`; minutes are not wrapped into hours.
    pub timestamp_label: String,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(timestamp_seconds: u32, text: impl Into<String>) -> Self {
        Self {
            timestamp_seconds,
            timestamp_label: format_label(timestamp_seconds),
            text: text.into(),
        }
    }
}

pub fn format_label(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRecord {
    #[serde(default)]
    pub recording_id: Option<String>,
    pub url: String,
    pub transcript_segments: Vec<TranscriptSegment>,
    pub formatted_text: String,
    pub segment_count: usize,
}

impl TranscriptRecord {
    pub fn new(url: impl Into<String>, segments: Vec<TranscriptSegment>) -> Self {
        let formatted_text = format_transcript(&segments);
        Self {
            recording_id: None,
            url: url.into(),
            segment_count: segments.len(),
            transcript_segments: segments,
            formatted_text,
        }
    }
}

/// Renders segments grouped under `[Minute N]` headers, one `[MM:SS] text` line each.
pub fn format_transcript(segments: &[TranscriptSegment]) -> String {
    if segments.is_empty() {
        return "No transcript data available.".to_string();
    }

    let mut out = String::new();
    let mut current_minute = None;
    for seg in segments {
        let minute = seg.timestamp_seconds / 60;
        if current_minute != Some(minute) {
            current_minute = Some(minute);
            out.push_str(&format!("\n\n[Minute {}]\n\n", minute));
        }
        out.push_str(&format!("[{}] {}\n", seg.timestamp_label, seg.text));
    }
    out.trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TranscriptStatus {
    #[serde(rename_all = "camelCase")]
    Success {
        segment_count: usize,
        segments: Vec<TranscriptSegment>,
        formatted_text: String,
    },
    #[serde(rename_all = "camelCase")]
    Failed { error: String, recoverable: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingRecord {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(rename = "type", default = "default_recording_type")]
    pub recording_type: String,
    pub transcript: Option<TranscriptStatus>,
}

fn default_recording_type() -> String {
    "zoom".to_string()
}
