//! Extraction engine.
//!
//! Page-specific heuristics that turn an uncontrolled third-party DOM into
//! normalized records. Every entry point works on an owned [`PageSnapshot`]
//! and reports an [`ExtractionOutcome`].

pub mod assignment;
pub mod diagnostic;
pub mod guard;
pub mod outcome;
pub mod page;
pub mod recording;
pub mod rubric;
pub mod strategy;
pub mod timestamp;
pub mod transcript;

pub use assignment::{
    extract_assignment_detail, extract_assignment_list, parse_due_date, AssignmentDetail,
    AssignmentSummary,
};
pub use outcome::{ExtractionFailure, ExtractionOutcome};
pub use page::{ElementHandle, PageContext, PageSnapshot};
pub use recording::{
    course_id_from_url, find_recording_conversations, read_recording_message,
    RecordingConversation, RecordingMessage,
};
pub use rubric::extract_rubric;
pub use strategy::{first_success, Strategy};
pub use timestamp::{normalize_items, RawItem};
pub use transcript::extract_transcript_once;
