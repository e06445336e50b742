//! Transcript extraction for recording playback pages.
//!
//! Two phases: open the transcript panel if a control for it exists, then
//! locate the rows. Rows are normalized by [`super::timestamp`].

use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;
use std::time::Duration;

use super::diagnostic::page_structure;
use super::guard::check_page;
use super::outcome::{ExtractionFailure, ExtractionOutcome};
use super::page::{
    attr, attr_contains, clean_text, element_children, handle_for, is_visible, select_all,
    ElementHandle, PageContext, PageSnapshot,
};
use super::strategy::{first_success, Strategy};
use super::timestamp::{normalize_items, RawItem};
use crate::error::ErrorKind;
use crate::model::TranscriptRecord;

/// Minimum rows before a generic container counts as a transcript.
const MIN_CONTAINER_ROWS: usize = 10;
/// Rows sampled when checking a container's shape.
const SHAPE_SAMPLE: usize = 5;

const DIRECT_SELECTORS: &[&str] = &[
    ".transcript-list-item",
    r#"[class*="transcript-list-item"]"#,
    r#"[role="listitem"]"#,
    ".transcript_sentence",
    "li.item",
    r#"[class*="transcript-item"]"#,
    r#"[data-kind="caption"]"#,
];

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

const BUTTONS: &str = r#"button, [role="button"]"#;

fn labelled_button(doc: &Html) -> Option<ElementHandle> {
    select_all(doc, "button")
        .into_iter()
        .find(|b| attr_contains(*b, "aria-label", "transcript") && is_visible(*b))
        .and_then(|b| handle_for(doc, "button", b))
}

fn labelled_role_button(doc: &Html) -> Option<ElementHandle> {
    let css = r#"[role="button"]"#;
    select_all(doc, css)
        .into_iter()
        .find(|b| attr_contains(*b, "aria-label", "transcript") && is_visible(*b))
        .and_then(|b| handle_for(doc, css, b))
}

fn classed_button(doc: &Html) -> Option<ElementHandle> {
    visible_match(doc, "button.transcript-btn")
}

fn tab_button(doc: &Html) -> Option<ElementHandle> {
    visible_match(doc, r#"button[data-tab="transcript"]"#)
}

fn text_scan(doc: &Html) -> Option<ElementHandle> {
    select_all(doc, BUTTONS)
        .into_iter()
        .find(|b| clean_text(*b).to_lowercase().contains("transcript") && is_visible(*b))
        .and_then(|b| handle_for(doc, BUTTONS, b))
}

fn visible_match(doc: &Html, css: &str) -> Option<ElementHandle> {
    select_all(doc, css)
        .into_iter()
        .find(|b| is_visible(*b))
        .and_then(|b| handle_for(doc, css, b))
}

const ACTIVATION: &[Strategy<ElementHandle>] = &[
    Strategy::new("aria-label button", labelled_button),
    Strategy::new("aria-label role=button", labelled_role_button),
    Strategy::new("transcript-btn class", classed_button),
    Strategy::new("data-tab", tab_button),
    Strategy::new("button text scan", text_scan),
];

/// The control that opens the transcript panel, if one is visible.
pub fn find_transcript_control(doc: &Html) -> Option<ElementHandle> {
    first_success(ACTIVATION, doc).map(|(_, handle)| handle)
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

fn raw_item(el: ElementRef<'_>) -> RawItem {
    RawItem::new(attr(el, "aria-label"), el.text().collect::<String>())
}

fn non_empty(items: Vec<RawItem>) -> Option<Vec<RawItem>> {
    (!items.is_empty()).then_some(items)
}

fn direct_rows(doc: &Html) -> Option<Vec<RawItem>> {
    // The transcript toggle itself is never a row.
    let first = select_all(doc, DIRECT_SELECTORS[0]);
    if !first.is_empty() {
        return non_empty(first.into_iter().map(raw_item).collect());
    }

    let labelled: Vec<_> = select_all(doc, "[aria-label]")
        .into_iter()
        .filter(|el| attr_contains(*el, "aria-label", "transcript"))
        .filter(|el| el.value().name() != "button" && attr(*el, "role") != Some("button"))
        .collect();
    if !labelled.is_empty() {
        return non_empty(labelled.into_iter().map(raw_item).collect());
    }

    DIRECT_SELECTORS[1..].iter().find_map(|css| {
        let hits = select_all(doc, css);
        if hits.is_empty() {
            None
        } else {
            tracing::debug!(selector = *css, rows = hits.len(), "direct transcript rows");
            non_empty(hits.into_iter().map(raw_item).collect())
        }
    })
}

fn time_like() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+:\d+").expect("time regex is valid"))
}

/// At least ten children, and the first five each carry a time or a sentence.
fn looks_like_rows(el: ElementRef<'_>) -> bool {
    let children = element_children(el);
    children.len() >= MIN_CONTAINER_ROWS
        && children.iter().take(SHAPE_SAMPLE).all(|child| {
            let text = clean_text(*child);
            time_like().is_match(&text) || text.split(' ').count() > 3
        })
}

fn hints_transcript(el: ElementRef<'_>) -> bool {
    attr_contains(el, "class", "transcript")
        || attr_contains(el, "id", "transcript")
        || attr(el, "role") == Some("list")
}

fn children_as_rows(el: ElementRef<'_>) -> Option<Vec<RawItem>> {
    non_empty(element_children(el).into_iter().map(raw_item).collect())
}

fn container_rows(doc: &Html) -> Option<Vec<RawItem>> {
    let hinted = select_all(doc, "*")
        .into_iter()
        .filter(|el| hints_transcript(*el) && looks_like_rows(*el))
        .max_by_key(|el| element_children(*el).len());
    if let Some(container) = hinted {
        return children_as_rows(container);
    }

    select_all(doc, "div")
        .into_iter()
        .filter(|el| looks_like_rows(*el))
        .max_by_key(|el| element_children(*el).len())
        .and_then(children_as_rows)
}

fn list_rows(doc: &Html) -> Option<Vec<RawItem>> {
    select_all(doc, r#"[role="list"], ul, ol, [class*="list"]"#)
        .into_iter()
        .find(|el| element_children(*el).len() >= MIN_CONTAINER_ROWS)
        .and_then(children_as_rows)
}

const LOCATION: &[Strategy<Vec<RawItem>>] = &[
    Strategy::new("direct selectors", direct_rows),
    Strategy::new("transcript container", container_rows),
    Strategy::new("list-like element", list_rows),
];

/// Searches the document, then each readable iframe.
pub fn locate_rows(snapshot: &PageSnapshot) -> Option<(String, Vec<RawItem>)> {
    {
        let doc = snapshot.document();
        if let Some((name, rows)) = first_success(LOCATION, &doc) {
            return Some((name.to_string(), rows));
        }
    }

    snapshot.frames.iter().enumerate().find_map(|(i, frame)| {
        locate_rows(frame).map(|(name, rows)| (format!("iframe[{}] {}", i, name), rows))
    })
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// One synchronous pass over a snapshot: guard, locate, normalize.
pub fn inspect(snapshot: &PageSnapshot) -> Result<TranscriptRecord, ExtractionFailure> {
    {
        let doc = snapshot.document();
        if let Some(terminal) = check_page(&doc) {
            return Err(terminal);
        }
    }

    let Some((strategy, rows)) = locate_rows(snapshot) else {
        let doc = snapshot.document();
        return Err(ExtractionFailure::new(
            ErrorKind::ContentNotFound,
            "No transcript items found on page. This recording may not have a transcript available.",
        )
        .with_diagnostic(page_structure(&doc, &snapshot.url, snapshot.frames.len())));
    };

    let segments = normalize_items(&rows);
    tracing::debug!(
        strategy = %strategy,
        rows = rows.len(),
        segments = segments.len(),
        "transcript rows located"
    );
    if segments.is_empty() {
        return Err(ExtractionFailure::new(
            ErrorKind::ContentNotFound,
            "Found items but could not extract valid transcript data",
        )
        .with_diagnostic(serde_json::json!({ "strategy": strategy, "rows": rows.len() })));
    }

    Ok(TranscriptRecord::new(snapshot.url.clone(), segments))
}

fn control_for(snapshot: &PageSnapshot) -> Option<ElementHandle> {
    let doc = snapshot.document();
    find_transcript_control(&doc)
}

/// A single extraction attempt against a live page.
///
/// The panel may already be open, so the page is read once before any click.
pub async fn extract_transcript_once(
    page: &dyn PageContext,
    activation_settle: Duration,
) -> ExtractionOutcome<TranscriptRecord> {
    let first = match page.snapshot().await {
        Ok(s) => s,
        Err(e) => return ExtractionOutcome::failure(ErrorKind::CommunicationFailure, e.to_string()),
    };

    let first_failure = match inspect(&first) {
        Ok(record) => return ExtractionOutcome::Success(record),
        Err(f) if f.kind.short_circuits_retry() => return ExtractionOutcome::Failure(f),
        Err(f) => f,
    };

    let Some(control) = control_for(&first) else {
        tracing::debug!("no transcript control found");
        return ExtractionOutcome::Failure(first_failure);
    };

    match page.click(&control).await {
        Ok(true) => tracing::debug!(control = %control, "clicked transcript control"),
        Ok(false) => {
            tracing::debug!(control = %control, "transcript control not clickable");
            return ExtractionOutcome::Failure(first_failure);
        }
        Err(e) => return ExtractionOutcome::failure(ErrorKind::CommunicationFailure, e.to_string()),
    }

    tokio::time::sleep(activation_settle).await;

    match page.snapshot().await {
        Ok(after) => inspect(&after).into(),
        Err(e) => ExtractionOutcome::failure(ErrorKind::CommunicationFailure, e.to_string()),
    }
}
