use scraper::Html;
use serde_json::{json, Value};

use super::page::{attr_contains, clean_text, element_children, exists, is_visible, select_all, select_first};

/// Structure summary attached to a ContentNotFound failure.
pub fn page_structure(doc: &Html, url: &str, frame_count: usize) -> Value {
    let body_children = select_first(doc, "body")
        .map(|b| element_children(b).len())
        .unwrap_or(0);

    let buttons = select_all(doc, r#"button, [role="button"]"#);
    let labelled_transcript_button = buttons
        .iter()
        .any(|b| attr_contains(*b, "aria-label", "transcript"));
    let text_transcript_buttons = buttons
        .iter()
        .filter(|b| clean_text(**b).to_lowercase().contains("transcript"))
        .count();
    let visible_buttons = select_all(doc, "button")
        .into_iter()
        .filter(|b| is_visible(*b))
        .count();

    let large_divs = select_all(doc, "div")
        .into_iter()
        .filter(|d| element_children(*d).len() > 10)
        .count();

    json!({
        "url": url,
        "bodyChildCount": body_children,
        "hasTranscriptButton": labelled_transcript_button,
        "possibleTranscriptButtons": text_transcript_buttons,
        "hasVideoPlayer": exists(doc, "video"),
        "hasZoomBranding": exists(doc, r#"[class*="zoom"]"#),
        "hasPasswordField": exists(doc, r#"input[type="password"]"#),
        "visibleButtons": visible_buttons,
        "potentialTranscriptContainers": select_all(doc, r#"[role="list"], ul, .transcript"#).len(),
        "listElements": select_all(doc, "ul, ol").len(),
        "divsWithManyChildren": large_divs,
        "iframes": frame_count,
    })
}
