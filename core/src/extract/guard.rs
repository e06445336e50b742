//! Pre-extraction checks for pages that can never yield content.

use scraper::Html;

use super::outcome::ExtractionFailure;
use super::page::{exists, select_first};
use crate::error::ErrorKind;

const INVALID_LINK_PHRASES: &[&str] = &[
    "meeting has not been found",
    "meeting is unavailable",
    "invalid meeting",
];

/// Returns a terminal failure when the page is password protected or the link is dead.
pub fn check_page(doc: &Html) -> Option<ExtractionFailure> {
    if exists(doc, r#"input[type="password"]"#) {
        return Some(ExtractionFailure::new(
            ErrorKind::AccessRestricted,
            "This recording requires a password. Set it to not require a password and try again.",
        ));
    }

    let body_text = select_first(doc, "body")
        .map(|b| b.text().collect::<String>())
        .unwrap_or_default()
        .to_lowercase();
    if let Some(phrase) = INVALID_LINK_PHRASES
        .iter()
        .find(|p| body_text.contains(*p))
    {
        tracing::debug!(phrase = *phrase, "invalid link phrase found");
        return Some(ExtractionFailure::new(
            ErrorKind::LinkInvalid,
            "This recording link appears to be invalid or expired.",
        ));
    }

    None
}
