//! Transcript item normalization: timestamps, prefixes and UI noise.

use regex::Regex;
use std::sync::OnceLock;

use super::page::collapse_whitespace;
use crate::model::TranscriptSegment;

/// What the page gave us for one transcript row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub aria_label: Option<String>,
    pub text: String,
}

impl RawItem {
    pub fn new(aria_label: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            aria_label: aria_label.map(str::to_string),
            text: text.into(),
        }
    }
}

const UI_CHROME: &[&str] = &["transcript", "loading", "starting", "view all", "menu"];
const UI_CHROME_MAX_WORDS: usize = 4;
const MIN_TEXT_CHARS: usize = 3;

fn hms_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+):(\d{1,2}):(\d{1,2})").expect("hms regex is valid"))
}

fn ms_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+):(\d{1,2})").expect("ms regex is valid"))
}

fn natural_re() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"(?i)(\d+)\s*hours?").expect("hour regex is valid"),
            Regex::new(r"(?i)(\d+)\s*minutes?").expect("minute regex is valid"),
            Regex::new(r"(?i)(\d+)\s*seconds?").expect("second regex is valid"),
        ]
    })
}

fn leading_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+):(\d{1,2})(?::(\d{1,2}))?\s*").expect("leading time regex is valid")
    })
}

fn speaker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:Speaker\s+\d+|[A-Z][a-z]+):\s+").expect("speaker regex is valid")
    })
}

/// A missing group counts as 0; digits too long for `u64` yield `None`.
fn num(caps: &regex::Captures<'_>, i: usize) -> Option<u64> {
    match caps.get(i) {
        Some(m) => m.as_str().parse().ok(),
        None => Some(0),
    }
}

/// `None` when the total does not fit in `u32` seconds.
fn to_seconds(hours: u64, minutes: u64, seconds: u64) -> Option<u32> {
    let total = hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    u32::try_from(total).ok()
}

fn hms_of(c: &regex::Captures<'_>) -> Option<u32> {
    to_seconds(num(c, 1)?, num(c, 2)?, num(c, 3)?)
}

/// Seconds from an accessibility label. Forms are tried in order:
/// `H:MM:SS`, `MM:SS`, then "N hours N minutes N seconds".
pub fn parse_label_seconds(label: &str) -> Option<u32> {
    if let Some(c) = hms_re().captures(label) {
        return hms_of(&c);
    }
    if let Some(c) = ms_re().captures(label) {
        return to_seconds(0, num(&c, 1)?, num(&c, 2)?);
    }

    let parts: Vec<Option<Option<u64>>> = natural_re()
        .iter()
        .map(|re| re.captures(label).map(|c| num(&c, 1)))
        .collect();
    if parts.iter().all(Option::is_none) {
        return None;
    }
    let hours = parts[0].unwrap_or(Some(0))?;
    let minutes = parts[1].unwrap_or(Some(0))?;
    let seconds = parts[2].unwrap_or(Some(0))?;
    to_seconds(hours, minutes, seconds)
}

/// Seconds from a timestamp at the very start of visible text.
pub fn leading_seconds(text: &str) -> Option<u32> {
    let c = leading_time_re().captures(text)?;
    match c.get(3) {
        Some(_) => hms_of(&c),
        None => to_seconds(0, num(&c, 1)?, num(&c, 2)?),
    }
}

/// Drops a leading timestamp, then a speaker prefix such as `Speaker 2: ` or `Alice: `.
pub fn strip_prefixes(text: &str) -> String {
    let text = collapse_whitespace(text);
    let without_time = leading_time_re().replace(&text, "");
    let without_speaker = speaker_re().replace(&without_time, "");
    without_speaker.trim().to_string()
}

/// Short strings naming player controls rather than speech.
pub fn is_ui_chrome(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.split_whitespace().count() <= UI_CHROME_MAX_WORDS
        && UI_CHROME.iter().any(|needle| lower.contains(needle))
}

/// Turns raw rows into ordered segments.
///
/// The label timestamp wins over a leading timestamp in the text. Rows
/// without either get the previous row's seconds plus one (0 for the
/// first row), in discovery order. The result is stably sorted by seconds.
pub fn normalize_items(items: &[RawItem]) -> Vec<TranscriptSegment> {
    let mut found: Vec<(Option<u32>, String)> = Vec::with_capacity(items.len());

    for item in items {
        let visible = collapse_whitespace(&item.text);
        if visible.chars().count() < MIN_TEXT_CHARS {
            continue;
        }

        let seconds = item
            .aria_label
            .as_deref()
            .and_then(parse_label_seconds)
            .or_else(|| leading_seconds(&visible));

        let text = strip_prefixes(&visible);
        if text.chars().count() < MIN_TEXT_CHARS || is_ui_chrome(&text) {
            continue;
        }
        found.push((seconds, text));
    }

    let mut previous: Option<u32> = None;
    let mut segments: Vec<TranscriptSegment> = found
        .into_iter()
        .map(|(seconds, text)| {
            let resolved = seconds.unwrap_or_else(|| previous.map(|p| p.saturating_add(1)).unwrap_or(0));
            previous = Some(resolved);
            TranscriptSegment::new(resolved, text)
        })
        .collect();

    segments.sort_by_key(|s| s.timestamp_seconds);
    segments
}
