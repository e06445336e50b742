//! Page access for the extraction engine.
//!
//! A [`PageContext`] hands out owned HTML snapshots. All parsing happens in
//! synchronous helpers over those snapshots, so a parsed document never lives
//! across an `.await`.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Owned copy of a document, plus any same-origin iframes the host could read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub html: String,
    #[serde(default)]
    pub frames: Vec<PageSnapshot>,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            html: html.into(),
            frames: Vec::new(),
        }
    }

    pub fn with_frame(mut self, frame: PageSnapshot) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Addresses the `index`-th match of `selector` in the current document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub selector: String,
    pub index: usize,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.selector, self.index)
    }
}

#[async_trait]
pub trait PageContext: Send + Sync {
    async fn snapshot(&self) -> Result<PageSnapshot, HostError>;

    /// Clicks the element. `Ok(false)` means the element was not found or the
    /// host cannot click.
    async fn click(&self, target: &ElementHandle) -> Result<bool, HostError>;
}

/// Parses a selector from the built-in tables. Malformed entries are skipped.
pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(selector = css, error = ?e, "invalid selector");
            None
        }
    }
}

pub fn select_all<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => doc.select(&sel).collect(),
        None => Vec::new(),
    }
}

pub fn select_first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    selector(css).and_then(|sel| doc.select(&sel).next())
}

pub fn select_within<'a>(el: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => el.select(&sel).collect(),
        None => Vec::new(),
    }
}

pub fn first_within<'a>(el: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    selector(css).and_then(|sel| el.select(&sel).next())
}

pub fn exists(doc: &Html, css: &str) -> bool {
    select_first(doc, css).is_some()
}

/// Text content with runs of whitespace collapsed.
pub fn clean_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn element_children<'a>(el: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    el.children().filter_map(ElementRef::wrap).collect()
}

pub fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name)
}

/// Case-insensitive substring match on an attribute.
pub fn attr_contains(el: ElementRef<'_>, name: &str, needle: &str) -> bool {
    attr(el, name)
        .map(|v| v.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

/// Best effort without layout: `hidden`, inline `display:none` or
/// `visibility:hidden`, and `aria-hidden="true"` count as invisible.
pub fn is_visible(el: ElementRef<'_>) -> bool {
    if attr(el, "hidden").is_some() {
        return false;
    }
    if attr(el, "aria-hidden").map(|v| v.eq_ignore_ascii_case("true")) == Some(true) {
        return false;
    }
    match attr(el, "style") {
        Some(style) => {
            let compact: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase();
            !compact.contains("display:none") && !compact.contains("visibility:hidden")
        }
        None => true,
    }
}

/// Builds a handle that addresses `el` through `css` in `doc`.
pub fn handle_for(doc: &Html, css: &str, el: ElementRef<'_>) -> Option<ElementHandle> {
    let sel = selector(css)?;
    doc.select(&sel)
        .position(|candidate| candidate.id() == el.id())
        .map(|index| ElementHandle::new(css, index))
}
